mod scalar_types;
mod vector_types;

pub use scalar_types::*;
pub use vector_types::*;
