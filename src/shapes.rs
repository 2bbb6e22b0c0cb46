use std::collections::HashMap;

use crate::document::Element;
use crate::error::{Error, Result};

/// Arbitrary gradient waveforms, referenced by `Shape ID` in axis
/// instructions. Unit: `mT / m`
#[derive(Debug, Clone, Default)]
pub struct ShapeLibrary {
    shapes: HashMap<u32, Vec<f64>>,
}

impl ShapeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the `Shapes` sections of every document. The number of
    /// points is taken from the values actually present, `NumberOfPoints`
    /// is only checked for a mismatch warning.
    pub fn load<'a, I>(documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Element>,
    {
        let mut library = Self::new();
        for doc in documents {
            for shape in doc.children_named("Shapes").flat_map(|s| &s.children) {
                if shape.tag != "Shape" {
                    return Err(Error::UnknownInstruction(shape.tag.clone()));
                }
                let id: u32 = shape.parse("ID")?;
                let values = shape
                    .text
                    .split_whitespace()
                    .map(|v| {
                        v.parse::<f64>()
                            .ok()
                            .filter(|value| value.is_finite())
                            .ok_or_else(|| Error::InvalidAttribute {
                                tag: shape.tag.clone(),
                                attribute: "values",
                                value: v.to_owned(),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;

                if let Some(declared) = shape.attr("NumberOfPoints") {
                    if declared.trim().parse::<usize>().ok() != Some(values.len()) {
                        log::warn!(
                            "shape {id} declares {declared} points but contains {}",
                            values.len()
                        );
                    }
                }
                library.insert(id, values);
            }
        }
        Ok(library)
    }

    pub fn insert(&mut self, id: u32, values: Vec<f64>) {
        self.shapes.insert(id, values);
    }

    pub fn get(&self, id: u32) -> Result<&[f64]> {
        self.shapes
            .get(&id)
            .map(Vec::as_slice)
            .ok_or(Error::UnknownShape(id))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
