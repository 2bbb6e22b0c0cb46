use std::fmt;
use std::ops::Mul;

use crate::types::{GradientAxis, LogicalAxis};

/// Maps logical gradient directions (phase-encode, readout, slice) to the
/// physical X, Y, Z axes. Column `i` holds the physical direction of
/// logical direction `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(pub [[f64; 3]; 3]);

impl RotationMatrix {
    pub fn identity() -> Self {
        Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    pub fn set_column(&mut self, gradient: GradientAxis, vector: [f64; 3]) {
        let col = gradient.index();
        for (row, value) in vector.into_iter().enumerate() {
            self.0[row][col] = value;
        }
    }

    pub fn column(&self, gradient: GradientAxis) -> [f64; 3] {
        let col = gradient.index();
        [self.0[0][col], self.0[1][col], self.0[2][col]]
    }
}

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Logical `[pe, ro, sl]` to physical `[x, y, z]`.
impl Mul<[f64; 3]> for &RotationMatrix {
    type Output = [f64; 3];

    fn mul(self, rhs: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * rhs[0] + m[0][1] * rhs[1] + m[0][2] * rhs[2],
            m[1][0] * rhs[0] + m[1][1] * rhs[1] + m[1][2] * rhs[2],
            m[2][0] * rhs[0] + m[2][1] * rhs[1] + m[2][2] * rhs[2],
        ]
    }
}

impl fmt::Display for RotationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "[{:+.4} {:+.4} {:+.4}]", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

/// The matrices of both logical axes. Rotation instructions overwrite
/// single columns, which then persist until overwritten again.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationState {
    pub a: RotationMatrix,
    pub b: RotationMatrix,
}

impl RotationState {
    pub fn matrix(&self, log: LogicalAxis) -> &RotationMatrix {
        match log {
            LogicalAxis::A => &self.a,
            LogicalAxis::B => &self.b,
        }
    }

    /// Returns the state with one column replaced.
    pub fn rotated(mut self, log: LogicalAxis, gradient: GradientAxis, vector: [f64; 3]) -> Self {
        match log {
            LogicalAxis::A => self.a.set_column(gradient, vector),
            LogicalAxis::B => self.b.set_column(gradient, vector),
        }
        self
    }

    /// Physical gradient of the superposition of both logical axes.
    pub fn physical(&self, logical_a: [f64; 3], logical_b: [f64; 3]) -> [f64; 3] {
        let a = &self.a * logical_a;
        let b = &self.b * logical_b;
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn identity_is_passthrough() {
        let state = RotationState::default();
        check!(state.physical([1.0, 2.0, 3.0], [0.0; 3]) == [1.0, 2.0, 3.0]);
        check!(state.physical([1.0, 2.0, 3.0], [1.0, 1.0, 1.0]) == [2.0, 3.0, 4.0]);
    }

    #[test]
    fn column_overwrite_persists() {
        // swap readout and phase-encode on axis B only
        let state = RotationState::default()
            .rotated(LogicalAxis::B, GradientAxis::PhaseEncode, [0.0, 1.0, 0.0])
            .rotated(LogicalAxis::B, GradientAxis::Readout, [1.0, 0.0, 0.0]);

        check!(state.a == RotationMatrix::identity());
        check!(state.b.column(GradientAxis::PhaseEncode) == [0.0, 1.0, 0.0]);
        check!(state.physical([0.0; 3], [5.0, 7.0, 0.0]) == [7.0, 5.0, 0.0]);
        check!(state.physical([5.0, 7.0, 0.0], [5.0, 7.0, 0.0]) == [12.0, 12.0, 0.0]);
    }

    #[test]
    fn random_rotation_preserves_norm() {
        for _ in 0..1000 {
            let angle = rand::random::<f64>() * std::f64::consts::TAU;
            let (s, c) = angle.sin_cos();
            let state = RotationState::default()
                .rotated(LogicalAxis::A, GradientAxis::PhaseEncode, [c, s, 0.0])
                .rotated(LogicalAxis::A, GradientAxis::Readout, [-s, c, 0.0]);

            let v = [rand::random::<f64>(), rand::random::<f64>(), rand::random::<f64>()];
            let p = state.physical(v, [0.0; 3]);
            let norm = |x: [f64; 3]| (x[0] * x[0] + x[1] * x[1] + x[2] * x[2]).sqrt();
            check!((norm(p) - norm(v)).abs() < 1e-12);
            check!(p[2] == v[2]);
        }
    }
}
