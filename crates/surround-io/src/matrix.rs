//! Dense matrix and vector blocks as they appear in calibration documents.

use crate::CalibrationError;
use nalgebra::{Matrix3, Vector2};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Row-major dense matrix of `f64` with a declared shape.
///
/// The shape is only trusted after [`MatrixBlock::validate`]; deserialized
/// blocks may carry a `rows × cols` that disagrees with `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixBlock {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl MatrixBlock {
    /// Create a block, rejecting inconsistent shapes.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, CalibrationError> {
        let block = Self { rows, cols, data };
        block.validate("matrix")?;
        Ok(block)
    }

    /// Check `rows × cols == data.len()`.
    pub fn validate(&self, name: &str) -> Result<(), CalibrationError> {
        if self.rows.checked_mul(self.cols) != Some(self.data.len()) {
            return Err(CalibrationError::ShapeMismatch {
                block: name.to_string(),
                rows: self.rows,
                cols: self.cols,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    /// Element at (row, col), if inside the block.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    /// Same values under a new shape with the same element count.
    pub fn reshape(&self, rows: usize, cols: usize) -> Result<Self, CalibrationError> {
        let reshaped = Self {
            rows,
            cols,
            data: self.data.clone(),
        };
        reshaped.validate("reshape")?;
        Ok(reshaped)
    }

    /// Interpret a validated 3×3 block as a matrix.
    pub fn to_matrix3(&self, name: &str) -> Result<Matrix3<f64>, CalibrationError> {
        self.validate(name)?;
        if self.rows != 3 || self.cols != 3 {
            return Err(CalibrationError::UnexpectedDimensions {
                block: name.to_string(),
                expected: "3x3".to_string(),
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(Matrix3::from_row_slice(&self.data))
    }

    pub fn from_matrix3(matrix: &Matrix3<f64>) -> Self {
        let data = (0..3)
            .flat_map(|r| (0..3).map(move |c| matrix[(r, c)]))
            .collect();
        Self {
            rows: 3,
            cols: 3,
            data,
        }
    }
}

impl Index<(usize, usize)> for MatrixBlock {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of bounds for {}x{} block",
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

/// Two-component vector block (`{ data: [x, y] }`).
///
/// Inline sequences (`[x, y]`) are accepted on input; output always uses the
/// block form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "VectorRepr")]
pub struct VectorBlock {
    pub data: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VectorRepr {
    Block { data: Vec<f64> },
    Inline(Vec<f64>),
}

impl From<VectorRepr> for VectorBlock {
    fn from(repr: VectorRepr) -> Self {
        match repr {
            VectorRepr::Block { data } | VectorRepr::Inline(data) => Self { data },
        }
    }
}

impl VectorBlock {
    pub fn from_vector2(v: &Vector2<f64>) -> Self {
        Self {
            data: vec![v.x, v.y],
        }
    }

    /// Interpret the block as a 2-vector.
    pub fn to_vector2(&self, name: &str) -> Result<Vector2<f64>, CalibrationError> {
        match self.data.as_slice() {
            [x, y] => Ok(Vector2::new(*x, *y)),
            _ => Err(CalibrationError::InvalidVector {
                block: name.to_string(),
                len: self.data.len(),
            }),
        }
    }
}
