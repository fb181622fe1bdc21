use serde::{Deserialize, Serialize};

/// A 3D affine transform from voxel to physical coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform3D {
    /// 3x4 affine transformation matrix in xyz coordinate order
    matrix: [[f64; 4]; 3],
}

impl Default for AffineTransform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform3D {
    /// Create an affine transform from a 3x4 row-major matrix.
    #[must_use]
    pub const fn new(matrix: [[f64; 4]; 3]) -> Self {
        Self { matrix }
    }

    /// The identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self::scale(1.0, 1.0, 1.0)
    }

    /// A scale transform `diag(sx, sy, sz)`.
    #[must_use]
    pub const fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
            ],
        }
    }

    /// Return the 3x4 row-major matrix.
    #[must_use]
    pub const fn matrix(&self) -> &[[f64; 4]; 3] {
        &self.matrix
    }

    /// Apply the transform to `point`.
    #[must_use]
    pub fn apply(&self, point: [f64; 3]) -> [f64; 3] {
        self.matrix.map(|row| {
            row[0] * point[0] + row[1] * point[1] + row[2] * point[2] + row[3]
        })
    }

    /// Return the transform applying `other` and then `self`.
    #[must_use]
    pub fn concatenate(&self, other: &Self) -> Self {
        let a = &self.matrix;
        let b = &other.matrix;
        let mut matrix = [[0.0; 4]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (0..3).map(|k| a[i][k] * b[k][j]).sum::<f64>();
            }
            row[3] += a[i][3];
        }
        Self { matrix }
    }
}
