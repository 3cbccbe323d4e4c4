/*!
# Dense and Symmetric Matrices

Two concrete containers share one contract, [`MatrixLike`]:

- [`Matrix`] keeps `rows * cols` elements in a flat row-major vector.
- [`SymmetricMatrix`] keeps only the lower triangle, `n * (n + 1) / 2` elements,
  and folds every `(i, j)` access onto `(max(i, j), min(i, j))`.

Out-of-range indices and shape mismatches are programming errors and panic.
File I/O returns [`crate::Result`].

## Example

```rust
use cosmo_mcmc::matrix::{multiply_matrices, Matrix, MatrixLike, SymmetricMatrix};

let mut cov = SymmetricMatrix::<f64>::new(2);
cov[(0, 0)] = 4.0;
cov[(1, 0)] = 2.0;
cov[(1, 1)] = 3.0;
assert_eq!(cov[(0, 1)], 2.0);

let x = Matrix::from_vec(vec![1.0, 1.0], true);
let mut y = Matrix::<f64>::new(0, 0);
multiply_matrices(&cov, &x, &mut y);
assert_eq!(y.as_slice(), &[6.0, 5.0]);
```
*/

mod dense;
mod format;
mod symmetric;

pub use dense::Matrix;
pub use symmetric::SymmetricMatrix;

use std::fmt::{Debug, Display};
use std::ops::{AddAssign, SubAssign};
use std::path::Path;
use std::str::FromStr;

use num_traits::Num;
use rayon::prelude::*;

use crate::error::Result;

/// Types that can be stored in a [`Matrix`] or [`SymmetricMatrix`].
///
/// Binary files hold elements in their native byte layout, hence the
/// [`bytemuck::Pod`] bound.
pub trait Element:
    Num
    + Copy
    + PartialEq
    + AddAssign
    + SubAssign
    + Debug
    + Display
    + FromStr
    + bytemuck::Pod
    + Send
    + Sync
    + 'static
{
    /// Formats the value for a text file with `precision` significant digits.
    /// Integer types ignore the precision.
    fn to_text(self, precision: usize) -> String;
}

macro_rules! float_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                fn to_text(self, precision: usize) -> String {
                    format!("{:.*e}", precision.saturating_sub(1), self)
                }
            }
        )*
    };
}

macro_rules! int_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                fn to_text(self, _precision: usize) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

float_element!(f32, f64);
int_element!(i32, i64, u32, u64);

/// The operations shared by dense and symmetric matrices.
///
/// Methods that take another matrix accept `&dyn MatrixLike<T>`, so dense and
/// symmetric operands mix freely. Where symmetry could be broken the
/// symmetric implementation checks [`MatrixLike::is_symmetric`] on the operand.
pub trait MatrixLike<T: Element>: Send + Sync {
    fn rows(&self) -> usize;

    fn cols(&self) -> usize;

    /// True for matrices whose storage enforces `m(i, j) == m(j, i)`.
    fn is_symmetric(&self) -> bool;

    /// Reads element `(i, j)`. Panics if either index is out of range.
    fn get(&self, i: usize, j: usize) -> T;

    /// Writes element `(i, j)`. Panics if either index is out of range.
    fn set(&mut self, i: usize, j: usize, value: T);

    /// Reallocates to the new shape, filling with zero. Old contents are lost.
    fn resize(&mut self, rows: usize, cols: usize) {
        self.resize_with(rows, cols, T::zero());
    }

    /// Reallocates to the new shape, filling with `value`. Old contents are lost.
    fn resize_with(&mut self, rows: usize, cols: usize, value: T);

    /// Deep copy of `other` into `self`, reshaping as needed.
    ///
    /// Self-assignment cannot be expressed through `&mut self` and `&other`
    /// at the same time, so no aliasing check is needed.
    fn copy_from(&mut self, other: &dyn MatrixLike<T>);

    /// Element-wise `self += other`. Panics on a shape mismatch.
    fn add(&mut self, other: &dyn MatrixLike<T>);

    /// Element-wise `self -= other`. Panics on a shape mismatch.
    fn subtract(&mut self, other: &dyn MatrixLike<T>);

    /// Writes the binary format: an `i32` header followed by native-endian elements.
    fn write_into_file(&self, path: &Path) -> Result<()>;

    /// Replaces `self` with the matrix stored in `path`. On error `self` is left untouched.
    fn read_from_file(&mut self, path: &Path) -> Result<()>;

    /// Writes a `rows<TAB>cols` header and one tab-separated line per row.
    fn write_into_text_file(&self, path: &Path, precision: usize) -> Result<()>;

    /// Replaces `self` with the matrix stored as text in `path`. On error `self`
    /// is left untouched.
    fn read_from_text_file(&mut self, path: &Path) -> Result<()>;

    /// Copy of row `i` as a `1 x cols` matrix.
    fn get_row(&self, i: usize) -> Matrix<T> {
        assert!(
            i < self.rows(),
            "invalid row index {i}, should be less than {}",
            self.rows()
        );
        let values = (0..self.cols()).map(|j| self.get(i, j)).collect();
        Matrix::from_vec(values, false)
    }

    /// Copy of column `j` as a `rows x 1` matrix.
    fn get_col(&self, j: usize) -> Matrix<T> {
        assert!(
            j < self.cols(),
            "invalid column index {j}, should be less than {}",
            self.cols()
        );
        let values = (0..self.rows()).map(|i| self.get(i, j)).collect();
        Matrix::from_vec(values, true)
    }

    /// Writes the transpose into `out`, resizing it to `cols x rows`.
    fn get_transpose(&self, out: &mut dyn MatrixLike<T>) {
        assert!(
            !out.is_symmetric() || self.is_symmetric(),
            "cannot store the transpose of a non-symmetric matrix in a symmetric one"
        );
        out.resize(self.cols(), self.rows());
        for i in 0..self.rows() {
            for j in 0..self.cols() {
                out.set(j, i, self.get(i, j));
            }
        }
    }
}

/// Computes `out = a * b`.
///
/// Panics if `a.cols() != b.rows()` or if `out` is symmetric, since the product
/// of two symmetric matrices is not symmetric in general. Output rows are
/// computed in parallel.
pub fn multiply_matrices<T, A, B, O>(a: &A, b: &B, out: &mut O)
where
    T: Element,
    A: MatrixLike<T> + ?Sized,
    B: MatrixLike<T> + ?Sized,
    O: MatrixLike<T> + ?Sized,
{
    assert!(
        a.cols() == b.rows(),
        "invalid multiplication, a must have the same number of columns as b rows ({} != {})",
        a.cols(),
        b.rows()
    );
    assert!(
        !out.is_symmetric(),
        "the product of two matrices is not necessarily symmetric, even if both are"
    );

    let (rows, cols, inner) = (a.rows(), b.cols(), a.cols());
    let mut product = vec![T::zero(); rows * cols];
    if cols > 0 {
        product
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(i, row)| {
                for (j, cell) in row.iter_mut().enumerate() {
                    let mut x = T::zero();
                    for k in 0..inner {
                        x += a.get(i, k) * b.get(k, j);
                    }
                    *cell = x;
                }
            });
    }

    out.resize(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            out.set(i, j, product[i * cols + j]);
        }
    }
}
