use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::Array2;
use rayon::prelude::*;

use super::format::{self, BinaryReader, TextTokens};
use super::{Element, MatrixLike};
use crate::error::{Error, Result};

/**
A symmetric `n x n` matrix holding only its lower triangle.

The packed store has `n * (n + 1) / 2` elements, row-major over `(i, j)` with
`i >= j`. Indexing with `(i, j)` and `(j, i)` reaches the same cell, so both
halves always agree.

# Examples

```rust
use cosmo_mcmc::matrix::{MatrixLike, SymmetricMatrix};

let mut s = SymmetricMatrix::<f64>::from_elem(3, 0.0);
s[(0, 2)] = 5.0;
assert_eq!(s[(2, 0)], 5.0);
assert!(s.is_symmetric());
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricMatrix<T> {
    size: usize,
    values: Vec<T>,
}

fn packed_len(size: usize) -> usize {
    size * (size + 1) / 2
}

impl<T: Element> SymmetricMatrix<T> {
    /// A zero-filled `size x size` matrix.
    pub fn new(size: usize) -> Self {
        Self::from_elem(size, T::zero())
    }

    /// A `size x size` matrix with every element set to `value`.
    pub fn from_elem(size: usize, value: T) -> Self {
        Self {
            size,
            values: vec![value; packed_len(size)],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The packed lower triangle, `(0,0), (1,0), (1,1), (2,0), ...`.
    pub fn as_packed_slice(&self) -> &[T] {
        &self.values
    }

    /// The only place where `(i, j)` is mapped to a packed offset.
    fn packed_index(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.size,
            "invalid index i = {i}, should be non-negative and less than {}",
            self.size
        );
        assert!(
            j < self.size,
            "invalid index j = {j}, should be non-negative and less than {}",
            self.size
        );
        let (row, col) = if i < j { (j, i) } else { (i, j) };
        row * (row + 1) / 2 + col
    }

    /// Applies `f` to every stored cell, rows of the triangle in parallel.
    /// `f` receives the lower-triangle position `(i, j)` with `j <= i`.
    fn for_each_packed<F>(&mut self, f: F)
    where
        F: Fn(usize, usize, &mut T) + Sync,
    {
        let mut rows = Vec::with_capacity(self.size);
        let mut rest: &mut [T] = &mut self.values;
        for i in 0..self.size {
            let (row, tail) = std::mem::take(&mut rest).split_at_mut(i + 1);
            rows.push(row);
            rest = tail;
        }
        rows.into_par_iter().enumerate().for_each(|(i, row)| {
            for (j, x) in row.iter_mut().enumerate() {
                f(i, j, x);
            }
        });
    }

    fn assert_symmetric_operand(&self, other: &dyn MatrixLike<T>, op: &str) {
        assert!(
            self.size == other.rows() && self.size == other.cols(),
            "cannot {op} matrices of different sizes ({0}x{0} and {1}x{2})",
            self.size,
            other.rows(),
            other.cols()
        );
        assert!(
            other.is_symmetric(),
            "cannot {op} a non-symmetric matrix and a symmetric one"
        );
    }

    fn check_square(rows: usize, cols: usize) {
        assert!(
            rows == cols,
            "symmetric matrix must have rows = cols, got {rows}x{cols}"
        );
    }
}

impl<T: Element> Index<(usize, usize)> for SymmetricMatrix<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self.values[self.packed_index(i, j)]
    }
}

impl<T: Element> IndexMut<(usize, usize)> for SymmetricMatrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        let k = self.packed_index(i, j);
        &mut self.values[k]
    }
}

impl<T: Element> MatrixLike<T> for SymmetricMatrix<T> {
    fn rows(&self) -> usize {
        self.size
    }

    fn cols(&self) -> usize {
        self.size
    }

    fn is_symmetric(&self) -> bool {
        true
    }

    fn get(&self, i: usize, j: usize) -> T {
        self[(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, value: T) {
        self[(i, j)] = value;
    }

    fn resize_with(&mut self, rows: usize, cols: usize, value: T) {
        Self::check_square(rows, cols);
        self.size = rows;
        self.values.clear();
        self.values.resize(packed_len(rows), value);
    }

    fn copy_from(&mut self, other: &dyn MatrixLike<T>) {
        assert!(
            other.is_symmetric(),
            "cannot copy from non-symmetric matrix to symmetric"
        );
        self.resize(other.rows(), other.cols());
        self.for_each_packed(|i, j, x| *x = other.get(i, j));
    }

    fn add(&mut self, other: &dyn MatrixLike<T>) {
        self.assert_symmetric_operand(other, "add");
        self.for_each_packed(|i, j, x| *x += other.get(i, j));
    }

    fn subtract(&mut self, other: &dyn MatrixLike<T>) {
        self.assert_symmetric_operand(other, "subtract");
        self.for_each_packed(|i, j, x| *x -= other.get(i, j));
    }

    fn write_into_file(&self, path: &Path) -> Result<()> {
        let size = i32::try_from(self.size).expect("matrix size exceeds i32::MAX");
        format::write_binary(path, &[size], &self.values)
    }

    fn read_from_file(&mut self, path: &Path) -> Result<()> {
        let mut reader = BinaryReader::open(path)?;
        let size = reader.dimension("matrix size")?;
        let values = reader.elements(packed_len(size))?;
        *self = Self { size, values };
        Ok(())
    }

    fn write_into_text_file(&self, path: &Path, precision: usize) -> Result<()> {
        format::write_text(path, self.size, self.size, precision, |i, j| self[(i, j)])
    }

    fn read_from_text_file(&mut self, path: &Path) -> Result<()> {
        let text = format::read_text(path)?;
        let mut tokens = TextTokens::new(path, &text);
        let rows = tokens.dimension("matrix size")?;
        let cols = tokens.dimension("matrix size")?;
        if rows != cols {
            return Err(Error::NotSquare {
                path: path.to_path_buf(),
                rows,
                cols,
            });
        }
        tokens.element_count(rows, cols)?;

        let mut m = Self::new(rows);
        for i in 0..rows {
            // Below the diagonal: already stored from row j, must match.
            for j in 0..i {
                let x: T = tokens.next()?;
                if x != m[(j, i)] {
                    return Err(Error::NotSymmetric {
                        path: path.to_path_buf(),
                        row: i,
                        col: j,
                        found: x.to_string(),
                        expected: m[(j, i)].to_string(),
                    });
                }
            }
            for j in i..rows {
                m[(i, j)] = tokens.next()?;
            }
        }
        *self = m;
        Ok(())
    }
}

impl<T: Element> From<&SymmetricMatrix<T>> for Array2<T> {
    fn from(s: &SymmetricMatrix<T>) -> Self {
        Array2::from_shape_fn((s.size, s.size), |(i, j)| s[(i, j)])
    }
}
