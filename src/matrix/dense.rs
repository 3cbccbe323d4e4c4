use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::Array2;
use rayon::prelude::*;

use super::format::{self, BinaryReader, TextTokens};
use super::{Element, MatrixLike, SymmetricMatrix};
use crate::error::Result;

/**
A dense `rows x cols` matrix stored row-major in a flat vector.

Element access through `m[(i, j)]` is bounds-checked and panics on a bad index.

# Examples

```rust
use cosmo_mcmc::matrix::{Matrix, MatrixLike};

let mut m = Matrix::from_elem(2, 3, 1.5);
m[(1, 2)] = -1.0;
assert_eq!(m.rows(), 2);
assert_eq!(m.get_row(1).as_slice(), &[1.5, 1.5, -1.0]);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    values: Vec<T>,
}

impl<T: Element> Matrix<T> {
    /// A zero-filled `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_elem(rows, cols, T::zero())
    }

    /// A `rows x cols` matrix with every element set to `value`.
    pub fn from_elem(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            values: vec![value; rows * cols],
        }
    }

    /// Wraps a vector as a column vector (`n x 1`) or a row vector (`1 x n`).
    pub fn from_vec(values: Vec<T>, column_vector: bool) -> Self {
        let (rows, cols) = if column_vector {
            (values.len(), 1)
        } else {
            (1, values.len())
        };
        Self { rows, cols, values }
    }

    /// The elements in row-major order.
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    fn check_indices(&self, i: usize, j: usize) {
        assert!(
            i < self.rows,
            "invalid index i = {i}, should be non-negative and less than {}",
            self.rows
        );
        assert!(
            j < self.cols,
            "invalid index j = {j}, should be non-negative and less than {}",
            self.cols
        );
    }

    fn assert_same_shape(&self, other: &dyn MatrixLike<T>, op: &str) {
        assert!(
            self.rows == other.rows() && self.cols == other.cols(),
            "cannot {op} matrices of different sizes ({}x{} and {}x{})",
            self.rows,
            self.cols,
            other.rows(),
            other.cols()
        );
    }

    fn zip_rows<F>(&mut self, other: &dyn MatrixLike<T>, f: F)
    where
        F: Fn(&mut T, T) + Sync,
    {
        let cols = self.cols;
        if cols == 0 {
            return;
        }
        self.values
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(i, row)| {
                for (j, x) in row.iter_mut().enumerate() {
                    f(x, other.get(i, j));
                }
            });
    }
}

impl<T: Element> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        self.check_indices(i, j);
        &self.values[i * self.cols + j]
    }
}

impl<T: Element> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        self.check_indices(i, j);
        &mut self.values[i * self.cols + j]
    }
}

impl<T: Element> MatrixLike<T> for Matrix<T> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn is_symmetric(&self) -> bool {
        false
    }

    fn get(&self, i: usize, j: usize) -> T {
        self[(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, value: T) {
        self[(i, j)] = value;
    }

    fn resize_with(&mut self, rows: usize, cols: usize, value: T) {
        self.rows = rows;
        self.cols = cols;
        self.values.clear();
        self.values.resize(rows * cols, value);
    }

    fn copy_from(&mut self, other: &dyn MatrixLike<T>) {
        self.resize(other.rows(), other.cols());
        self.zip_rows(other, |x, y| *x = y);
    }

    fn add(&mut self, other: &dyn MatrixLike<T>) {
        self.assert_same_shape(other, "add");
        self.zip_rows(other, |x, y| *x += y);
    }

    fn subtract(&mut self, other: &dyn MatrixLike<T>) {
        self.assert_same_shape(other, "subtract");
        self.zip_rows(other, |x, y| *x -= y);
    }

    fn write_into_file(&self, path: &Path) -> Result<()> {
        // `usize` dimensions beyond `i32::MAX` cannot be represented in the header.
        let rows = i32::try_from(self.rows).expect("number of rows exceeds i32::MAX");
        let cols = i32::try_from(self.cols).expect("number of columns exceeds i32::MAX");
        format::write_binary(path, &[rows, cols], &self.values)
    }

    fn read_from_file(&mut self, path: &Path) -> Result<()> {
        let mut reader = BinaryReader::open(path)?;
        let rows = reader.dimension("number of rows")?;
        let cols = reader.dimension("number of columns")?;
        let values = reader.elements(rows * cols)?;
        *self = Self { rows, cols, values };
        Ok(())
    }

    fn write_into_text_file(&self, path: &Path, precision: usize) -> Result<()> {
        format::write_text(path, self.rows, self.cols, precision, |i, j| self[(i, j)])
    }

    fn read_from_text_file(&mut self, path: &Path) -> Result<()> {
        let text = format::read_text(path)?;
        let mut tokens = TextTokens::new(path, &text);
        let rows = tokens.dimension("number of rows")?;
        let cols = tokens.dimension("number of columns")?;
        let count = tokens.element_count(rows, cols)?;
        let values = (0..count)
            .map(|_| tokens.next())
            .collect::<Result<Vec<T>>>()?;
        *self = Self { rows, cols, values };
        Ok(())
    }
}

impl<T: Element> From<&SymmetricMatrix<T>> for Matrix<T> {
    fn from(sym: &SymmetricMatrix<T>) -> Self {
        let mut dense = Matrix::<T>::new(0, 0);
        dense.copy_from(sym);
        dense
    }
}

impl<T: Element> From<&Matrix<T>> for Array2<T> {
    fn from(m: &Matrix<T>) -> Self {
        Array2::from_shape_fn((m.rows, m.cols), |(i, j)| m[(i, j)])
    }
}

impl<T: Element> From<Array2<T>> for Matrix<T> {
    fn from(a: Array2<T>) -> Self {
        let (rows, cols) = a.dim();
        Self {
            rows,
            cols,
            values: a.iter().copied().collect(),
        }
    }
}
