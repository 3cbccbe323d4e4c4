/*!
# Factorizations, Inverses, Determinants and Eigendecomposition

LU for [`Matrix<f64>`] through [`LuFactorization`], Cholesky and the symmetric
eigenproblem for [`SymmetricMatrix<f64>`] through [`CholeskyFactorization`].

The numerical work is done by `nalgebra` and only exists when the crate is built
with the `linalg` feature (on by default). Without it every method still exists
and returns [`LinalgError::Unsupported`].

Factorizations overwrite the matrix in place, LAPACK style. A failed call leaves
the matrix in an unspecified state.

```rust
use cosmo_mcmc::linalg::LuFactorization;
use cosmo_mcmc::matrix::Matrix;

let a = Matrix::from(ndarray::array![[4.0, 3.0], [6.0, 3.0]]);
if let Ok((log_det, sign)) = a.log_det() {
    assert_eq!(sign, -1);
    assert!((log_det - 6f64.ln()).abs() < 1e-12);
}
```
*/

use thiserror::Error;

use crate::matrix::{Matrix, SymmetricMatrix};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinalgError {
    #[error("no linear-algebra backend available, build with the `linalg` feature")]
    Unsupported,
    #[error("the matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("the matrix is singular, zero pivot at index {index}")]
    Singular { index: usize },
    #[error("the matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("the symmetric eigenvalue solver did not converge")]
    EigenNotConverged,
}

pub type LinalgResult<T> = std::result::Result<T, LinalgError>;

/// LU decomposition with partial pivoting, `P A = L U`.
///
/// After [`lu_factorize`](Self::lu_factorize) the strictly lower part of the
/// matrix holds `L` (unit diagonal implied) and the rest holds `U`. `pivot[i]`
/// is the row of the original matrix that ended up in row `i`.
pub trait LuFactorization: Clone {
    fn lu_factorize(&mut self, _pivot: &mut Vec<usize>) -> LinalgResult<()> {
        Err(LinalgError::Unsupported)
    }

    /// Replaces the factors with the inverse of the original matrix.
    fn invert_from_lu_factorization(&mut self, _pivot: &[usize]) -> LinalgResult<()> {
        Err(LinalgError::Unsupported)
    }

    fn determinant_from_lu_factorization(&self, _pivot: &[usize]) -> LinalgResult<f64> {
        Err(LinalgError::Unsupported)
    }

    /// `(ln |det|, sign)`, with sign `-1`, `0` or `1`.
    fn log_det_from_lu_factorization(&self, _pivot: &[usize]) -> LinalgResult<(f64, i32)> {
        Err(LinalgError::Unsupported)
    }

    fn invert(&mut self) -> LinalgResult<()> {
        let mut pivot = Vec::new();
        self.lu_factorize(&mut pivot)?;
        self.invert_from_lu_factorization(&pivot)
    }

    fn get_inverse(&self, out: &mut Self) -> LinalgResult<()> {
        let mut m = self.clone();
        m.invert()?;
        *out = m;
        Ok(())
    }

    fn determinant(&self) -> LinalgResult<f64> {
        let mut m = self.clone();
        let mut pivot = Vec::new();
        match m.lu_factorize(&mut pivot) {
            Ok(()) | Err(LinalgError::Singular { .. }) => {
                m.determinant_from_lu_factorization(&pivot)
            }
            Err(e) => Err(e),
        }
    }

    fn log_det(&self) -> LinalgResult<(f64, i32)> {
        let mut m = self.clone();
        let mut pivot = Vec::new();
        match m.lu_factorize(&mut pivot) {
            Ok(()) | Err(LinalgError::Singular { .. }) => m.log_det_from_lu_factorization(&pivot),
            Err(e) => Err(e),
        }
    }
}

/// Cholesky decomposition `A = L L^T` of a symmetric positive-definite matrix,
/// and the symmetric eigenproblem.
///
/// After [`cholesky_factorize`](Self::cholesky_factorize) the packed lower
/// triangle holds `L`. The matrix then no longer represents `A`.
pub trait CholeskyFactorization: Clone {
    fn cholesky_factorize(&mut self) -> LinalgResult<()> {
        Err(LinalgError::Unsupported)
    }

    /// Replaces the Cholesky factor with the inverse of the original matrix.
    fn invert_from_cholesky_factorization(&mut self) -> LinalgResult<()> {
        Err(LinalgError::Unsupported)
    }

    fn determinant_from_cholesky_factorization(&self) -> LinalgResult<f64> {
        Err(LinalgError::Unsupported)
    }

    /// `(ln det, sign)`; the sign of a positive-definite determinant is always 1.
    fn log_det_from_cholesky_factorization(&self) -> LinalgResult<(f64, i32)> {
        Err(LinalgError::Unsupported)
    }

    /// Eigenvalues in ascending order and the matching unit eigenvectors as the
    /// columns of `eigenvectors`. With `assume_positive_definite` a
    /// non-positive eigenvalue is reported as [`LinalgError::NotPositiveDefinite`].
    fn get_eigen(
        &self,
        _eigenvalues: &mut Vec<f64>,
        _eigenvectors: &mut Matrix<f64>,
        _assume_positive_definite: bool,
    ) -> LinalgResult<()> {
        Err(LinalgError::Unsupported)
    }

    fn invert(&mut self) -> LinalgResult<()> {
        self.cholesky_factorize()?;
        self.invert_from_cholesky_factorization()
    }

    fn determinant(&self) -> LinalgResult<f64> {
        let mut m = self.clone();
        m.cholesky_factorize()?;
        m.determinant_from_cholesky_factorization()
    }

    fn log_det(&self) -> LinalgResult<(f64, i32)> {
        let mut m = self.clone();
        m.cholesky_factorize()?;
        m.log_det_from_cholesky_factorization()
    }
}

impl LuFactorization for Matrix<f64> {
    #[cfg(feature = "linalg")]
    fn lu_factorize(&mut self, pivot: &mut Vec<usize>) -> LinalgResult<()> {
        let n = backend::square_size(self)?;
        let lu = backend::to_dmatrix(&*self).lu();
        let (l, u) = (lu.l(), lu.u());

        let mut order = nalgebra::DVector::<usize>::from_iterator(n, 0..n);
        lu.p().permute_rows(&mut order);
        pivot.clear();
        pivot.extend(order.iter().copied());

        for i in 0..n {
            for j in 0..n {
                self[(i, j)] = if j < i { l[(i, j)] } else { u[(i, j)] };
            }
        }
        match (0..n).find(|&i| u[(i, i)] == 0.0) {
            Some(index) => Err(LinalgError::Singular { index }),
            None => Ok(()),
        }
    }

    #[cfg(feature = "linalg")]
    fn invert_from_lu_factorization(&mut self, pivot: &[usize]) -> LinalgResult<()> {
        let n = backend::square_size(self)?;
        assert_eq!(pivot.len(), n, "pivot length must match the matrix size");
        let (l, u) = backend::split_lu(self);

        // A^-1 = U^-1 L^-1 P
        let mut p = nalgebra::DMatrix::<f64>::zeros(n, n);
        for (i, &row) in pivot.iter().enumerate() {
            p[(i, row)] = 1.0;
        }
        let singular = || LinalgError::Singular {
            index: (0..n).find(|&i| u[(i, i)] == 0.0).unwrap_or(0),
        };
        let y = l.solve_lower_triangular(&p).ok_or_else(singular)?;
        let x = u.solve_upper_triangular(&y).ok_or_else(singular)?;
        backend::store_dense(self, &x);
        Ok(())
    }

    #[cfg(feature = "linalg")]
    fn determinant_from_lu_factorization(&self, pivot: &[usize]) -> LinalgResult<f64> {
        let n = backend::square_size(self)?;
        let product: f64 = (0..n).map(|i| self[(i, i)]).product();
        Ok(backend::permutation_sign(pivot) as f64 * product)
    }

    #[cfg(feature = "linalg")]
    fn log_det_from_lu_factorization(&self, pivot: &[usize]) -> LinalgResult<(f64, i32)> {
        let n = backend::square_size(self)?;
        let diagonal: Vec<f64> = (0..n).map(|i| self[(i, i)]).collect();
        Ok(backend::signed_log_product(
            &diagonal,
            backend::permutation_sign(pivot),
        ))
    }
}

impl CholeskyFactorization for SymmetricMatrix<f64> {
    #[cfg(feature = "linalg")]
    fn cholesky_factorize(&mut self) -> LinalgResult<()> {
        let chol = backend::to_dmatrix(&*self)
            .cholesky()
            .ok_or(LinalgError::NotPositiveDefinite)?;
        let l = chol.l();
        for i in 0..self.size() {
            for j in 0..=i {
                self[(i, j)] = l[(i, j)];
            }
        }
        Ok(())
    }

    #[cfg(feature = "linalg")]
    fn invert_from_cholesky_factorization(&mut self) -> LinalgResult<()> {
        let n = self.size();
        let l = backend::lower_factor(&*self);
        let l_inv = l
            .solve_lower_triangular(&nalgebra::DMatrix::identity(n, n))
            .ok_or(LinalgError::NotPositiveDefinite)?;
        let inverse = l_inv.transpose() * &l_inv;
        for i in 0..n {
            for j in 0..=i {
                self[(i, j)] = inverse[(i, j)];
            }
        }
        Ok(())
    }

    #[cfg(feature = "linalg")]
    fn determinant_from_cholesky_factorization(&self) -> LinalgResult<f64> {
        let product: f64 = (0..self.size()).map(|i| self[(i, i)]).product();
        Ok(product * product)
    }

    #[cfg(feature = "linalg")]
    fn log_det_from_cholesky_factorization(&self) -> LinalgResult<(f64, i32)> {
        let diagonal: Vec<f64> = (0..self.size()).map(|i| self[(i, i)]).collect();
        let (log_det, sign) = backend::signed_log_product(&diagonal, 1);
        if sign == 0 {
            return Ok((log_det, 0));
        }
        Ok((2.0 * log_det, 1))
    }

    #[cfg(feature = "linalg")]
    fn get_eigen(
        &self,
        eigenvalues: &mut Vec<f64>,
        eigenvectors: &mut Matrix<f64>,
        assume_positive_definite: bool,
    ) -> LinalgResult<()> {
        let n = self.size();
        let eigen = nalgebra::SymmetricEigen::try_new(backend::to_dmatrix(self), f64::EPSILON, 0)
            .ok_or(LinalgError::EigenNotConverged)?;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        eigenvalues.clear();
        eigenvalues.extend(order.iter().map(|&k| eigen.eigenvalues[k]));
        *eigenvectors = Matrix::new(n, n);
        for (col, &k) in order.iter().enumerate() {
            for i in 0..n {
                eigenvectors[(i, col)] = eigen.eigenvectors[(i, k)];
            }
        }

        if assume_positive_definite && eigenvalues.first().is_some_and(|&v| v <= 0.0) {
            return Err(LinalgError::NotPositiveDefinite);
        }
        Ok(())
    }
}

#[cfg(feature = "linalg")]
mod backend {
    use nalgebra::DMatrix;

    use super::{LinalgError, LinalgResult};
    use crate::matrix::{Matrix, MatrixLike};

    pub(super) fn square_size(m: &Matrix<f64>) -> LinalgResult<usize> {
        if m.rows() != m.cols() {
            return Err(LinalgError::NotSquare {
                rows: m.rows(),
                cols: m.cols(),
            });
        }
        Ok(m.rows())
    }

    pub(super) fn to_dmatrix(m: &dyn MatrixLike<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(m.rows(), m.cols(), |i, j| m.get(i, j))
    }

    pub(super) fn store_dense(m: &mut Matrix<f64>, d: &DMatrix<f64>) {
        m.resize(d.nrows(), d.ncols());
        for i in 0..d.nrows() {
            for j in 0..d.ncols() {
                m[(i, j)] = d[(i, j)];
            }
        }
    }

    /// Unit lower and upper factors from a matrix overwritten by LU.
    pub(super) fn split_lu(m: &Matrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = m.rows();
        let l = DMatrix::from_fn(n, n, |i, j| match i.cmp(&j) {
            std::cmp::Ordering::Greater => m[(i, j)],
            std::cmp::Ordering::Equal => 1.0,
            std::cmp::Ordering::Less => 0.0,
        });
        let u = DMatrix::from_fn(n, n, |i, j| if j >= i { m[(i, j)] } else { 0.0 });
        (l, u)
    }

    /// The Cholesky factor stored in a packed triangle, zeros above the diagonal.
    pub(super) fn lower_factor(m: &dyn MatrixLike<f64>) -> DMatrix<f64> {
        let n = m.rows();
        DMatrix::from_fn(n, n, |i, j| if j <= i { m.get(i, j) } else { 0.0 })
    }

    /// Parity of the permutation `pivot`, as `1` or `-1`.
    pub(super) fn permutation_sign(pivot: &[usize]) -> i32 {
        let mut seen = vec![false; pivot.len()];
        let mut sign = 1;
        for start in 0..pivot.len() {
            if seen[start] {
                continue;
            }
            let mut len = 0;
            let mut k = start;
            while !seen[k] {
                seen[k] = true;
                k = pivot[k];
                len += 1;
            }
            if len % 2 == 0 {
                sign = -sign;
            }
        }
        sign
    }

    /// `(sum ln |d_i|, sign * prod sign(d_i))`, or `(-inf, 0)` when a factor is zero.
    pub(super) fn signed_log_product(diagonal: &[f64], sign: i32) -> (f64, i32) {
        let mut sign = sign;
        let mut log = 0.0;
        for &d in diagonal {
            if d == 0.0 {
                return (f64::NEG_INFINITY, 0);
            }
            if d < 0.0 {
                sign = -sign;
            }
            log += d.abs().ln();
        }
        (log, sign)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn permutation_parity() {
            assert_eq!(permutation_sign(&[0, 1, 2]), 1);
            assert_eq!(permutation_sign(&[1, 0, 2]), -1);
            assert_eq!(permutation_sign(&[1, 2, 0]), 1);
            assert_eq!(permutation_sign(&[3, 2, 1, 0]), 1);
            assert_eq!(permutation_sign(&[]), 1);
        }

        #[test]
        fn log_product_tracks_sign() {
            let (log, sign) = signed_log_product(&[-2.0, 3.0], 1);
            assert!((log - 6f64.ln()).abs() < 1e-15);
            assert_eq!(sign, -1);
            assert_eq!(signed_log_product(&[1.0, 0.0], -1), (f64::NEG_INFINITY, 0));
        }
    }
}


#[cfg(all(test, not(feature = "linalg")))]
mod unsupported_tests {
    use super::*;

    #[test]
    fn every_operation_reports_unsupported() {
        let mut a = Matrix::<f64>::from_elem(2, 2, 1.0);
        let mut pivot = Vec::new();
        assert_eq!(a.lu_factorize(&mut pivot), Err(LinalgError::Unsupported));
        assert_eq!(LuFactorization::determinant(&a), Err(LinalgError::Unsupported));
        assert_eq!(LuFactorization::invert(&mut a), Err(LinalgError::Unsupported));

        let mut s = SymmetricMatrix::<f64>::from_elem(2, 1.0);
        assert_eq!(s.cholesky_factorize(), Err(LinalgError::Unsupported));
        assert_eq!(
            CholeskyFactorization::log_det(&s),
            Err(LinalgError::Unsupported)
        );
        let mut values = Vec::new();
        let mut vectors = Matrix::<f64>::new(0, 0);
        assert_eq!(
            s.get_eigen(&mut values, &mut vectors, false),
            Err(LinalgError::Unsupported)
        );
    }
}
