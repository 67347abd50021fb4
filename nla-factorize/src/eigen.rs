use nd::{Array1, Array2, ArrayBase, Data, Ix2};

use crate::error::{Error, Result};
use crate::{check_square, from_dmatrix, to_dmatrix};

const MAX_SWEEPS: usize = 10_000;

/// Matrix functions of symmetric matrices, through the eigendecomposition
/// of the symmetric part `(A + A^T) / 2`.
pub trait SymmetricFunctions {
  /// Eigenvalues and the matching (column) eigenvectors.
  fn sym_eigen(&self) -> Result<(Array1<f64>, Array2<f64>)>;

  /// Symmetric square root of a positive semi-definite matrix. Eigenvalues
  /// that are negative only through round-off are clamped to zero.
  fn sqrtm_psd(&self) -> Result<Array2<f64>> {
    let (d, v) = self.sym_eigen()?;
    let tol = eigen_tol(&d);
    if let Some(&neg) = d.iter().find(|&&l| l < -tol) {
      return Err(Error::NotPositiveSemiDefinite(neg));
    }
    let vf = &v * &d.mapv(|l| l.max(0.0).sqrt());
    Ok(vf.dot(&v.t()))
  }

  /// Moore-Penrose pseudo-inverse; eigenvalues at or below the numerical
  /// rank tolerance are treated as zero.
  fn pinv_sym(&self) -> Result<Array2<f64>> {
    let (d, v) = self.sym_eigen()?;
    let tol = eigen_tol(&d);
    let vf = &v * &d.mapv(|l| if l.abs() > tol { l.recip() } else { 0.0 });
    Ok(vf.dot(&v.t()))
  }
}

impl<S> SymmetricFunctions for ArrayBase<S, Ix2>
  where S: Data<Elem = f64>,
{
  fn sym_eigen(&self) -> Result<(Array1<f64>, Array2<f64>)> {
    check_square(self)?;
    let sym = (&self.view() + &self.t()) * 0.5;
    let eig = to_dmatrix(&sym)
      .try_symmetric_eigen(::std::f64::EPSILON, MAX_SWEEPS)
      .ok_or(Error::NoConvergence)?;

    let d = eig.eigenvalues.iter().cloned().collect::<Array1<f64>>();
    Ok((d, from_dmatrix(&eig.eigenvectors)))
  }
}

/// Rank tolerance in the style of LAPACK's pinv: n * eps * max |lambda|.
pub fn eigen_tol(d: &Array1<f64>) -> f64 {
  let largest = d.iter().fold(0.0f64, |m, l| m.max(l.abs()));
  d.len() as f64 * ::std::f64::EPSILON * largest
}
