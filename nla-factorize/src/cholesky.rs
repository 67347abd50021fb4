use nd::{Array2, ArrayBase, Data, Ix2};

use crate::error::{Error, Result};
use crate::{check_square, from_dmatrix, to_dmatrix};

pub trait Cholesky {
  /// Returns the lower triangular factor, L, of A = LL^T.
  fn cholesky_lower(&self) -> Result<Array2<f64>>;
  /// Solves AX = B for symmetric positive definite A.
  fn solve_spd<S2>(&self, rhs: &ArrayBase<S2, Ix2>) -> Result<Array2<f64>>
    where S2: Data<Elem = f64>;
}

impl<S> Cholesky for ArrayBase<S, Ix2>
  where S: Data<Elem = f64>,
{
  fn cholesky_lower(&self) -> Result<Array2<f64>> {
    check_square(self)?;
    let chol = to_dmatrix(self)
      .cholesky()
      .ok_or(Error::NotPositiveDefinite)?;
    Ok(from_dmatrix(&chol.l()))
  }

  fn solve_spd<S2>(&self, rhs: &ArrayBase<S2, Ix2>) -> Result<Array2<f64>>
    where S2: Data<Elem = f64>,
  {
    let n = check_square(self)?;
    if rhs.dim().0 != n {
      return Err(Error::Shape(self.dim(), rhs.dim()));
    }
    if self.iter().any(|v| !v.is_finite()) {
      return Err(Error::NotPositiveDefinite);
    }

    let chol = to_dmatrix(self)
      .cholesky()
      .ok_or(Error::NotPositiveDefinite)?;
    Ok(from_dmatrix(&chol.solve(&to_dmatrix(rhs))))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::arr2;
  use crate::max_abs_diff;

  #[test]
  fn cholesky_llstar() {
    let a = arr2(&[
      [4.0, 12.0, -16.0],
      [12.0, 37.0, -43.0],
      [-16.0, -43.0, 98.0],
    ]);

    let l = a.cholesky_lower().expect("cholesky factorization failed");

    let expected = arr2(&[
      [2.0, 0.0, 0.0],
      [6.0, 1.0, 0.0],
      [-8.0, 5.0, 3.0],
    ]);
    assert!(max_abs_diff(&l, &expected) < 1e-12);
  }

  #[test]
  fn solve_spd_inverts() {
    let a = arr2(&[
      [4.0, 1.0],
      [1.0, 3.0],
    ]);
    let b = Array2::eye(2);
    let x = a.solve_spd(&b).unwrap();
    let id = a.dot(&x);
    assert!(max_abs_diff(&id, &Array2::eye(2)) < 1e-12);
  }

  #[test]
  fn indefinite_is_rejected() {
    let a = arr2(&[
      [1.0, 2.0],
      [2.0, 1.0],
    ]);
    assert_eq!(a.cholesky_lower(), Err(Error::NotPositiveDefinite));
    let b = Array2::eye(2);
    assert_eq!(a.solve_spd(&b), Err(Error::NotPositiveDefinite));
  }

  #[test]
  fn non_square() {
    let a = Array2::<f64>::zeros((2, 3));
    assert_eq!(a.cholesky_lower(), Err(Error::NotSquare(2, 3)));
  }
}
