//! Dense factorizations of `ndarray` matrices.
//!
//! `ndarray` stays the storage type everywhere in the workspace; the
//! factorizations themselves are done by `nalgebra` and copied back.

extern crate nalgebra as na;
extern crate ndarray as nd;
extern crate rand;
extern crate rand_distr;
extern crate thiserror;

use na::DMatrix;
use nd::{Array2, ArrayBase, Data, Ix2};

pub use cholesky::*;
pub use eigen::*;
pub use error::{Error, Result};
pub use qr::*;

pub mod cholesky;
pub mod eigen;
pub mod error;
pub mod qr;

pub fn to_dmatrix<S>(a: &ArrayBase<S, Ix2>) -> DMatrix<f64>
  where S: Data<Elem = f64>,
{
  let (rows, cols) = a.dim();
  DMatrix::from_fn(rows, cols, |i, j| a[[i, j]])
}

pub fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
  Array2::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

fn check_square<S>(a: &ArrayBase<S, Ix2>) -> Result<usize>
  where S: Data<Elem = f64>,
{
  let (rows, cols) = a.dim();
  if rows != cols {
    return Err(Error::NotSquare(rows, cols));
  }
  Ok(rows)
}

#[cfg(test)]
fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
  a.iter()
    .zip(b.iter())
    .fold(0.0f64, |m, (l, r)| m.max((l - r).abs()))
}
