//! Linear models and observation operators. These are what the filters are
//! checked against, since for them the Kalman recursion is exact.

use nd::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::error::{Error, Result};
use crate::noise::{Covariance, GaussRV};
use crate::{Model, Observer};

/// `x_{k+1} = M x_k`, independent of `t` and `dt`.
#[derive(Debug, Clone)]
pub struct LinearModel {
  matrix: Array2<f64>,
  noise: GaussRV,
  x0: GaussRV,
}

impl LinearModel {
  pub fn new(matrix: Array2<f64>, noise: GaussRV, x0: GaussRV)
    -> Result<LinearModel>
  {
    let (rows, cols) = matrix.dim();
    if rows != cols {
      return Err(nla::Error::NotSquare(rows, cols).into());
    }
    for &(what, found) in &[("process noise", noise.dim()),
                            ("initial condition", x0.dim())] {
      if found != rows {
        return Err(Error::Dimension { what, expected: rows, found, });
      }
    }
    if matrix.iter().any(|v| !v.is_finite()) {
      return Err(Error::NonFinite("model matrix"));
    }
    Ok(LinearModel { matrix, noise, x0 })
  }

  /// The one dimensional `x_{k+1} = a x_k` with process noise variance `q`
  /// per unit time and `x_0 ~ N(mu0, var0)`.
  pub fn scalar(a: f64, q: f64, mu0: f64, var0: f64) -> Result<LinearModel> {
    LinearModel::new(Array2::from_elem((1, 1), a),
                     GaussRV::isotropic(1, q)?,
                     GaussRV::new(Array1::from_elem(1, mu0),
                                  Covariance::isotropic(1, var0)?)?)
  }

  pub fn matrix(&self) -> &Array2<f64> { &self.matrix }
}

impl Model for LinearModel {
  fn state_dim(&self) -> usize { self.matrix.dim().0 }

  fn step(&self, x: ArrayView1<f64>, _t: f64, _dt: f64,
          mut out: ArrayViewMut1<f64>) {
    out.assign(&self.matrix.dot(&x));
  }

  fn tangent_linear(&self, _x: ArrayView1<f64>, _t: f64, _dt: f64,
                    mut out: ArrayViewMut2<f64>) {
    out.assign(&self.matrix);
  }

  fn process_noise(&self) -> &GaussRV { &self.noise }
  fn initial_condition(&self) -> &GaussRV { &self.x0 }
}

/// `y = H x + v`.
#[derive(Debug, Clone)]
pub struct LinearObserver {
  matrix: Array2<f64>,
  noise: GaussRV,
}

impl LinearObserver {
  pub fn new(matrix: Array2<f64>, noise: GaussRV) -> Result<LinearObserver> {
    let (p, _) = matrix.dim();
    if noise.dim() != p {
      return Err(Error::Dimension {
        what: "observation noise",
        expected: p,
        found: noise.dim(),
      });
    }
    if matrix.iter().any(|v| !v.is_finite()) {
      return Err(Error::NonFinite("observation matrix"));
    }
    Ok(LinearObserver { matrix, noise })
  }

  /// Observes every component with noise `var * I`.
  pub fn identity(m: usize, var: f64) -> Result<LinearObserver> {
    LinearObserver::new(Array2::eye(m), GaussRV::isotropic(m, var)?)
  }

  /// Observes the listed components of an `m` dimensional state.
  pub fn indexed(m: usize, indices: &[usize], var: f64)
    -> Result<LinearObserver>
  {
    let mut h = Array2::zeros((indices.len(), m));
    for (row, &i) in indices.iter().enumerate() {
      if i >= m {
        return Err(Error::Dimension {
          what: "observed index",
          expected: m,
          found: i,
        });
      }
      h[[row, i]] = 1.0;
    }
    LinearObserver::new(h, GaussRV::isotropic(indices.len(), var)?)
  }

  pub fn matrix(&self) -> &Array2<f64> { &self.matrix }
}

impl Observer for LinearObserver {
  fn state_dim(&self) -> usize { self.matrix.dim().1 }
  fn obs_dim(&self) -> usize { self.matrix.dim().0 }

  fn observe(&self, x: ArrayView1<f64>, _t: f64, mut out: ArrayViewMut1<f64>) {
    out.assign(&self.matrix.dot(&x));
  }

  fn jacobian(&self, _x: ArrayView1<f64>, _t: f64, mut out: ArrayViewMut2<f64>) {
    out.assign(&self.matrix);
  }

  fn noise(&self) -> &GaussRV { &self.noise }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::arr1;

  #[test]
  fn scalar_model() {
    let m = LinearModel::scalar(0.9, 0.01, 1.0, 0.1).unwrap();
    assert_eq!(m.state_dim(), 1);
    let mut out = Array1::zeros(1);
    m.step(arr1(&[2.0]).view(), 0.0, 1.0, out.view_mut());
    assert_eq!(out[0], 1.8);
    assert_eq!(m.initial_condition().mu()[0], 1.0);
    assert_eq!(m.process_noise().cov().full()[[0, 0]], 0.01);
  }

  #[test]
  fn analytic_jacobians_match_finite_differences() {
    let h = LinearObserver::indexed(3, &[2, 0], 1.0).unwrap();
    let x = arr1(&[0.3, -1.0, 4.0]);

    let mut analytic = Array2::zeros((2, 3));
    h.jacobian(x.view(), 0.0, analytic.view_mut());
    let mut fd = Array2::zeros((2, 3));
    crate::finite_difference_jacobian(|x, out| h.observe(x, 0.0, out),
                                      x.view(), 2, fd.view_mut());

    for (a, b) in analytic.iter().zip(fd.iter()) {
      assert!((a - b).abs() < 1e-8);
    }
    assert_eq!(analytic[[0, 2]], 1.0);
    assert_eq!(analytic[[1, 0]], 1.0);
  }

  #[test]
  fn dimension_mismatches() {
    assert!(LinearObserver::indexed(2, &[2], 1.0).is_err());
    let noise = GaussRV::isotropic(3, 1.0).unwrap();
    assert!(LinearObserver::new(Array2::eye(2), noise.clone()).is_err());
    assert!(LinearModel::new(Array2::eye(2), noise.clone(), noise).is_err());
  }
}
