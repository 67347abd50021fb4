//! Interfaces to the things being assimilated: the dynamical model, the
//! observation operator and their Gaussian noise processes.

extern crate ndarray as nd;
extern crate ndarray_rand as nd_rand;
extern crate nla_factorize as nla;
extern crate rand;
extern crate thiserror;

use nd::{Array1, ArrayView1, ArrayViewMut1, ArrayViewMut2};

pub use error::{Error, Result};
pub use linear::{LinearModel, LinearObserver};
pub use noise::{Covariance, GaussRV};

pub mod error;
pub mod linear;
pub mod noise;

/// Relative step for central finite differences, ~ eps^(1/3).
pub const FD_STEP: f64 = 6.0e-6;

pub trait Model: Send + Sync {
  fn state_dim(&self) -> usize;

  /// Advances `x` from time `t` by `dt`. Must be deterministic; process
  /// noise is added by the caller.
  fn step(&self, x: ArrayView1<f64>, t: f64, dt: f64,
          out: ArrayViewMut1<f64>);

  /// Jacobian of `step` at `x` (`state_dim x state_dim`).
  fn tangent_linear(&self, x: ArrayView1<f64>, t: f64, dt: f64,
                    out: ArrayViewMut2<f64>) {
    finite_difference_jacobian(|x, out| self.step(x, t, dt, out),
                               x, self.state_dim(), out);
  }

  /// Noise per unit time; a step of size `dt` adds `sqrt(dt)` times a draw.
  fn process_noise(&self) -> &GaussRV;

  fn initial_condition(&self) -> &GaussRV;
}

pub trait Observer: Send + Sync {
  fn state_dim(&self) -> usize;
  fn obs_dim(&self) -> usize;

  fn observe(&self, x: ArrayView1<f64>, t: f64, out: ArrayViewMut1<f64>);

  /// Jacobian of `observe` at `x` (`obs_dim x state_dim`).
  fn jacobian(&self, x: ArrayView1<f64>, t: f64, out: ArrayViewMut2<f64>) {
    finite_difference_jacobian(|x, out| self.observe(x, t, out),
                               x, self.obs_dim(), out);
  }

  fn noise(&self) -> &GaussRV;
}

/// Central difference Jacobian of `f` at `x` into the `out_dim x x.len()`
/// matrix `out`.
pub fn finite_difference_jacobian<F>(f: F, x: ArrayView1<f64>,
                                     out_dim: usize,
                                     mut out: ArrayViewMut2<f64>)
  where F: Fn(ArrayView1<f64>, ArrayViewMut1<f64>),
{
  debug_assert_eq!(out.dim(), (out_dim, x.len()));

  let mut xh = x.to_owned();
  let mut fp = Array1::zeros(out_dim);
  let mut fm = Array1::zeros(out_dim);
  for j in 0..x.len() {
    let h = FD_STEP * x[j].abs().max(1.0);

    xh[j] = x[j] + h;
    f(xh.view(), fp.view_mut());
    xh[j] = x[j] - h;
    f(xh.view(), fm.view_mut());
    xh[j] = x[j];

    let mut col = out.column_mut(j);
    col.assign(&fp);
    col -= &fm;
    col.mapv_inplace(|v| v / (2.0 * h));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, Array2};

  #[test]
  fn finite_differences_of_a_quadratic() {
    // f(x) = (x0 * x1, x1^2)
    fn f(x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
      out[0] = x[0] * x[1];
      out[1] = x[1] * x[1];
    }
    let x = arr1(&[2.0, 3.0]);
    let mut j = Array2::zeros((2, 2));
    finite_difference_jacobian(f, x.view(), 2, j.view_mut());

    let expected = [[3.0, 2.0], [0.0, 6.0]];
    for i in 0..2 {
      for k in 0..2 {
        assert!((j[[i, k]] - expected[i][k]).abs() < 1e-8,
                "J[{}, {}] = {}", i, k, j[[i, k]]);
      }
    }
  }
}
