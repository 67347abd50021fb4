//! Ensembles: `N` weighted member states, stored one member per row.

use nd::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::Rng;
use serde::Serialize;

use na_core::{GaussRV, Observer};
use nla::mean_preserving_orthogonal;

use crate::error::{Error, Result};
use crate::state::Estimate;
use crate::utils::symmetrize;

const WEIGHT_SUM_TOL: f64 = 1.0e-8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ensemble {
  members: Array2<f64>,
  weights: Array1<f64>,
}

impl Ensemble {
  /// An equally weighted ensemble.
  pub fn new(members: Array2<f64>) -> Result<Ensemble> {
    let (n, _) = members.dim();
    if n == 0 {
      return Err(Error::Dimension {
        what: "ensemble size",
        expected: 1,
        found: 0,
      });
    }
    if members.iter().any(|v| !v.is_finite()) {
      return Err(Error::NonFinite("ensemble members"));
    }
    Ok(Ensemble {
      members,
      weights: Array1::from_elem(n, 1.0 / n as f64),
    })
  }

  pub fn with_weights(members: Array2<f64>, weights: Array1<f64>)
    -> Result<Ensemble>
  {
    let mut e = Ensemble::new(members)?;
    e.overwrite_weights(weights)?;
    Ok(e)
  }

  /// `n` independent draws of `rv`.
  pub fn sample<R>(rv: &GaussRV, n: usize, rng: &mut R) -> Result<Ensemble>
    where R: Rng + ?Sized,
  {
    Ensemble::new(rv.sample(n, rng))
  }

  pub fn n(&self) -> usize { self.members.dim().0 }
  pub fn members(&self) -> &Array2<f64> { &self.members }
  pub fn weights(&self) -> &Array1<f64> { &self.weights }

  pub fn is_uniform(&self) -> bool {
    let w0 = 1.0 / self.n() as f64;
    self.weights.iter().all(|&w| w == w0)
  }

  /// Deviations of the members from the (weighted) mean, `N x m`.
  pub fn anomalies(&self) -> Array2<f64> {
    &self.members - &self.mean()
  }

  /// `N_eff = 1 / sum(w^2)`.
  pub fn effective_size(&self) -> f64 {
    1.0 / self.weights.dot(&self.weights)
  }

  /// `h(x_i)` for every member, `N x p`. Members are observed in parallel.
  pub fn observed<O>(&self, observer: &O, t: f64) -> Array2<f64>
    where O: Observer + ?Sized,
  {
    observe_rows(observer, self.members.view(), t)
  }

  pub(crate) fn overwrite_members(&mut self, members: Array2<f64>)
    -> Result<()>
  {
    let (n, m) = self.members.dim();
    let (rows, cols) = members.dim();
    if rows != n {
      return Err(Error::Dimension {
        what: "ensemble size",
        expected: n,
        found: rows,
      });
    }
    if cols != m {
      return Err(Error::Dimension {
        what: "member dimension",
        expected: m,
        found: cols,
      });
    }
    self.members = members;
    Ok(())
  }

  pub(crate) fn overwrite_weights(&mut self, weights: Array1<f64>)
    -> Result<()>
  {
    if weights.len() != self.n() {
      return Err(Error::Dimension {
        what: "weights",
        expected: self.n(),
        found: weights.len(),
      });
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
      return Err(Error::NonFinite("weights"));
    }
    if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOL {
      return Err(Error::NonFinite("normalized weights"));
    }
    self.weights = weights;
    Ok(())
  }

  pub(crate) fn reset_weights(&mut self) {
    let n = self.n();
    self.weights.fill(1.0 / n as f64);
  }

  /// `E <- mean + infl * A`.
  pub(crate) fn inflate(&mut self, infl: f64) {
    if infl == 1.0 {
      return;
    }
    let mean = self.mean();
    let mut a = self.anomalies();
    a *= infl;
    a += &mean;
    self.members = a;
  }

  /// `A <- Omega A` with a random orthogonal `Omega`, `Omega 1 = 1`.
  pub(crate) fn rotate<R>(&mut self, rng: &mut R)
    where R: Rng + ?Sized,
  {
    let omega = mean_preserving_orthogonal(self.n(), rng);
    let mean = self.mean();
    let mut a = omega.dot(&self.anomalies());
    a += &mean;
    self.members = a;
  }

  /// Inflation then, optionally, rotation.
  pub(crate) fn post_process<R>(&mut self, infl: f64, rot: bool, rng: &mut R)
    where R: Rng + ?Sized,
  {
    self.inflate(infl);
    if rot {
      self.rotate(rng);
    }
  }
}

/// Applies `observer` to every row of `xs`.
pub(crate) fn observe_rows<O>(observer: &O, xs: ArrayView2<f64>, t: f64)
  -> Array2<f64>
  where O: Observer + ?Sized,
{
  let mut out = Array2::zeros((xs.dim().0, observer.obs_dim()));
  Zip::from(out.rows_mut())
    .and(xs.rows())
    .par_for_each(|out, x| observer.observe(x, t, out));
  out
}

impl Estimate for Ensemble {
  fn dim(&self) -> usize { self.members.dim().1 }

  fn mean(&self) -> Array1<f64> {
    if self.is_uniform() {
      self.members.sum_axis(Axis(0)) / self.n() as f64
    } else {
      self.weights.dot(&self.members)
    }
  }

  /// Unbiased weighted sample covariance, `sum w_i a_i a_i^T / (1 - sum w^2)`.
  fn covariance(&self) -> Array2<f64> {
    let m = self.dim();
    let n = self.n();
    let a = self.anomalies();
    let mut c = if self.is_uniform() {
      if n < 2 {
        return Array2::zeros((m, m));
      }
      a.t().dot(&a) / (n - 1) as f64
    } else {
      let denom = 1.0 - self.weights.dot(&self.weights);
      if denom <= 0.0 {
        return Array2::zeros((m, m));
      }
      let wa = &a * &self.weights.view().insert_axis(Axis(1));
      a.t().dot(&wa) / denom
    };
    symmetrize(&mut c);
    c
  }

  fn variances(&self) -> Array1<f64> {
    let n = self.n();
    let a = self.anomalies();
    let sq = a.mapv(|v| v * v);
    if self.is_uniform() {
      if n < 2 {
        return Array1::zeros(self.dim());
      }
      sq.sum_axis(Axis(0)) / (n - 1) as f64
    } else {
      let denom = 1.0 - self.weights.dot(&self.weights);
      if denom <= 0.0 {
        return Array1::zeros(self.dim());
      }
      self.weights.dot(&sq) / denom
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;
  use crate::utils::PartialEqWithinTol;

  fn ens() -> Ensemble {
    Ensemble::new(arr2(&[[1.0, 0.0],
                         [3.0, 2.0],
                         [5.0, 1.0],
                         [7.0, 5.0]])).unwrap()
  }

  #[test]
  fn sample_moments() {
    let e = ens();
    assert_eq!(e.mean(), arr1(&[4.0, 2.0]));
    let a = e.anomalies();
    let expected = a.t().dot(&a) / 3.0;
    assert!(e.covariance().partial_eq_within_tol(&expected, 1e-12));
    assert!(e.variances().partial_eq_within_tol(&expected.diag(), 1e-12));
  }

  #[test]
  fn weighted_moments() {
    let e = Ensemble::with_weights(arr2(&[[0.0], [1.0], [2.0]]),
                                   arr1(&[0.5, 0.25, 0.25])).unwrap();
    assert!(e.mean().partial_eq_within_tol(&arr1(&[0.75]), 1e-12));
    // sum w a^2 = 0.5 * 0.5625 + 0.25 * 0.0625 + 0.25 * 1.5625 = 0.6875
    // 1 - sum w^2 = 0.625
    assert!(e.variances()[0].partial_eq_within_tol(&1.1, 1e-12));
    assert!(e.covariance()[[0, 0]].partial_eq_within_tol(&1.1, 1e-12));
    assert!((e.effective_size() - 1.0 / 0.375).abs() < 1e-12);

    assert!(Ensemble::with_weights(arr2(&[[0.0], [1.0]]),
                                   arr1(&[0.5, 0.6])).is_err());
  }

  #[test]
  fn inflation_scales_spread_only() {
    let mut e = ens();
    let before = e.clone();
    e.inflate(1.5);
    assert!(e.mean().partial_eq_within_tol(&before.mean(), 1e-12));
    assert!(e.spread().partial_eq_within_tol(&(1.5 * before.spread()), 1e-12));
  }

  #[test]
  fn rotation_preserves_first_two_moments() {
    let mut rng = Isaac64Rng::seed_from_u64(2);
    let mut e = ens();
    let before = e.clone();
    e.rotate(&mut rng);
    assert!(e.mean().partial_eq_within_tol(&before.mean(), 1e-10));
    assert!(e.covariance().partial_eq_within_tol(&before.covariance(), 1e-10));
    assert!(e.members().partial_neq_within_tol(before.members(), 1e-6));
  }

  #[test]
  fn overwrite_rejects_new_shapes() {
    let mut e = ens();
    assert!(e.overwrite_members(Array2::zeros((3, 2))).is_err());
    assert!(e.overwrite_members(Array2::zeros((4, 3))).is_err());
    assert!(e.overwrite_members(Array2::zeros((4, 2))).is_ok());
  }
}
