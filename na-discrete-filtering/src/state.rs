//! The two state representations a filter can carry: an ensemble, or a
//! mean with a covariance.

use nd::{Array1, Array2, ArrayView2, Axis};
use serde::Serialize;

use na_core::GaussRV;

use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::utils::symmetrize;

/// What every state representation can report about itself.
pub trait Estimate {
  fn dim(&self) -> usize;
  fn mean(&self) -> Array1<f64>;
  fn covariance(&self) -> Array2<f64>;

  fn variances(&self) -> Array1<f64> {
    self.covariance().diag().to_owned()
  }

  /// `sqrt(mean(variances))`.
  fn spread(&self) -> f64 {
    let v = self.variances();
    if v.is_empty() {
      return 0.0;
    }
    v.mean().unwrap_or(0.0).max(0.0).sqrt()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Moments {
  mean: Array1<f64>,
  cov: Array2<f64>,
}

impl Moments {
  pub fn new(mean: Array1<f64>, cov: Array2<f64>) -> Result<Moments> {
    check_moments(&mean, &cov)?;
    Ok(Moments { mean, cov })
  }

  pub fn from_rv(rv: &GaussRV) -> Moments {
    Moments {
      mean: rv.mu().clone(),
      cov: rv.cov().full().clone(),
    }
  }

  /// Sample mean and covariance of a series, one row per time.
  pub fn climatology(series: ArrayView2<f64>) -> Result<Moments> {
    let (k, m) = series.dim();
    if k < 2 {
      return Err(Error::Dimension {
        what: "climatology sample count",
        expected: 2,
        found: k,
      });
    }
    if series.iter().any(|v| !v.is_finite()) {
      return Err(Error::NonFinite("truth"));
    }
    let mean = series.sum_axis(Axis(0)) / k as f64;
    let anomalies = &series - &mean;
    let mut cov = anomalies.t().dot(&anomalies) / (k - 1) as f64;
    symmetrize(&mut cov);
    debug_assert_eq!(cov.dim(), (m, m));
    Ok(Moments { mean, cov })
  }

  pub fn mean_ref(&self) -> &Array1<f64> { &self.mean }
  pub fn cov(&self) -> &Array2<f64> { &self.cov }

  pub(crate) fn overwrite_mean_and_covariance(&mut self, mean: Array1<f64>,
                                              cov: Array2<f64>)
    -> Result<()>
  {
    if mean.len() != self.mean.len() {
      return Err(Error::Dimension {
        what: "mean",
        expected: self.mean.len(),
        found: mean.len(),
      });
    }
    check_moments(&mean, &cov)?;
    self.mean = mean;
    self.cov = cov;
    Ok(())
  }
}

fn check_moments(mean: &Array1<f64>, cov: &Array2<f64>) -> Result<()> {
  let m = mean.len();
  let (rows, cols) = cov.dim();
  for &(what, found) in &[("covariance rows", rows),
                          ("covariance columns", cols)] {
    if found != m {
      return Err(Error::Dimension { what, expected: m, found, });
    }
  }
  Ok(())
}

impl Estimate for Moments {
  fn dim(&self) -> usize { self.mean.len() }
  fn mean(&self) -> Array1<f64> { self.mean.clone() }
  fn covariance(&self) -> Array2<f64> { self.cov.clone() }
  fn variances(&self) -> Array1<f64> { self.cov.diag().to_owned() }
}

/// The state a driver carries through a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum State {
  Ensemble(Ensemble),
  Moments(Moments),
}

impl State {
  pub fn kind(&self) -> &'static str {
    match *self {
      State::Ensemble(_) => "ensemble",
      State::Moments(_) => "moment",
    }
  }

  pub fn is_ensemble(&self) -> bool {
    match *self {
      State::Ensemble(_) => true,
      State::Moments(_) => false,
    }
  }

  pub fn as_ensemble(&self) -> Option<&Ensemble> {
    match *self {
      State::Ensemble(ref e) => Some(e),
      State::Moments(_) => None,
    }
  }

  pub(crate) fn is_finite(&self) -> bool {
    let finite = |v: &f64| v.is_finite();
    match *self {
      State::Ensemble(ref e) => e.members().iter().all(finite),
      State::Moments(ref m) => {
        m.mean.iter().all(finite) && m.cov.iter().all(finite)
      },
    }
  }
}

impl Estimate for State {
  fn dim(&self) -> usize {
    match *self {
      State::Ensemble(ref e) => e.dim(),
      State::Moments(ref m) => m.dim(),
    }
  }
  fn mean(&self) -> Array1<f64> {
    match *self {
      State::Ensemble(ref e) => e.mean(),
      State::Moments(ref m) => m.mean(),
    }
  }
  fn covariance(&self) -> Array2<f64> {
    match *self {
      State::Ensemble(ref e) => e.covariance(),
      State::Moments(ref m) => m.covariance(),
    }
  }
  fn variances(&self) -> Array1<f64> {
    match *self {
      State::Ensemble(ref e) => e.variances(),
      State::Moments(ref m) => m.variances(),
    }
  }
}
