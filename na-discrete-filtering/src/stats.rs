//! Per-step accuracy statistics of a run, and their time averages.

use nd::{s, Array1, ArrayView1};
use serde::Serialize;
use std::fmt;

use crate::analysis::AnalysisReport;
use crate::chronology::Chronology;
use crate::error::{Error, Result};
use crate::state::{Estimate, State};
use crate::utils::rms;

/// RMS error and RMS spread at every forecast step (`k = 0..=K`) and at every
/// analysis (`k_obs = 0..=KObs`). Entries not yet recorded are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
  rmse_f: Array1<f64>,
  rmsv_f: Array1<f64>,
  rmse_a: Array1<f64>,
  rmsv_a: Array1<f64>,
  reports: Vec<AnalysisReport>,
  /// Rank of the truth among the members, counted over every dimension of
  /// every analysis past the burn-in. Ensemble methods only.
  #[serde(skip_serializing_if = "Option::is_none")]
  rank_hist: Option<Vec<u64>>,
}

fn error_and_spread(state: &State, truth: ArrayView1<f64>) -> Result<(f64, f64)> {
  if truth.len() != state.dim() {
    return Err(Error::Dimension {
      what: "true state",
      expected: state.dim(),
      found: truth.len(),
    });
  }
  let err = &state.mean() - &truth;
  Ok((rms(&err), state.spread()))
}

impl Statistics {
  /// `ensemble_size` is `Some` for ensemble methods, which also get a rank
  /// histogram.
  pub fn new(chrono: &Chronology, ensemble_size: Option<usize>) -> Statistics {
    let nan = |n: usize| Array1::from_elem(n, ::std::f64::NAN);
    Statistics {
      rmse_f: nan(chrono.k() + 1),
      rmsv_f: nan(chrono.k() + 1),
      rmse_a: nan(chrono.obs_count()),
      rmsv_a: nan(chrono.obs_count()),
      reports: vec![AnalysisReport::default(); chrono.obs_count()],
      rank_hist: ensemble_size.map(|n| vec![0; n + 1]),
    }
  }

  pub fn record_forecast(&mut self, k: usize, state: &State,
                         truth: ArrayView1<f64>)
    -> Result<()>
  {
    let (e, v) = error_and_spread(state, truth)?;
    self.rmse_f[k] = e;
    self.rmsv_f[k] = v;
    Ok(())
  }

  pub fn record_analysis(&mut self, k_obs: usize, state: &State,
                         truth: ArrayView1<f64>, report: AnalysisReport,
                         past_burn_in: bool)
    -> Result<()>
  {
    let (e, v) = error_and_spread(state, truth)?;
    self.rmse_a[k_obs] = e;
    self.rmsv_a[k_obs] = v;
    self.reports[k_obs] = report;

    if past_burn_in {
      if let (Some(hist), Some(ens)) = (self.rank_hist.as_mut(),
                                        state.as_ensemble()) {
        for (j, &x) in truth.iter().enumerate() {
          let rank = ens.members().column(j).iter()
            .filter(|&&member| member < x)
            .count();
          if rank < hist.len() {
            hist[rank] += 1;
          }
        }
      }
    }
    Ok(())
  }

  pub fn rmse_f(&self) -> &Array1<f64> { &self.rmse_f }
  pub fn rmsv_f(&self) -> &Array1<f64> { &self.rmsv_f }
  pub fn rmse_a(&self) -> &Array1<f64> { &self.rmse_a }
  pub fn rmsv_a(&self) -> &Array1<f64> { &self.rmsv_a }
  pub fn reports(&self) -> &[AnalysisReport] { &self.reports }
  pub fn rank_hist(&self) -> Option<&[u64]> {
    self.rank_hist.as_ref().map(|h| h.as_slice())
  }

  /// Averages over the analyses past the burn-in, and over the forecasts
  /// valid at those same observation times.
  pub fn summary(&self, chrono: &Chronology) -> Summary {
    let from = chrono.obs_bi();
    let at_obs = |series: &Array1<f64>| -> Array1<f64> {
      chrono.kk_obs()[from..].iter().map(|&k| series[k]).collect()
    };
    Summary {
      rmse_a: series_mean_with_conf(self.rmse_a.slice(s![from..])),
      rmsv_a: series_mean_with_conf(self.rmsv_a.slice(s![from..])),
      rmse_f: series_mean_with_conf(at_obs(&self.rmse_f).view()),
      rmsv_f: series_mean_with_conf(at_obs(&self.rmsv_f).view()),
    }
  }
}

/// A time average with the half-width of its confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeanConf {
  pub mean: f64,
  pub conf: f64,
}

impl fmt::Display for MeanConf {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:8.5} +/- {}", self.mean, self.conf)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
  pub rmse_a: MeanConf,
  pub rmsv_a: MeanConf,
  pub rmse_f: MeanConf,
  pub rmsv_f: MeanConf,
}

/// Rounds to `digits` significant figures.
fn round_sig(x: f64, digits: i32) -> f64 {
  if x == 0.0 || !x.is_finite() {
    return x;
  }
  let scale = 10f64.powi(digits - 1 - x.abs().log10().floor() as i32);
  (x * scale).round() / scale
}

/// The mean of a (serially correlated) series, with a confidence half-width
/// that accounts for the correlation by fitting an AR(1) model:
/// `var(mean) = var / N * (1 + 2 / N * sum_k (N - k) a^k)`.
pub fn series_mean_with_conf(xx: ArrayView1<f64>) -> MeanConf {
  let n = xx.len();
  if n == 0 {
    return MeanConf { mean: ::std::f64::NAN, conf: ::std::f64::NAN, };
  }
  let n_f = n as f64;
  let mean = xx.sum() / n_f;
  if !mean.is_finite() || n < 2 {
    return MeanConf { mean, conf: ::std::f64::NAN, };
  }

  let dev = xx.mapv(|x| x - mean);
  let c0 = dev.dot(&dev) / n_f;
  // constant up to round-off
  if c0 <= (4.0 * ::std::f64::EPSILON * mean.abs()).powi(2) {
    return MeanConf { mean, conf: 0.0, };
  }
  let c1 = dev.slice(s![..-1]).dot(&dev.slice(s![1..])) / n_f;
  let a = (c1 / c0).max(0.0).min(0.999);

  let mut corr = 0.0;
  let mut ak = 1.0;
  for k in 1..n {
    ak *= a;
    corr += (n - k) as f64 * ak;
  }
  let var = c0 / n_f * (1.0 + 2.0 * corr / n_f);
  MeanConf { mean, conf: round_sig(var.sqrt(), 1), }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};

  use crate::ensemble::Ensemble;
  use crate::state::Moments;
  use crate::utils::PartialEqWithinTol;

  fn chrono() -> Chronology {
    Chronology::from_steps(10, 2, 0.5, 1.0).unwrap()
  }

  #[test]
  fn series_lengths() {
    let c = chrono();
    let s = Statistics::new(&c, None);
    assert_eq!(s.rmse_f().len(), c.k() + 1);
    assert_eq!(s.rmsv_f().len(), c.k() + 1);
    assert_eq!(s.rmse_a().len(), c.k_obs() + 1);
    assert_eq!(s.rmsv_a().len(), c.k_obs() + 1);
    assert_eq!(s.reports().len(), c.k_obs() + 1);
    assert!(s.rank_hist().is_none());
  }

  #[test]
  fn exact_estimate_has_zero_error() {
    let c = chrono();
    let mut s = Statistics::new(&c, None);
    let truth = arr1(&[1.0, -2.0]);
    let state = State::Moments(Moments::new(truth.clone(),
                                            arr2(&[[4.0, 0.0], [0.0, 0.0]]))
                               .unwrap());
    s.record_forecast(3, &state, truth.view()).unwrap();
    assert_eq!(s.rmse_f()[3], 0.0);
    assert!(s.rmsv_f()[3].partial_eq_within_tol(&2f64.sqrt(), 1e-12));
    assert!(s.rmse_f()[2].is_nan());
    assert!(s.record_forecast(4, &state, arr1(&[1.0]).view()).is_err());
  }

  #[test]
  fn rank_histogram_counts_members_below_truth() {
    let c = chrono();
    let mut s = Statistics::new(&c, Some(3));
    let ens = State::Ensemble(Ensemble::new(arr2(&[[0.0, 0.0],
                                                   [1.0, 1.0],
                                                   [2.0, 2.0]])).unwrap());
    let truth = arr1(&[1.5, 5.0]);
    s.record_analysis(0, &ens, truth.view(), AnalysisReport::default(), false)
      .unwrap();
    assert_eq!(s.rank_hist(), Some(&[0, 0, 0, 0][..]));
    s.record_analysis(1, &ens, truth.view(), AnalysisReport::default(), true)
      .unwrap();
    assert_eq!(s.rank_hist(), Some(&[0, 0, 1, 1][..]));
  }

  #[test]
  fn summary_starts_after_burn_in() {
    let c = chrono();
    let mut s = Statistics::new(&c, None);
    let truth = arr1(&[0.0]);
    for k_obs in 0..c.obs_count() {
      let x = if k_obs < c.obs_bi() { 100.0 } else { 1.0 };
      let st = State::Moments(Moments::new(arr1(&[x]), arr2(&[[1.0]]))
                              .unwrap());
      s.record_analysis(k_obs, &st, truth.view(), AnalysisReport::default(),
                        k_obs >= c.obs_bi()).unwrap();
      s.record_forecast(c.kk_obs()[k_obs], &st, truth.view()).unwrap();
    }
    let sum = s.summary(&c);
    assert_eq!(sum.rmse_a, MeanConf { mean: 1.0, conf: 0.0 });
    assert_eq!(sum.rmse_f, MeanConf { mean: 1.0, conf: 0.0 });
    assert_eq!(sum.rmsv_a.mean, 1.0);
  }

  #[test]
  fn confidence_widens_with_correlation() {
    let white = arr1(&[1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
    let red = arr1(&[1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0]);
    let w = series_mean_with_conf(white.view());
    let r = series_mean_with_conf(red.view());
    assert_eq!(w.mean, 0.0);
    assert_eq!(r.mean, 0.0);
    assert!(r.conf > w.conf, "{} vs {}", r.conf, w.conf);
    assert!(series_mean_with_conf(arr1(&[]).view()).mean.is_nan());
  }

  #[test]
  fn one_significant_figure() {
    assert_eq!(round_sig(0.0234, 1), 0.02);
    assert_eq!(round_sig(345.0, 1), 300.0);
  }
}
