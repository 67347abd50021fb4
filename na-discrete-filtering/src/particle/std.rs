//! The bootstrap ("standard") particle filter: reweighting by the
//! observation likelihood, with resampling once the effective ensemble size
//! drops below a threshold.

use log::{debug, warn};
use nd::{Array1, Array2, ArrayView1, Axis, Zip};
use rand::Rng;
use rand_distr::StandardNormal;
use nd_rand::RandomExt;

use na_core::Observer;
use nla::SymmetricFunctions;

use crate::analysis::StepNote;
use crate::config::Resampling;
use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::state::Estimate;

use super::resample;

/// Weights at least this close to one count as degenerate.
const DEGENERACY_TOL: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
  /// Resample when `N_eff < ner * N`.
  pub ner: f64,
  pub resampling: Resampling,
  /// Jitter added after resampling, relative to the ensemble covariance.
  /// `None` uses `bandwidth`; `Some(0.0)` resamples without jitter.
  pub reg: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
  /// Before any resampling.
  pub n_eff: f64,
  pub resampled: bool,
}

/// Silverman's rule of thumb for a Gaussian kernel on `n` particles in `m`
/// dimensions, `(4 / (n (m + 2)))^(1 / (m + 4))`.
pub fn bandwidth(n: usize, m: usize) -> f64 {
  let m = m as f64;
  (4.0 / (n as f64 * (m + 2.0))).powf(1.0 / (m + 4.0))
}

/// `ln w_i - |y - h(x_i)|^2_R / 2`, for every particle in parallel.
fn log_likelihoods<O>(ens: &Ensemble, y: ArrayView1<f64>, observer: &O, t: f64)
  -> Array1<f64>
  where O: Observer + ?Sized,
{
  let r_isqrt = observer.noise().cov().sym_sqrt_inv();
  let he = ens.observed(observer, t);
  let mut out = Array1::zeros(ens.n());
  Zip::from(&mut out)
    .and(he.rows())
    .and(ens.weights())
    .par_for_each(|out, hx, &w| {
      let innov = r_isqrt.dot(&(&y - &hx));
      *out = w.ln() - 0.5 * innov.dot(&innov);
    });
  out
}

/// Normalises `exp(log_w)` after shifting by the maximum. `None` if no
/// entry is finite.
fn normalise(log_w: &Array1<f64>) -> Option<Array1<f64>> {
  let max = log_w.iter()
    .cloned()
    .filter(|v| v.is_finite())
    .fold(::std::f64::NEG_INFINITY, f64::max);
  if !max.is_finite() {
    return None;
  }
  let w = log_w.mapv(|v| if v.is_finite() { (v - max).exp() } else { 0.0 });
  let total = w.sum();
  Some(w / total)
}

pub fn analyze<O, R>(ens: &mut Ensemble, y: ArrayView1<f64>, observer: &O,
                     t: f64, params: &Params, rng: &mut R,
                     notes: &mut Vec<StepNote>)
  -> Result<Outcome>
  where O: Observer + ?Sized,
        R: Rng + ?Sized,
{
  let n = ens.n();
  if y.len() != observer.obs_dim() {
    return Err(Error::Dimension {
      what: "observation",
      expected: observer.obs_dim(),
      found: y.len(),
    });
  }

  let weights = match normalise(&log_likelihoods(ens, y, observer, t)) {
    Some(w) => w,
    None => {
      warn!("every particle has zero likelihood; resetting the weights");
      notes.push(StepNote::WeightCollapse);
      Array1::from_elem(n, 1.0 / n as f64)
    },
  };
  ens.overwrite_weights(weights)?;

  let n_eff = ens.effective_size();
  let w_max = ens.weights().iter().cloned().fold(0.0, f64::max);
  if w_max > 1.0 - DEGENERACY_TOL {
    debug!("particle weights degenerate, N_eff = {}", n_eff);
    notes.push(StepNote::WeightDegeneracy { n_eff, });
  }

  let resampled = n_eff < params.ner * n as f64;
  if resampled {
    // jitter is scaled from the weighted spread before it collapses
    let reg = params.reg.unwrap_or_else(|| bandwidth(n, ens.dim()));
    let jitter = if reg > 0.0 {
      Some(ens.covariance().sqrtm_psd()? * reg)
    } else {
      None
    };

    let idx = resample(ens.weights(), n, params.resampling, rng);
    let mut members = ens.members().select(Axis(0), &idx);
    if let Some(factor) = jitter {
      let z = Array2::<f64>::random_using(members.raw_dim(), StandardNormal, rng);
      members += &z.dot(&factor);
    }
    ens.overwrite_members(members)?;
    ens.reset_weights();
    debug!("resampled, N_eff was {:.2}", n_eff);
  }

  Ok(Outcome { n_eff, resampled, })
}
