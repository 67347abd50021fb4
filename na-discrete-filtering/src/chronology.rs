//! The time grid of a run: `K + 1` simulation times `tt[k] = k * dt` and the
//! subsequence `kk_obs` of steps at which an observation is assimilated.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chronology {
  dt: f64,
  dk_obs: usize,
  k: usize,
  burn_in: f64,
  kk_obs: Vec<usize>,
  k_bi: usize,
  obs_bi: usize,
}

/// One forecast step, from `t - dt` to `t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
  pub k: usize,
  /// Set when step `k` is an observation step.
  pub k_obs: Option<usize>,
  pub t: f64,
  pub dt: f64,
}

impl Step {
  pub fn t_start(&self) -> f64 { self.t - self.dt }
}

impl Chronology {
  pub fn new(dt: f64, dk_obs: usize, t_end: f64, burn_in: f64)
    -> Result<Chronology>
  {
    if !dt.is_finite() || dt <= 0.0 {
      return Err(Error::Chronology("dt must be positive"));
    }
    if !t_end.is_finite() || t_end <= 0.0 {
      return Err(Error::Chronology("t_end must be positive"));
    }
    let k = (t_end / dt).round() as usize;
    Chronology::from_steps(k, dk_obs, dt, burn_in)
  }

  pub fn from_steps(k: usize, dk_obs: usize, dt: f64, burn_in: f64)
    -> Result<Chronology>
  {
    if !dt.is_finite() || dt <= 0.0 {
      return Err(Error::Chronology("dt must be positive"));
    }
    if !burn_in.is_finite() {
      return Err(Error::Chronology("burn_in must be finite"));
    }
    if dk_obs == 0 {
      return Err(Error::Chronology("dk_obs must be positive"));
    }
    if k == 0 {
      return Err(Error::Chronology("no time steps"));
    }
    if k < dk_obs {
      return Err(Error::Chronology("no observation fits before t_end"));
    }

    let kk_obs: Vec<usize> = (1..=k / dk_obs).map(|i| i * dk_obs).collect();
    let k_bi = (0..=k)
      .find(|&i| i as f64 * dt > burn_in)
      .unwrap_or(k + 1);
    let obs_bi = kk_obs.iter()
      .position(|&i| i as f64 * dt > burn_in)
      .unwrap_or(kk_obs.len());

    Ok(Chronology {
      dt,
      dk_obs,
      k,
      burn_in,
      kk_obs,
      k_bi,
      obs_bi,
    })
  }

  pub fn dt(&self) -> f64 { self.dt }
  pub fn dk_obs(&self) -> usize { self.dk_obs }
  /// Index of the last simulation step, `K`.
  pub fn k(&self) -> usize { self.k }
  /// Index of the last observation, `KObs`.
  pub fn k_obs(&self) -> usize { self.kk_obs.len() - 1 }
  pub fn obs_count(&self) -> usize { self.kk_obs.len() }
  pub fn t_end(&self) -> f64 { self.tt(self.k) }
  pub fn burn_in(&self) -> f64 { self.burn_in }
  /// First simulation step past the burn-in. `K + 1` if there is none.
  pub fn k_bi(&self) -> usize { self.k_bi }
  /// First observation past the burn-in. `KObs + 1` if there is none.
  pub fn obs_bi(&self) -> usize { self.obs_bi }
  pub fn kk_obs(&self) -> &[usize] { &self.kk_obs }

  pub fn tt(&self, k: usize) -> f64 { k as f64 * self.dt }
  pub fn tt_obs(&self, k_obs: usize) -> f64 { self.tt(self.kk_obs[k_obs]) }

  /// The observation index of step `k`, if it has one.
  pub fn obs_index(&self, k: usize) -> Option<usize> {
    if k == 0 || k % self.dk_obs != 0 || k > self.k {
      return None;
    }
    let k_obs = k / self.dk_obs - 1;
    if k_obs < self.kk_obs.len() { Some(k_obs) } else { None }
  }

  pub fn step(&self, k: usize) -> Step {
    Step {
      k,
      k_obs: self.obs_index(k),
      t: self.tt(k),
      dt: self.dt,
    }
  }

  /// The forecast steps `1..=K`.
  pub fn forecast_range(&self) -> impl Iterator<Item = Step> + '_ {
    (1..=self.k).map(move |k| self.step(k))
  }

  /// The forecast steps leading up to observation `k_obs`, i.e. those after
  /// the previous observation (or the start) up to and including
  /// `kk_obs[k_obs]`.
  pub fn window(&self, k_obs: usize) -> RangeInclusive<usize> {
    let start = if k_obs == 0 { 0 } else { self.kk_obs[k_obs - 1] };
    (start + 1)..=self.kk_obs[k_obs]
  }
}
