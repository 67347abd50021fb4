//! The assimilation cycle: forecast every step, analyse at every observation
//! step, record statistics as it goes.

use log::{debug, info};
use nd::{Array2, ArrayView2};
use rand::Rng;
use serde::Serialize;

use na_core::{Model, Observer};

use crate::analysis::{AnalysisContext, Analyzer};
use crate::chronology::Chronology;
use crate::config::{Config, Method};
use crate::error::{Error, Result};
use crate::forecast::forecast;
use crate::state::{Estimate, Moments, State};
use crate::stats::{Statistics, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Initialized,
  Forecasting,
  Analyzing,
  Done,
}

/// The frozen result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
  method: Method,
  /// Forecast means, `(K + 1) x m`.
  mu_f: Array2<f64>,
  /// Analysis means, `(KObs + 1) x m`.
  mu_a: Array2<f64>,
  stats: Statistics,
}

impl RunOutput {
  pub fn method(&self) -> Method { self.method }
  pub fn mu_f(&self) -> &Array2<f64> { &self.mu_f }
  pub fn mu_a(&self) -> &Array2<f64> { &self.mu_a }
  pub fn stats(&self) -> &Statistics { &self.stats }
  pub fn summary(&self, chrono: &Chronology) -> Summary {
    self.stats.summary(chrono)
  }
}

pub struct Driver<'a, M, O, R>
  where M: Model + ?Sized,
        O: Observer + ?Sized,
        R: Rng,
{
  model: &'a M,
  observer: &'a O,
  chrono: &'a Chronology,
  analyzer: Analyzer,
  truth: ArrayView2<'a, f64>,
  obs: ArrayView2<'a, f64>,
  background: Option<Array2<f64>>,

  state: State,
  window_start: Option<State>,
  k: usize,
  phase: Phase,

  mu_f: Array2<f64>,
  mu_a: Array2<f64>,
  stats: Statistics,
  rng: R,
}

fn check_shape(what: &'static str, found: (usize, usize),
               expected: (usize, usize))
  -> Result<()>
{
  if found.0 != expected.0 {
    return Err(Error::Dimension { what, expected: expected.0, found: found.0, });
  }
  if found.1 != expected.1 {
    return Err(Error::Dimension { what, expected: expected.1, found: found.1, });
  }
  Ok(())
}

impl<'a, M, O, R> Driver<'a, M, O, R>
  where M: Model + ?Sized,
        O: Observer + ?Sized,
        R: Rng,
{
  /// Validates the run up front and seeds the state. `truth` holds the true
  /// state at every step, `obs` the observation at every observation step.
  pub fn new(model: &'a M, observer: &'a O, chrono: &'a Chronology,
             config: &Config, truth: ArrayView2<'a, f64>,
             obs: ArrayView2<'a, f64>, mut rng: R)
    -> Result<Driver<'a, M, O, R>>
  {
    let analyzer = Analyzer::from_config(config)?;

    let m = model.state_dim();
    if observer.state_dim() != m {
      return Err(Error::Dimension {
        what: "observer state",
        expected: m,
        found: observer.state_dim(),
      });
    }
    check_shape("truth", truth.dim(), (chrono.k() + 1, m))?;
    check_shape("observations", obs.dim(),
                (chrono.obs_count(), observer.obs_dim()))?;

    let climatology = if analyzer.needs_climatology() {
      Some(Moments::climatology(truth)?)
    } else {
      None
    };
    let background = analyzer.static_covariance(climatology.as_ref())?;
    let state = analyzer.initial_state(model.initial_condition(),
                                       climatology.as_ref(), &mut rng)?;
    let window_start = if analyzer.needs_window() {
      Some(state.clone())
    } else {
      None
    };

    let mut stats = Statistics::new(chrono, analyzer.ensemble_size());
    stats.record_forecast(0, &state, truth.row(0))?;
    let mut mu_f = Array2::zeros((chrono.k() + 1, m));
    mu_f.row_mut(0).assign(&state.mean());

    info!("{} run over {} steps with {} observations (m = {}, p = {})",
          analyzer.method(), chrono.k(), chrono.obs_count(), m,
          observer.obs_dim());

    Ok(Driver {
      model,
      observer,
      chrono,
      analyzer,
      truth,
      obs,
      background,
      state,
      window_start,
      k: 0,
      phase: Phase::Initialized,
      mu_f,
      mu_a: Array2::zeros((chrono.obs_count(), m)),
      stats,
      rng,
    })
  }

  pub fn phase(&self) -> Phase { self.phase }
  pub fn state(&self) -> &State { &self.state }
  pub fn analyzer(&self) -> &Analyzer { &self.analyzer }
  /// The last completed step.
  pub fn k(&self) -> usize { self.k }

  /// Advances one step of the chronology.
  pub fn step(&mut self) -> Result<Phase> {
    if self.phase == Phase::Done {
      return Err(Error::Finished);
    }
    let step = self.chrono.step(self.k + 1);

    self.phase = Phase::Forecasting;
    let propagation = self.analyzer.propagation(self.background.as_ref());
    forecast(&mut self.state, propagation, self.model, step.t_start(), step.dt,
             &mut self.rng)?;
    self.stats.record_forecast(step.k, &self.state, self.truth.row(step.k))?;
    self.mu_f.row_mut(step.k).assign(&self.state.mean());

    if let Some(k_obs) = step.k_obs {
      self.phase = Phase::Analyzing;
      let report = {
        let ctx = AnalysisContext {
          model: self.model,
          observer: self.observer,
          chrono: self.chrono,
          k_obs,
          truth: Some(self.truth.row(step.k)),
          window_start: self.window_start.as_ref(),
          background: self.background.as_ref(),
        };
        self.analyzer.analyze(&mut self.state, self.obs.row(k_obs), &ctx,
                              &mut self.rng)?
      };
      for note in report.notes.iter() {
        debug!("k = {} (k_obs = {}): {}", step.k, k_obs, note);
      }

      let past_burn_in = k_obs >= self.chrono.obs_bi();
      self.stats.record_analysis(k_obs, &self.state, self.truth.row(step.k),
                                 report, past_burn_in)?;
      self.mu_a.row_mut(k_obs).assign(&self.state.mean());
      if self.window_start.is_some() {
        self.window_start = Some(self.state.clone());
      }
    }

    self.k = step.k;
    if self.k == self.chrono.k() {
      self.phase = Phase::Done;
      info!("{} run done", self.analyzer.method());
    }
    Ok(self.phase)
  }

  /// Steps to the end of the chronology.
  pub fn run(&mut self) -> Result<()> {
    while self.phase != Phase::Done {
      self.step()?;
    }
    Ok(())
  }

  pub fn finish(self) -> Result<RunOutput> {
    if self.phase != Phase::Done {
      return Err(Error::Unfinished);
    }
    Ok(RunOutput {
      method: self.analyzer.method(),
      mu_f: self.mu_f,
      mu_a: self.mu_a,
      stats: self.stats,
    })
  }
}
