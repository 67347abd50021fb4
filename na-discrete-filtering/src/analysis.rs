//! The analysis step: one closed set of methods behind a single `analyze`.

use log::warn;
use nd::{Array2, ArrayView1};
use rand::Rng;
use serde::Serialize;
use std::fmt;

use na_core::{GaussRV, Model, Observer};

use crate::baseline;
use crate::chronology::Chronology;
use crate::config::{AMethod, Config, Field, Method, Resampling};
use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::forecast::Propagation;
use crate::kalman::{ekf, enkf, enkf_n, ienkf, var3d};
use crate::particle;
use crate::state::{Moments, State};

pub const DEFAULT_INFL: f64 = 1.0;
pub const DEFAULT_TOL: f64 = 1.0e-4;

/// A numerical difficulty met, and handled, during one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StepNote {
  /// A matrix that should have been positive definite was not; its
  /// pseudo-inverse was used.
  PseudoInverse { what: &'static str },
  /// The iterative filter hit its iteration cap; the last iterate was used.
  NotConverged { iterations: usize, last_step: f64 },
  /// The inflation search failed; the prior mode was used.
  InflationFallback { inflation: f64 },
  /// (Nearly) all particle weight sits on a single particle.
  WeightDegeneracy { n_eff: f64 },
  /// No particle had a finite likelihood; weights were reset to uniform.
  WeightCollapse,
  /// The analysis met non-finite values in `what`; the last finite estimate
  /// was kept.
  NonFinite { what: &'static str },
}

impl fmt::Display for StepNote {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      StepNote::PseudoInverse { what } =>
        write!(f, "pseudo-inverse of {}", what),
      StepNote::NotConverged { iterations, last_step } =>
        write!(f, "no convergence after {} iterations (|dw| = {:e})",
               iterations, last_step),
      StepNote::InflationFallback { inflation } =>
        write!(f, "inflation search failed, using {}", inflation),
      StepNote::WeightDegeneracy { n_eff } =>
        write!(f, "degenerate weights (N_eff = {})", n_eff),
      StepNote::WeightCollapse => f.write_str("all likelihoods vanished"),
      StepNote::NonFinite { what } =>
        write!(f, "non-finite {}, estimate kept", what),
    }
  }
}

/// What happened during one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
  pub notes: Vec<StepNote>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub n_eff: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resampled: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub inflation: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub iterations: Option<usize>,
}

/// Everything an analysis may look at besides the state and observation.
pub struct AnalysisContext<'a, M, O>
  where M: Model + ?Sized,
        O: Observer + ?Sized,
{
  pub model: &'a M,
  pub observer: &'a O,
  pub chrono: &'a Chronology,
  pub k_obs: usize,
  /// The true state at the observation time; only the cheat reads it.
  pub truth: Option<ArrayView1<'a, f64>>,
  /// The analysis at the previous observation (or the initial state).
  pub window_start: Option<&'a State>,
  /// The static background covariance of the variational method.
  pub background: Option<&'a Array2<f64>>,
}

/// A resolved, validated method with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Analyzer {
  EnKF { n: usize, upd: AMethod, infl: f64, rot: bool },
  EnKFN { n: usize, infl: f64, rot: bool },
  IEnKF { n: usize, i_max: usize, tol: f64, infl: f64, rot: bool },
  /// `reg: None` jitters by the bandwidth of `particle::std::bandwidth`.
  PartFilt { n: usize, ner: f64, resampling: Resampling, reg: Option<f64> },
  ExtKF { infl: f64 },
  Var3D { infl: f64 },
  Climatology,
  EnsCheat { n: usize },
}

impl Analyzer {
  pub fn from_config(config: &Config) -> Result<Analyzer> {
    let method = config.method()?;
    config.check_required(method)?;
    for field in config.ignored_by(method) {
      warn!("{} does not use `{}`; ignoring it", method, field);
    }

    let n = || -> Result<usize> {
      let n = config.n.ok_or(Error::MissingParameter {
        method,
        field: Field::N,
      })?;
      if n < 2 {
        return Err(invalid(Field::N, format!("need at least 2 members, got {}", n)));
      }
      Ok(n)
    };
    let infl = || -> Result<f64> {
      let infl = config.infl.unwrap_or(DEFAULT_INFL);
      if !infl.is_finite() || infl <= 0.0 {
        return Err(invalid(Field::Infl, format!("must be positive, got {}", infl)));
      }
      Ok(infl)
    };
    let rot = config.rot.unwrap_or(false);

    let analyzer = match method {
      Method::EnKF => Analyzer::EnKF {
        n: n()?,
        upd: config.a_method.ok_or(Error::MissingParameter {
          method,
          field: Field::AMethod,
        })?,
        infl: infl()?,
        rot,
      },
      Method::EnKFN => Analyzer::EnKFN { n: n()?, infl: infl()?, rot, },
      Method::IEnKF => {
        let i_max = config.i_max.unwrap_or(0);
        if i_max == 0 {
          return Err(invalid(Field::IMax, "must be at least 1".to_string()));
        }
        let tol = config.tol.unwrap_or(DEFAULT_TOL);
        if !tol.is_finite() || tol <= 0.0 {
          return Err(invalid(Field::Tol, format!("must be positive, got {}", tol)));
        }
        Analyzer::IEnKF { n: n()?, i_max, tol, infl: infl()?, rot, }
      },
      Method::PartFilt => {
        let ner = config.ner.unwrap_or(0.0);
        if !(ner > 0.0 && ner <= 1.0) {
          return Err(invalid(Field::Ner, format!("must lie in (0, 1], got {}", ner)));
        }
        let reg = config.reg;
        if let Some(reg) = reg {
          if !reg.is_finite() || reg < 0.0 {
            return Err(invalid(Field::Reg, format!("must be non-negative, got {}", reg)));
          }
        }
        Analyzer::PartFilt {
          n: n()?,
          ner,
          resampling: config.resampling.unwrap_or_default(),
          reg,
        }
      },
      Method::ExtKF => Analyzer::ExtKF { infl: infl()? },
      Method::Var3D => Analyzer::Var3D { infl: infl()? },
      Method::Climatology => Analyzer::Climatology,
      Method::EnsCheat => Analyzer::EnsCheat { n: n()? },
    };
    Ok(analyzer)
  }

  pub fn method(&self) -> Method {
    match *self {
      Analyzer::EnKF { .. } => Method::EnKF,
      Analyzer::EnKFN { .. } => Method::EnKFN,
      Analyzer::IEnKF { .. } => Method::IEnKF,
      Analyzer::PartFilt { .. } => Method::PartFilt,
      Analyzer::ExtKF { .. } => Method::ExtKF,
      Analyzer::Var3D { .. } => Method::Var3D,
      Analyzer::Climatology => Method::Climatology,
      Analyzer::EnsCheat { .. } => Method::EnsCheat,
    }
  }

  pub fn ensemble_size(&self) -> Option<usize> {
    match *self {
      Analyzer::EnKF { n, .. } | Analyzer::EnKFN { n, .. } |
      Analyzer::IEnKF { n, .. } | Analyzer::PartFilt { n, .. } |
      Analyzer::EnsCheat { n } => Some(n),
      Analyzer::ExtKF { .. } | Analyzer::Var3D { .. } |
      Analyzer::Climatology => None,
    }
  }

  /// Whether the analysis looks back over the whole assimilation window.
  pub fn needs_window(&self) -> bool {
    match *self {
      Analyzer::IEnKF { .. } => true,
      _ => false,
    }
  }

  pub fn needs_climatology(&self) -> bool {
    match *self {
      Analyzer::Var3D { .. } | Analyzer::Climatology => true,
      _ => false,
    }
  }

  pub fn needs_truth(&self) -> bool {
    match *self {
      Analyzer::EnsCheat { .. } => true,
      _ => false,
    }
  }

  /// The fixed prior covariance of the variational method.
  pub fn static_covariance(&self, climatology: Option<&Moments>)
    -> Result<Option<Array2<f64>>>
  {
    match *self {
      Analyzer::Var3D { infl } => {
        let clim = climatology
          .ok_or(Error::MissingClimatology(self.method()))?;
        Ok(Some(clim.cov() * infl))
      },
      _ => Ok(None),
    }
  }

  pub fn initial_state<R>(&self, x0: &GaussRV,
                          climatology: Option<&Moments>,
                          rng: &mut R) -> Result<State>
    where R: Rng + ?Sized,
  {
    match *self {
      Analyzer::EnKF { n, .. } | Analyzer::EnKFN { n, .. } |
      Analyzer::IEnKF { n, .. } | Analyzer::PartFilt { n, .. } |
      Analyzer::EnsCheat { n } => {
        Ok(State::Ensemble(Ensemble::sample(x0, n, rng)?))
      },
      Analyzer::ExtKF { .. } => Ok(State::Moments(Moments::from_rv(x0))),
      Analyzer::Var3D { .. } | Analyzer::Climatology => {
        let clim = climatology
          .ok_or(Error::MissingClimatology(self.method()))?;
        let cov = match self.static_covariance(Some(clim))? {
          Some(b) => b,
          None => clim.cov().clone(),
        };
        Ok(State::Moments(Moments::new(clim.mean_ref().clone(), cov)?))
      },
    }
  }

  pub fn propagation<'a>(&self, background: Option<&'a Array2<f64>>)
    -> Propagation<'a>
  {
    match *self {
      Analyzer::EnKF { .. } | Analyzer::EnKFN { .. } |
      Analyzer::IEnKF { .. } | Analyzer::PartFilt { .. } |
      Analyzer::EnsCheat { .. } => Propagation::Members,
      Analyzer::ExtKF { infl } => Propagation::Linearized { inflation: infl },
      Analyzer::Var3D { .. } => match background {
        Some(covariance) => Propagation::Static { covariance },
        None => Propagation::Frozen,
      },
      Analyzer::Climatology => Propagation::Frozen,
    }
  }

  /// Corrects `state` with the observation `y` taken at observation index
  /// `ctx.k_obs`. The state keeps its representation and dimension.
  ///
  /// An analysis that runs into non-finite values leaves `state` as it was
  /// and records `StepNote::NonFinite`; only setup errors are returned.
  pub fn analyze<M, O, R>(&self, state: &mut State, y: ArrayView1<f64>,
                          ctx: &AnalysisContext<M, O>, rng: &mut R)
    -> Result<AnalysisReport>
    where M: Model + ?Sized,
          O: Observer + ?Sized,
          R: Rng + ?Sized,
  {
    let mut report = AnalysisReport::default();
    let forecast = state.clone();
    let failed = match self.apply(state, y, ctx, rng, &mut report) {
      Ok(()) if state.is_finite() => None,
      Ok(()) => Some("analysis"),
      Err(Error::NonFinite(what)) => Some(what),
      Err(e) => return Err(e),
    };
    if let Some(what) = failed {
      warn!("{} analysis at observation {}: non-finite {}, keeping the forecast",
            self.method(), ctx.k_obs, what);
      *state = forecast;
      report.notes.push(StepNote::NonFinite { what });
    }
    Ok(report)
  }

  fn apply<M, O, R>(&self, state: &mut State, y: ArrayView1<f64>,
                    ctx: &AnalysisContext<M, O>, rng: &mut R,
                    report: &mut AnalysisReport)
    -> Result<()>
    where M: Model + ?Sized,
          O: Observer + ?Sized,
          R: Rng + ?Sized,
  {
    let method = self.method();
    let t = ctx.chrono.tt_obs(ctx.k_obs);

    match (*self, state) {
      (Analyzer::EnKF { upd, infl, rot, .. }, &mut State::Ensemble(ref mut ens)) => {
        enkf::analyze(ens, y, ctx.observer, t, upd, rng, &mut report.notes)?;
        ens.post_process(infl, rot, rng);
      },
      (Analyzer::EnKFN { infl, rot, .. }, &mut State::Ensemble(ref mut ens)) => {
        let l = enkf_n::analyze(ens, y, ctx.observer, t, &mut report.notes)?;
        report.inflation = Some(l);
        ens.post_process(infl, rot, rng);
      },
      (Analyzer::IEnKF { i_max, tol, infl, rot, .. },
       &mut State::Ensemble(ref mut ens)) => {
        let start = match ctx.window_start {
          Some(&State::Ensemble(ref start)) => start,
          _ => return Err(Error::MissingWindow(method)),
        };
        let window = ienkf::Window {
          model: ctx.model,
          chrono: ctx.chrono,
          k_obs: ctx.k_obs,
        };
        let iterations = ienkf::analyze(ens, start, y, &window, ctx.observer,
                                        i_max, tol, rng, &mut report.notes)?;
        report.iterations = Some(iterations);
        ens.post_process(infl, rot, rng);
      },
      (Analyzer::PartFilt { ner, resampling, reg, .. },
       &mut State::Ensemble(ref mut ens)) => {
        let pf = particle::std::Params { ner, resampling, reg, };
        let out = particle::std::analyze(ens, y, ctx.observer, t, &pf, rng,
                                         &mut report.notes)?;
        report.n_eff = Some(out.n_eff);
        report.resampled = Some(out.resampled);
      },
      (Analyzer::EnsCheat { .. }, &mut State::Ensemble(ref mut ens)) => {
        let truth = ctx.truth.ok_or(Error::MissingTruth(method))?;
        baseline::cheat(ens, truth)?;
      },
      (Analyzer::ExtKF { .. }, &mut State::Moments(ref mut mom)) => {
        ekf::analyze(mom, y, ctx.observer, t, &mut report.notes)?;
      },
      (Analyzer::Var3D { .. }, &mut State::Moments(ref mut mom)) => {
        let b = ctx.background.ok_or(Error::MissingClimatology(method))?;
        var3d::analyze(mom, b, y, ctx.observer, t, &mut report.notes)?;
      },
      (Analyzer::Climatology, &mut State::Moments(_)) => {},
      (_, state) => {
        return Err(Error::Representation {
          method,
          found: state.kind(),
        });
      },
    }

    Ok(())
  }
}

fn invalid(field: Field, reason: String) -> Error {
  Error::InvalidParameter { field, reason }
}
