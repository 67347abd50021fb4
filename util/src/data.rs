use nd::{Array1, Array2, Axis};
use nd::parallel::prelude::*;
use rand::Rng;
use rayon::prelude::*;

use na_core::{Model, Observer};
use na_df::forcing::sample_forcing;
use na_df::{Chronology, Error, Result};

/// A synthetic experiment: the true trajectory and what was observed of it.
#[derive(Clone, Debug, PartialEq)]
pub struct Data {
  /// `(K + 1) x m`, row `k` at `tt[k]`.
  pub truth: Array2<f64>,
  /// `(KObs + 1) x p`, row `k_obs` at `tt_obs[k_obs]`.
  pub observations: Array2<f64>,
}

/// Draws `x_0` from the model's initial condition, steps it through the
/// chronology with process noise `sqrt(dt) * Q`, and observes it with noise
/// `R` at every observation step.
pub fn generate_truth_and_observations<M, O, R>(model: &M, observer: &O,
                                                chrono: &Chronology,
                                                rng: &mut R)
  -> Result<Data>
  where M: Model + ?Sized,
        O: Observer + ?Sized,
        R: Rng + ?Sized,
{
  let m = model.state_dim();
  if observer.state_dim() != m {
    return Err(Error::Dimension {
      what: "observer state",
      expected: m,
      found: observer.state_dim(),
    });
  }
  let p = observer.obs_dim();

  let mut truth = Array2::zeros((chrono.k() + 1, m));
  let mut obs_noise = Array2::zeros((chrono.obs_count(), p));
  truth.row_mut(0).assign(&model.initial_condition().sample_one(rng));

  for step in chrono.forecast_range() {
    let (prev, mut next) = truth.view_mut().split_at(Axis(0), step.k);
    let mut x = next.row_mut(0);
    model.step(prev.row(step.k - 1), step.t_start(), step.dt, x.view_mut());
    if let Some(forcing) = sample_forcing(model.process_noise(), 1, step.dt,
                                          rng) {
      x += &forcing.row(0);
    }
    if let Some(k_obs) = step.k_obs {
      obs_noise.row_mut(k_obs).assign(&observer.noise().sample_one(rng));
    }
  }

  let mut observations = obs_noise;
  observations.axis_iter_mut(Axis(0))
    .into_par_iter()
    .zip(chrono.kk_obs().par_iter())
    .for_each(|(mut y, &k)| {
      let mut hx = Array1::zeros(p);
      observer.observe(truth.row(k), chrono.tt(k), hx.view_mut());
      y += &hx;
    });

  Ok(Data {
    truth,
    observations,
  })
}
