//! The forecast step: advancing a state through the model by one step.

use nd::{Array2, ArrayView2, Zip};
use rand::Rng;

use na_core::Model;

use crate::error::{Error, Result};
use crate::forcing::sample_forcing;
use crate::state::State;
use crate::utils::symmetrize;

/// How a method's state moves between observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Propagation<'a> {
  /// Every ensemble member through the model, plus its own process noise.
  Members,
  /// The mean through the model, the covariance through the tangent linear
  /// model, `P <- inflation^dt F P F^T + dt Q`.
  Linearized { inflation: f64 },
  /// The mean through the model; the covariance is reset to a fixed one.
  Static { covariance: &'a Array2<f64> },
  /// Left as is.
  Frozen,
}

/// Advances `state` from `t` to `t + dt`.
pub fn forecast<M, R>(state: &mut State, propagation: Propagation,
                      model: &M, t: f64, dt: f64, rng: &mut R)
  -> Result<()>
  where M: Model + ?Sized,
        R: Rng + ?Sized,
{
  match (propagation, state) {
    (Propagation::Frozen, _) => Ok(()),

    (Propagation::Members, &mut State::Ensemble(ref mut ens)) => {
      let forcing = sample_forcing(model.process_noise(), ens.n(), dt, rng);
      let next = propagate_rows(model, ens.members().view(), t, dt,
                                forcing.as_ref());
      ens.overwrite_members(next)
    },

    (Propagation::Linearized { inflation },
     &mut State::Moments(ref mut mom)) => {
      let m = mom.mean_ref().len();
      let mut f = Array2::zeros((m, m));
      model.tangent_linear(mom.mean_ref().view(), t, dt, f.view_mut());

      let mut mean = mom.mean_ref().clone();
      model.step(mom.mean_ref().view(), t, dt, mean.view_mut());

      let mut cov = f.dot(mom.cov()).dot(&f.t());
      if inflation != 1.0 {
        cov *= inflation.powf(dt);
      }
      let q = model.process_noise();
      if !q.is_zero() {
        cov.scaled_add(dt, q.cov().full());
      }
      symmetrize(&mut cov);
      mom.overwrite_mean_and_covariance(mean, cov)
    },

    (Propagation::Static { covariance }, &mut State::Moments(ref mut mom)) => {
      let mut mean = mom.mean_ref().clone();
      model.step(mom.mean_ref().view(), t, dt, mean.view_mut());
      mom.overwrite_mean_and_covariance(mean, covariance.clone())
    },

    (_, state) => Err(Error::Propagation(state.kind())),
  }
}

/// Every row of `xs` through one model step, in parallel, plus `forcing`.
pub(crate) fn propagate_rows<M>(model: &M, xs: ArrayView2<f64>, t: f64,
                                dt: f64, forcing: Option<&Array2<f64>>)
  -> Array2<f64>
  where M: Model + ?Sized,
{
  let mut next = Array2::zeros(xs.raw_dim());
  Zip::from(next.rows_mut())
    .and(xs.rows())
    .par_for_each(|out, x| model.step(x, t, dt, out));
  if let Some(forcing) = forcing {
    next += forcing;
  }
  next
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;

  use na_core::LinearModel;

  use crate::ensemble::Ensemble;
  use crate::state::{Estimate, Moments};
  use crate::utils::PartialEqWithinTol;

  fn model() -> LinearModel {
    LinearModel::scalar(0.9, 0.04, 0.0, 1.0).unwrap()
  }

  #[test]
  fn linearized_covariance() {
    let mut rng = Isaac64Rng::seed_from_u64(0);
    let mut s = State::Moments(Moments::new(arr1(&[2.0]),
                                            arr2(&[[1.0]])).unwrap());
    forecast(&mut s, Propagation::Linearized { inflation: 1.0 }, &model(),
             0.0, 0.25, &mut rng).unwrap();
    assert!(s.mean()[0].partial_eq_within_tol(&1.8, 1e-12));
    // 0.81 * 1 + 0.25 * 0.04
    assert!(s.covariance()[[0, 0]].partial_eq_within_tol(&0.82, 1e-12));

    forecast(&mut s, Propagation::Linearized { inflation: 4.0 }, &model(),
             0.25, 0.5, &mut rng).unwrap();
    // 2 * 0.81 * 0.82 + 0.5 * 0.04
    assert!(s.covariance()[[0, 0]].partial_eq_within_tol(&1.3484, 1e-12));
  }

  #[test]
  fn static_resets_covariance() {
    let mut rng = Isaac64Rng::seed_from_u64(0);
    let b = arr2(&[[3.0]]);
    let mut s = State::Moments(Moments::new(arr1(&[1.0]),
                                            arr2(&[[0.1]])).unwrap());
    forecast(&mut s, Propagation::Static { covariance: &b }, &model(),
             0.0, 1.0, &mut rng).unwrap();
    assert_eq!(s.covariance(), b);
    assert!(s.mean()[0].partial_eq_within_tol(&0.9, 1e-12));
  }

  #[test]
  fn members_get_independent_noise() {
    let mut rng = Isaac64Rng::seed_from_u64(9);
    let ens = Ensemble::new(Array2::ones((50, 1))).unwrap();
    let mut s = State::Ensemble(ens);
    forecast(&mut s, Propagation::Members, &model(), 0.0, 1.0, &mut rng)
      .unwrap();
    let e = s.as_ensemble().unwrap();
    assert_eq!(e.n(), 50);
    assert!(e.spread() > 0.1 && e.spread() < 0.3, "{}", e.spread());
    assert!((e.mean()[0] - 0.9).abs() < 0.1);
  }

  #[test]
  fn frozen_and_mismatched() {
    let mut rng = Isaac64Rng::seed_from_u64(0);
    let mut s = State::Moments(Moments::new(arr1(&[1.0]),
                                            arr2(&[[0.1]])).unwrap());
    let before = s.clone();
    forecast(&mut s, Propagation::Frozen, &model(), 0.0, 1.0, &mut rng)
      .unwrap();
    assert_eq!(s, before);
    assert_eq!(forecast(&mut s, Propagation::Members, &model(), 0.0, 1.0,
                        &mut rng).unwrap_err(),
               Error::Propagation("moment"));
  }
}
