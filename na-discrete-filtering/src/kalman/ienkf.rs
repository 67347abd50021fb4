//! The iterative ensemble Kalman filter (Sakov, Oliver and Bertino 2012),
//! transform version. The analysis is sought at the start of the window in
//! the space of ensemble coefficients, with each iterate propagated through
//! the whole window and compared to the observation at its end.

use log::{debug, warn};
use nd::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use na_core::{Model, Observer};

use crate::analysis::StepNote;
use crate::chronology::Chronology;
use crate::ensemble::{observe_rows, Ensemble};
use crate::error::{Error, Result};
use crate::forcing::ForcingSequence;
use crate::forecast::propagate_rows;
use crate::state::Estimate;

use super::{solve_sym, sqrt_transform, transform_members};

/// The stretch of forecast steps that ends at observation `k_obs`.
pub struct Window<'a, M>
  where M: Model + ?Sized,
{
  pub model: &'a M,
  pub chrono: &'a Chronology,
  pub k_obs: usize,
}

impl<'a, M> Window<'a, M>
  where M: Model + ?Sized,
{
  /// `members` at the window start through every step of the window.
  fn propagate(&self, members: Array2<f64>, forcing: &ForcingSequence)
    -> Array2<f64>
  {
    let dt = self.chrono.dt();
    self.chrono.window(self.k_obs)
      .enumerate()
      .fold(members, |e, (i, k)| {
        let t = self.chrono.tt(k) - dt;
        propagate_rows(self.model, e.view(), t, dt, forcing.get(i))
      })
  }
}

/// Replaces `ens` with the analysis at the end of the window, computed from
/// `start`, the analysis at its beginning. Returns the number of iterations.
pub fn analyze<M, O, R>(ens: &mut Ensemble, start: &Ensemble,
                        y: ArrayView1<f64>, window: &Window<M>, observer: &O,
                        i_max: usize, tol: f64, rng: &mut R,
                        notes: &mut Vec<StepNote>)
  -> Result<usize>
  where M: Model + ?Sized,
        O: Observer + ?Sized,
        R: Rng + ?Sized,
{
  let n = start.n();
  if n != ens.n() {
    return Err(Error::Dimension {
      what: "ensemble size",
      expected: ens.n(),
      found: n,
    });
  }
  let p = observer.obs_dim();
  if y.len() != p {
    return Err(Error::Dimension {
      what: "observation",
      expected: p,
      found: y.len(),
    });
  }

  let n1 = (n - 1) as f64;
  let x0 = start.mean();
  let a0 = start.anomalies();
  let r_inv = observer.noise().cov().inv();
  let t_obs = window.chrono.tt_obs(window.k_obs);

  // one realisation of the model noise for every iterate
  let steps = window.chrono.window(window.k_obs).count();
  let forcing = ForcingSequence::sample(window.model.process_noise(), n,
                                        window.chrono.dt(), steps, rng);

  let mut w = Array1::zeros(n);
  let mut tr = Array2::eye(n);
  // the last iterate whose window forecast was finite
  let mut accepted: Option<(Array1<f64>, Array2<f64>)> = None;
  let mut iterations = 0;
  let mut last_step = ::std::f64::INFINITY;
  let mut diverged = false;

  while iterations < i_max {
    iterations += 1;

    let e = window.propagate(transform_members(&x0, &a0, &w, &tr), &forcing);
    let he = observe_rows(observer, e.view(), t_obs);
    if he.iter().any(|v| !v.is_finite()) {
      if let Some((w_ok, tr_ok)) = accepted.take() {
        w = w_ok;
        tr = tr_ok;
      }
      diverged = true;
      break;
    }
    accepted = Some((w.clone(), tr.clone()));

    let dw = match increment(&he, &y, &w, &tr, r_inv, n1, notes) {
      Ok((dw, next_tr)) => {
        if dw.iter().any(|v| !v.is_finite()) {
          diverged = true;
          break;
        }
        tr = next_tr;
        dw
      },
      Err(Error::NonFinite(_)) => {
        diverged = true;
        break;
      },
      Err(e) => return Err(e),
    };
    w += &dw;
    last_step = dw.dot(&dw).sqrt();
    debug!("iEnKF iteration {}: |dw| = {:e}", iterations, last_step);

    if last_step < tol * n as f64 {
      break;
    }
  }

  if diverged {
    warn!("iEnKF iterate {} is not finite, keeping the previous one",
          iterations);
    notes.push(StepNote::NonFinite { what: "iEnKF iterate" });
  } else if !(last_step < tol * n as f64) {
    warn!("iEnKF did not converge in {} iterations (|dw| = {:e})",
          iterations, last_step);
    notes.push(StepNote::NotConverged { iterations, last_step, });
  }

  let e = window.propagate(transform_members(&x0, &a0, &w, &tr), &forcing);
  ens.overwrite_members(e)?;
  ens.reset_weights();
  Ok(iterations)
}

/// The Gauss-Newton increment `dw` and the next transform, from the observed
/// window forecast `he` of the iterate `(w, tr)`.
fn increment(he: &Array2<f64>, y: &ArrayView1<f64>, w: &Array1<f64>,
             tr: &Array2<f64>, r_inv: &Array2<f64>, n1: f64,
             notes: &mut Vec<StepNote>)
  -> Result<(Array1<f64>, Array2<f64>)>
{
  let hx = he.sum_axis(Axis(0)) / he.nrows() as f64;
  let dy = y - &hx;

  // sensitivities, de-scaled by the current transform
  let y_anom = he - &hx;
  let y_anom = solve_sym(tr, &y_anom, "ensemble transform", notes)?;

  let yr = y_anom.dot(r_inv);
  let grad = yr.dot(&dy) - &(w * n1);
  let mut hess = yr.dot(&y_anom.t());
  hess.diag_mut().map_inplace(|v| *v += n1);

  let (next_tr, pw) = sqrt_transform(&hess, n1)?;
  Ok((pw.dot(&grad), next_tr))
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;

  use na_core::{GaussRV, LinearModel, LinearObserver};

  use crate::kalman::enkf;
  use crate::config::AMethod;
  use crate::forecast::{forecast, Propagation};
  use crate::state::State;
  use crate::utils::PartialEqWithinTol;

  fn setup() -> (LinearModel, LinearObserver, Chronology, Ensemble) {
    let model = LinearModel::new(arr2(&[[0.9, 0.1], [0.0, 0.8]]),
                                 GaussRV::zero(2),
                                 GaussRV::isotropic(2, 1.0).unwrap())
      .unwrap();
    let h = LinearObserver::indexed(2, &[0], 0.1).unwrap();
    let chrono = Chronology::from_steps(6, 3, 1.0, -1.0).unwrap();
    let mut rng = Isaac64Rng::seed_from_u64(4);
    let start = Ensemble::sample(model.initial_condition(), 12, &mut rng)
      .unwrap();
    (model, h, chrono, start)
  }

  /// For linear models without noise the iterative filter converges in one
  /// step to the square root filter's analysis.
  #[test]
  fn linear_case_matches_the_square_root_filter() {
    let (model, h, chrono, start) = setup();
    let y = arr1(&[0.4]);
    let mut rng = Isaac64Rng::seed_from_u64(0);

    let mut fc = State::Ensemble(start.clone());
    for k in chrono.window(0) {
      forecast(&mut fc, Propagation::Members, &model, chrono.tt(k) - 1.0, 1.0,
               &mut rng).unwrap();
    }
    let mut sqrt = fc.as_ensemble().unwrap().clone();
    let mut notes = vec![];
    enkf::analyze(&mut sqrt, y.view(), &h, chrono.tt_obs(0), AMethod::Sqrt,
                  &mut rng, &mut notes).unwrap();

    let mut it = fc.as_ensemble().unwrap().clone();
    let window = Window { model: &model, chrono: &chrono, k_obs: 0, };
    let iterations = analyze(&mut it, &start, y.view(), &window, &h, 10, 1e-6,
                             &mut rng, &mut notes).unwrap();
    assert!(notes.is_empty(), "{:?}", notes);
    assert!(iterations <= 2, "{}", iterations);
    assert!(it.mean().partial_eq_within_tol(&sqrt.mean(), 1e-8));
    assert!(it.covariance().partial_eq_within_tol(&sqrt.covariance(), 1e-8));
  }

  #[test]
  fn iteration_cap_is_reported() {
    let (model, h, chrono, start) = setup();
    let mut ens = start.clone();
    let mut rng = Isaac64Rng::seed_from_u64(0);
    let mut notes = vec![];
    let window = Window { model: &model, chrono: &chrono, k_obs: 1, };
    let iterations = analyze(&mut ens, &start, arr1(&[3.0]).view(), &window,
                             &h, 1, 1e-12, &mut rng, &mut notes).unwrap();
    assert_eq!(iterations, 1);
    match notes.as_slice() {
      [StepNote::NotConverged { iterations: 1, .. }] => {},
      other => panic!("unexpected notes {:?}", other),
    }
  }

  /// The identity, until a state leaves `(-10, 10)`.
  struct Bounded {
    noise: GaussRV,
    x0: GaussRV,
  }

  impl Model for Bounded {
    fn state_dim(&self) -> usize { 1 }
    fn step(&self, x: ArrayView1<f64>, _t: f64, _dt: f64,
            mut out: nd::ArrayViewMut1<f64>) {
      out.assign(&x);
      out.mapv_inplace(|v| if v.abs() < 10.0 { v } else { ::std::f64::INFINITY });
    }
    fn process_noise(&self) -> &GaussRV { &self.noise }
    fn initial_condition(&self) -> &GaussRV { &self.x0 }
  }

  #[test]
  fn diverging_iterate_falls_back_to_the_last_finite_one() {
    let model = Bounded {
      noise: GaussRV::zero(1),
      x0: GaussRV::isotropic(1, 1.0).unwrap(),
    };
    let h = LinearObserver::identity(1, 1e-4).unwrap();
    let chrono = Chronology::from_steps(2, 2, 1.0, -1.0).unwrap();
    let mut rng = Isaac64Rng::seed_from_u64(8);
    let start = Ensemble::sample(model.initial_condition(), 10, &mut rng)
      .unwrap();

    let mut ens = start.clone();
    let mut notes = vec![];
    let window = Window { model: &model, chrono: &chrono, k_obs: 0, };
    let iterations = analyze(&mut ens, &start, arr1(&[100.0]).view(), &window,
                             &h, 5, 1e-6, &mut rng, &mut notes).unwrap();
    assert_eq!(iterations, 2);
    assert_eq!(notes, vec![StepNote::NonFinite { what: "iEnKF iterate" }]);
    assert!(ens.members().partial_eq_within_tol(start.members(), 1e-12));
  }
}
