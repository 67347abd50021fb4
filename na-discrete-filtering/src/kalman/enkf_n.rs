//! The finite-size ensemble Kalman filter (Bocquet 2011; Bocquet, Raanes
//! and Hannart 2015), dual form. The prior inflation `l` is found by a scalar
//! minimisation each analysis, then used in a square root update.

use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::brent::BrentOpt;
use log::{debug, warn};
use nd::{Array1, ArrayView1};

use na_core::Observer;
use nla::{eigen_tol, SymmetricFunctions};

use crate::analysis::StepNote;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::state::Estimate;

use super::{transform_members, Innovations};

pub const L_MIN: f64 = 0.05;
pub const L_MAX: f64 = 100.0;
pub const L_TOL: f64 = 1.0e-4;
const MAX_ITERS: u64 = 200;

/// `J(l) = sum du^2 / (l^2 s^2 + N1) + eN / l^2 + cL ln l^2`.
#[derive(Debug, Clone)]
pub struct DualCost {
  du2: Array1<f64>,
  s2: Array1<f64>,
  n1: f64,
  e_n: f64,
  c_l: f64,
}

impl DualCost {
  pub fn new(du: &Array1<f64>, s2: &Array1<f64>, n: usize) -> DualCost {
    let n_f = n as f64;
    let n1 = n_f - 1.0;
    DualCost {
      du2: du.mapv(|v| v * v),
      s2: s2.clone(),
      n1,
      e_n: (n_f + 1.0) / n_f,
      // g = 0: no rank deficiency correction
      c_l: n_f / n1,
    }
  }

  pub fn eval(&self, l: f64) -> f64 {
    let l2 = l * l;
    let data = self.du2.iter()
      .zip(self.s2.iter())
      .map(|(&du2, &s2)| du2 / (l2 * s2 + self.n1))
      .sum::<f64>();
    data + self.e_n / l2 + self.c_l * l2.ln()
  }

  /// The minimiser when the observation carries no information.
  pub fn prior_mode(&self) -> f64 {
    (self.e_n / self.c_l).sqrt()
  }
}

impl CostFunction for DualCost {
  type Param = f64;
  type Output = f64;

  fn cost(&self, l: &f64) -> ::std::result::Result<f64, ArgminError> {
    Ok(self.eval(*l))
  }
}

/// Minimises `cost` over `[L_MIN, L_MAX]` by Brent's method.
fn minimise(cost: &DualCost) -> ::std::result::Result<f64, ArgminError> {
  let solver = BrentOpt::new(L_MIN, L_MAX).set_tolerance(L_TOL, L_TOL);
  let res = Executor::new(cost.clone(), solver)
    .configure(|state| state.max_iters(MAX_ITERS))
    .run()?;
  Ok(res.state().get_best_param().cloned().unwrap_or(::std::f64::NAN))
}

/// The inflation found by the search, or the prior mode (noted) when the
/// search failed or left the admissible range.
fn accept(cost: &DualCost, found: ::std::result::Result<f64, ArgminError>,
          notes: &mut Vec<StepNote>)
  -> f64
{
  match found {
    Ok(l) if l.is_finite() && l > 0.0 => l,
    other => {
      let l = cost.prior_mode();
      match other {
        Err(e) => warn!("inflation search failed ({}), using {}", e, l),
        Ok(bad) => warn!("inflation search returned {}, using {}", bad, l),
      }
      notes.push(StepNote::InflationFallback { inflation: l });
      l
    },
  }
}

/// Updates `ens` in place and returns the inflation `l` it used.
pub fn analyze<O>(ens: &mut Ensemble, y: ArrayView1<f64>, observer: &O, t: f64,
                  notes: &mut Vec<StepNote>)
  -> Result<f64>
  where O: Observer + ?Sized,
{
  let n = ens.n();
  let n1 = (n - 1) as f64;
  let mu = ens.mean();
  let a = ens.anomalies();
  let inn = Innovations::of(ens, observer, t, y)?;
  let r_inv = observer.noise().cov().inv();

  // Y R^-1 Y^T = V diag(s^2) V^T
  let yr = inn.y.dot(r_inv);
  let g = yr.dot(&inn.y.t());
  let (s2, v) = g.sym_eigen()?;
  let tol = eigen_tol(&s2);
  let s2 = s2.mapv(|s| s.max(0.0));

  // innovation in the singular basis, du_i = (V^T Y R^-1 dy)_i / s_i
  let proj = v.t().dot(&yr.dot(&inn.dy));
  let du = Array1::from_shape_fn(n, |i| {
    if s2[i] > tol { proj[i] / s2[i].sqrt() } else { 0.0 }
  });

  let cost = DualCost::new(&du, &s2, n);
  let l = accept(&cost, minimise(&cost), notes);
  debug!("EnKF_N inflation {:.5}", l);

  // square root update with the prior covariance scaled by l^2
  let za = n1 / (l * l);
  let pw = (&v * &s2.mapv(|s| 1.0 / (s + za))).dot(&v.t());
  let tr = (&v * &s2.mapv(|s| (n1 / (s + za)).sqrt())).dot(&v.t());
  let w = pw.dot(&yr.dot(&inn.dy));

  ens.overwrite_members(transform_members(&mu, &a, &w, &tr))?;
  Ok(l)
}
