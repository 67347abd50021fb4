//! Kalman-type analyses, and the linear algebra they share.

use log::warn;
use nd::{Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Dimension};

use na_core::Observer;
use nla::{Cholesky, SymmetricFunctions};

use crate::analysis::StepNote;
use crate::ensemble::Ensemble;
use crate::error::{Error, Result};

pub mod ekf;
pub mod enkf;
pub mod enkf_n;
pub mod ienkf;
pub mod var3d;

/// Solves `S X = B` for symmetric `S`, by Cholesky when `S` is positive
/// definite and through the pseudo-inverse (noted in `notes`) otherwise.
pub(crate) fn solve_sym(s: &Array2<f64>, b: &Array2<f64>, what: &'static str,
                        notes: &mut Vec<StepNote>)
  -> Result<Array2<f64>>
{
  ensure_finite(s, what)?;
  match s.solve_spd(b) {
    Ok(x) => Ok(x),
    Err(nla::Error::NotPositiveDefinite) => {
      warn!("{} is not positive definite, using its pseudo-inverse", what);
      notes.push(StepNote::PseudoInverse { what });
      Ok(s.pinv_sym()?.dot(b))
    },
    Err(e) => Err(e.into()),
  }
}

/// `Error::NonFinite(what)` unless every entry of `a` is finite.
pub(crate) fn ensure_finite<S, D>(a: &ArrayBase<S, D>, what: &'static str)
  -> Result<()>
  where S: Data<Elem = f64>,
        D: Dimension,
{
  if a.iter().all(|v| v.is_finite()) {
    Ok(())
  } else {
    Err(Error::NonFinite(what))
  }
}

/// `B S^-1` for symmetric `S`.
pub(crate) fn mrdiv(b: &Array2<f64>, s: &Array2<f64>, what: &'static str,
                    notes: &mut Vec<StepNote>)
  -> Result<Array2<f64>>
{
  let bt = b.t().to_owned();
  Ok(solve_sym(s, &bt, what, notes)?.reversed_axes())
}

/// The observed ensemble and its departures.
pub(crate) struct Innovations {
  /// `h(E)`, `N x p`.
  pub he: Array2<f64>,
  /// `h(E) - hx`, `N x p`.
  pub y: Array2<f64>,
  /// `y_obs - hx`.
  pub dy: Array1<f64>,
}

impl Innovations {
  pub fn of<O>(ens: &Ensemble, observer: &O, t: f64, y: ArrayView1<f64>)
    -> Result<Innovations>
    where O: Observer + ?Sized,
  {
    if y.len() != observer.obs_dim() {
      return Err(Error::Dimension {
        what: "observation",
        expected: observer.obs_dim(),
        found: y.len(),
      });
    }
    let he = ens.observed(observer, t);
    ensure_finite(&he, "observed ensemble")?;
    let hx = he.sum_axis(Axis(0)) / ens.n() as f64;
    let anomalies = &he - &hx;
    let dy = &y - &hx;
    ensure_finite(&dy, "innovation")?;
    Ok(Innovations { he, y: anomalies, dy, })
  }
}

/// `E <- mu + w A + T A`: the ensemble transform update shared by the
/// square root filters.
pub(crate) fn transform_members(mu: &Array1<f64>, a: &Array2<f64>,
                                w: &Array1<f64>, t: &Array2<f64>)
  -> Array2<f64>
{
  let mean = mu + &w.dot(a);
  let mut e = t.dot(a);
  e += &mean;
  e
}

/// The square root `T = sqrt(N - 1) V d^-1/2 V^T` and `Pw = V d^-1 V^T` of
/// the symmetric `C = V diag(d) V^T`.
pub(crate) fn sqrt_transform(c: &Array2<f64>, n1: f64)
  -> Result<(Array2<f64>, Array2<f64>)>
{
  ensure_finite(c, "transform matrix")?;
  let (d, v) = c.sym_eigen()?;
  if let Some(&bad) = d.iter().find(|&&l| !(l > 0.0)) {
    return Err(nla::Error::NotPositiveSemiDefinite(bad).into());
  }
  let pw = (&v * &d.mapv(f64::recip)).dot(&v.t());
  let t = (&v * &d.mapv(|l| (n1 / l).sqrt())).dot(&v.t());
  Ok((t, pw))
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::arr2;
  use crate::utils::PartialEqWithinTol;

  #[test]
  fn singular_systems_fall_back() {
    let mut notes = vec![];
    let s = arr2(&[[1.0, 1.0], [1.0, 1.0]]);
    let b = arr2(&[[2.0], [2.0]]);
    let x = solve_sym(&s, &b, "test matrix", &mut notes).unwrap();
    assert_eq!(notes, vec![StepNote::PseudoInverse { what: "test matrix" }]);
    assert!(x.partial_eq_within_tol(&arr2(&[[1.0], [1.0]]), 1e-10));
  }

  #[test]
  fn non_finite_systems_are_refused() {
    let mut notes = vec![];
    let s = arr2(&[[1.0, ::std::f64::NAN], [::std::f64::NAN, 1.0]]);
    let b = arr2(&[[1.0], [1.0]]);
    assert_eq!(solve_sym(&s, &b, "test matrix", &mut notes).unwrap_err(),
               Error::NonFinite("test matrix"));
    assert_eq!(sqrt_transform(&s, 1.0).unwrap_err(),
               Error::NonFinite("transform matrix"));
    assert!(notes.is_empty());
  }

  #[test]
  fn right_division() {
    let mut notes = vec![];
    let s = arr2(&[[2.0, 0.0], [0.0, 4.0]]);
    let b = arr2(&[[2.0, 4.0]]);
    let x = mrdiv(&b, &s, "test matrix", &mut notes).unwrap();
    assert!(notes.is_empty());
    assert!(x.partial_eq_within_tol(&arr2(&[[1.0, 1.0]]), 1e-12));
  }

  #[test]
  fn transform_of_a_diagonal() {
    let c = arr2(&[[4.0, 0.0], [0.0, 1.0]]);
    let (t, pw) = sqrt_transform(&c, 1.0).unwrap();
    assert!(t.partial_eq_within_tol(&arr2(&[[0.5, 0.0], [0.0, 1.0]]), 1e-12));
    assert!(pw.partial_eq_within_tol(&arr2(&[[0.25, 0.0], [0.0, 1.0]]), 1e-12));
  }
}
