//! The extended Kalman filter analysis: the Kalman update of a mean and
//! covariance, linearised at the mean.

use nd::{Array1, Array2, ArrayView1};

use na_core::Observer;

use crate::analysis::StepNote;
use crate::error::{Error, Result};
use crate::state::Moments;
use crate::utils::symmetrize;

use super::mrdiv;

pub fn analyze<O>(mom: &mut Moments, y: ArrayView1<f64>, observer: &O, t: f64,
                  notes: &mut Vec<StepNote>)
  -> Result<()>
  where O: Observer + ?Sized,
{
  let prior = mom.cov().clone();
  let (mean, cov) = update(mom.mean_ref(), &prior, y, observer, t, notes)?;
  mom.overwrite_mean_and_covariance(mean, cov)
}

/// `mu + K (y - h(mu))` and `(I - K H) P` with `K = P H^T (H P H^T + R)^-1`.
pub(crate) fn update<O>(mu: &Array1<f64>, p: &Array2<f64>, y: ArrayView1<f64>,
                        observer: &O, t: f64, notes: &mut Vec<StepNote>)
  -> Result<(Array1<f64>, Array2<f64>)>
  where O: Observer + ?Sized,
{
  let m = mu.len();
  let p_obs = observer.obs_dim();
  if y.len() != p_obs {
    return Err(Error::Dimension {
      what: "observation",
      expected: p_obs,
      found: y.len(),
    });
  }

  let mut h = Array2::zeros((p_obs, m));
  observer.jacobian(mu.view(), t, h.view_mut());
  let mut hx = Array1::zeros(p_obs);
  observer.observe(mu.view(), t, hx.view_mut());

  let pht = p.dot(&h.t());
  let mut s = h.dot(&pht);
  s += observer.noise().cov().full();
  symmetrize(&mut s);
  let k = mrdiv(&pht, &s, "innovation covariance", notes)?;

  let mean = mu + &k.dot(&(&y - &hx));
  let mut kh = k.dot(&h);
  kh.mapv_inplace(|v| -v);
  kh.diag_mut().map_inplace(|v| *v += 1.0);
  let mut cov = kh.dot(p);
  symmetrize(&mut cov);
  Ok((mean, cov))
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};

  use na_core::LinearObserver;

  use crate::state::Estimate;
  use crate::utils::PartialEqWithinTol;

  #[test]
  fn scalar_kalman_update() {
    let h = LinearObserver::identity(1, 1.0).unwrap();
    let mut mom = Moments::new(arr1(&[0.0]), arr2(&[[3.0]])).unwrap();
    let mut notes = vec![];
    analyze(&mut mom, arr1(&[4.0]).view(), &h, 0.0, &mut notes).unwrap();
    // K = 3 / 4
    assert!(mom.mean()[0].partial_eq_within_tol(&3.0, 1e-12));
    assert!(mom.covariance()[[0, 0]].partial_eq_within_tol(&0.75, 1e-12));
    assert!(notes.is_empty());
  }

  #[test]
  fn unobserved_components_follow_correlations() {
    let h = LinearObserver::indexed(2, &[0], 1.0).unwrap();
    let mut mom = Moments::new(arr1(&[0.0, 0.0]),
                               arr2(&[[1.0, 0.5], [0.5, 1.0]])).unwrap();
    let mut notes = vec![];
    analyze(&mut mom, arr1(&[2.0]).view(), &h, 0.0, &mut notes).unwrap();
    assert!(mom.mean().partial_eq_within_tol(&arr1(&[1.0, 0.5]), 1e-12));
    let expected = arr2(&[[0.5, 0.25], [0.25, 0.875]]);
    assert!(mom.covariance().partial_eq_within_tol(&expected, 1e-12));
  }

  #[test]
  fn wrong_observation_length() {
    let h = LinearObserver::identity(2, 1.0).unwrap();
    let mut mom = Moments::new(arr1(&[0.0, 0.0]), Array2::eye(2)).unwrap();
    let mut notes = vec![];
    assert!(analyze(&mut mom, arr1(&[1.0]).view(), &h, 0.0, &mut notes)
            .is_err());
  }
}
