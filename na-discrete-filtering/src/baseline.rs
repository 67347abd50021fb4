//! Reference methods that need no analysis of their own.

use nd::ArrayView1;

use crate::ensemble::Ensemble;
use crate::error::{Error, Result};
use crate::state::Estimate;

/// Recentres the ensemble on the true state, keeping its anomalies. A lower
/// bound on the error any ensemble method of the same spread can achieve.
pub fn cheat(ens: &mut Ensemble, truth: ArrayView1<f64>) -> Result<()> {
  if truth.len() != ens.dim() {
    return Err(Error::Dimension {
      what: "true state",
      expected: ens.dim(),
      found: truth.len(),
    });
  }
  let mut e = ens.anomalies();
  e += &truth;
  ens.overwrite_members(e)
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};
  use crate::utils::PartialEqWithinTol;

  #[test]
  fn recentres_on_the_truth() {
    let mut ens = Ensemble::new(arr2(&[[0.0, 1.0], [2.0, 5.0], [4.0, 0.0]]))
      .unwrap();
    let spread = ens.spread();
    let truth = arr1(&[10.0, -3.0]);
    cheat(&mut ens, truth.view()).unwrap();
    assert!(ens.mean().partial_eq_within_tol(&truth, 1e-12));
    assert!(ens.spread().partial_eq_within_tol(&spread, 1e-12));
  }

  #[test]
  fn truth_must_match_the_state() {
    let mut ens = Ensemble::new(arr2(&[[0.0], [1.0]])).unwrap();
    assert!(cheat(&mut ens, arr1(&[0.0, 0.0]).view()).is_err());
  }
}
