//! Static (3D) variational analysis: the Kalman update with a fixed
//! background covariance `B` in place of a propagated one.

use nd::{Array2, ArrayView1};

use na_core::Observer;

use crate::analysis::StepNote;
use crate::error::{Error, Result};
use crate::state::Moments;

use super::ekf::update;

/// The posterior `(I - K H) B` is stored with the mean so that the spread
/// statistics have something to report; the next forecast discards it.
pub fn analyze<O>(mom: &mut Moments, b: &Array2<f64>, y: ArrayView1<f64>,
                  observer: &O, t: f64, notes: &mut Vec<StepNote>)
  -> Result<()>
  where O: Observer + ?Sized,
{
  let m = mom.mean_ref().len();
  if b.dim() != (m, m) {
    return Err(Error::Dimension {
      what: "background covariance",
      expected: m,
      found: b.dim().0,
    });
  }
  let (mean, cov) = update(mom.mean_ref(), b, y, observer, t, notes)?;
  mom.overwrite_mean_and_covariance(mean, cov)
}
