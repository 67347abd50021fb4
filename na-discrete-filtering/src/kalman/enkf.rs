//! The stochastic (perturbed observations) and the deterministic (symmetric
//! square root, ETKF) ensemble Kalman filter updates.

use nd::{ArrayView1, Axis};
use rand::Rng;

use na_core::Observer;

use crate::analysis::StepNote;
use crate::config::AMethod;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::state::Estimate;

use super::{mrdiv, sqrt_transform, transform_members, Innovations};

pub fn analyze<O, R>(ens: &mut Ensemble, y: ArrayView1<f64>, observer: &O,
                     t: f64, upd: AMethod, rng: &mut R,
                     notes: &mut Vec<StepNote>)
  -> Result<()>
  where O: Observer + ?Sized,
        R: Rng + ?Sized,
{
  let n = ens.n();
  let n1 = (n - 1) as f64;
  let mu = ens.mean();
  let a = ens.anomalies();
  let inn = Innovations::of(ens, observer, t, y)?;
  let r = observer.noise().cov();

  let next = match upd {
    AMethod::PertObs => {
      // centred draws, rescaled to keep the sample variance unbiased
      let mut d = observer.noise().sample(n, rng);
      let d_mean = d.sum_axis(Axis(0)) / n as f64;
      d -= &d_mean;
      d *= (n as f64 / n1).sqrt();

      // C = Y^T Y + (N - 1) R, K = A^T Y C^-1
      let mut c = inn.y.t().dot(&inn.y);
      c.scaled_add(n1, r.full());
      let k = mrdiv(&a.t().dot(&inn.y), &c, "innovation covariance", notes)?;

      // each member against its own perturbed observation
      let mut innovations = d;
      innovations += &y;
      innovations -= &inn.he;
      let mut e = ens.members().clone();
      e += &innovations.dot(&k.t());
      e
    },
    AMethod::Sqrt => {
      // C = Y R^-1 Y^T + (N - 1) I
      let yr = inn.y.dot(r.inv());
      let mut c = yr.dot(&inn.y.t());
      c.diag_mut().map_inplace(|v| *v += n1);
      let (tr, pw) = sqrt_transform(&c, n1)?;
      let w = pw.dot(&yr.dot(&inn.dy));
      transform_members(&mu, &a, &w, &tr)
    },
  };

  ens.overwrite_members(next)
}
