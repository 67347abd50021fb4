//! The Lorenz (1963) convection model.

extern crate na_core;
extern crate na_discrete_filtering as na_df;
extern crate na_quadrature as na_q;
extern crate ndarray as nd;
extern crate util;

use nd::{arr1, ArrayView1, ArrayViewMut1};

use na_core::{Covariance, GaussRV, LinearObserver, Model};
use na_df::{Chronology, Result};
use util::Setup;

#[derive(Debug, Clone)]
pub struct L63Model {
  pub sigma: f64,
  pub rho: f64,
  pub beta: f64,
  pub noise: GaussRV,
  pub x0: GaussRV,
}

impl L63Model {
  /// The classical parameters, deterministic, started from `x0`.
  pub fn new(x0: GaussRV) -> L63Model {
    L63Model {
      sigma: 10.0,
      rho: 28.0,
      beta: 8.0 / 3.0,
      noise: GaussRV::zero(3),
      x0,
    }
  }

  pub fn dxdt(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    debug_assert!(x.len() == 3);
    debug_assert!(out.len() == 3);

    out[0] = self.sigma * (x[1] - x[0]);
    out[1] = x[0] * (self.rho - x[2]) - x[1];
    out[2] = x[0] * x[1] - self.beta * x[2];
  }
}

impl Model for L63Model {
  fn state_dim(&self) -> usize { 3 }

  fn step(&self, x: ArrayView1<f64>, t: f64, dt: f64,
          out: ArrayViewMut1<f64>) {
    na_q::rk4(|_, x, out| self.dxdt(x, out), t, dt, x, out);
  }

  fn process_noise(&self) -> &GaussRV { &self.noise }
  fn initial_condition(&self) -> &GaussRV { &self.x0 }
}

/// Sakov et al. (2012): `dt = 0.01`, observed in full every 25 steps with
/// `R = 2 I`.
pub fn sak12() -> Result<Setup<L63Model, LinearObserver>> {
  let x0 = GaussRV::new(arr1(&[1.509, -1.531, 25.46]),
                        Covariance::isotropic(3, 2.0)?)?;
  Ok(Setup {
    f: L63Model::new(x0),
    h: LinearObserver::identity(3, 2.0)?,
    t: Chronology::new(0.01, 25, 4f64.powi(5), 4.0)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::Array1;
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;

  use na_core::Observer;
  use na_df::Config;

  #[test]
  fn equilibria_are_fixed() {
    let m = L63Model::new(GaussRV::zero(3));
    let c = (m.beta * (m.rho - 1.0)).sqrt();
    let x = arr1(&[c, c, m.rho - 1.0]);
    let mut out = Array1::zeros(3);
    m.step(x.view(), 0.0, 0.01, out.view_mut());
    for i in 0..3 {
      assert!((out[i] - x[i]).abs() < 1e-10, "{}", out);
    }
  }

  #[test]
  fn preset() {
    let s = sak12().unwrap();
    assert_eq!(s.t.dk_obs(), 25);
    assert_eq!(s.t.k(), 102400);
    assert_eq!(s.t.obs_count(), 4096);
    assert_eq!(s.h.obs_dim(), 3);
  }

  /// Resampling a deterministic model must not leave the particles sitting
  /// on one point.
  #[test]
  fn particle_filter_keeps_its_spread() {
    let s = Setup {
      t: Chronology::new(0.01, 25, 40.0, 4.0).unwrap(),
      ..sak12().unwrap()
    };
    let mut rng = Isaac64Rng::seed_from_u64(5);
    let data = s.simulate(&mut rng).unwrap();
    let config = Config::new("PartFilt").n(400).ner(0.1);
    let out = s.assimilate(&config, &data, rng, false).unwrap();
    let summary = out.summary(&s.t);

    assert!(summary.rmse_a.mean < 1.5, "{}", summary.rmse_a);
    assert!(summary.rmsv_a.mean > 0.05, "{}", summary.rmsv_a);
    let rmsv = out.stats().rmsv_a();
    assert!(rmsv[rmsv.len() - 1] > 0.0);
  }
}
