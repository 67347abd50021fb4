//! The Lorenz (1996) model ("Lorenz-95") on a ring of `m` sites.

extern crate na_core;
extern crate na_discrete_filtering as na_df;
extern crate na_quadrature as na_q;
extern crate ndarray as nd;
extern crate util;

use nd::{ArrayView1, ArrayViewMut1};

use na_core::{GaussRV, LinearObserver, Model};
use na_df::{Chronology, Result};
use util::Setup;

#[derive(Debug, Clone)]
pub struct L95Model {
  pub m: usize,
  pub forcing: f64,
  pub noise: GaussRV,
  pub x0: GaussRV,
}

/// `dx_i/dt = (x_{i+1} - x_{i-2}) x_{i-1} - x_i + F`, indices cyclic.
pub fn lorenz95(forcing: f64, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
  let n = x.len();
  for i in 0..n {
    let ip1 = (i + 1) % n;
    let im1 = (i + n - 1) % n;
    let im2 = (i + n - 2) % n;
    out[i] = (x[ip1] - x[im2]) * x[im1] - x[i] + forcing;
  }
}

impl Model for L95Model {
  fn state_dim(&self) -> usize { self.m }

  fn step(&self, x: ArrayView1<f64>, t: f64, dt: f64,
          out: ArrayViewMut1<f64>) {
    let forcing = self.forcing;
    na_q::rk4(|_, x, out| lorenz95(forcing, x, out), t, dt, x, out);
  }

  fn process_noise(&self) -> &GaussRV { &self.noise }
  fn initial_condition(&self) -> &GaussRV { &self.x0 }
}

/// Sakov and Oke (2008): 40 sites, `F = 8`, `dt = 0.05`, observed in full
/// every step with `R = I`.
pub fn sak08() -> Result<Setup<L95Model, LinearObserver>> {
  let m = 40;
  Ok(Setup {
    f: L95Model {
      m,
      forcing: 8.0,
      noise: GaussRV::zero(m),
      x0: GaussRV::isotropic(m, 0.001)?,
    },
    h: LinearObserver::identity(m, 1.0)?,
    t: Chronology::new(0.05, 1, 4f64.powi(5), 20.0)?,
  })
}
