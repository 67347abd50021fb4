//! Fixed step Runge-Kutta integration of ODE right hand sides
//! `f(t, y, yp)`.

extern crate ndarray as nd;

use nd::{Array1, ArrayView1, ArrayViewMut1, Zip};

/// One classical fourth order Runge-Kutta step of size `h` from `(t, y)`.
pub fn rk4<F>(f: F, t: f64, h: f64,
              y: ArrayView1<f64>,
              mut out: ArrayViewMut1<f64>)
  where F: Fn(f64, ArrayView1<f64>, ArrayViewMut1<f64>),
{
  let n = y.len();
  debug_assert_eq!(n, out.len());

  let mut k1 = Array1::zeros(n);
  let mut k2 = Array1::zeros(n);
  let mut k3 = Array1::zeros(n);
  let mut k4 = Array1::zeros(n);
  let mut stage = Array1::zeros(n);

  f(t, y.view(), k1.view_mut());

  Zip::from(&mut stage).and(&y).and(&k1)
    .for_each(|s, &y, &k| *s = y + 0.5 * h * k);
  f(t + 0.5 * h, stage.view(), k2.view_mut());

  Zip::from(&mut stage).and(&y).and(&k2)
    .for_each(|s, &y, &k| *s = y + 0.5 * h * k);
  f(t + 0.5 * h, stage.view(), k3.view_mut());

  Zip::from(&mut stage).and(&y).and(&k3)
    .for_each(|s, &y, &k| *s = y + h * k);
  f(t + h, stage.view(), k4.view_mut());

  Zip::from(&mut out).and(&y).and(&k1).and(&k2).and(&k3).and(&k4)
    .for_each(|o, &y, &k1, &k2, &k3, &k4| {
      *o = y + h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
    });
}
