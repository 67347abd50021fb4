use nd::{Array1, Array2, ArrayBase, Data};
use nd_rand::rand_distr::StandardNormal;
use nd_rand::RandomExt;
use nla::{eigen_tol, Cholesky, SymmetricFunctions};
use rand::Rng;

use crate::error::{Error, Result};

const SYMMETRY_TOL: f64 = 1.0e-10;

/// A symmetric positive semi-definite matrix together with the derived
/// quantities the filters need: a factor `L` with `L L^T = C`, the
/// pseudo-inverse and the pseudo-inverse of the symmetric square root.
#[derive(Debug, Clone)]
pub struct Covariance {
  full: Array2<f64>,
  factor: Array2<f64>,
  inv: Array2<f64>,
  sym_sqrt_inv: Array2<f64>,
  zero: bool,
}

impl Covariance {
  pub fn new(full: Array2<f64>) -> Result<Covariance> {
    let (rows, cols) = full.dim();
    if rows != cols {
      return Err(nla::Error::NotSquare(rows, cols).into());
    }
    if full.iter().any(|v| !v.is_finite()) {
      return Err(Error::NonFinite("covariance"));
    }
    let scale = full.iter().fold(1.0f64, |m, v| m.max(v.abs()));
    for i in 0..rows {
      for j in 0..i {
        if (full[[i, j]] - full[[j, i]]).abs() > SYMMETRY_TOL * scale {
          return Err(Error::Asymmetric);
        }
      }
    }

    if full.iter().all(|&v| v == 0.0) {
      return Ok(Covariance::zeros(rows));
    }

    let (d, v) = full.sym_eigen()?;
    let tol = eigen_tol(&d);
    if let Some(&neg) = d.iter().find(|&&l| l < -tol) {
      return Err(nla::Error::NotPositiveSemiDefinite(neg).into());
    }
    // Cholesky when it exists, eigen factor V sqrt(D) otherwise
    let factor = match full.cholesky_lower() {
      Ok(l) => l,
      Err(_) => &v * &d.mapv(|l| l.max(0.0).sqrt()),
    };
    let inv = {
      let vf = &v * &d.mapv(|l| if l > tol { l.recip() } else { 0.0 });
      vf.dot(&v.t())
    };
    let sym_sqrt_inv = {
      let vf = &v * &d.mapv(|l| if l > tol { l.sqrt().recip() } else { 0.0 });
      vf.dot(&v.t())
    };

    Ok(Covariance {
      full,
      factor,
      inv,
      sym_sqrt_inv,
      zero: false,
    })
  }

  pub fn zeros(m: usize) -> Covariance {
    Covariance {
      full: Array2::zeros((m, m)),
      factor: Array2::zeros((m, m)),
      inv: Array2::zeros((m, m)),
      sym_sqrt_inv: Array2::zeros((m, m)),
      zero: true,
    }
  }

  /// `var * I`.
  pub fn isotropic(m: usize, var: f64) -> Result<Covariance> {
    Covariance::diagonal(&Array1::from_elem(m, var))
  }

  pub fn diagonal<S>(vars: &ArrayBase<S, nd::Ix1>) -> Result<Covariance>
    where S: Data<Elem = f64>,
  {
    if let Some(&neg) = vars.iter().find(|&&v| v < 0.0) {
      return Err(Error::NegativeVariance(neg));
    }
    if vars.iter().any(|v| !v.is_finite()) {
      return Err(Error::NonFinite("variances"));
    }
    Covariance::new(Array2::from_diag(vars))
  }

  pub fn dim(&self) -> usize { self.full.dim().0 }
  pub fn is_zero(&self) -> bool { self.zero }
  pub fn full(&self) -> &Array2<f64> { &self.full }
  pub fn factor(&self) -> &Array2<f64> { &self.factor }
  /// Pseudo-inverse.
  pub fn inv(&self) -> &Array2<f64> { &self.inv }
  /// Pseudo-inverse of the symmetric square root, `C^{-1/2}`.
  pub fn sym_sqrt_inv(&self) -> &Array2<f64> { &self.sym_sqrt_inv }
}

/// A Gaussian random vector `N(mu, C)`.
#[derive(Debug, Clone)]
pub struct GaussRV {
  mu: Array1<f64>,
  cov: Covariance,
}

impl GaussRV {
  pub fn new(mu: Array1<f64>, cov: Covariance) -> Result<GaussRV> {
    if mu.len() != cov.dim() {
      return Err(Error::Dimension {
        what: "mean",
        expected: cov.dim(),
        found: mu.len(),
      });
    }
    if mu.iter().any(|v| !v.is_finite()) {
      return Err(Error::NonFinite("mean"));
    }
    Ok(GaussRV { mu, cov })
  }

  pub fn centered(cov: Covariance) -> GaussRV {
    GaussRV {
      mu: Array1::zeros(cov.dim()),
      cov,
    }
  }

  pub fn isotropic(m: usize, var: f64) -> Result<GaussRV> {
    Ok(GaussRV::centered(Covariance::isotropic(m, var)?))
  }

  /// The degenerate distribution at zero; sampling it consumes no
  /// randomness.
  pub fn zero(m: usize) -> GaussRV {
    GaussRV::centered(Covariance::zeros(m))
  }

  pub fn dim(&self) -> usize { self.mu.len() }
  pub fn mu(&self) -> &Array1<f64> { &self.mu }
  pub fn cov(&self) -> &Covariance { &self.cov }
  pub fn is_zero(&self) -> bool { self.cov.is_zero() }

  /// `n` independent draws, one per row.
  pub fn sample<R>(&self, n: usize, rng: &mut R) -> Array2<f64>
    where R: Rng + ?Sized,
  {
    let m = self.dim();
    let mut out = if self.cov.is_zero() {
      Array2::zeros((n, m))
    } else {
      let z = Array2::<f64>::random_using((n, m), StandardNormal, rng);
      z.dot(&self.cov.factor().t())
    };
    out += &self.mu;
    out
  }

  pub fn sample_one<R>(&self, rng: &mut R) -> Array1<f64>
    where R: Rng + ?Sized,
  {
    self.sample(1, rng).row(0).to_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2, Axis};
  use rand::{RngCore, SeedableRng};
  use rand_isaac::Isaac64Rng;

  fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter()
      .zip(b.iter())
      .fold(0.0f64, |m, (l, r)| m.max((l - r).abs()))
  }

  #[test]
  fn factor_reconstructs() {
    let c = arr2(&[[4.0, 12.0, -16.0],
                   [12.0, 37.0, -43.0],
                   [-16.0, -43.0, 98.0]]);
    let cov = Covariance::new(c.clone()).unwrap();
    let l = cov.factor();
    assert!(max_abs_diff(&l.dot(&l.t()), &c) < 1e-10);
    assert!(max_abs_diff(&cov.inv().dot(&c), &Array2::eye(3)) < 1e-8);
  }

  #[test]
  fn rank_deficient() {
    // rank one: u u^T with u = (1, 2)
    let c = arr2(&[[1.0, 2.0], [2.0, 4.0]]);
    let cov = Covariance::new(c.clone()).unwrap();
    let l = cov.factor();
    assert!(max_abs_diff(&l.dot(&l.t()), &c) < 1e-10);

    // pinv(u u^T) = u u^T / |u|^4
    let expected = &c / 25.0;
    assert!(max_abs_diff(cov.inv(), &expected) < 1e-10);
  }

  #[test]
  fn bad_covariances() {
    assert_eq!(Covariance::new(arr2(&[[1.0, 0.5], [0.0, 1.0]])).unwrap_err(),
               Error::Asymmetric);
    assert_eq!(Covariance::isotropic(2, -1.0).unwrap_err(),
               Error::NegativeVariance(-1.0));
    assert!(Covariance::new(Array2::zeros((2, 3))).is_err());
    assert!(Covariance::new(arr2(&[[1.0, 2.0], [2.0, 1.0]])).is_err());
  }

  #[test]
  fn zero_draws_nothing() {
    let rv = GaussRV::new(arr1(&[1.0, -1.0]), Covariance::zeros(2)).unwrap();
    let mut a = Isaac64Rng::seed_from_u64(3);
    let mut b = a.clone();
    let x = rv.sample(4, &mut a);
    assert_eq!(x.dim(), (4, 2));
    assert!(x.rows().into_iter().all(|r| r == arr1(&[1.0, -1.0])));
    assert_eq!(a.next_u64(), b.next_u64());
  }

  #[test]
  fn sample_moments() {
    let c = arr2(&[[2.0, 0.6], [0.6, 0.5]]);
    let rv = GaussRV::new(arr1(&[3.0, -2.0]), Covariance::new(c.clone()).unwrap())
      .unwrap();
    let mut rng = Isaac64Rng::seed_from_u64(11);
    let x = rv.sample(20_000, &mut rng);

    let mean = x.mean_axis(Axis(0)).unwrap();
    assert!((mean[0] - 3.0).abs() < 0.05, "{}", mean);
    assert!((mean[1] + 2.0).abs() < 0.05, "{}", mean);

    let anomalies = &x - &mean;
    let emp = anomalies.t().dot(&anomalies) / (x.nrows() - 1) as f64;
    assert!(max_abs_diff(&emp, &c) < 0.08, "{}", emp);
  }
}
