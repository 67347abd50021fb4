use nd::{Array1, Array2, ArrayBase, Data, Ix2, s};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::{from_dmatrix, to_dmatrix};

pub trait QR {
  /// A = QR with R upper triangular and a non-negative diagonal. Assumes
  /// rows >= cols; Q is thin.
  fn qr_decompose(&self) -> (Array2<f64>, Array2<f64>);
}

impl<S> QR for ArrayBase<S, Ix2>
  where S: Data<Elem = f64>,
{
  fn qr_decompose(&self) -> (Array2<f64>, Array2<f64>) {
    let qr = to_dmatrix(self).qr();
    let mut q = from_dmatrix(&qr.q());
    let mut r = from_dmatrix(&qr.r());

    for j in 0..r.dim().0.min(r.dim().1) {
      if r[[j, j]] < 0.0 {
        q.column_mut(j).mapv_inplace(|v| -v);
        r.row_mut(j).mapv_inplace(|v| -v);
      }
    }

    (q, r)
  }
}

/// A Haar-distributed (uniformly random) n x n orthogonal matrix.
pub fn haar_orthogonal<R>(n: usize, rand: &mut R) -> Array2<f64>
  where R: Rng + ?Sized,
{
  let g: Array2<f64> =
    Array2::from_shape_fn((n, n), |_| rand.sample(StandardNormal));
  let (q, _) = g.qr_decompose();
  q
}

/// A random orthogonal matrix Ω with Ω1 = 1. Applied to ensemble anomalies
/// it leaves both the ensemble mean and the sample covariance unchanged.
pub fn mean_preserving_orthogonal<R>(n: usize, rand: &mut R) -> Array2<f64>
  where R: Rng + ?Sized,
{
  if n < 2 {
    return Array2::eye(n);
  }

  // orthonormal basis whose first vector is 1/sqrt(n)
  let mut seed = Array2::<f64>::eye(n);
  seed.column_mut(0).assign(&Array1::from_elem(n, 1.0));
  for i in 1..n {
    seed[[i - 1, i]] = 1.0;
    seed[[i, i]] = 0.0;
  }
  let (basis, _) = seed.qr_decompose();

  let inner = haar_orthogonal(n - 1, rand);
  let mut block = Array2::<f64>::zeros((n, n));
  block[[0, 0]] = 1.0;
  block.slice_mut(s![1.., 1..]).assign(&inner);

  basis.dot(&block).dot(&basis.t())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::max_abs_diff;
  use nd::arr2;
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;

  #[test]
  fn textbook_qr() {
    let a = arr2(&[
      [12.0, -51.0, 4.0,],
      [6.0, 167.0, -68.0,],
      [-4.0, 24.0, -41.0,],
    ]);

    let expected_q = arr2(&[
      [6.0/7.0, -69.0/175.0, -58.0/175.0,],
      [3.0/7.0, 158.0/175.0, 6.0/175.0,],
      [-2.0/7.0, 6.0/35.0, -33.0/35.0,],
    ]);
    let expected_r = arr2(&[
      [14.0, 21.0, -14.0,],
      [0.0, 175.0, -70.0,],
      [0.0, 0.0, 35.0,],
    ]);

    let (q, r) = a.qr_decompose();
    assert!(max_abs_diff(&expected_r, &r) < 1e-10);
    assert!(max_abs_diff(&expected_q, &q) < 1e-12);
  }

  #[test]
  fn haar_is_orthogonal() {
    let mut rand = Isaac64Rng::seed_from_u64(7);
    let q = haar_orthogonal(6, &mut rand);
    assert!(max_abs_diff(&q.t().dot(&q), &Array2::eye(6)) < 1e-12);
  }

  #[test]
  fn mean_preserving_fixes_ones() {
    let mut rand = Isaac64Rng::seed_from_u64(11);
    let n = 8;
    let o = mean_preserving_orthogonal(n, &mut rand);
    assert!(max_abs_diff(&o.t().dot(&o), &Array2::eye(n)) < 1e-12);

    let ones = Array1::from_elem(n, 1.0);
    let image = o.dot(&ones);
    assert!(image.iter().all(|v| (v - 1.0).abs() < 1e-12));
    let pre = o.t().dot(&ones);
    assert!(pre.iter().all(|v| (v - 1.0).abs() < 1e-12));

    // not the identity
    assert!(max_abs_diff(&o, &Array2::eye(n)) > 1e-3);
  }

  #[test]
  fn trivial_sizes() {
    let mut rand = Isaac64Rng::seed_from_u64(1);
    assert_eq!(mean_preserving_orthogonal(1, &mut rand), Array2::eye(1));
    assert_eq!(mean_preserving_orthogonal(0, &mut rand).dim(), (0, 0));
  }
}
