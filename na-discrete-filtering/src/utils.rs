use nd::{Array1, Array2, ArrayBase, Data, Dimension, Ix1, Zip};

pub trait PartialEqWithinTol<Rhs, Tol> {
  const STD_TOL: Tol;
  fn partial_eq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool;

  fn partial_neq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool {
    !self.partial_eq_within_tol(rhs, tol)
  }

  fn partial_eq_within_std_tol(&self, rhs: &Rhs) -> bool {
    self.partial_eq_within_tol(rhs, Self::STD_TOL)
  }
  fn partial_neq_within_std_tol(&self, rhs: &Rhs) -> bool {
    !self.partial_eq_within_std_tol(rhs)
  }
}

impl PartialEqWithinTol<f64, f64> for f64 {
  const STD_TOL: Self = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &f64, tol: f64) -> bool {
    (self - rhs).abs() <= tol
  }
}
impl PartialEqWithinTol<f32, f32> for f32 {
  const STD_TOL: Self = ::std::f32::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &f32, tol: f32) -> bool {
    (self - rhs).abs() <= tol
  }
}
impl<S, S2, D> PartialEqWithinTol<ArrayBase<S2, D>, f64> for ArrayBase<S, D>
  where S: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D: Dimension,
{
  const STD_TOL: f64 = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &ArrayBase<S2, D>, tol: f64) -> bool {
    self.shape() == rhs.shape() &&
      Zip::from(self)
        .and(rhs)
        .all(|l, r| l.partial_eq_within_tol(r, tol))
  }
}

/// Replaces `a` by `(a + a^T) / 2`.
pub fn symmetrize(a: &mut Array2<f64>) {
  let n = a.dim().0;
  for i in 0..n {
    for j in 0..i {
      let avg = 0.5 * (a[[i, j]] + a[[j, i]]);
      a[[i, j]] = avg;
      a[[j, i]] = avg;
    }
  }
}

/// Root mean square of the entries.
pub fn rms<S>(v: &ArrayBase<S, Ix1>) -> f64
  where S: Data<Elem = f64>,
{
  if v.is_empty() {
    return 0.0;
  }
  (v.iter().map(|x| x * x).sum::<f64>() / v.len() as f64).sqrt()
}

/// Inclusive running sum.
pub fn cumsum<S>(v: &ArrayBase<S, Ix1>) -> Array1<f64>
  where S: Data<Elem = f64>,
{
  let mut acc = 0.0;
  v.iter()
    .map(|&x| {
      acc += x;
      acc
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};

  #[test]
  fn within_tol() {
    assert!(1.0f64.partial_eq_within_tol(&1.05, 0.1));
    assert!(1.0f64.partial_neq_within_std_tol(&1.05));
    let a = arr1(&[1.0, 2.0]);
    assert!(a.partial_eq_within_tol(&arr1(&[1.0, 2.0 + 1e-9]), 1e-8));
    assert!(a.partial_neq_within_tol(&arr1(&[1.0, 2.0, 3.0]), 1.0));
  }

  #[test]
  fn symmetrize_averages() {
    let mut a = arr2(&[[1.0, 2.0], [4.0, 3.0]]);
    symmetrize(&mut a);
    assert_eq!(a, arr2(&[[1.0, 3.0], [3.0, 3.0]]));
  }

  #[test]
  fn rms_and_cumsum() {
    assert_eq!(rms(&arr1(&[3.0, -3.0])), 3.0);
    assert_eq!(rms(&Array1::<f64>::zeros(0)), 0.0);
    assert_eq!(cumsum(&arr1(&[0.25, 0.25, 0.5])), arr1(&[0.25, 0.5, 1.0]));
  }
}
