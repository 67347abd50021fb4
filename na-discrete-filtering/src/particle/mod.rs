//! Particle filters, and the resampling schemes they share.

use nd::{Array1, ArrayBase, Data, Ix1};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::config::Resampling;
use crate::utils::cumsum;

pub mod std;

/// `n` particle indices drawn according to `weights`, which must be
/// non-negative and sum to one. The indices come out sorted.
pub fn resample<S, R>(weights: &ArrayBase<S, Ix1>, n: usize,
                      scheme: Resampling, rng: &mut R)
  -> Vec<usize>
  where S: Data<Elem = f64>,
        R: Rng + ?Sized,
{
  match scheme {
    Resampling::Systematic => systematic(&cumsum(weights), n, rng),
    Resampling::Multinomial => multinomial(&cumsum(weights), n, rng),
    Resampling::Residual => residual(weights, n, rng),
  }
}

/// One uniform draw `u`, then the points `(i + u) / n`.
fn systematic<R>(cdf: &Array1<f64>, n: usize, rng: &mut R) -> Vec<usize>
  where R: Rng + ?Sized,
{
  let u = Uniform::new(0.0, 1.0).sample(rng);
  let points = (0..n).map(|i| (i as f64 + u) / n as f64);
  invert_cdf(cdf, points)
}

fn multinomial<R>(cdf: &Array1<f64>, n: usize, rng: &mut R) -> Vec<usize>
  where R: Rng + ?Sized,
{
  let mut points: Vec<f64> = Uniform::new(0.0, 1.0)
    .sample_iter(rng)
    .take(n)
    .collect();
  points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(::std::cmp::Ordering::Equal));
  invert_cdf(cdf, points.into_iter())
}

/// `floor(n w_i)` copies of each particle, the remainder drawn
/// multinomially from the leftover weight.
fn residual<S, R>(weights: &ArrayBase<S, Ix1>, n: usize, rng: &mut R)
  -> Vec<usize>
  where S: Data<Elem = f64>,
        R: Rng + ?Sized,
{
  let n_f = n as f64;
  let copies = weights.mapv(|w| (w * n_f).floor());
  let mut idx: Vec<usize> = copies.iter()
    .enumerate()
    .flat_map(|(i, &c)| ::std::iter::repeat(i).take(c as usize))
    .collect();
  idx.truncate(n);

  let rest = n - idx.len();
  if rest > 0 {
    let mut leftover = weights.mapv(|w| w * n_f) - &copies;
    let total = leftover.sum();
    if total > 0.0 {
      leftover /= total;
      idx.extend(multinomial(&cumsum(&leftover), rest, rng));
    } else {
      idx.extend(multinomial(&cumsum(weights), rest, rng));
    }
    idx.sort();
  }
  idx
}

/// For each point (in increasing order), the first index whose cumulative
/// weight exceeds it.
fn invert_cdf<I>(cdf: &Array1<f64>, points: I) -> Vec<usize>
  where I: Iterator<Item = f64>,
{
  let last = cdf.len() - 1;
  let mut j = 0;
  points
    .map(|u| {
      while j < last && cdf[j] <= u {
        j += 1;
      }
      j
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::arr1;
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;

  fn counts(idx: &[usize], n: usize) -> Vec<usize> {
    let mut c = vec![0; n];
    for &i in idx {
      c[i] += 1;
    }
    c
  }

  #[test]
  fn systematic_is_nearly_deterministic() {
    let mut rng = Isaac64Rng::seed_from_u64(3);
    let w = arr1(&[0.5, 0.25, 0.0, 0.25]);
    let idx = resample(&w, 8, Resampling::Systematic, &mut rng);
    assert_eq!(counts(&idx, 4), vec![4, 2, 0, 2]);
  }

  #[test]
  fn residual_keeps_the_integer_parts() {
    let mut rng = Isaac64Rng::seed_from_u64(3);
    let w = arr1(&[0.55, 0.3, 0.15]);
    let idx = resample(&w, 10, Resampling::Residual, &mut rng);
    let c = counts(&idx, 3);
    assert_eq!(idx.len(), 10);
    assert!(c[0] >= 5 && c[1] >= 3 && c[2] >= 1, "{:?}", c);
  }

  #[test]
  fn multinomial_follows_the_weights() {
    let mut rng = Isaac64Rng::seed_from_u64(3);
    let w = arr1(&[0.7, 0.2, 0.1]);
    let idx = resample(&w, 10_000, Resampling::Multinomial, &mut rng);
    let c = counts(&idx, 3);
    assert!((c[0] as f64 / 1e4 - 0.7).abs() < 0.03, "{:?}", c);
    assert!((c[2] as f64 / 1e4 - 0.1).abs() < 0.02, "{:?}", c);
    assert!(idx.windows(2).all(|p| p[0] <= p[1]));
  }

  #[test]
  fn zero_weight_particles_are_never_picked() {
    let mut rng = Isaac64Rng::seed_from_u64(9);
    let w = arr1(&[0.0, 1.0, 0.0]);
    for &s in &[Resampling::Systematic, Resampling::Multinomial,
                Resampling::Residual] {
      assert_eq!(resample(&w, 5, s, &mut rng), vec![1; 5]);
    }
  }
}
