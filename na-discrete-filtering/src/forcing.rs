//! Stochastic forcing of ensemble members by the model's process noise.

use nd::Array2;
use rand::Rng;

use na_core::GaussRV;

/// Process noise for one step of size `dt` of `n` members: `sqrt(dt)` times
/// independent draws, one row per member. `None`, drawing nothing, when the
/// model is deterministic.
pub fn sample_forcing<R>(noise: &GaussRV, n: usize, dt: f64, rng: &mut R)
  -> Option<Array2<f64>>
  where R: Rng + ?Sized,
{
  if noise.is_zero() {
    return None;
  }
  let mut forcing = noise.sample(n, rng);
  forcing *= dt.sqrt();
  Some(forcing)
}

/// The forcings of a sequence of steps, drawn up front so that the same
/// realisation can be replayed.
#[derive(Debug, Clone)]
pub struct ForcingSequence {
  steps: Vec<Option<Array2<f64>>>,
}

impl ForcingSequence {
  pub fn sample<R>(noise: &GaussRV, n: usize, dt: f64, steps: usize,
                   rng: &mut R) -> ForcingSequence
    where R: Rng + ?Sized,
  {
    ForcingSequence {
      steps: (0..steps).map(|_| sample_forcing(noise, n, dt, rng)).collect(),
    }
  }

  pub fn len(&self) -> usize { self.steps.len() }
  pub fn is_empty(&self) -> bool { self.steps.is_empty() }

  pub fn get(&self, i: usize) -> Option<&Array2<f64>> {
    self.steps.get(i).and_then(|f| f.as_ref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{RngCore, SeedableRng};
  use rand_isaac::Isaac64Rng;

  #[test]
  fn deterministic_models_draw_nothing() {
    let mut a = Isaac64Rng::seed_from_u64(1);
    let mut b = a.clone();
    assert!(sample_forcing(&GaussRV::zero(3), 5, 0.1, &mut a).is_none());
    assert_eq!(a.next_u64(), b.next_u64());
  }

  #[test]
  fn replayed_sequences_are_identical() {
    let noise = GaussRV::isotropic(2, 1.0).unwrap();
    let mut rng = Isaac64Rng::seed_from_u64(4);
    let seq = ForcingSequence::sample(&noise, 3, 0.25, 4, &mut rng);
    assert_eq!(seq.len(), 4);
    let first = seq.get(0).unwrap().clone();
    assert_eq!(seq.get(0).unwrap(), &first);
    assert_eq!(first.dim(), (3, 2));
    assert!(seq.get(4).is_none());
  }
}
