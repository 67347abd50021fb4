//! Experiment plumbing around the assimilation engine: synthetic data,
//! the model/observer/chronology bundle of an experiment, progress bars.

extern crate log;
extern crate na_core;
extern crate na_discrete_filtering as na_df;
extern crate ndarray as nd;
extern crate pbr;
extern crate rand;
extern crate rayon;

use log::info;
use rand::Rng;

use na_core::{Model, Observer};
use na_df::{Chronology, Config, Driver, Result, RunOutput};

use crate::data::Data;
use crate::progress::ReportingIterator;

pub mod data;
pub mod progress;

/// A twin experiment: the dynamics `f`, the observation operator `h` and
/// the time grid `t`.
#[derive(Clone, Debug)]
pub struct Setup<M, O> {
  pub f: M,
  pub h: O,
  pub t: Chronology,
}

impl<M, O> Setup<M, O>
  where M: Model,
        O: Observer,
{
  /// Truth and observations for this setup.
  pub fn simulate<R>(&self, rng: &mut R) -> Result<Data>
    where R: Rng + ?Sized,
  {
    info!("simulating truth over {} steps", self.t.k());
    data::generate_truth_and_observations(&self.f, &self.h, &self.t, rng)
  }

  /// Runs the method of `config` over `data`.
  pub fn assimilate<R>(&self, config: &Config, data: &Data, rng: R,
                       show_progress: bool)
    -> Result<RunOutput>
    where R: Rng,
  {
    let mut driver = Driver::new(&self.f, &self.h, &self.t, config,
                                 data.truth.view(), data.observations.view(),
                                 rng)?;
    let name = format!("{}", driver.analyzer().method());
    for _ in ReportingIterator::new(0..self.t.k(), name.into(), show_progress) {
      driver.step()?;
    }
    driver.finish()
  }
}
