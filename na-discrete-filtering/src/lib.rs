//! Sequential data assimilation: an engine that alternately forecasts a
//! state estimate through a dynamical model and corrects it against noisy
//! observations, with a closed set of analysis methods (ensemble Kalman
//! filters, a particle filter, the extended Kalman filter, 3D-Var and two
//! reference baselines).
//!
//! A run is a [`Driver`] over a [`Chronology`], configured by a [`Config`].

extern crate argmin;
extern crate log;
extern crate na_core;
extern crate ndarray as nd;
extern crate ndarray_rand as nd_rand;
extern crate nla_factorize as nla;
extern crate rand;
extern crate rand_distr;
extern crate serde;
extern crate thiserror;

pub use analysis::{AnalysisContext, AnalysisReport, Analyzer, StepNote};
pub use chronology::{Chronology, Step};
pub use config::{AMethod, Config, Field, Method, Resampling};
pub use driver::{Driver, Phase, RunOutput};
pub use ensemble::Ensemble;
pub use error::{Error, Result};
pub use state::{Estimate, Moments, State};
pub use stats::{MeanConf, Statistics, Summary};

pub mod analysis;
pub mod baseline;
pub mod chronology;
pub mod config;
pub mod driver;
pub mod ensemble;
pub mod error;
pub mod forcing;
pub mod forecast;
pub mod kalman;
pub mod particle;
pub mod state;
pub mod stats;
pub mod utils;
