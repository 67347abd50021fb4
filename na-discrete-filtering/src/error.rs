use thiserror::Error;

use crate::config::{Field, Method};

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] na_core::Error),
  #[error(transparent)]
  Factorize(#[from] nla::Error),

  #[error("unknown assimilation method `{0}`")]
  UnknownMethod(String),
  #[error("{method} requires `{field}`")]
  MissingParameter {
    method: Method,
    field: Field,
  },
  #[error("invalid `{field}`: {reason}")]
  InvalidParameter {
    field: Field,
    reason: String,
  },
  #[error("invalid chronology: {0}")]
  Chronology(&'static str),

  #[error("{what}: expected dimension {expected}, found {found}")]
  Dimension {
    what: &'static str,
    expected: usize,
    found: usize,
  },
  #[error("{0} contains non-finite entries")]
  NonFinite(&'static str),
  #[error("{0} needs the true state")]
  MissingTruth(Method),
  #[error("{0} needs the state at the start of the window")]
  MissingWindow(Method),
  #[error("{0} needs the climatology of the truth")]
  MissingClimatology(Method),
  #[error("{method} cannot operate on a {found} state")]
  Representation {
    method: Method,
    found: &'static str,
  },

  #[error("cannot propagate a {0} state this way")]
  Propagation(&'static str),

  #[error("the run is already done")]
  Finished,
  #[error("the run has not finished yet")]
  Unfinished,
}
