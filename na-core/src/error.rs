use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error(transparent)]
  Factorize(#[from] nla::Error),
  #[error("{what}: expected dimension {expected}, found {found}")]
  Dimension {
    what: &'static str,
    expected: usize,
    found: usize,
  },
  #[error("covariance is not symmetric")]
  Asymmetric,
  #[error("{0} contains non-finite entries")]
  NonFinite(&'static str),
  #[error("negative variance {0}")]
  NegativeVariance(f64),
}
