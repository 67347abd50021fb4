use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  #[error("expected a square matrix, got {0}x{1}")]
  NotSquare(usize, usize),
  #[error("shape mismatch: {0:?} vs {1:?}")]
  Shape((usize, usize), (usize, usize)),
  #[error("matrix is not positive definite")]
  NotPositiveDefinite,
  #[error("matrix has a negative eigenvalue ({0})")]
  NotPositiveSemiDefinite(f64),
  #[error("symmetric eigendecomposition did not converge")]
  NoConvergence,
}
