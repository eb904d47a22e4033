pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("vault transport error: {0}")]
  Transport(#[from] reqwest::Error),

  /// The vault answered with a status the operation cannot absorb.
  #[error("vault returned {status} for {path:?}")]
  Status {
    status: reqwest::StatusCode,
    path:   String,
  },

  #[error("vault configuration error: {0}")]
  Config(String),
}
