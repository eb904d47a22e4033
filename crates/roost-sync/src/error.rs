pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Vault(#[from] roost_vault::Error),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Box a backend-specific store error. The sync layer is generic over the
  /// store, so its error type is erased here.
  pub fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Error::Store(Box::new(err))
  }
}
