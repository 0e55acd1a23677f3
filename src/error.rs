use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Battery configuration or state violates its invariants.
    #[error("invalid battery configuration: {0}")]
    Configuration(String),

    /// Price series cannot be used for per-day grouping.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("profile error: {0}")]
    Profile(String),
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;
