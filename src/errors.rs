//! Error types for the resource pool

use thiserror::Error;

/// Boxed error carried by caller-supplied factories and destructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("invalid pool configuration: {parameter} {message}")]
    InvalidConfiguration {
        parameter: &'static str,
        message: String,
    },

    #[error("resource factory failed")]
    Factory(#[source] BoxError),
}

impl PoolError {
    pub(crate) fn bad_config(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            parameter,
            message: message.into(),
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
