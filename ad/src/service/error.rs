//! Service lifecycle errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("service already started")]
    AlreadyStarted,

    #[error("service not started")]
    NotStarted,
}
