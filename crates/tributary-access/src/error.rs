use thiserror::Error;
use tributary_types::{Principal, RoleId};

/// Authorization and pause errors shared by every component entry point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Principal {principal} is missing role {role}")]
    MissingRole { role: RoleId, principal: Principal },

    #[error("Component {0} is paused")]
    Paused(String),

    #[error("Component {0} is not paused")]
    NotPaused(String),
}

pub type Result<T> = std::result::Result<T, AccessError>;
