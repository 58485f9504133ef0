pub mod error;
pub mod pause;
pub mod roles;

pub use error::{AccessError, Result};
pub use pause::PauseFlag;
pub use roles::RolesGate;
