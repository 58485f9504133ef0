pub mod error;
pub mod escrow;
pub mod treasury;

pub use error::{EscrowError, Result};
pub use escrow::{Escrow, EscrowStats, EscrowedPayment, PaymentStatus};
pub use treasury::FeeTreasury;
