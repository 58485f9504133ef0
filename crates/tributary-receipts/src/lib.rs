pub mod error;
pub mod typed_data;
pub mod verifier;

pub use error::{ReceiptError, Result};
pub use typed_data::{
    principal_from_verifying_key, recover_signer, sign_receipt, TypedDomain, UsageReceipt,
};
pub use verifier::ReceiptVerifier;
