//! Payment verification engine.
//!
//! The payment record is embedded in the order aggregate; `PaymentVerifier`
//! is the only code that moves it between states.

mod claim;
mod record;
mod status;
mod verifier;

pub use claim::{PaymentClaim, normalize_phone, normalize_transaction_code};
pub use record::{AuditOutcome, PaymentAuditEntry, PaymentRecord};
pub use status::PaymentStatus;
pub use verifier::{
    DEFAULT_MAX_ATTEMPTS, PaymentVerifier, SubmitPayment, VerificationOutcome, VerifyAction,
    VerifyPayment,
};
