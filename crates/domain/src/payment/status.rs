use serde::{Deserialize, Serialize};

/// Verification status of a payment claim.
///
/// ```text
/// Awaiting ──► Confirmed
///    │ ▲
///    ▼ │ (resubmission)
/// Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Awaiting,
    Confirmed,
    Rejected,
}

impl PaymentStatus {
    /// Only a claim under review can be confirmed or rejected.
    pub fn can_verify(&self) -> bool {
        matches!(self, PaymentStatus::Awaiting)
    }

    /// A new claim may replace a rejected one.
    pub fn accepts_resubmission(&self) -> bool {
        matches!(self, PaymentStatus::Rejected)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Awaiting => "awaiting",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
