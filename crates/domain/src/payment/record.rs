use chrono::{DateTime, Utc};
use common::{AggregateId, Money, StaffId};
use serde::{Deserialize, Serialize};

use crate::order::{PaymentConfirmedData, PaymentRejectedData, PaymentSubmittedData};

use super::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Confirmed,
    Rejected,
}

/// One verification outcome. Entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuditEntry {
    pub outcome: AuditOutcome,
    pub amount: Money,
    pub transaction_code: String,
    pub verified_by: StaffId,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// The payment claim of an order and its verification state.
///
/// `order_id` is a lookup reference only; the record lives inside the
/// order's stream and is rebuilt from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub order_id: AggregateId,
    pub amount: Money,
    pub phone: String,
    pub transaction_code: String,
    pub status: PaymentStatus,
    pub submitted_at: DateTime<Utc>,
    pub submission_count: u32,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<StaffId>,
    pub rejection_reason: Option<String>,
    pub audit_trail: Vec<PaymentAuditEntry>,
}

impl PaymentRecord {
    pub(crate) fn submitted(order_id: AggregateId, data: PaymentSubmittedData) -> Self {
        Self {
            order_id,
            amount: data.amount,
            phone: data.phone,
            transaction_code: data.transaction_code,
            status: PaymentStatus::Awaiting,
            submitted_at: data.submitted_at,
            submission_count: 1,
            verified_at: None,
            verified_by: None,
            rejection_reason: None,
            audit_trail: Vec::new(),
        }
    }

    /// Replaces a rejected claim. The audit trail carries over.
    pub(crate) fn resubmitted(&mut self, data: PaymentSubmittedData) {
        self.amount = data.amount;
        self.phone = data.phone;
        self.transaction_code = data.transaction_code;
        self.status = PaymentStatus::Awaiting;
        self.submitted_at = data.submitted_at;
        self.submission_count += 1;
        self.verified_at = None;
        self.verified_by = None;
        self.rejection_reason = None;
    }

    pub(crate) fn confirmed(&mut self, data: PaymentConfirmedData) {
        self.status = PaymentStatus::Confirmed;
        self.verified_at = Some(data.verified_at);
        self.verified_by = Some(data.verified_by.clone());
        self.audit_trail.push(PaymentAuditEntry {
            outcome: AuditOutcome::Confirmed,
            amount: self.amount,
            transaction_code: self.transaction_code.clone(),
            verified_by: data.verified_by,
            reason: None,
            at: data.verified_at,
        });
    }

    pub(crate) fn rejected(&mut self, data: PaymentRejectedData) {
        self.status = PaymentStatus::Rejected;
        self.verified_at = Some(data.rejected_at);
        self.verified_by = Some(data.verified_by.clone());
        self.rejection_reason = Some(data.reason.clone());
        self.audit_trail.push(PaymentAuditEntry {
            outcome: AuditOutcome::Rejected,
            amount: self.amount,
            transaction_code: self.transaction_code.clone(),
            verified_by: data.verified_by,
            reason: Some(data.reason),
            at: data.rejected_at,
        });
    }
}
