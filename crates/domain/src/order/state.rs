//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The fulfillment status of an order.
///
/// ```text
/// Pending ──► Processing ──┬──► Completed
///    │            │        └──► Delivered
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed at checkout, waiting for a confirmed payment.
    #[default]
    Pending,

    /// Payment confirmed and stock committed.
    Processing,

    /// Collected by the customer (terminal state).
    Completed,

    /// Handed over at the delivery address (terminal state).
    Delivered,

    /// Terminal state.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if `next` is a legal edge from this status.
    ///
    /// Same-status moves are never legal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }

    /// Payments may only be submitted or confirmed while pending.
    pub fn accepts_payment(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Delivered | OrderStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn only_the_legal_edges_are_allowed() {
        let legal = [
            (OrderStatus::Pending, OrderStatus::Processing),
            (OrderStatus::Processing, OrderStatus::Completed),
            (OrderStatus::Processing, OrderStatus::Delivered),
            (OrderStatus::Pending, OrderStatus::Cancelled),
            (OrderStatus::Processing, OrderStatus::Cancelled),
        ];

        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(OrderStatus::is_terminal) {
            assert!(ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
        let parsed: OrderStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(parsed, OrderStatus::Processing);
    }

    #[test]
    fn parses_from_str() {
        assert_eq!("Cancelled".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
