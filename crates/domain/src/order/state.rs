//! Order workflow status and payment state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Payment state of an order, driven by gateway notifications.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Challenge ──┬──► Paid
///           │                │
///           ├────────────────┴──► Paid
///           │
///           └──► Failure ◄── (cancel / expire from any state)
/// ```
///
/// `Challenge` is a fraud-review hold and is not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Challenge,
    Paid,
    Failure,
}

impl PaymentStatus {
    /// Returns true while the order is waiting for the customer to pay.
    pub fn is_awaiting_payment(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Value of the order's `is_paid` flag in this state. A challenged
    /// payment has been captured and counts as paid.
    pub fn counts_as_paid(&self) -> bool {
        matches!(self, PaymentStatus::Challenge | PaymentStatus::Paid)
    }

    /// Returns true if stock for the order has been handed back.
    pub fn has_released_stock(&self) -> bool {
        matches!(self, PaymentStatus::Failure)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Challenge => "challenge",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failure => "failure",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "challenge" => Ok(PaymentStatus::Challenge),
            "paid" => Ok(PaymentStatus::Paid),
            "failure" => Ok(PaymentStatus::Failure),
            other => Err(OrderError::UnknownPaymentStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a gateway status resolves to once mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentOutcome {
    /// Held for fraud review.
    Challenge,
    Paid,
    /// Cancelled or expired; stock goes back.
    Failed,
}

impl PaymentOutcome {
    /// The payment status an order lands in.
    pub fn target(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Challenge => PaymentStatus::Challenge,
            PaymentOutcome::Paid => PaymentStatus::Paid,
            PaymentOutcome::Failed => PaymentStatus::Failure,
        }
    }
}

/// Administrative fulfilment status. Set by operators; no transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "rejected" => Ok(OrderStatus::Rejected),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_payment_status_is_pending() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert!(PaymentStatus::Pending.is_awaiting_payment());
    }

    #[test]
    fn test_challenge_is_not_terminal() {
        assert!(!PaymentStatus::Challenge.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Paid.is_terminal());
        assert!(PaymentStatus::Failure.is_terminal());
    }

    #[test]
    fn test_challenge_counts_as_paid() {
        assert!(PaymentStatus::Challenge.counts_as_paid());
        assert!(PaymentStatus::Paid.counts_as_paid());
        assert!(!PaymentStatus::Pending.counts_as_paid());
        assert!(!PaymentStatus::Failure.counts_as_paid());
    }

    #[test]
    fn test_only_failure_has_released_stock() {
        assert!(PaymentStatus::Failure.has_released_stock());
        assert!(!PaymentStatus::Paid.has_released_stock());
        assert!(!PaymentStatus::Challenge.has_released_stock());
    }

    #[test]
    fn test_outcome_targets() {
        assert_eq!(PaymentOutcome::Challenge.target(), PaymentStatus::Challenge);
        assert_eq!(PaymentOutcome::Paid.target(), PaymentStatus::Paid);
        assert_eq!(PaymentOutcome::Failed.target(), PaymentStatus::Failure);
    }

    #[test]
    fn test_payment_status_string_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Challenge,
            PaymentStatus::Paid,
            PaymentStatus::Failure,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("settled".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!(
            "teleported".parse::<OrderStatus>(),
            Err(OrderError::UnknownStatus("teleported".into()))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PaymentStatus::Challenge.to_string(), "challenge");
        assert_eq!(OrderStatus::Approved.to_string(), "approved");
    }
}
