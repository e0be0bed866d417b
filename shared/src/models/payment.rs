//! Payment Models

use serde::{Deserialize, Serialize};

/// Payment lifecycle status
///
/// Mirrors the gateway outcome: `PENDING` while the intent is open,
/// `COMPLETED` or `FAILED` after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Payment entity, local mirror of the gateway intent (one per order)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub payment_provider: String,
    pub status: PaymentStatus,
    /// Gateway-assigned reference (payment intent id)
    pub payment_reference: String,
    /// Settlement time, epoch milliseconds (set on completion)
    pub paid_at: Option<i64>,
}

/// Direct reconciliation notification payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventRequest {
    pub payment_reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(PaymentStatus::from_db("refunded"), None);
    }

    #[test]
    fn test_settled_states() {
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(PaymentStatus::Completed.is_settled());
        assert!(PaymentStatus::Failed.is_settled());
    }
}
