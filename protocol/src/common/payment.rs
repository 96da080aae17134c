//! Payment dashboard structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::RecordId;

// ============================================================================
// Transaction Structures
// ============================================================================

/// Normalized transaction status.
///
/// Raw statuses the normalizer does not remap are carried through verbatim
/// in `Other` so nothing the backend says is lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
    Other(String),
}

impl TransactionStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "completed" => Self::Completed,
            "pending" => Self::Pending,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransactionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: RecordId,
    pub user_name: String,
    pub user_email: String,
    pub course_title: String,
    pub amount: i64,
    pub status: TransactionStatus,
    pub created_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Dashboard Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatsSummary {
    pub total_transactions: u64,
    pub total_revenue: i64,
    pub completed_transactions: u64,
    pub pending_transactions: u64,
    pub failed_transactions: u64,
    pub average_transaction_value: i64,
}

/// Where a dashboard payload came from. Fixture data is never mixed with
/// live rows in one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Live,
    Fixture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStats {
    pub stats: StatsSummary,
    pub transactions: Vec<Transaction>,
    pub origin: DataOrigin,
}

impl PaymentStats {
    pub fn is_fixture(&self) -> bool {
        self.origin == DataOrigin::Fixture
    }
}
