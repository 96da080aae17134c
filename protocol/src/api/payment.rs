//! Payment admin API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Update transaction request
///
/// Used for PUT /payments/admin/transactions/{id}. `status` is the raw backend
/// vocabulary (`paid`, `unpaid`, `free`, `failed`), not the normalized one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 32))]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub amount_paid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}
