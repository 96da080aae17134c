//! Payments dashboard
//!
//! Raw transaction rows use several naming schemes; [`normalize_transaction`]
//! maps them onto [`Transaction`]. Where the stats come from is a
//! [`PaymentSource`] chosen by [`DataSourceMode`]: live, fixture, or live
//! with the fixture standing in for unreachable or malformed responses.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

use branchdesk_protocol::api::UpdateTransactionRequest;
use branchdesk_protocol::common::{
    DataOrigin, PaymentStats, RecordId, StatsSummary, Transaction, TransactionStatus,
};

use crate::client::{ApiClient, ApiRequest};
use crate::config::DataSourceMode;
use crate::envelope::{self, RawRow};
use crate::error::{DeskError, Result};
use crate::fixtures;
use crate::listing::Searchable;
use crate::record::{parse_int_lenient, RawRecord};

pub const TRANSACTIONS_PATH: &str = "/payments/transaction";
pub const ADMIN_TRANSACTIONS_PATH: &str = "/payments/admin/transactions";

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_str(value: Option<&Value>, expected: &str) -> bool {
    matches!(value, Some(Value::String(s)) if s == expected)
}

/// Status mapping: `paid`/`free` (or `payment_status = paid`) are completed,
/// `unpaid` is pending, any other truthy raw status passes through, and a
/// missing or falsy one is pending.
pub fn transaction_status(row: &RawRow) -> TransactionStatus {
    let status = row.get("status");
    if is_str(status, "paid") || is_str(row.get("payment_status"), "paid") || is_str(status, "free") {
        return TransactionStatus::Completed;
    }
    if is_str(status, "unpaid") {
        return TransactionStatus::Pending;
    }

    match status {
        Some(Value::String(s)) if !s.is_empty() => TransactionStatus::from_wire(s),
        Some(Value::Number(n)) if n.as_f64().map_or(false, |f| f != 0.0) => {
            TransactionStatus::from_wire(&n.to_string())
        }
        Some(Value::Bool(true)) => TransactionStatus::from_wire("true"),
        Some(other @ (Value::Array(_) | Value::Object(_))) => {
            TransactionStatus::from_wire(&other.to_string())
        }
        _ => TransactionStatus::Pending,
    }
}

/// First non-null of `amount_paid`, `amount`, `price`, `course_price`,
/// parsed like `parseInt`, with anything unparseable as 0
pub fn transaction_amount(row: &RawRow) -> i64 {
    RawRecord::new(row)
        .first(&["amount_paid", "amount", "price", "course_price"])
        .map(parse_int_lenient)
        .unwrap_or(0)
}

pub fn normalize_transaction(row: &RawRow) -> Transaction {
    let raw = RawRecord::new(row);
    let text_or = |keys: &[&str], default: &str| {
        raw.first(keys)
            .map(as_text)
            .unwrap_or_else(|| default.to_string())
    };

    Transaction {
        id: raw
            .id(&["id", "_id", "transaction_id"])
            .unwrap_or_else(|| RecordId::new("")),
        user_name: text_or(&["student_name", "user_name"], "Unknown"),
        user_email: text_or(&["student_email", "user_email", "email"], ""),
        course_title: text_or(&["course_title", "course_name"], "N/A"),
        amount: transaction_amount(row),
        status: transaction_status(row),
        created_at: raw.timestamp(&["created_at", "payment_date"]),
    }
}

/// Headline numbers for a set of normalized transactions
pub fn summarize(transactions: &[Transaction]) -> StatsSummary {
    let count = |status: TransactionStatus| {
        transactions.iter().filter(|t| t.status == status).count() as u64
    };
    let completed = count(TransactionStatus::Completed);
    let total_revenue: i64 = transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Completed)
        .fold(0i64, |sum, t| sum.saturating_add(t.amount));

    StatsSummary {
        total_transactions: transactions.len() as u64,
        total_revenue,
        completed_transactions: completed,
        pending_transactions: count(TransactionStatus::Pending),
        failed_transactions: count(TransactionStatus::Failed),
        average_transaction_value: if completed == 0 {
            0
        } else {
            total_revenue / completed as i64
        },
    }
}

/// Shape check for the transaction listing: `success` must be `true` and
/// `transactions` must be a list
pub fn live_transactions(body: Value) -> Result<Vec<RawRow>> {
    let mut map = match body {
        Value::Object(map) => map,
        other => {
            return Err(DeskError::invalid_response(format!(
                "transactions response is a {} instead of an object",
                envelope::json_kind(&other)
            )))
        }
    };

    if !matches!(map.get("success"), Some(Value::Bool(true))) {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("success flag missing");
        return Err(DeskError::invalid_response(format!(
            "transactions request was not successful: {}",
            message
        )));
    }

    match map.remove("transactions") {
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()),
        _ => Err(DeskError::invalid_response(
            "transactions response has no transactions list",
        )),
    }
}

impl Searchable for Transaction {
    fn search_text(&self) -> Vec<&str> {
        vec![
            self.id.as_str(),
            self.user_name.as_str(),
            self.user_email.as_str(),
            self.course_title.as_str(),
            self.status.as_str(),
        ]
    }
}

/// Where payment stats come from
#[async_trait]
pub trait PaymentSource: Send + Sync {
    async fn payment_stats(&self) -> Result<PaymentStats>;
}

pub struct LivePayments<C: ApiClient> {
    client: Arc<C>,
}

impl<C: ApiClient> LivePayments<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: ApiClient> PaymentSource for LivePayments<C> {
    async fn payment_stats(&self) -> Result<PaymentStats> {
        let body = self.client.send(ApiRequest::get(TRANSACTIONS_PATH)).await?;
        let transactions: Vec<Transaction> = live_transactions(body)?
            .iter()
            .map(normalize_transaction)
            .collect();

        Ok(PaymentStats {
            stats: summarize(&transactions),
            transactions,
            origin: DataOrigin::Live,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixturePayments;

#[async_trait]
impl PaymentSource for FixturePayments {
    async fn payment_stats(&self) -> Result<PaymentStats> {
        Ok(fixtures::payment_stats())
    }
}

pub struct PaymentService<C: ApiClient> {
    client: Arc<C>,
    live: LivePayments<C>,
    fixture: FixturePayments,
    mode: DataSourceMode,
}

impl<C: ApiClient> PaymentService<C> {
    pub fn new(client: Arc<C>, mode: DataSourceMode) -> Self {
        Self {
            live: LivePayments::new(Arc::clone(&client)),
            client,
            fixture: FixturePayments,
            mode,
        }
    }

    pub fn mode(&self) -> DataSourceMode {
        self.mode
    }

    pub async fn get_payment_stats(&self) -> Result<PaymentStats> {
        match self.mode {
            DataSourceMode::Live => self.live.payment_stats().await,
            DataSourceMode::Fixture => self.fixture.payment_stats().await,
            DataSourceMode::Fallback => match self.live.payment_stats().await {
                Ok(stats) => Ok(stats),
                Err(e) if e.is_fallback_eligible() => {
                    tracing::warn!("Payment stats unavailable, showing fixture data: {}", e);
                    self.fixture.payment_stats().await
                }
                Err(e) => Err(e),
            },
        }
    }

    pub async fn get_transaction(&self, id: &RecordId) -> Result<Transaction> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Transaction ID is required"));
        }

        if self.mode == DataSourceMode::Fixture {
            return fixtures::payment_stats()
                .transactions
                .into_iter()
                .find(|t| &t.id == id)
                .ok_or_else(|| DeskError::not_found(format!("transaction {}", id)));
        }

        let path = format!("{}/{}", ADMIN_TRANSACTIONS_PATH, id);
        let body = self.client.send(ApiRequest::get(path)).await?;
        let row = envelope::single(body, "transaction")?;
        Ok(normalize_transaction(&row))
    }

    /// Writes always go to the backend, whatever the data source mode
    pub async fn update_transaction(
        &self,
        id: &RecordId,
        request: &UpdateTransactionRequest,
    ) -> Result<Option<Transaction>> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Transaction ID is required"));
        }
        if request.status.is_none() && request.amount_paid.is_none() && request.remarks.is_none() {
            return Err(DeskError::validation("Nothing to update"));
        }
        request.validate()?;

        let path = format!("{}/{}", ADMIN_TRANSACTIONS_PATH, id);
        let body = self.client.send(ApiRequest::put(path).json(request)?).await?;
        tracing::info!("Updated transaction {}", id);

        Ok(envelope::single(body, "transaction")
            .ok()
            .filter(|row| row.contains_key("id") || row.contains_key("_id"))
            .map(|row| normalize_transaction(&row)))
    }
}
