//! Ledger Store
//!
//! Durable tables for identity, transactions, scheduled bills, accounts
//! and category goals. The trait is the unit of substitution: Postgres in
//! production, in-memory for development and tests.
//!
//! Multi-statement mutations (`record_expense`, `settle_bill`) are atomic
//! per call; callers never sequence partial writes themselves.

pub mod memory;
pub mod pg;

pub use memory::MemoryLedgerStore;
pub use pg::PgLedgerStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AccountBalance, CategoryTotal, ExpenseReceipt, NewExpense, PendingBill, SettledBill, User,
};
use crate::Result;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Identity lookup by chat id. `None` means "not registered".
    async fn user_by_chat(&self, chat_id: i64) -> Result<Option<User>>;

    /// Inserts a transaction and, when the expense names a bank, debits the
    /// best-matching account in the same unit of work.
    async fn record_expense(&self, user_id: i64, expense: &NewExpense) -> Result<ExpenseReceipt>;

    /// Upsert-accumulate: creates the (user, bank) account on first use,
    /// increments its balance otherwise. Returns the new balance.
    async fn deposit(&self, user_id: i64, bank: &str, amount: f64) -> Result<f64>;

    /// Accounts for the user, optionally narrowed by a bank fragment.
    async fn balances(&self, user_id: i64, bank: Option<&str>) -> Result<Vec<AccountBalance>>;

    /// Creates a pending bill.
    async fn add_bill(
        &self,
        user_id: i64,
        amount: f64,
        description: &str,
        due_day: Option<i32>,
    ) -> Result<()>;

    /// Pending bills whose description contains the month fragment.
    /// Paid bills are never returned.
    async fn pending_bills(&self, user_id: i64, month: &str) -> Result<Vec<PendingBill>>;

    /// Locates one pending bill by description fragment (optionally
    /// narrowed by month), marks it paid and debits the named account, all
    /// atomically. `None` when no pending bill matches — including bills
    /// already paid, which makes repeated settlement a no-op.
    async fn settle_bill(
        &self,
        user_id: i64,
        description: &str,
        month: Option<&str>,
        bank: Option<&str>,
    ) -> Result<Option<SettledBill>>;

    /// Total spend in the half-open window `[from, to)`.
    async fn spent_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64>;

    /// Total spend for one category (case-insensitive) in the window.
    async fn category_spend_between(
        &self,
        user_id: i64,
        category: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64>;

    /// Category with the highest spend in the window.
    async fn top_category_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<CategoryTotal>>;

    /// Distinct category labels ever used, alphabetical.
    async fn categories(&self, user_id: i64) -> Result<Vec<String>>;

    /// Upserts the monthly ceiling for a category (last write wins).
    async fn set_goal(&self, user_id: i64, category: &str, amount: f64) -> Result<()>;

    /// Monthly ceiling for a category, if one was set.
    async fn goal_for(&self, user_id: i64, category: &str) -> Result<Option<f64>>;
}
