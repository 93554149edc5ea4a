//! In-memory ledger store for development and tests
//!
//! Mirrors the Postgres backend's semantics (matching policy included) so
//! dispatcher behavior can be exercised without a database. Not durable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::matching;
use crate::models::{
    AccountBalance, CategoryTotal, ExpenseReceipt, NewExpense, PendingBill, SettledBill, User,
};
use crate::store::LedgerStore;
use crate::Result;

#[derive(Debug, Clone)]
struct StoredTransaction {
    user_id: i64,
    amount: f64,
    category: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredBill {
    user_id: i64,
    amount: f64,
    description: String,
    due_day: Option<i32>,
    is_active: bool,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    transactions: Vec<StoredTransaction>,
    bills: Vec<StoredBill>,
    /// (user_id, bank_name) → balance; BTreeMap keeps listing order stable.
    accounts: BTreeMap<(i64, String), f64>,
    /// (user_id, lowercase category) → monthly ceiling.
    goals: HashMap<(i64, String), f64>,
}

impl Inner {
    fn debit_matching_account(&mut self, user_id: i64, bank: &str, amount: f64) -> Option<String> {
        let key = self
            .accounts
            .keys()
            .find(|(owner, name)| *owner == user_id && matching::contains(name, bank))
            .cloned()?;
        if let Some(balance) = self.accounts.get_mut(&key) {
            *balance -= amount;
        }
        Some(key.1)
    }
}

pub struct MemoryLedgerStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Registers a user. Identity records are created out-of-band in
    /// production; this is the development-time equivalent.
    pub async fn add_user(&self, name: &str, chat_id: i64) -> User {
        let mut inner = self.inner.write().await;
        let user = User {
            id: inner.users.len() as i64 + 1,
            name: name.to_string(),
            telegram_chat_id: chat_id,
        };
        inner.users.push(user.clone());
        user
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn user_by_chat(&self, chat_id: i64) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .find(|user| user.telegram_chat_id == chat_id)
            .cloned())
    }

    async fn record_expense(&self, user_id: i64, expense: &NewExpense) -> Result<ExpenseReceipt> {
        let mut inner = self.inner.write().await;
        inner.transactions.push(StoredTransaction {
            user_id,
            amount: expense.amount,
            category: expense.category.clone(),
            date: expense.occurred_at,
        });

        let debited_bank = expense
            .bank
            .as_deref()
            .and_then(|bank| inner.debit_matching_account(user_id, bank, expense.amount));

        Ok(ExpenseReceipt { debited_bank })
    }

    async fn deposit(&self, user_id: i64, bank: &str, amount: f64) -> Result<f64> {
        let mut inner = self.inner.write().await;
        let balance = inner
            .accounts
            .entry((user_id, bank.to_string()))
            .or_insert(0.0);
        *balance += amount;
        Ok(*balance)
    }

    async fn balances(&self, user_id: i64, bank: Option<&str>) -> Result<Vec<AccountBalance>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .iter()
            .filter(|((owner, name), _)| {
                *owner == user_id
                    && bank.map_or(true, |fragment| matching::contains(name, fragment))
            })
            .map(|((_, name), balance)| AccountBalance {
                bank_name: name.clone(),
                balance: *balance,
            })
            .collect())
    }

    async fn add_bill(
        &self,
        user_id: i64,
        amount: f64,
        description: &str,
        due_day: Option<i32>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.bills.push(StoredBill {
            user_id,
            amount,
            description: description.to_string(),
            due_day,
            is_active: true,
        });
        Ok(())
    }

    async fn pending_bills(&self, user_id: i64, month: &str) -> Result<Vec<PendingBill>> {
        let inner = self.inner.read().await;
        Ok(inner
            .bills
            .iter()
            .filter(|bill| {
                bill.user_id == user_id
                    && bill.is_active
                    && matching::contains(&bill.description, month)
            })
            .map(|bill| PendingBill {
                description: bill.description.clone(),
                amount: bill.amount,
                due_day: bill.due_day,
            })
            .collect())
    }

    async fn settle_bill(
        &self,
        user_id: i64,
        description: &str,
        month: Option<&str>,
        bank: Option<&str>,
    ) -> Result<Option<SettledBill>> {
        let mut inner = self.inner.write().await;

        let position = inner.bills.iter().position(|bill| {
            bill.user_id == user_id
                && bill.is_active
                && matching::contains(&bill.description, description)
                && month.map_or(true, |m| matching::contains(&bill.description, m))
        });

        let Some(position) = position else {
            return Ok(None);
        };

        inner.bills[position].is_active = false;
        let bill_description = inner.bills[position].description.clone();
        let amount = inner.bills[position].amount;

        let debited_bank =
            bank.and_then(|bank| inner.debit_matching_account(user_id, bank, amount));

        Ok(Some(SettledBill {
            description: bill_description,
            amount,
            debited_bank,
        }))
    }

    async fn spent_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.date >= from && t.date < to)
            .map(|t| t.amount)
            .sum())
    }

    async fn category_spend_between(
        &self,
        user_id: i64,
        category: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && t.date >= from
                    && t.date < to
                    && t.category.eq_ignore_ascii_case(category)
            })
            .map(|t| t.amount)
            .sum())
    }

    async fn top_category_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<CategoryTotal>> {
        let inner = self.inner.read().await;
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for t in inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.date >= from && t.date < to)
        {
            *totals.entry(t.category.as_str()).or_insert(0.0) += t.amount;
        }
        Ok(totals
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(category, total)| CategoryTotal {
                category: category.to_string(),
                total,
            }))
    }

    async fn categories(&self, user_id: i64) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut labels: Vec<String> = inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.category.clone())
            .collect();
        labels.sort();
        labels.dedup();
        Ok(labels)
    }

    async fn set_goal(&self, user_id: i64, category: &str, amount: f64) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .goals
            .insert((user_id, category.to_lowercase()), amount);
        Ok(())
    }

    async fn goal_for(&self, user_id: i64, category: &str) -> Result<Option<f64>> {
        let inner = self.inner.read().await;
        Ok(inner.goals.get(&(user_id, category.to_lowercase())).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_deposit_accumulates() {
        let store = MemoryLedgerStore::new();
        let user = store.add_user("Ana", 555).await;

        for _ in 0..3 {
            store.deposit(user.id, "Itaú", 100.0).await.unwrap();
        }

        let balances = store.balances(user.id, None).await.unwrap();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].balance, 300.0);
    }

    #[tokio::test]
    async fn test_settle_bill_is_not_idempotent() {
        let store = MemoryLedgerStore::new();
        let user = store.add_user("Ana", 555).await;
        store
            .add_bill(user.id, 1200.0, "Aluguel - março", None)
            .await
            .unwrap();

        let first = store
            .settle_bill(user.id, "aluguel", Some("março"), None)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .settle_bill(user.id, "aluguel", Some("março"), None)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_pending_bills_hide_paid() {
        let store = MemoryLedgerStore::new();
        let user = store.add_user("Ana", 555).await;
        store
            .add_bill(user.id, 1200.0, "Aluguel - março", Some(5))
            .await
            .unwrap();
        store
            .add_bill(user.id, 90.0, "Internet - março", None)
            .await
            .unwrap();

        store
            .settle_bill(user.id, "internet", None, None)
            .await
            .unwrap();

        let pending = store.pending_bills(user.id, "março").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].description, "Aluguel - março");
    }

    #[tokio::test]
    async fn test_expense_debits_substring_matched_account() {
        let store = MemoryLedgerStore::new();
        let user = store.add_user("Ana", 555).await;
        store.deposit(user.id, "Itaú", 500.0).await.unwrap();

        let receipt = store
            .record_expense(
                user.id,
                &NewExpense {
                    amount: 25.0,
                    category: "Mercado".to_string(),
                    description: "compras".to_string(),
                    bank: Some("itau".to_string()),
                    occurred_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        // ASCII fragment doesn't match the accented name; exact fragment does.
        assert_eq!(receipt.debited_bank, None);

        let receipt = store
            .record_expense(
                user.id,
                &NewExpense {
                    amount: 25.0,
                    category: "Mercado".to_string(),
                    description: "compras".to_string(),
                    bank: Some("Itaú".to_string()),
                    occurred_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.debited_bank.as_deref(), Some("Itaú"));

        let balances = store.balances(user.id, Some("Itaú")).await.unwrap();
        assert_eq!(balances[0].balance, 475.0);
    }

    #[tokio::test]
    async fn test_top_category_and_listing() {
        let store = MemoryLedgerStore::new();
        let user = store.add_user("Ana", 555).await;
        let now = Utc::now();

        for (category, amount) in [("Mercado", 120.0), ("Lazer", 80.0), ("Mercado", 30.0)] {
            store
                .record_expense(
                    user.id,
                    &NewExpense {
                        amount,
                        category: category.to_string(),
                        description: String::new(),
                        bank: None,
                        occurred_at: now,
                    },
                )
                .await
                .unwrap();
        }

        let top = store
            .top_category_between(
                user.id,
                now - chrono::Duration::hours(1),
                now + chrono::Duration::hours(1),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(top.category, "Mercado");
        assert_eq!(top.total, 150.0);

        assert_eq!(
            store.categories(user.id).await.unwrap(),
            vec!["Lazer".to_string(), "Mercado".to_string()]
        );
    }
}
