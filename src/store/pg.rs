//! Postgres ledger store
//!
//! One pooled connection per request, released on every exit path by pool
//! semantics. Balance decrements are single-statement updates; the
//! read-deactivate-debit sequence of bill settlement runs inside one
//! transaction with the bill row locked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::EngineError;
use crate::matching;
use crate::models::{
    AccountBalance, CategoryTotal, ExpenseReceipt, NewExpense, PendingBill, SettledBill, User,
};
use crate::store::LedgerStore;
use crate::Result;

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| EngineError::Database(format!("failed to connect: {}", e)))?;
        info!("Ledger store backend: postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap, run once at boot.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
              id BIGSERIAL PRIMARY KEY,
              name TEXT NOT NULL,
              telegram_chat_id BIGINT NOT NULL UNIQUE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
              id BIGSERIAL PRIMARY KEY,
              user_id BIGINT NOT NULL REFERENCES users(id),
              amount DOUBLE PRECISION NOT NULL,
              category TEXT NOT NULL,
              description TEXT NOT NULL DEFAULT '',
              date TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_user_date
            ON transactions (user_id, date);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scheduled_expenses (
              id BIGSERIAL PRIMARY KEY,
              user_id BIGINT NOT NULL REFERENCES users(id),
              amount DOUBLE PRECISION NOT NULL,
              description TEXT NOT NULL,
              due_day INTEGER,
              is_active BOOLEAN NOT NULL DEFAULT TRUE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
              user_id BIGINT NOT NULL REFERENCES users(id),
              bank_name TEXT NOT NULL,
              balance DOUBLE PRECISION NOT NULL DEFAULT 0,
              PRIMARY KEY (user_id, bank_name)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS category_goals (
              user_id BIGINT NOT NULL REFERENCES users(id),
              category TEXT NOT NULL,
              goal_amount DOUBLE PRECISION NOT NULL,
              PRIMARY KEY (user_id, category)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn user_by_chat(&self, chat_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, telegram_chat_id FROM users WHERE telegram_chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(User {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                telegram_chat_id: row.try_get("telegram_chat_id")?,
            }),
            None => None,
        })
    }

    async fn record_expense(&self, user_id: i64, expense: &NewExpense) -> Result<ExpenseReceipt> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (user_id, amount, category, description, date)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.occurred_at)
        .execute(&mut *tx)
        .await?;

        let debited_bank = match expense.bank.as_deref() {
            Some(bank) => {
                // Single account, single statement: the subquery pins one
                // matching row, the outer update decrements it atomically.
                let row = sqlx::query(
                    r#"
                    UPDATE accounts SET balance = balance - $3
                    WHERE user_id = $1
                      AND bank_name = (
                        SELECT bank_name FROM accounts
                        WHERE user_id = $1 AND bank_name ILIKE $2
                        ORDER BY bank_name LIMIT 1
                      )
                    RETURNING bank_name
                    "#,
                )
                .bind(user_id)
                .bind(matching::sql_pattern(bank))
                .bind(expense.amount)
                .fetch_optional(&mut *tx)
                .await?;

                match row {
                    Some(row) => Some(row.try_get("bank_name")?),
                    None => None,
                }
            }
            None => None,
        };

        tx.commit().await?;

        Ok(ExpenseReceipt { debited_bank })
    }

    async fn deposit(&self, user_id: i64, bank: &str, amount: f64) -> Result<f64> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (user_id, bank_name, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, bank_name)
            DO UPDATE SET balance = accounts.balance + EXCLUDED.balance
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(bank)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("balance")?)
    }

    async fn balances(&self, user_id: i64, bank: Option<&str>) -> Result<Vec<AccountBalance>> {
        let rows = sqlx::query(
            r#"
            SELECT bank_name, balance FROM accounts
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR bank_name ILIKE $2)
            ORDER BY bank_name
            "#,
        )
        .bind(user_id)
        .bind(bank.map(matching::sql_pattern))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(AccountBalance {
                    bank_name: row.try_get("bank_name")?,
                    balance: row.try_get("balance")?,
                })
            })
            .collect()
    }

    async fn add_bill(
        &self,
        user_id: i64,
        amount: f64,
        description: &str,
        due_day: Option<i32>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_expenses (user_id, amount, description, due_day, is_active)
            VALUES ($1, $2, $3, $4, TRUE)
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(description)
        .bind(due_day)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_bills(&self, user_id: i64, month: &str) -> Result<Vec<PendingBill>> {
        let rows = sqlx::query(
            r#"
            SELECT description, amount, due_day FROM scheduled_expenses
            WHERE user_id = $1 AND is_active AND description ILIKE $2
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .bind(matching::sql_pattern(month))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PendingBill {
                    description: row.try_get("description")?,
                    amount: row.try_get("amount")?,
                    due_day: row.try_get("due_day")?,
                })
            })
            .collect()
    }

    async fn settle_bill(
        &self,
        user_id: i64,
        description: &str,
        month: Option<&str>,
        bank: Option<&str>,
    ) -> Result<Option<SettledBill>> {
        let mut tx = self.pool.begin().await?;

        // Lock the candidate row so a concurrent settlement of the same
        // bill waits here and then finds it already inactive.
        let bill = sqlx::query(
            r#"
            SELECT id, description, amount FROM scheduled_expenses
            WHERE user_id = $1 AND is_active
              AND description ILIKE $2
              AND ($3::TEXT IS NULL OR description ILIKE $3)
            ORDER BY id LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(matching::sql_pattern(description))
        .bind(month.map(matching::sql_pattern))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(bill) = bill else {
            tx.rollback().await?;
            return Ok(None);
        };

        let bill_id: i64 = bill.try_get("id")?;
        let bill_description: String = bill.try_get("description")?;
        let amount: f64 = bill.try_get("amount")?;

        sqlx::query("UPDATE scheduled_expenses SET is_active = FALSE WHERE id = $1")
            .bind(bill_id)
            .execute(&mut *tx)
            .await?;

        let debited_bank = match bank {
            Some(bank) => {
                let row = sqlx::query(
                    r#"
                    UPDATE accounts SET balance = balance - $3
                    WHERE user_id = $1
                      AND bank_name = (
                        SELECT bank_name FROM accounts
                        WHERE user_id = $1 AND bank_name ILIKE $2
                        ORDER BY bank_name LIMIT 1
                      )
                    RETURNING bank_name
                    "#,
                )
                .bind(user_id)
                .bind(matching::sql_pattern(bank))
                .bind(amount)
                .fetch_optional(&mut *tx)
                .await?;

                match row {
                    Some(row) => Some(row.try_get("bank_name")?),
                    None => None,
                }
            }
            None => None,
        };

        tx.commit().await?;

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
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total FROM transactions
            WHERE user_id = $1 AND date >= $2 AND date < $3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("total")?)
    }

    async fn category_spend_between(
        &self,
        user_id: i64,
        category: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total FROM transactions
            WHERE user_id = $1 AND LOWER(category) = LOWER($2)
              AND date >= $3 AND date < $4
            "#,
        )
        .bind(user_id)
        .bind(category)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("total")?)
    }

    async fn top_category_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<CategoryTotal>> {
        let row = sqlx::query(
            r#"
            SELECT category, SUM(amount) AS total FROM transactions
            WHERE user_id = $1 AND date >= $2 AND date < $3
            GROUP BY category
            ORDER BY total DESC, category
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(CategoryTotal {
                category: row.try_get("category")?,
                total: row.try_get("total")?,
            }),
            None => None,
        })
    }

    async fn categories(&self, user_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT category FROM transactions WHERE user_id = $1 ORDER BY category",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(row.try_get("category")?))
            .collect()
    }

    async fn set_goal(&self, user_id: i64, category: &str, amount: f64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO category_goals (user_id, category, goal_amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, category)
            DO UPDATE SET goal_amount = EXCLUDED.goal_amount
            "#,
        )
        .bind(user_id)
        .bind(category)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn goal_for(&self, user_id: i64, category: &str) -> Result<Option<f64>> {
        let row = sqlx::query(
            r#"
            SELECT goal_amount FROM category_goals
            WHERE user_id = $1 AND LOWER(category) = LOWER($2)
            "#,
        )
        .bind(user_id)
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("goal_amount")?),
            None => None,
        })
    }
}
