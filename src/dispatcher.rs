//! Intent Dispatcher
//!
//! The core of the engine: one inbound utterance becomes zero or more
//! ledger mutations and exactly one reply string. All failure modes are
//! absorbed here — an unregistered user gets the fixed reply without a
//! classifier call, classification failures degrade to chat, validation
//! failures ask for clarification, and store failures are logged and
//! answered with a generic apology. Raw error text never reaches the user.

use chrono::{FixedOffset, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::classifier::IntentClassifier;
use crate::error::EngineError;
use crate::models::{Intent, NewExpense, User};
use crate::periods::{self, ReportPeriod};
use crate::reply;
use crate::store::LedgerStore;
use crate::Result;

pub struct IntentDispatcher {
    store: Arc<dyn LedgerStore>,
    classifier: Arc<dyn IntentClassifier>,
    local_offset: FixedOffset,
}

impl IntentDispatcher {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        classifier: Arc<dyn IntentClassifier>,
        local_offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            classifier,
            local_offset,
        }
    }

    /// Turns one inbound message into the reply to send back. Infallible:
    /// every error becomes a user-appropriate reply.
    pub async fn handle(&self, chat_id: i64, utterance: &str) -> String {
        let user = match self.store.user_by_chat(chat_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                info!("Ignoring message from unregistered chat {}", chat_id);
                return reply::not_registered();
            }
            Err(e) => {
                error!("Identity lookup failed for chat {}: {}", chat_id, e);
                return reply::apology();
            }
        };

        let intent = match self.classifier.classify(utterance).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Classification failed, degrading to chat: {}", e);
                Intent::chat_fallback()
            }
        };

        match self.dispatch(&user, intent).await {
            Ok(text) => text,
            Err(EngineError::Validation(what)) => reply::clarify(&what),
            Err(e) => {
                error!("Handler failed for user {}: {}", user.id, e);
                reply::apology()
            }
        }
    }

    async fn dispatch(&self, user: &User, intent: Intent) -> Result<String> {
        match intent {
            Intent::AddExpense {
                amount,
                category,
                description,
                bank,
            } => self.add_expense(user, amount, category, description, bank).await,
            Intent::AddIncome { amount, bank, .. } => self.add_income(user, amount, bank).await,
            Intent::GetBalance { bank } => self.get_balance(user, bank).await,
            Intent::AddBill {
                amount,
                description,
                due_day,
            } => self.add_bill(user, amount, description, due_day).await,
            Intent::ListBills { month } => self.list_bills(user, month).await,
            Intent::PayBill {
                description,
                month,
                bank,
            } => self.pay_bill(user, description, month, bank).await,
            Intent::GetReport { period } => self.report(user, period).await,
            Intent::ReportCategory { category, period } => {
                self.report_category(user, category, period).await
            }
            Intent::TopCategory { period } => self.top_category(user, period).await,
            Intent::ListCategories => self.list_categories(user).await,
            Intent::SetGoal { category, amount } => self.set_goal(user, category, amount).await,
            Intent::Chat { .. } => Ok(reply::greeting(&user.name)),
        }
    }

    async fn add_expense(
        &self,
        user: &User,
        amount: Option<f64>,
        category: Option<String>,
        description: Option<String>,
        bank: Option<String>,
    ) -> Result<String> {
        let amount = require_amount(amount)?;
        let category = require_text(category, "a categoria do gasto")?;
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| category.clone());

        let receipt = self
            .store
            .record_expense(
                user.id,
                &NewExpense {
                    amount,
                    category: category.clone(),
                    description,
                    bank,
                    occurred_at: Utc::now(),
                },
            )
            .await?;

        let goal_note = match self.store.goal_for(user.id, &category).await? {
            Some(goal) => {
                let (from, to) = ReportPeriod::Month.window(Utc::now(), self.local_offset);
                let spent = self
                    .store
                    .category_spend_between(user.id, &category, from, to)
                    .await?;
                Some(reply::goal_note(&category, goal, spent))
            }
            None => None,
        };

        Ok(reply::expense_recorded(
            amount,
            &category,
            receipt.debited_bank.as_deref(),
            goal_note.as_deref(),
        ))
    }

    async fn add_income(
        &self,
        user: &User,
        amount: Option<f64>,
        bank: Option<String>,
    ) -> Result<String> {
        let amount = require_amount(amount)?;
        let bank = require_text(bank, "o banco da receita")?;

        let balance = self.store.deposit(user.id, &bank, amount).await?;
        Ok(reply::income_recorded(amount, &bank, balance))
    }

    async fn get_balance(&self, user: &User, bank: Option<String>) -> Result<String> {
        let accounts = self.store.balances(user.id, bank.as_deref()).await?;
        Ok(reply::balances(&accounts))
    }

    async fn add_bill(
        &self,
        user: &User,
        amount: Option<f64>,
        description: Option<String>,
        due_day: Option<i32>,
    ) -> Result<String> {
        let amount = require_amount(amount)?;
        let description = require_text(description, "a descrição da fatura")?;

        self.store
            .add_bill(user.id, amount, &description, due_day)
            .await?;
        Ok(reply::bill_added(&description, amount, due_day))
    }

    async fn list_bills(&self, user: &User, month: Option<String>) -> Result<String> {
        let month = month
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                periods::current_month_name(Utc::now(), self.local_offset).to_string()
            });

        let bills = self.store.pending_bills(user.id, &month).await?;
        Ok(reply::pending_bills(&month, &bills))
    }

    async fn pay_bill(
        &self,
        user: &User,
        description: Option<String>,
        month: Option<String>,
        bank: Option<String>,
    ) -> Result<String> {
        let description = require_text(description, "qual fatura pagar")?;

        let settled = self
            .store
            .settle_bill(user.id, &description, month.as_deref(), bank.as_deref())
            .await?;

        Ok(match settled {
            Some(settled) => reply::bill_paid(&settled),
            None => reply::bill_not_found(&description),
        })
    }

    async fn report(&self, user: &User, period: Option<String>) -> Result<String> {
        let period = ReportPeriod::parse(period.as_deref());
        let (from, to) = period.window(Utc::now(), self.local_offset);
        let total = self.store.spent_between(user.id, from, to).await?;
        Ok(reply::report_total(period, total))
    }

    async fn report_category(
        &self,
        user: &User,
        category: Option<String>,
        period: Option<String>,
    ) -> Result<String> {
        let category = require_text(category, "a categoria do relatório")?;
        let period = ReportPeriod::parse(period.as_deref());
        let (from, to) = period.window(Utc::now(), self.local_offset);
        let total = self
            .store
            .category_spend_between(user.id, &category, from, to)
            .await?;
        Ok(reply::category_report(&category, period, total))
    }

    async fn top_category(&self, user: &User, period: Option<String>) -> Result<String> {
        let period = ReportPeriod::parse(period.as_deref());
        let (from, to) = period.window(Utc::now(), self.local_offset);
        let top = self.store.top_category_between(user.id, from, to).await?;
        Ok(reply::top_category(period, top.as_ref()))
    }

    async fn list_categories(&self, user: &User) -> Result<String> {
        let labels = self.store.categories(user.id).await?;
        Ok(reply::categories(&labels))
    }

    async fn set_goal(
        &self,
        user: &User,
        category: Option<String>,
        amount: Option<f64>,
    ) -> Result<String> {
        let category = require_text(category, "a categoria da meta")?;
        let amount = require_amount(amount)?;

        self.store.set_goal(user.id, &category, amount).await?;
        Ok(reply::goal_set(&category, amount))
    }
}

fn require_amount(amount: Option<f64>) -> Result<f64> {
    match amount {
        Some(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(EngineError::Validation("o valor".to_string())),
    }
}

fn require_text(value: Option<String>, what: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EngineError::Validation(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use async_trait::async_trait;

    /// Scripted classifier: returns a fixed outcome per call, no LLM.
    struct ScriptedClassifier {
        outcome: std::sync::Mutex<Vec<Result<Intent>>>,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedClassifier {
        fn returning(intent: Intent) -> Self {
            Self {
                outcome: std::sync::Mutex::new(vec![Ok(intent)]),
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                outcome: std::sync::Mutex::new(vec![Err(EngineError::Classification(
                    "classifier returned non-JSON: not json".to_string(),
                ))]),
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IntentClassifier for ScriptedClassifier {
        async fn classify(&self, _utterance: &str) -> Result<Intent> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut outcomes = self.outcome.lock().expect("lock poisoned");
            match outcomes.pop() {
                Some(outcome) => outcome,
                None => Ok(Intent::chat_fallback()),
            }
        }
    }

    fn offset() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).expect("valid offset")
    }

    async fn dispatcher_with(
        intent_outcome: ScriptedClassifier,
    ) -> (IntentDispatcher, Arc<MemoryLedgerStore>, User) {
        let store = Arc::new(MemoryLedgerStore::new());
        let user = store.add_user("Ana", 555).await;
        let dispatcher = IntentDispatcher::new(
            store.clone(),
            Arc::new(intent_outcome),
            offset(),
        );
        (dispatcher, store, user)
    }

    #[tokio::test]
    async fn test_unregistered_chat_never_reaches_classifier() {
        let store = Arc::new(MemoryLedgerStore::new());
        let classifier = Arc::new(ScriptedClassifier::returning(Intent::chat_fallback()));
        let dispatcher = IntentDispatcher::new(store, classifier.clone(), offset());

        let first = dispatcher.handle(999, "Gastei 25 no mercado").await;
        let second = dispatcher.handle(999, "oi").await;

        assert_eq!(first, reply::not_registered());
        assert_eq!(second, first);
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_classification_failure_degrades_to_greeting() {
        let (dispatcher, _store, _user) = dispatcher_with(ScriptedClassifier::failing()).await;

        let text = dispatcher.handle(555, "%%% garbage %%%").await;
        assert!(text.contains("Ana"));
        assert!(text.contains("assistente financeiro"));
    }

    #[tokio::test]
    async fn test_expense_scenario_mercado() {
        let (dispatcher, store, user) = dispatcher_with(ScriptedClassifier::returning(
            Intent::AddExpense {
                amount: Some(25.0),
                category: Some("Mercado".to_string()),
                description: Some("mercado".to_string()),
                bank: None,
            },
        ))
        .await;

        let text = dispatcher.handle(555, "Gastei 25 no mercado").await;
        assert!(text.contains("25.00"));
        assert!(text.contains("Mercado"));

        let (from, to) = ReportPeriod::Today.window(Utc::now(), offset());
        let recorded = store
            .category_spend_between(user.id, "mercado", from, to)
            .await
            .unwrap();
        assert_eq!(recorded, 25.0);
    }

    #[tokio::test]
    async fn test_expense_debits_named_bank_and_notes_goal() {
        let store = Arc::new(MemoryLedgerStore::new());
        let user = store.add_user("Ana", 555).await;
        store.deposit(user.id, "Itaú", 500.0).await.unwrap();
        store.set_goal(user.id, "Mercado", 200.0).await.unwrap();

        let dispatcher = IntentDispatcher::new(
            store.clone(),
            Arc::new(ScriptedClassifier::returning(Intent::AddExpense {
                amount: Some(25.0),
                category: Some("Mercado".to_string()),
                description: None,
                bank: Some("Itaú".to_string()),
            })),
            offset(),
        );

        let text = dispatcher.handle(555, "Gastei 25 no mercado com o Itaú").await;
        assert!(text.contains("debitado de Itaú"));
        assert!(text.contains("restam R$ 175.00"));

        let balances = store.balances(user.id, None).await.unwrap();
        assert_eq!(balances[0].balance, 475.0);
    }

    #[tokio::test]
    async fn test_income_accumulates_and_balance_reflects() {
        let store = Arc::new(MemoryLedgerStore::new());
        store.add_user("Ana", 555).await;

        for _ in 0..3 {
            let dispatcher = IntentDispatcher::new(
                store.clone(),
                Arc::new(ScriptedClassifier::returning(Intent::AddIncome {
                    amount: Some(100.0),
                    bank: Some("Nubank".to_string()),
                    description: None,
                })),
                offset(),
            );
            let text = dispatcher.handle(555, "Recebi 100 no Nubank").await;
            assert!(text.contains("100.00"));
        }

        let dispatcher = IntentDispatcher::new(
            store.clone(),
            Arc::new(ScriptedClassifier::returning(Intent::GetBalance {
                bank: Some("Nubank".to_string()),
            })),
            offset(),
        );
        let text = dispatcher.handle(555, "saldo do nubank").await;
        assert!(text.contains("Nubank: R$ 300.00"));
    }

    #[tokio::test]
    async fn test_pay_bill_scenario_and_non_idempotence() {
        let store = Arc::new(MemoryLedgerStore::new());
        let user = store.add_user("Ana", 555).await;
        store.deposit(user.id, "Itaú", 2000.0).await.unwrap();
        store
            .add_bill(user.id, 1200.0, "Aluguel - março", Some(5))
            .await
            .unwrap();

        let pay_intent = Intent::PayBill {
            description: Some("aluguel".to_string()),
            month: Some("março".to_string()),
            bank: Some("Itaú".to_string()),
        };

        let dispatcher = IntentDispatcher::new(
            store.clone(),
            Arc::new(ScriptedClassifier::returning(pay_intent.clone())),
            offset(),
        );
        let text = dispatcher
            .handle(555, "Pagar conta de aluguel de março com o Itaú")
            .await;
        assert!(text.contains("Fatura paga"));
        assert!(text.contains("1200.00"));
        assert!(text.contains("Itaú"));

        let balances = store.balances(user.id, None).await.unwrap();
        assert_eq!(balances[0].balance, 800.0);

        // Second settlement finds nothing and debits nothing.
        let dispatcher = IntentDispatcher::new(
            store.clone(),
            Arc::new(ScriptedClassifier::returning(pay_intent)),
            offset(),
        );
        let text = dispatcher.handle(555, "Pagar aluguel de novo").await;
        assert!(text.contains("Não encontrei fatura pendente"));
        let balances = store.balances(user.id, None).await.unwrap();
        assert_eq!(balances[0].balance, 800.0);

        // And it no longer shows up as pending.
        let pending = store.pending_bills(user.id, "março").await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_week_report_renders_zero() {
        let (dispatcher, _store, _user) = dispatcher_with(ScriptedClassifier::returning(
            Intent::GetReport {
                period: Some("week".to_string()),
            },
        ))
        .await;

        let text = dispatcher.handle(555, "Quanto gastei essa semana?").await;
        assert!(text.contains("0.00"));
        assert!(text.contains("essa semana"));
    }

    #[tokio::test]
    async fn test_missing_amount_asks_for_clarification() {
        let (dispatcher, _store, _user) = dispatcher_with(ScriptedClassifier::returning(
            Intent::AddExpense {
                amount: None,
                category: Some("Mercado".to_string()),
                description: None,
                bank: None,
            },
        ))
        .await;

        let text = dispatcher.handle(555, "gastei no mercado").await;
        assert!(text.contains("o valor"));
        assert!(!text.contains("algo deu errado"));
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let (dispatcher, store, user) = dispatcher_with(ScriptedClassifier::returning(
            Intent::AddExpense {
                amount: Some(-10.0),
                category: Some("Mercado".to_string()),
                description: None,
                bank: None,
            },
        ))
        .await;

        let text = dispatcher.handle(555, "gastei -10").await;
        assert!(text.contains("o valor"));
        let (from, to) = ReportPeriod::Month.window(Utc::now(), offset());
        assert_eq!(store.spent_between(user.id, from, to).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_set_goal_then_list_categories() {
        let store = Arc::new(MemoryLedgerStore::new());
        store.add_user("Ana", 555).await;

        let dispatcher = IntentDispatcher::new(
            store.clone(),
            Arc::new(ScriptedClassifier::returning(Intent::SetGoal {
                category: Some("Lazer".to_string()),
                amount: Some(300.0),
            })),
            offset(),
        );
        let text = dispatcher.handle(555, "meta de 300 para lazer").await;
        assert!(text.contains("Lazer"));
        assert!(text.contains("300.00"));

        let dispatcher = IntentDispatcher::new(
            store.clone(),
            Arc::new(ScriptedClassifier::returning(Intent::ListCategories)),
            offset(),
        );
        let text = dispatcher.handle(555, "minhas categorias").await;
        assert!(text.contains("nenhuma categoria"));
    }
}
