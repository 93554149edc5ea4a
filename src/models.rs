//! Core data models for the ledger assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

//
// ================= Intents =================
//

/// Closed set of actions the classifier may request.
///
/// Decoded from the classifier's JSON object by its `action` tag. Anything
/// that fails to decode — unknown tag, malformed JSON, wrong field shapes —
/// degrades to [`Intent::Chat`] upstream; the tag is never routed as a raw
/// string. Fields are optional at this layer: each handler validates what it
/// actually requires and answers with a clarifying reply when something is
/// missing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    AddExpense {
        #[serde(default, deserialize_with = "lenient_amount")]
        amount: Option<f64>,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        bank: Option<String>,
    },
    AddIncome {
        #[serde(default, deserialize_with = "lenient_amount")]
        amount: Option<f64>,
        #[serde(default)]
        bank: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    GetBalance {
        #[serde(default)]
        bank: Option<String>,
    },
    AddBill {
        #[serde(default, deserialize_with = "lenient_amount")]
        amount: Option<f64>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        due_day: Option<i32>,
    },
    ListBills {
        #[serde(default)]
        month: Option<String>,
    },
    PayBill {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        month: Option<String>,
        #[serde(default)]
        bank: Option<String>,
    },
    GetReport {
        #[serde(default)]
        period: Option<String>,
    },
    ReportCategory {
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        period: Option<String>,
    },
    TopCategory {
        #[serde(default)]
        period: Option<String>,
    },
    ListCategories,
    SetGoal {
        #[serde(default)]
        category: Option<String>,
        #[serde(default, deserialize_with = "lenient_amount")]
        amount: Option<f64>,
    },
    Chat {
        #[serde(default)]
        message: Option<String>,
    },
}

impl Intent {
    /// Fallback intent used whenever classification fails.
    pub fn chat_fallback() -> Self {
        Intent::Chat { message: None }
    }
}

/// Accepts amounts as JSON numbers or numeric strings ("25", "25.50",
/// "R$ 25,50"). LLM output is not reliable about types.
fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Null,
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(Some(value)),
        Raw::Text(text) => Ok(parse_amount_text(&text)),
        Raw::Null => Ok(None),
    }
}

fn parse_amount_text(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    // Brazilian inputs use a decimal comma, optionally with dot thousands
    // separators; the rightmost separator wins as the decimal mark.
    let normalized = match (digits.rfind('.'), digits.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (None, Some(_)) => digits.replace(',', "."),
        _ => digits.replace(',', ""),
    };
    normalized.parse().ok()
}

//
// ================= Ledger records =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub telegram_chat_id: i64,
}

/// A realized expense to be recorded in the transaction log.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: f64,
    pub category: String,
    pub description: String,
    /// Free-text bank fragment; when present the matching account is
    /// debited in the same unit of work as the insert.
    pub bank: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Outcome of recording an expense.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseReceipt {
    /// Bank actually debited, when one matched the requested fragment.
    pub debited_bank: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalance {
    pub bank_name: String,
    pub balance: f64,
}

/// A scheduled bill still awaiting payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBill {
    pub description: String,
    pub amount: f64,
    pub due_day: Option<i32>,
}

/// Result of settling a bill: the bill left the pending state and, when a
/// bank matched, its account was debited in the same unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledBill {
    pub description: String,
    pub amount: f64,
    pub debited_bank: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}
