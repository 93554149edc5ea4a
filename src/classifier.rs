//! Intent Classifier
//!
//! Maps a free-text utterance to a typed [`Intent`] via the Gemini API.
//! The classifier is the only untrusted input source in the pipeline: its
//! output is decoded into a closed enum and anything that fails to decode
//! is treated as plain chat by the dispatcher.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;
use crate::gemini::GeminiClient;
use crate::models::Intent;
use crate::Result;

/// Seam between the dispatcher and the LLM, so handlers can be exercised
/// with a scripted classifier in tests.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, utterance: &str) -> Result<Intent>;
}

/// Gemini-backed classifier.
pub struct GeminiIntentClassifier {
    client: GeminiClient,
}

impl GeminiIntentClassifier {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IntentClassifier for GeminiIntentClassifier {
    async fn classify(&self, utterance: &str) -> Result<Intent> {
        let response = self.client.generate(TAXONOMY_PROMPT, utterance).await?;
        let intent = parse_intent_response(&response)?;
        debug!("Classified utterance as {:?}", intent);
        Ok(intent)
    }
}

/// Fixed taxonomy description sent as the system instruction. The model
/// must answer with a single JSON object naming one of the known actions.
const TAXONOMY_PROMPT: &str = r#"Você é o classificador de intenções de um assistente de finanças pessoais em português.

Dada a mensagem do usuário, responda APENAS com um objeto JSON (sem texto extra) no formato:
{"action": "<ação>", ...campos}

Ações e campos:
- add_expense: amount (número), category (texto curto, ex.: "Mercado"), description, bank (opcional)
- add_income: amount, bank, description (opcional)
- get_balance: bank (opcional; ausente = todas as contas)
- add_bill: amount, description (inclua o mês quando citado, ex.: "Aluguel - março"), due_day (opcional)
- list_bills: month (opcional)
- pay_bill: description, month (opcional), bank (opcional)
- get_report: period ("today" | "yesterday" | "week" | "month")
- report_category: category, period (opcional)
- top_category: period (opcional)
- list_categories
- set_goal: category, amount
- chat: qualquer outra coisa (saudações, dúvidas, conversa)

Regras:
- Valores monetários sempre como número (25.50), nunca com "R$".
- Se não tiver certeza da ação, use "chat".
- Retorne somente o JSON."#;

/// Decodes the model's reply into an [`Intent`].
///
/// Strips markdown fences the model sometimes adds, then requires a JSON
/// object whose `action` tag is one of the known variants.
pub(crate) fn parse_intent_response(response: &str) -> Result<Intent> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        EngineError::Classification(format!("classifier returned non-JSON: {}", e))
    })?;

    serde_json::from_value(json)
        .map_err(|e| EngineError::Classification(format!("unknown intent shape: {}", e)))
}
