//! User-facing reply strings
//!
//! All replies are pt-BR Markdown with amounts rendered as `R$ {:.2}`.
//! Handlers never format text inline; everything the user reads is built
//! here so wording stays in one place.

use crate::models::{AccountBalance, CategoryTotal, PendingBill, SettledBill};
use crate::periods::ReportPeriod;

pub fn money(amount: f64) -> String {
    format!("R$ {:.2}", amount)
}

/// Fixed reply for chat ids with no user record. Sent without ever
/// invoking the classifier.
pub fn not_registered() -> String {
    "Você ainda não está cadastrado. Peça ao administrador para criar o seu usuário.".to_string()
}

/// Generic greeting/help, the terminal state of the dispatch.
pub fn greeting(name: &str) -> String {
    format!(
        "Olá, {}! 👋 Sou seu assistente financeiro.\n\
         Posso registrar gastos e receitas, controlar faturas, \
         acompanhar metas por categoria e montar relatórios.\n\
         Exemplos: \"Gastei 25 no mercado\", \"Quanto gastei essa semana?\", \
         \"Pagar conta de aluguel\".",
        name
    )
}

/// Generic apology for internal failures. Never includes error details.
pub fn apology() -> String {
    "😔 Desculpe, algo deu errado ao processar sua mensagem. Tente novamente em instantes."
        .to_string()
}

/// Clarifying reply for a missing/invalid intent field.
pub fn clarify(what: &str) -> String {
    format!("🤔 Não consegui entender {}. Pode repetir com mais detalhes?", what)
}

pub fn expense_recorded(
    amount: f64,
    category: &str,
    debited_bank: Option<&str>,
    goal_note: Option<&str>,
) -> String {
    let mut text = format!("✅ Gasto registrado: {} em {}", money(amount), category);
    if let Some(bank) = debited_bank {
        text.push_str(&format!(" (debitado de {})", bank));
    }
    if let Some(note) = goal_note {
        text.push('\n');
        text.push_str(note);
    }
    text
}

/// Month-to-date budget note appended to expense confirmations.
pub fn goal_note(category: &str, goal: f64, spent: f64) -> String {
    let remaining = goal - spent;
    if remaining >= 0.0 {
        format!(
            "🎯 Meta de {}: restam {} de {} neste mês.",
            category,
            money(remaining),
            money(goal)
        )
    } else {
        format!(
            "🚨 Meta de {} estourada: {} acima do limite de {}.",
            category,
            money(-remaining),
            money(goal)
        )
    }
}

pub fn income_recorded(amount: f64, bank: &str, balance: f64) -> String {
    format!(
        "💰 Receita registrada: {} no {}. Saldo atual: {}.",
        money(amount),
        bank,
        money(balance)
    )
}

pub fn balances(accounts: &[AccountBalance]) -> String {
    if accounts.is_empty() {
        return "Não encontrei nenhuma conta. Registre uma receita para criar a primeira."
            .to_string();
    }
    let mut text = String::from("🏦 **Saldos:**");
    for account in accounts {
        text.push_str(&format!("\n• {}: {}", account.bank_name, money(account.balance)));
    }
    text
}

pub fn bill_added(description: &str, amount: f64, due_day: Option<i32>) -> String {
    let mut text = format!("🧾 Fatura registrada: {} ({})", description, money(amount));
    if let Some(day) = due_day {
        text.push_str(&format!(", vencimento dia {}", day));
    }
    text
}

pub fn pending_bills(month: &str, bills: &[PendingBill]) -> String {
    if bills.is_empty() {
        return format!("🙌 Não encontrei faturas pendentes para {}.", month);
    }
    let mut text = format!("⏳ **Faturas pendentes ({}):**", month);
    for bill in bills {
        text.push_str(&format!("\n• {}: {}", bill.description, money(bill.amount)));
        if let Some(day) = bill.due_day {
            text.push_str(&format!(" (dia {})", day));
        }
    }
    text
}

pub fn bill_paid(settled: &SettledBill) -> String {
    let mut text = format!(
        "✅ Fatura paga: {} ({})",
        settled.description,
        money(settled.amount)
    );
    if let Some(bank) = settled.debited_bank.as_deref() {
        text.push_str(&format!(", debitado de {}", bank));
    }
    text
}

pub fn bill_not_found(fragment: &str) -> String {
    format!("Não encontrei fatura pendente parecida com \"{}\".", fragment)
}

pub fn report_total(period: ReportPeriod, total: f64) -> String {
    format!("📊 Gastos ({}): {}", period.label(), money(total))
}

pub fn category_report(category: &str, period: ReportPeriod, total: f64) -> String {
    format!(
        "📊 Gastos em {} ({}): {}",
        category,
        period.label(),
        money(total)
    )
}

pub fn top_category(period: ReportPeriod, top: Option<&CategoryTotal>) -> String {
    match top {
        Some(entry) => format!(
            "🏆 Maior gasto ({}): {} com {}",
            period.label(),
            entry.category,
            money(entry.total)
        ),
        None => format!("Nenhum gasto registrado {}.", period.label()),
    }
}

pub fn categories(labels: &[String]) -> String {
    if labels.is_empty() {
        return "Você ainda não registrou gastos em nenhuma categoria.".to_string();
    }
    format!("🗂 Suas categorias: {}", labels.join(", "))
}

pub fn goal_set(category: &str, amount: f64) -> String {
    format!("🎯 Meta definida para {}: {} por mês.", category, money(amount))
}
