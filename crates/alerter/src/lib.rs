//! # Quorum Alerter
//!
//! Best-effort delivery of execution outcomes to account owners. The executor
//! hands every record to a `NotificationSink` from a spawned task and never
//! waits for, or fails because of, the delivery.

use async_trait::async_trait;
use configuration::TelegramConfig;
use core_types::{ExecutionOutcome, ExecutionRecord, Side};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;
pub mod error;

pub use error::AlerterError;

/// Receives execution outcomes for the account that owns them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, account_id: Uuid, record: &ExecutionRecord) -> Result<(), AlerterError>;
}

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str, // To allow for formatting like bold, italics etc.
}

/// A client for sending messages to the Telegram Bot API.
///
/// Executions go to the chat registered for their account, or to the operator
/// chat when the account has none.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
    account_chats: HashMap<Uuid, String>,
}

impl TelegramNotifier {
    /// Creates a new `TelegramNotifier`.
    ///
    /// Returns `None` if the token or chat_id is missing from the configuration,
    /// allowing the system to gracefully fall back to log-only notifications.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram notifier is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
            account_chats: HashMap::new(),
        })
    }

    /// Routes each account's executions to its own chat.
    pub fn with_account_chats(mut self, chats: HashMap<Uuid, String>) -> Self {
        self.account_chats = chats;
        self
    }

    /// The chat that receives `account_id`'s notifications.
    pub fn chat_for(&self, account_id: Uuid) -> &str {
        self.account_chats
            .get(&account_id)
            .map(String::as_str)
            .unwrap_or(&self.chat_id)
    }

    /// Sends a text message to the operator chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        self.send_to(&self.chat_id, message).await
    }

    async fn send_to(&self, chat_id: &str, message: &str) -> Result<(), AlerterError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);

        let payload = SendMessagePayload {
            chat_id,
            text: message,
            parse_mode: "MarkdownV2", // Use Markdown for rich formatting
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::Rejected { status: status.as_u16(), body });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify(&self, account_id: Uuid, record: &ExecutionRecord) -> Result<(), AlerterError> {
        self.send_to(self.chat_for(account_id), &format_execution(account_id, record))
            .await
    }
}

/// Writes every notification to the log. Used when Telegram is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, account_id: Uuid, record: &ExecutionRecord) -> Result<(), AlerterError> {
        tracing::info!(
            account_id = %account_id,
            signal_id = %record.signal_id,
            outcome = record.outcome.as_str(),
            side = %record.side,
            symbol = %record.symbol,
            size = %record.filled_size,
            price = %record.fill_price,
            balance = %record.balance_after,
            "Execution notification"
        );
        Ok(())
    }
}

/// Renders an execution record as a MarkdownV2 message.
pub fn format_execution(account_id: Uuid, record: &ExecutionRecord) -> String {
    let side = record.side.to_string().to_uppercase();
    match record.outcome {
        ExecutionOutcome::Filled => {
            let icon = if record.side == Side::Buy { "📈" } else { "📉" };
            format!(
                "{} *{} {}* `@{}`\n`{:.8}` units, fee `{:.8}`\nbalance `{}`",
                icon,
                side,
                escape_markdown(&record.symbol),
                record.fill_price,
                record.filled_size,
                record.fee,
                record.balance_after
            )
        }
        ExecutionOutcome::Rejected | ExecutionOutcome::Error => {
            let title = if record.outcome == ExecutionOutcome::Error { "⚠️ ERROR" } else { "⛔ REJECTED" };
            format!(
                "*{}* {} {} for account `{}`: {}",
                title,
                side,
                escape_markdown(&record.symbol),
                account_id,
                escape_markdown(record.reason.as_deref().unwrap_or("no reason given"))
            )
        }
    }
}

/// A helper function to escape characters that have special meaning in Telegram's MarkdownV2.
pub fn escape_markdown(text: &str) -> String {
    let special_chars = r"_*[]()~`>#+-=|{}.!";
    special_chars
        .chars()
        .fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn record(outcome: ExecutionOutcome, reason: Option<&str>) -> ExecutionRecord {
        ExecutionRecord {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            signal_id: Uuid::new_v4(),
            symbol: "BTC_USDT".to_string(),
            side: Side::Buy,
            requested_size: dec!(0.04),
            filled_size: if outcome == ExecutionOutcome::Filled { dec!(0.04) } else { Decimal::ZERO },
            fill_price: dec!(50000),
            fee: dec!(2),
            balance_before: dec!(10000),
            balance_after: dec!(7998),
            outcome,
            reason: reason.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn markdown_special_characters_are_escaped() {
        assert_eq!(escape_markdown("a_b.c!"), r"a\_b\.c\!");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn fills_render_side_symbol_and_size() {
        let text = format_execution(Uuid::new_v4(), &record(ExecutionOutcome::Filled, None));
        assert!(text.starts_with("📈 *BUY BTC\\_USDT*"));
        assert!(text.contains("`0.04000000` units"));
    }

    #[test]
    fn rejections_carry_their_reason() {
        let account = Uuid::new_v4();
        let text = format_execution(
            account,
            &record(ExecutionOutcome::Rejected, Some("signal is stale")),
        );
        assert!(text.starts_with("*⛔ REJECTED*"));
        assert!(text.contains(&account.to_string()));
        assert!(text.ends_with("signal is stale"));
    }

    #[test]
    fn unconfigured_telegram_is_disabled() {
        assert!(TelegramNotifier::new(&TelegramConfig::default()).is_none());
    }

    #[test]
    fn executions_go_to_the_accounts_own_chat() {
        let config = TelegramConfig { token: "bot-token".to_string(), chat_id: "operator".to_string() };
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let telegram = TelegramNotifier::new(&config)
            .unwrap()
            .with_account_chats(HashMap::from([(alice, "alice-chat".to_string())]));

        assert_eq!(telegram.chat_for(alice), "alice-chat");
        assert_eq!(telegram.chat_for(bob), "operator");
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let sink = LogNotifier;
        let r = record(ExecutionOutcome::Error, Some("lock timeout"));
        assert!(sink.notify(r.account_id, &r).await.is_ok());
    }
}
