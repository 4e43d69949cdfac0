use core_types::{AccountStatus, Level, StrategyKind, StrategyStatus, Trend};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub consensus: ConsensusSettings,
    #[serde(default)]
    pub voting: VotingSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub market: MarketSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub strategies: Vec<StrategySettings>,
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
}

/// Thresholds applied when reducing votes into an ensemble signal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusSettings {
    /// Minimum number of distinct strategies that must vote.
    pub min_votes: usize,
    /// Minimum consensus strength (0..1), inclusive.
    pub min_strength: Decimal,
    /// Upper bound on the reported ensemble confidence.
    pub max_confidence: Decimal,
    /// Suggested order size (in base units) when a symbol has no entry in `order_sizes`.
    pub default_order_size: Decimal,
    pub order_sizes: HashMap<String, Decimal>,
}

impl ConsensusSettings {
    pub fn order_size_for(&self, symbol: &str) -> Decimal {
        self.order_sizes
            .get(symbol)
            .copied()
            .unwrap_or(self.default_order_size)
    }
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            min_votes: 2,
            min_strength: dec!(0.6),
            max_confidence: dec!(95),
            default_order_size: dec!(1),
            order_sizes: HashMap::new(),
        }
    }
}

/// Parameters of the per-strategy vote generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VotingSettings {
    /// Absolute confidence below which no strategy is allowed to vote.
    pub min_vote_confidence: Decimal,
    /// Number of trades that earn the full track-record bonus.
    pub track_record_trades: u64,
    /// Cap on the `1 + trades / track_record_trades` weight factor.
    pub max_track_record_factor: Decimal,
}

impl Default for VotingSettings {
    fn default() -> Self {
        Self {
            min_vote_confidence: dec!(30),
            track_record_trades: 1000,
            max_track_record_factor: dec!(2),
        }
    }
}

/// Parameters of the paper execution coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Fee charged on the notional of every fill. 0.001 corresponds to 0.1%.
    pub fee_pct: Decimal,
    /// Signals older than this are rejected as stale.
    pub signal_validity_secs: u64,
    /// Bound on waiting for an account's execution lock.
    pub lock_timeout_ms: u64,
    /// Upper bound of the random delay applied before each account's execution.
    pub max_distribution_jitter_ms: u64,
}

impl ExecutionSettings {
    pub fn signal_validity(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.signal_validity_secs as i64)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn max_distribution_jitter(&self) -> Duration {
        Duration::from_millis(self.max_distribution_jitter_ms)
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            fee_pct: dec!(0.001),
            signal_validity_secs: 30,
            lock_timeout_ms: 2_000,
            max_distribution_jitter_ms: 250,
        }
    }
}

/// Evaluation cadence. One cycle per symbol per interval.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub symbols: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_cycle_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_cycle_jitter_ms() -> u64 {
    2_000
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSource {
    /// Prices and conditions read from `static_prices` / `static_conditions`.
    Static,
    /// Public Binance REST endpoints.
    Binance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub source: MarketSource,
    pub base_url: String,
    /// Prices older than this are refreshed before use.
    pub max_price_staleness_secs: u64,
    pub kline_interval: String,
    pub kline_lookback: usize,
    pub static_prices: HashMap<String, Decimal>,
    pub static_conditions: HashMap<String, ConditionSettings>,
}

impl MarketSettings {
    pub fn max_price_staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_price_staleness_secs as i64)
    }
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            source: MarketSource::Static,
            base_url: "https://api.binance.com".to_string(),
            max_price_staleness_secs: 5,
            kline_interval: "1h".to_string(),
            kline_lookback: 48,
            static_prices: HashMap::new(),
            static_conditions: HashMap::new(),
        }
    }
}

/// A fixed market reading for one symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionSettings {
    pub volatility: Level,
    pub trend: Trend,
    pub volume: Level,
    pub sentiment: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    /// The operator chat: startup messages and any account without its own chat.
    pub chat_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// JSON-lines audit file used with the in-memory backend.
    pub audit_log_path: PathBuf,
    pub max_connections: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            audit_log_path: PathBuf::from("audit.jsonl"),
            max_connections: 10,
        }
    }
}

/// Operator definition of one strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySettings {
    pub id: Option<Uuid>,
    pub name: String,
    pub kind: StrategyKind,
    pub symbols: Vec<String>,
    #[serde(default = "default_strategy_status")]
    pub status: StrategyStatus,
    #[serde(default = "default_strategy_threshold")]
    pub confidence_threshold: Decimal,
    #[serde(default = "default_one")]
    pub performance_weight: Decimal,
    #[serde(default)]
    pub total_trades: u64,
}

/// Operator definition of one paper-trading account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSettings {
    pub id: Option<Uuid>,
    pub name: String,
    pub balance: Decimal,
    #[serde(default = "default_one")]
    pub risk_multiplier: Decimal,
    #[serde(default = "default_account_threshold")]
    pub confidence_threshold: Decimal,
    pub max_position_value: Decimal,
    pub symbols: Vec<String>,
    #[serde(default = "default_account_status")]
    pub status: AccountStatus,
    /// Telegram chat for this account's executions. Unset routes them to the operator chat.
    #[serde(default)]
    pub telegram_chat: Option<String>,
}

fn default_strategy_status() -> StrategyStatus {
    StrategyStatus::Active
}

fn default_account_status() -> AccountStatus {
    AccountStatus::Active
}

fn default_strategy_threshold() -> Decimal {
    dec!(30)
}

fn default_account_threshold() -> Decimal {
    dec!(60)
}

fn default_one() -> Decimal {
    Decimal::ONE
}
