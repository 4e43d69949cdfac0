use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::init_logging;
pub use settings::{
    AccountSettings, Config, ConditionSettings, ConsensusSettings, ExecutionSettings, LoggingSettings,
    MarketSettings, MarketSource, SchedulerSettings, StorageBackend, StorageSettings,
    StrategySettings, TelegramConfig, VotingSettings,
};

/// Command-line flags shared by every binary that loads a configuration file.
#[cfg(feature = "clap")]
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(long, short = 'c', default_value = "config.toml")]
    pub config: std::path::PathBuf,
}

/// Loads the application configuration from a TOML file, layered with
/// `QUORUM__SECTION__KEY` environment variables.
///
/// The merged result is deserialized into the strongly-typed `Config` and
/// validated before it is returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix("QUORUM")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let mut config = builder.try_deserialize::<Config>()?;
    config.normalize_symbols();
    config.validate()?;

    Ok(config)
}

/// Parses a configuration from an in-memory TOML string. Used by tests and tooling.
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let mut config = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    config.normalize_symbols();
    config.validate()?;
    Ok(config)
}

fn ensure(condition: bool, message: impl Into<String>) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(message.into()))
    }
}

fn in_range(value: Decimal, low: Decimal, high: Decimal) -> bool {
    value >= low && value <= high
}

fn upper_keys<V>(map: &mut HashMap<String, V>) {
    *map = std::mem::take(map)
        .into_iter()
        .map(|(k, v)| (k.to_uppercase(), v))
        .collect();
}

fn upper_all(symbols: &mut [String]) {
    for symbol in symbols {
        *symbol = symbol.to_uppercase();
    }
}

impl Config {
    /// Symbols are compared in upper case everywhere. Map keys need this too,
    /// since the `config` crate may lowercase them.
    fn normalize_symbols(&mut self) {
        upper_all(&mut self.scheduler.symbols);
        upper_keys(&mut self.consensus.order_sizes);
        upper_keys(&mut self.market.static_prices);
        upper_keys(&mut self.market.static_conditions);
        for strategy in &mut self.strategies {
            upper_all(&mut strategy.symbols);
        }
        for account in &mut self.accounts {
            upper_all(&mut account.symbols);
        }
    }

    /// Checks that every value is in the range the engine assumes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.consensus;
        ensure(c.min_votes >= 2, "consensus.min_votes must be at least 2")?;
        ensure(
            in_range(c.min_strength, dec!(0), dec!(1)),
            "consensus.min_strength must be within 0..1",
        )?;
        ensure(
            in_range(c.max_confidence, dec!(0), dec!(100)),
            "consensus.max_confidence must be within 0..100",
        )?;
        ensure(
            c.default_order_size > Decimal::ZERO && c.order_sizes.values().all(|s| *s > Decimal::ZERO),
            "order sizes must be positive",
        )?;

        ensure(
            in_range(self.voting.min_vote_confidence, dec!(0), dec!(100)),
            "voting.min_vote_confidence must be within 0..100",
        )?;
        ensure(
            self.voting.track_record_trades > 0,
            "voting.track_record_trades must be positive",
        )?;
        ensure(
            self.voting.max_track_record_factor >= Decimal::ONE,
            "voting.max_track_record_factor must be at least 1",
        )?;

        ensure(
            in_range(self.execution.fee_pct, dec!(0), dec!(0.1)),
            "execution.fee_pct must be within 0..0.1",
        )?;
        ensure(
            self.execution.signal_validity_secs > 0,
            "execution.signal_validity_secs must be positive",
        )?;
        ensure(
            self.execution.lock_timeout_ms > 0,
            "execution.lock_timeout_ms must be positive",
        )?;

        ensure(!self.scheduler.symbols.is_empty(), "scheduler.symbols must not be empty")?;
        ensure(self.scheduler.interval_secs > 0, "scheduler.interval_secs must be positive")?;

        for (symbol, reading) in &self.market.static_conditions {
            ensure(
                in_range(reading.sentiment, dec!(-1), dec!(1)),
                format!("market.static_conditions.{symbol}.sentiment must be within -1..1"),
            )?;
        }

        let mut names = HashSet::new();
        for strategy in &self.strategies {
            ensure(
                names.insert(strategy.name.as_str()),
                format!("duplicate strategy name '{}'", strategy.name),
            )?;
            ensure(
                in_range(strategy.confidence_threshold, dec!(0), dec!(100)),
                format!("strategy '{}' confidence_threshold must be within 0..100", strategy.name),
            )?;
            ensure(
                strategy.performance_weight >= Decimal::ZERO,
                format!("strategy '{}' performance_weight must not be negative", strategy.name),
            )?;
        }

        let mut names = HashSet::new();
        for account in &self.accounts {
            ensure(
                names.insert(account.name.as_str()),
                format!("duplicate account name '{}'", account.name),
            )?;
            ensure(
                account.balance >= Decimal::ZERO,
                format!("account '{}' balance must not be negative", account.name),
            )?;
            ensure(
                account.risk_multiplier > Decimal::ZERO,
                format!("account '{}' risk_multiplier must be positive", account.name),
            )?;
            ensure(
                account.max_position_value > Decimal::ZERO,
                format!("account '{}' max_position_value must be positive", account.name),
            )?;
        }

        Ok(())
    }
}
