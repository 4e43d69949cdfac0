//! # Quorum Engine
//!
//! The orchestrator. For every scheduled symbol it periodically takes a market
//! snapshot, collects the votes of the active strategies, reduces them to at
//! most one ensemble signal, records and publishes it, and fans it out to the
//! subscribed accounts.
//!
//! ## Public API
//!
//! - `ConsensusEngine`: scheduler, one-shot `evaluate`, `get_consensus`, and
//!   `record_outcome` for performance feedback.
//! - `EngineComponents`: the collaborators the engine is wired with.
//! - `EvaluationCycle` / `CycleReport`: one evaluation of one symbol.
//! - `Ticker`: the jittered, cancellable evaluation clock.

use chrono::{DateTime, Utc};
use configuration::{Config, SchedulerSettings};
use consensus::ConsensusAggregator;
use core_types::{EnsembleSignal, ExecutionRecord, Strategy};
use database::{AccountStore, AuditRecorder, StrategyStore};
use events::SignalBus;
use executor::Executor;
use futures::future::join_all;
use market_data::{MarketConditionProvider, PriceOracle};
use risk::RiskFilter;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use strategies::{ConfidenceModel, VoteGenerator};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

pub mod cycle;
pub mod distributor;
pub mod error;
pub mod ticker;

pub use cycle::{CycleReport, EvaluationCycle};
pub use distributor::Distributor;
pub use error::EngineError;
pub use ticker::{jitter, Ticker};

/// Everything the engine talks to, as trait objects so each can be swapped.
pub struct EngineComponents {
    pub market: Arc<dyn MarketConditionProvider>,
    pub prices: Arc<dyn PriceOracle>,
    pub strategies: Arc<dyn StrategyStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub audit: Arc<dyn AuditRecorder>,
    pub confidence: Arc<dyn ConfidenceModel>,
    pub risk: Arc<dyn RiskFilter>,
    pub executor: Arc<dyn Executor>,
    pub bus: SignalBus,
}

/// The central orchestrator.
pub struct ConsensusEngine {
    cycle: EvaluationCycle,
    scheduler: SchedulerSettings,
    signal_validity: chrono::Duration,
    bus: SignalBus,
    /// Latest emitted signal per symbol.
    latest: RwLock<HashMap<String, EnsembleSignal>>,
}

impl ConsensusEngine {
    pub fn new(config: &Config, components: EngineComponents) -> Result<Self, EngineError> {
        let generator = VoteGenerator::new(components.confidence, config.voting.clone())?;
        let distributor = Distributor::new(
            components.accounts,
            components.risk,
            components.executor,
            config.execution.max_distribution_jitter(),
        );
        let cycle = EvaluationCycle {
            market: components.market,
            prices: components.prices,
            strategies: components.strategies,
            audit: components.audit,
            generator,
            aggregator: ConsensusAggregator::new(config.consensus.clone()),
            distributor,
            bus: components.bus.clone(),
        };

        Ok(Self {
            cycle,
            scheduler: config.scheduler.clone(),
            signal_validity: config.execution.signal_validity(),
            bus: components.bus,
            latest: RwLock::new(HashMap::new()),
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.scheduler.symbols
    }

    /// Runs one evaluation cycle for `symbol` immediately. Symbols are matched
    /// case-insensitively, as the configuration stores them upper-cased.
    pub async fn evaluate(&self, symbol: &str) -> Result<CycleReport, EngineError> {
        let symbol = symbol.to_uppercase();
        if !self.scheduler.symbols.contains(&symbol) {
            return Err(EngineError::UnknownSymbol(symbol));
        }
        self.cycle
            .run(&symbol, |signal| {
                let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
                latest.insert(signal.symbol.clone(), signal.clone());
            })
            .await
    }

    /// The latest signal for `symbol`, unless it has gone stale.
    pub fn get_consensus(&self, symbol: &str) -> Option<EnsembleSignal> {
        self.consensus_at(symbol, Utc::now())
    }

    fn consensus_at(&self, symbol: &str, now: DateTime<Utc>) -> Option<EnsembleSignal> {
        let latest = self.latest.read().unwrap_or_else(|e| e.into_inner());
        latest
            .get(symbol)
            .filter(|signal| !signal.is_stale(now, self.signal_validity))
            .cloned()
    }

    /// Feeds the result of one closed trade back into a strategy: its weight
    /// moves one step and its trade count grows by one. The next cycle votes
    /// with the new weight.
    pub async fn record_outcome(&self, strategy_id: Uuid, won: bool) -> Result<Strategy, EngineError> {
        let strategy = self.cycle.strategies.record_performance(strategy_id, won).await?;
        tracing::info!(
            strategy = %strategy.name,
            won,
            weight = %strategy.performance_weight,
            trades = strategy.total_trades,
            "Recorded strategy performance"
        );
        Ok(strategy)
    }

    pub fn subscribe_signals(&self, symbol: &str) -> broadcast::Receiver<EnsembleSignal> {
        self.bus.subscribe_signals(symbol)
    }

    pub fn subscribe_executions(&self, account_id: Option<Uuid>) -> broadcast::Receiver<ExecutionRecord> {
        self.bus.subscribe_executions(account_id)
    }

    /// Runs one scheduler task per symbol until `shutdown` flips to `true`
    /// (or its sender is dropped).
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Result<(), EngineError> {
        tracing::info!(
            symbols = ?self.scheduler.symbols,
            interval_secs = self.scheduler.interval_secs,
            "Engine is running"
        );

        let tasks: Vec<_> = self
            .scheduler
            .symbols
            .iter()
            .cloned()
            .map(|symbol| {
                let engine = Arc::clone(&self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { engine.run_symbol(symbol, shutdown).await })
            })
            .collect();

        for result in join_all(tasks).await {
            result??;
        }
        tracing::info!("Engine stopped");
        Ok(())
    }

    async fn run_symbol(&self, symbol: String, mut shutdown: watch::Receiver<bool>) -> Result<(), EngineError> {
        let mut ticker = Ticker::new(self.scheduler.interval(), self.scheduler.max_jitter())?;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.evaluate(&symbol).await {
                Ok(report) => tracing::debug!(
                    symbol = %symbol,
                    cycle_id = %report.cycle_id,
                    votes = report.votes.len(),
                    executions = report.executions.len(),
                    "Cycle complete"
                ),
                // Retried on the next tick.
                Err(e) => tracing::warn!(symbol = %symbol, error = %e, "Cycle aborted"),
            }
        }

        tracing::debug!(symbol = %symbol, "Scheduler task stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerter::LogNotifier;
    use configuration::load_config_from_str;
    use consensus::ConsensusError;
    use core_types::{ExecutionOutcome, Side, StrategyKind, StrategyStatus};
    use database::{InMemoryAuditLog, InMemoryStore, StrategyStore as _};
    use events::AuditEvent;
    use executor::ExecutionCoordinator;
    use market_data::StaticMarket;
    use risk::AccountRiskFilter;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use strategies::FixedConfidence;

    const CONFIG: &str = r#"
        [scheduler]
        symbols = ["BTCUSDT", "ETHUSDT"]
        interval_secs = 60
        max_jitter_ms = 0

        [execution]
        max_distribution_jitter_ms = 0

        [market.static_prices]
        BTCUSDT = 50000

        [market.static_conditions.BTCUSDT]
        volatility = "medium"
        trend = "bullish"
        volume = "high"
        sentiment = 0.4

        [[strategies]]
        name = "trend"
        kind = "trend_following"
        symbols = ["BTCUSDT", "ETHUSDT"]

        [[strategies]]
        name = "momentum"
        kind = "momentum"
        symbols = ["BTCUSDT", "ETHUSDT"]

        [[strategies]]
        name = "sentiment"
        kind = "sentiment"
        symbols = ["BTCUSDT", "ETHUSDT"]

        [[accounts]]
        name = "alice"
        balance = 10000
        max_position_value = 2000
        symbols = ["BTCUSDT"]

        [[accounts]]
        name = "bob"
        balance = 10000
        confidence_threshold = 90
        max_position_value = 2000
        symbols = ["BTCUSDT"]
    "#;

    struct Fixture {
        engine: Arc<ConsensusEngine>,
        store: Arc<InMemoryStore>,
        audit: Arc<InMemoryAuditLog>,
    }

    fn fixture(confidence: FixedConfidence) -> Fixture {
        let config = load_config_from_str(CONFIG).unwrap();
        let audit = Arc::new(InMemoryAuditLog::new());
        let store = Arc::new(InMemoryStore::from_config(&config, audit.clone()));
        let market = Arc::new(StaticMarket::from_settings(&config.market).unwrap());
        let bus = SignalBus::default();
        let executor = Arc::new(ExecutionCoordinator::new(
            store.clone(),
            store.clone(),
            audit.clone(),
            Arc::new(LogNotifier),
            bus.clone(),
            config.execution.clone(),
        ));
        let engine = ConsensusEngine::new(
            &config,
            EngineComponents {
                market: market.clone(),
                prices: market,
                strategies: store.clone(),
                accounts: store.clone(),
                audit: audit.clone(),
                confidence: Arc::new(confidence),
                risk: Arc::new(AccountRiskFilter::default()),
                executor,
                bus,
            },
        )
        .unwrap();
        Fixture {
            engine: Arc::new(engine),
            store,
            audit,
        }
    }

    fn agreeing() -> FixedConfidence {
        FixedConfidence::new()
            .with(StrategyKind::TrendFollowing, dec!(80))
            .with(StrategyKind::Momentum, dec!(70))
            .with(StrategyKind::Sentiment, dec!(10))
    }

    fn kinds(events: &[AuditEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.kind()).collect()
    }

    #[tokio::test]
    async fn cycle_emits_signal_and_fills_accepting_accounts() {
        let f = fixture(agreeing());
        let mut signals = f.engine.subscribe_signals("BTCUSDT");

        let report = f.engine.evaluate("BTCUSDT").await.unwrap();

        // Sentiment abstains at 10; the other two agree at (80 + 70) / 2.
        assert_eq!(report.votes.len(), 2);
        let signal = report.signal.clone().unwrap();
        assert_eq!(signal.side, Side::Buy);
        assert_eq!(signal.confidence, dec!(75));
        assert_eq!(signal.price, dec!(50000));
        assert_eq!(signals.recv().await.unwrap().id, signal.id);

        // Bob's bar is 90, so only Alice trades: min(1, 2000 / 50000) = 0.04.
        assert_eq!(report.executions.len(), 1);
        let record = &report.executions[0];
        assert_eq!(record.outcome, ExecutionOutcome::Filled);
        assert_eq!(record.filled_size, dec!(0.04));
        assert_eq!(record.balance_after, dec!(7998));

        assert_eq!(
            kinds(&f.audit.events().await),
            vec!["vote_cast", "vote_cast", "signal_emitted", "execution_attempted"]
        );
        assert_eq!(f.engine.get_consensus("BTCUSDT").map(|s| s.id), Some(signal.id));
    }

    #[tokio::test]
    async fn weak_consensus_emits_nothing() {
        let f = fixture(
            FixedConfidence::new()
                .with(StrategyKind::TrendFollowing, dec!(80))
                .with(StrategyKind::Momentum, dec!(-70)),
        );

        let report = f.engine.evaluate("BTCUSDT").await.unwrap();

        assert!(report.signal.is_none());
        assert!(matches!(report.rejection, Some(ConsensusError::WeakConsensus { .. })));
        assert!(report.executions.is_empty());
        assert_eq!(kinds(&f.audit.events().await), vec!["vote_cast", "vote_cast"]);
        assert!(f.engine.get_consensus("BTCUSDT").is_none());
    }

    #[tokio::test]
    async fn upstream_failure_aborts_only_that_symbol() {
        let f = fixture(agreeing());

        // No static price or conditions are configured for ETHUSDT.
        let err = f.engine.evaluate("ETHUSDT").await.unwrap_err();
        assert!(matches!(err, EngineError::MarketData(_)));

        assert!(f.engine.evaluate("BTCUSDT").await.unwrap().signal.is_some());
    }

    #[tokio::test]
    async fn paused_strategy_sits_out_the_next_cycle() {
        let f = fixture(agreeing());
        let momentum = f
            .store
            .get_active_strategies("BTCUSDT")
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.kind == StrategyKind::Momentum)
            .unwrap();
        f.store.set_status(momentum.id, StrategyStatus::Paused).await.unwrap();

        let report = f.engine.evaluate("BTCUSDT").await.unwrap();

        assert_eq!(report.votes.len(), 1);
        assert!(matches!(report.rejection, Some(ConsensusError::TooFewVoters { voters: 1, .. })));
    }

    #[tokio::test]
    async fn recorded_outcomes_change_the_next_votes_weight() {
        let f = fixture(agreeing());
        let trend = f
            .store
            .get_active_strategies("BTCUSDT")
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.kind == StrategyKind::TrendFollowing)
            .unwrap();

        f.engine.record_outcome(trend.id, true).await.unwrap();
        let updated = f.engine.record_outcome(trend.id, true).await.unwrap();
        assert_eq!(updated.performance_weight, dec!(1.10));
        assert_eq!(updated.total_trades, 2);

        let report = f.engine.evaluate("BTCUSDT").await.unwrap();
        let vote = report.votes.iter().find(|v| v.strategy_id == trend.id).unwrap();
        // 1.10 * (1 + 2 / 1000)
        assert_eq!(vote.weight, dec!(1.1022));

        assert!(matches!(
            f.engine.record_outcome(Uuid::new_v4(), false).await,
            Err(EngineError::Database(_))
        ));
    }

    #[tokio::test]
    async fn unscheduled_symbol_is_rejected() {
        let f = fixture(agreeing());
        assert!(matches!(
            f.engine.evaluate("DOGEUSDT").await,
            Err(EngineError::UnknownSymbol(_))
        ));
    }

    #[tokio::test]
    async fn lowercase_symbol_evaluates_the_scheduled_pair() {
        let f = fixture(agreeing());
        let report = f.engine.evaluate("btcusdt").await.unwrap();
        assert_eq!(report.symbol, "BTCUSDT");
        assert!(report.signal.is_some());
        assert!(f.engine.get_consensus("BTCUSDT").is_some());
    }

    #[tokio::test]
    async fn stale_consensus_is_not_served() {
        let f = fixture(agreeing());
        f.engine.evaluate("BTCUSDT").await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(31);
        assert!(f.engine.consensus_at("BTCUSDT", later).is_none());
        assert!(f.engine.consensus_at("BTCUSDT", Utc::now()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_evaluates_every_interval_until_shutdown() {
        let f = fixture(agreeing());
        let (stop, shutdown) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&f.engine).run(shutdown));

        // Ticks at 0s, 60s and 120s.
        tokio::time::sleep(Duration::from_secs(150)).await;
        stop.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let emitted = f
            .audit
            .events()
            .await
            .iter()
            .filter(|e| e.kind() == "signal_emitted")
            .count();
        assert_eq!(emitted, 3);

        let alice = f.store.accounts().await.into_iter().find(|a| a.name == "alice").unwrap();
        assert_eq!(alice.balance, dec!(10000) - dec!(3) * dec!(2002));
    }
}
