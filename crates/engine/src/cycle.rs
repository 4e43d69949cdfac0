use crate::distributor::Distributor;
use crate::error::EngineError;
use chrono::Utc;
use consensus::{ConsensusAggregator, ConsensusError};
use core_types::{EnsembleSignal, ExecutionRecord, Vote};
use database::{AuditRecorder, StrategyStore};
use events::{AuditEvent, SignalBus, SignalEmitted, VoteCast};
use futures::future::join_all;
use market_data::{MarketConditionProvider, PriceOracle};
use std::sync::Arc;
use strategies::VoteGenerator;
use uuid::Uuid;

/// What one evaluation of one symbol produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub symbol: String,
    pub votes: Vec<Vote>,
    pub signal: Option<EnsembleSignal>,
    /// Why no signal was emitted, when none was.
    pub rejection: Option<ConsensusError>,
    pub executions: Vec<ExecutionRecord>,
}

/// One pass of snapshot, vote, aggregate, record, publish and distribute for a symbol.
pub struct EvaluationCycle {
    pub(crate) market: Arc<dyn MarketConditionProvider>,
    pub(crate) prices: Arc<dyn PriceOracle>,
    pub(crate) strategies: Arc<dyn StrategyStore>,
    pub(crate) audit: Arc<dyn AuditRecorder>,
    pub(crate) generator: VoteGenerator,
    pub(crate) aggregator: ConsensusAggregator,
    pub(crate) distributor: Distributor,
    pub(crate) bus: SignalBus,
}

impl EvaluationCycle {
    /// Runs the cycle. `on_signal` is invoked after the signal is recorded and
    /// published, before it is distributed to accounts.
    ///
    /// Market-data and storage failures abort the cycle for this symbol only.
    /// A vote set without sufficient consensus is not an error: the report
    /// carries the reason and no signal.
    pub async fn run(
        &self,
        symbol: &str,
        on_signal: impl FnOnce(&EnsembleSignal),
    ) -> Result<CycleReport, EngineError> {
        let cycle_id = Uuid::new_v4();

        let (conditions, price) = tokio::join!(self.market.snapshot(symbol), self.prices.get_price(symbol));
        let conditions = conditions?;
        let price = price?;

        // Strategies are snapshotted once: pausing one mid-cycle takes effect next cycle.
        let strategies = self.strategies.get_active_strategies(symbol).await?;
        let snapshot = &conditions;
        let votes: Vec<Vote> = join_all(
            strategies
                .iter()
                .map(|strategy| async move { self.generator.evaluate(strategy, symbol, snapshot) }),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        for vote in &votes {
            let event = AuditEvent::VoteCast(VoteCast {
                cycle_id,
                symbol: symbol.to_string(),
                vote: vote.clone(),
                cast_at: Utc::now(),
            });
            self.audit.record(&event).await?;
        }

        let size = self.aggregator.settings().order_size_for(symbol);
        let signal = match self
            .aggregator
            .aggregate(symbol, &votes, Some(&conditions), price, size)
        {
            Ok(signal) => signal,
            Err(reason) => {
                tracing::debug!(
                    symbol = %symbol,
                    cycle_id = %cycle_id,
                    strategies = strategies.len(),
                    votes = votes.len(),
                    reason = %reason,
                    "No consensus this cycle"
                );
                return Ok(CycleReport {
                    cycle_id,
                    symbol: symbol.to_string(),
                    votes,
                    signal: None,
                    rejection: Some(reason),
                    executions: Vec::new(),
                });
            }
        };

        self.audit
            .record(&AuditEvent::SignalEmitted(SignalEmitted {
                cycle_id,
                signal: signal.clone(),
            }))
            .await?;
        let subscribers = self.bus.publish_signal(&signal);
        on_signal(&signal);
        tracing::info!(
            symbol = %symbol,
            signal_id = %signal.id,
            side = %signal.side,
            price = %signal.price,
            confidence = %signal.confidence,
            strength = %signal.consensus_strength,
            subscribers,
            "Ensemble signal emitted: {}",
            signal.reasoning
        );

        let executions = self.distributor.distribute(&signal).await?;

        Ok(CycleReport {
            cycle_id,
            symbol: symbol.to_string(),
            votes,
            signal: Some(signal),
            rejection: None,
            executions,
        })
    }
}
