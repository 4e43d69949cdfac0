use alerter::{LogNotifier, NotificationSink, TelegramNotifier};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::{Config, ConfigArgs, MarketSource, StorageBackend, init_logging, load_config};
use database::{
    AccountStore, AuditRecorder, ExecutionJournal, InMemoryStore, JsonlAuditLog, PgRepository,
    StrategyStore, account_from_settings, connect, run_migrations,
};
use engine::{ConsensusEngine, CycleReport, EngineComponents};
use events::SignalBus;
use executor::ExecutionCoordinator;
use market_data::{
    BinanceMarketClient, CachedOracle, MarketConditionProvider, PriceOracle, StaticMarket,
};
use risk::AccountRiskFilter;
use std::sync::Arc;
use strategies::SensitivityModel;
use tokio::sync::watch;
use uuid::Uuid;

/// The main entry point for the Quorum consensus engine.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; DATABASE_URL may come from the real environment.
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();
    let config = load_config(&cli.config.config)
        .with_context(|| format!("loading {}", cli.config.config.display()))?;
    let _log_guard = init_logging(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Run => handle_run(config).await,
        Commands::Evaluate(args) => handle_evaluate(config, args).await,
        Commands::Migrate => handle_migrate(config).await,
        Commands::Feedback(args) => handle_feedback(config, args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Aggregates independent strategy votes into ensemble signals and paper-trades them across accounts.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler and evaluate every configured symbol until Ctrl-C.
    Run,
    /// Run a single evaluation cycle for one symbol and print the result.
    Evaluate(EvaluateArgs),
    /// Apply database migrations and seed the configured strategies and accounts.
    Migrate,
    /// Record the result of a closed trade against the strategy that called it.
    Feedback(FeedbackArgs),
}

#[derive(Parser)]
struct EvaluateArgs {
    /// The symbol to evaluate (e.g., "BTCUSDT").
    #[arg(long)]
    symbol: String,
}

#[derive(Parser)]
struct FeedbackArgs {
    /// The strategy id, as shown in the `evaluate` votes table.
    #[arg(long)]
    strategy: Uuid,
    #[arg(long, value_enum)]
    result: TradeResult,
}

#[derive(Clone, Copy, ValueEnum)]
enum TradeResult {
    Won,
    Lost,
}

// ==============================================================================
// Wiring
// ==============================================================================

/// The storage trait objects, all backed by the same store.
struct Storage {
    accounts: Arc<dyn AccountStore>,
    strategies: Arc<dyn StrategyStore>,
    journal: Arc<dyn ExecutionJournal>,
    audit: Arc<dyn AuditRecorder>,
}

async fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    match config.storage.backend {
        StorageBackend::Memory => {
            let audit: Arc<dyn AuditRecorder> =
                Arc::new(JsonlAuditLog::open(&config.storage.audit_log_path).await?);
            let store = Arc::new(InMemoryStore::from_config(config, audit.clone()));
            tracing::info!(
                accounts = config.accounts.len(),
                strategies = config.strategies.len(),
                "Using in-memory storage"
            );
            Ok(Storage {
                accounts: store.clone(),
                strategies: store.clone(),
                journal: store,
                audit,
            })
        }
        StorageBackend::Postgres => {
            let pool = connect(config.storage.max_connections).await?;
            run_migrations(&pool).await?;
            let repo = Arc::new(PgRepository::new(pool));
            repo.seed(config).await?;
            Ok(Storage {
                accounts: repo.clone(),
                strategies: repo.clone(),
                journal: repo.clone(),
                audit: repo,
            })
        }
    }
}

fn open_market(
    config: &Config,
) -> anyhow::Result<(Arc<dyn MarketConditionProvider>, Arc<dyn PriceOracle>)> {
    match config.market.source {
        MarketSource::Static => {
            let market = Arc::new(StaticMarket::from_settings(&config.market)?);
            let conditions: Arc<dyn MarketConditionProvider> = market.clone();
            let prices: Arc<dyn PriceOracle> = market;
            Ok((conditions, prices))
        }
        MarketSource::Binance => {
            let client = Arc::new(BinanceMarketClient::new(&config.market)?);
            let prices: Arc<dyn PriceOracle> = Arc::new(CachedOracle::new(
                client.clone(),
                config.market.max_price_staleness(),
            ));
            let conditions: Arc<dyn MarketConditionProvider> = client;
            Ok((conditions, prices))
        }
    }
}

fn notifier(config: &Config) -> Arc<dyn NotificationSink> {
    match TelegramNotifier::new(&config.telegram) {
        Some(telegram) => {
            let chats = config
                .accounts
                .iter()
                .filter_map(|settings| {
                    let chat = settings.telegram_chat.clone()?;
                    Some((account_from_settings(settings).id, chat))
                })
                .collect();
            Arc::new(telegram.with_account_chats(chats))
        }
        None => Arc::new(LogNotifier),
    }
}

async fn build_engine(config: &Config) -> anyhow::Result<ConsensusEngine> {
    let storage = open_storage(config).await?;
    let (market, prices) = open_market(config)?;
    let bus = SignalBus::default();

    let executor = ExecutionCoordinator::new(
        storage.accounts.clone(),
        storage.journal,
        storage.audit.clone(),
        notifier(config),
        bus.clone(),
        config.execution.clone(),
    );

    let engine = ConsensusEngine::new(
        config,
        EngineComponents {
            market,
            prices,
            strategies: storage.strategies,
            accounts: storage.accounts,
            audit: storage.audit,
            confidence: Arc::new(SensitivityModel::default()),
            risk: Arc::new(AccountRiskFilter::default()),
            executor: Arc::new(executor),
            bus,
        },
    )?;
    Ok(engine)
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_run(config: Config) -> anyhow::Result<()> {
    let engine = Arc::new(build_engine(&config).await?);

    if let Some(telegram) = TelegramNotifier::new(&config.telegram) {
        if let Err(e) = telegram.send_message("✅ *Quorum Engine Started*").await {
            tracing::warn!(error = %e, "Failed to send startup notification");
        }
    }

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, finishing the current cycles");
        }
        let _ = stop.send(true);
    });

    engine.run(shutdown).await?;
    Ok(())
}

async fn handle_evaluate(config: Config, args: EvaluateArgs) -> anyhow::Result<()> {
    let engine = build_engine(&config).await?;
    let report = engine.evaluate(&args.symbol).await?;
    print_report(&report);
    Ok(())
}

async fn handle_migrate(config: Config) -> anyhow::Result<()> {
    let pool = connect(config.storage.max_connections).await?;
    run_migrations(&pool).await?;
    PgRepository::new(pool).seed(&config).await?;
    println!("Migrations applied; strategies and accounts seeded.");
    Ok(())
}

async fn handle_feedback(config: Config, args: FeedbackArgs) -> anyhow::Result<()> {
    if config.storage.backend == StorageBackend::Memory {
        tracing::warn!("In-memory storage: the adjusted weight is not kept after this process exits");
    }
    let engine = build_engine(&config).await?;
    let won = matches!(args.result, TradeResult::Won);
    let strategy = engine.record_outcome(args.strategy, won).await?;
    println!(
        "{} ({}): weight {}, {} trades",
        strategy.name, strategy.kind, strategy.performance_weight, strategy.total_trades
    );
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("Cycle {} for {}", report.cycle_id, report.symbol);

    let mut votes = Table::new();
    votes
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Strategy", "Kind", "Direction", "Confidence", "Weight"]);
    for vote in &report.votes {
        votes.add_row(vec![
            vote.strategy_id.to_string(),
            vote.strategy_kind.to_string(),
            vote.direction.to_string(),
            vote.confidence.to_string(),
            vote.weight.round_dp(4).to_string(),
        ]);
    }
    println!("{votes}");

    match (&report.signal, &report.rejection) {
        (Some(signal), _) => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["Side", "Price", "Size", "Confidence", "Strength"])
                .add_row(vec![
                    signal.side.to_string(),
                    signal.price.to_string(),
                    signal.size.to_string(),
                    signal.confidence.round_dp(2).to_string(),
                    signal.consensus_strength.round_dp(4).to_string(),
                ]);
            println!("{table}");
            println!("{}", signal.reasoning);
        }
        (None, Some(reason)) => println!("No signal: {reason}"),
        (None, None) => println!("No signal."),
    }

    if !report.executions.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Account", "Outcome", "Size", "Fee", "Balance", "Reason"]);
        for record in &report.executions {
            table.add_row(vec![
                record.account_id.to_string(),
                record.outcome.as_str().to_string(),
                record.filled_size.to_string(),
                record.fee.to_string(),
                record.balance_after.to_string(),
                record.reason.clone().unwrap_or_default(),
            ]);
        }
        println!("{table}");
    }
}
