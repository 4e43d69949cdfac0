use crate::error::DbError;
use crate::seed::{account_from_settings, strategy_from_settings};
use crate::{AccountStore, AuditRecorder, ExecutionJournal, StrategyStore, adjusted_weight};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configuration::Config;
use core_types::{
    Account, AccountStatus, ExecutionOutcome, ExecutionRecord, Fill, Side, Strategy, StrategyKind,
    StrategyStatus,
};
use events::{AuditEvent, ExecutionAttempted};
use rust_decimal::Decimal;
use sqlx::postgres::{PgExecutor, PgPool};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// The `PgRepository` implements every storage trait on top of PostgreSQL.
/// It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

// These structs represent rows as they come back from the database. Enum
// columns are stored as their snake_case names and parsed on the way out.
#[derive(FromRow, Debug, Clone)]
struct DbStrategy {
    id: Uuid,
    name: String,
    kind: String,
    target_symbols: Vec<String>,
    status: String,
    confidence_threshold: Decimal,
    performance_weight: Decimal,
    total_trades: i64,
}

#[derive(FromRow, Debug, Clone)]
struct DbAccount {
    id: Uuid,
    name: String,
    balance: Decimal,
    risk_multiplier: Decimal,
    confidence_threshold: Decimal,
    max_position_value: Decimal,
    status: String,
    symbols: Vec<String>,
}

#[derive(FromRow, Debug, Clone)]
struct DbExecutionRecord {
    id: Uuid,
    account_id: Uuid,
    signal_id: Uuid,
    symbol: String,
    side: String,
    requested_size: Decimal,
    filled_size: Decimal,
    fill_price: Decimal,
    fee: Decimal,
    balance_before: Decimal,
    balance_after: Decimal,
    outcome: String,
    reason: Option<String>,
    executed_at: DateTime<Utc>,
}

fn parse<T: FromStr<Err = core_types::CoreError>>(value: &str) -> Result<T, DbError> {
    value.parse::<T>().map_err(|e| DbError::InvalidRow(e.to_string()))
}

impl TryFrom<DbStrategy> for Strategy {
    type Error = DbError;

    fn try_from(row: DbStrategy) -> Result<Self, Self::Error> {
        Ok(Strategy {
            id: row.id,
            name: row.name,
            kind: parse::<StrategyKind>(&row.kind)?,
            target_symbols: row.target_symbols.into_iter().collect(),
            status: parse::<StrategyStatus>(&row.status)?,
            confidence_threshold: row.confidence_threshold,
            performance_weight: row.performance_weight,
            total_trades: u64::try_from(row.total_trades)
                .map_err(|_| DbError::InvalidRow(format!("total_trades {}", row.total_trades)))?,
        })
    }
}

impl TryFrom<DbAccount> for Account {
    type Error = DbError;

    fn try_from(row: DbAccount) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            name: row.name,
            balance: row.balance,
            risk_multiplier: row.risk_multiplier,
            confidence_threshold: row.confidence_threshold,
            max_position_value: row.max_position_value,
            status: parse::<AccountStatus>(&row.status)?,
            symbols: row.symbols.into_iter().collect(),
        })
    }
}

impl TryFrom<DbExecutionRecord> for ExecutionRecord {
    type Error = DbError;

    fn try_from(row: DbExecutionRecord) -> Result<Self, Self::Error> {
        Ok(ExecutionRecord {
            id: row.id,
            account_id: row.account_id,
            signal_id: row.signal_id,
            symbol: row.symbol,
            side: parse::<Side>(&row.side)?,
            requested_size: row.requested_size,
            filled_size: row.filled_size,
            fill_price: row.fill_price,
            fee: row.fee,
            balance_before: row.balance_before,
            balance_after: row.balance_after,
            outcome: parse::<ExecutionOutcome>(&row.outcome)?,
            reason: row.reason,
            timestamp: row.executed_at,
        })
    }
}

const STRATEGY_COLUMNS: &str = "id, name, kind, target_symbols, status, confidence_threshold, performance_weight, total_trades";
const ACCOUNT_COLUMNS: &str = "id, name, balance, risk_multiplier, confidence_threshold, max_position_value, status, symbols";
const RECORD_COLUMNS: &str = "id, account_id, signal_id, symbol, side, requested_size, filled_size, fill_price, fee, balance_before, balance_after, outcome, reason, executed_at";

const INSERT_RECORD: &str = r#"
    INSERT INTO execution_records (
        id, account_id, signal_id, symbol, side, requested_size, filled_size,
        fill_price, fee, balance_before, balance_after, outcome, reason, executed_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
    "#;

/// Maps a unique-key violation on the journal to `DuplicateExecution`.
fn journal_error(e: sqlx::Error, record: &ExecutionRecord) -> DbError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => DbError::DuplicateExecution {
            account_id: record.account_id,
            signal_id: record.signal_id,
        },
        _ => e.into(),
    }
}

const INSERT_AUDIT: &str =
    "INSERT INTO audit_events (kind, symbol, account_id, payload, recorded_at) VALUES ($1, $2, $3, $4, $5)";

async fn insert_audit<'e, E>(executor: E, event: &AuditEvent) -> Result<(), DbError>
where
    E: PgExecutor<'e>,
{
    let payload = serde_json::to_value(event)?;
    sqlx::query(INSERT_AUDIT)
        .bind(event.kind())
        .bind(event.symbol().to_string())
        .bind(event.account_id())
        .bind(payload)
        .bind(event.occurred_at())
        .execute(executor)
        .await?;
    Ok(())
}

fn bind_record<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    record: &'q ExecutionRecord,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(record.id)
        .bind(record.account_id)
        .bind(record.signal_id)
        .bind(&record.symbol)
        .bind(record.side.to_string())
        .bind(record.requested_size)
        .bind(record.filled_size)
        .bind(record.fill_price)
        .bind(record.fee)
        .bind(record.balance_before)
        .bind(record.balance_after)
        .bind(record.outcome.as_str())
        .bind(record.reason.as_deref())
        .bind(record.timestamp)
}

impl PgRepository {
    /// Creates a new repository with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the strategies and accounts defined in the configuration.
    /// Rows that already exist are left untouched, so restarts never reset balances.
    pub async fn seed(&self, config: &Config) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        for strategy in config.strategies.iter().map(strategy_from_settings) {
            let symbols: Vec<String> = strategy.target_symbols.iter().cloned().collect();
            sqlx::query(
                r#"
                INSERT INTO strategies (id, name, kind, target_symbols, status, confidence_threshold, performance_weight, total_trades)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(strategy.id)
            .bind(&strategy.name)
            .bind(strategy.kind.as_str())
            .bind(&symbols)
            .bind(strategy.status.as_str())
            .bind(strategy.confidence_threshold)
            .bind(strategy.performance_weight)
            .bind(strategy.total_trades as i64)
            .execute(&mut *tx)
            .await?;
        }

        for account in config.accounts.iter().map(account_from_settings) {
            let symbols: Vec<String> = account.symbols.iter().cloned().collect();
            sqlx::query(
                r#"
                INSERT INTO accounts (id, name, balance, risk_multiplier, confidence_threshold, max_position_value, status, symbols)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(account.id)
            .bind(&account.name)
            .bind(account.balance)
            .bind(account.risk_multiplier)
            .bind(account.confidence_threshold)
            .bind(account.max_position_value)
            .bind(account.status.as_str())
            .bind(&symbols)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(
            strategies = config.strategies.len(),
            accounts = config.accounts.len(),
            "Seeded strategies and accounts"
        );
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgRepository {
    async fn get_account(&self, id: Uuid) -> Result<Account, DbError> {
        let row = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::RowNotFound = e {
                DbError::NotFound(format!("account {id}"))
            } else {
                e.into()
            }
        })?;
        row.try_into()
    }

    async fn get_active_accounts(&self, symbol: &str) -> Result<Vec<Account>, DbError> {
        let rows = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE status = 'active' AND $1 = ANY(symbols) ORDER BY id"
        ))
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Account::try_from).collect()
    }

    async fn holding(&self, account_id: Uuid, symbol: &str) -> Result<Decimal, DbError> {
        let quantity: Option<Decimal> =
            sqlx::query_scalar("SELECT quantity FROM holdings WHERE account_id = $1 AND symbol = $2")
                .bind(account_id)
                .bind(symbol)
                .fetch_optional(&self.pool)
                .await?;
        Ok(quantity.unwrap_or(Decimal::ZERO))
    }

    /// Balance, holding, journal row and audit row are written in one
    /// transaction. The balance update only matches if the stored balance
    /// still equals `fill.balance_before`.
    async fn apply_fill(&self, fill: &Fill, record: &ExecutionRecord) -> Result<(), DbError> {
        if fill.balance_after < Decimal::ZERO {
            return Err(DbError::Conflict(format!(
                "balance of account {} would become {}",
                fill.account_id, fill.balance_after
            )));
        }

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2 AND balance = $3")
            .bind(fill.balance_after)
            .bind(fill.account_id)
            .bind(fill.balance_before)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "balance of account {} changed since it was read",
                fill.account_id
            )));
        }

        let holding = match fill.side {
            Side::Buy => {
                sqlx::query(
                    r#"
                    INSERT INTO holdings (account_id, symbol, quantity) VALUES ($1, $2, $3)
                    ON CONFLICT (account_id, symbol) DO UPDATE SET quantity = holdings.quantity + EXCLUDED.quantity
                    "#,
                )
                .bind(fill.account_id)
                .bind(&fill.symbol)
                .bind(fill.quantity)
                .execute(&mut *tx)
                .await?
            }
            Side::Sell => {
                sqlx::query(
                    "UPDATE holdings SET quantity = quantity - $3 WHERE account_id = $1 AND symbol = $2 AND quantity >= $3",
                )
                .bind(fill.account_id)
                .bind(&fill.symbol)
                .bind(fill.quantity)
                .execute(&mut *tx)
                .await?
            }
        };
        if holding.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "account {} does not hold {} {}",
                fill.account_id, fill.quantity, fill.symbol
            )));
        }

        bind_record(sqlx::query(INSERT_RECORD), record)
            .execute(&mut *tx)
            .await
            .map_err(|e| journal_error(e, record))?;

        let event = AuditEvent::ExecutionAttempted(ExecutionAttempted { record: record.clone() });
        insert_audit(&mut *tx, &event).await?;

        // Dropping `tx` on any early return above rolls everything back.
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl StrategyStore for PgRepository {
    async fn get_active_strategies(&self, symbol: &str) -> Result<Vec<Strategy>, DbError> {
        let rows = sqlx::query_as::<_, DbStrategy>(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM strategies WHERE status = 'active' AND $1 = ANY(target_symbols) ORDER BY name"
        ))
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Strategy::try_from).collect()
    }

    async fn set_status(&self, id: Uuid, status: StrategyStatus) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE strategies SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("strategy {id}")));
        }
        Ok(())
    }

    async fn record_performance(&self, id: Uuid, won: bool) -> Result<Strategy, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DbStrategy>(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("strategy {id}")))?;

        let mut strategy = Strategy::try_from(row)?;
        strategy.performance_weight = adjusted_weight(strategy.performance_weight, won);
        strategy.total_trades += 1;

        sqlx::query("UPDATE strategies SET performance_weight = $1, total_trades = $2 WHERE id = $3")
            .bind(strategy.performance_weight)
            .bind(strategy.total_trades as i64)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(strategy)
    }
}

#[async_trait]
impl ExecutionJournal for PgRepository {
    async fn find(&self, account_id: Uuid, signal_id: Uuid) -> Result<Option<ExecutionRecord>, DbError> {
        let row = sqlx::query_as::<_, DbExecutionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM execution_records WHERE account_id = $1 AND signal_id = $2"
        ))
        .bind(account_id)
        .bind(signal_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ExecutionRecord::try_from).transpose()
    }

    async fn insert(&self, record: &ExecutionRecord) -> Result<(), DbError> {
        bind_record(sqlx::query(INSERT_RECORD), record)
            .execute(&self.pool)
            .await
            .map_err(|e| journal_error(e, record))?;
        Ok(())
    }

    async fn records_for(&self, account_id: Uuid) -> Result<Vec<ExecutionRecord>, DbError> {
        let rows = sqlx::query_as::<_, DbExecutionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM execution_records WHERE account_id = $1 ORDER BY executed_at"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ExecutionRecord::try_from).collect()
    }
}

#[async_trait]
impl AuditRecorder for PgRepository {
    async fn record(&self, event: &AuditEvent) -> Result<(), DbError> {
        insert_audit(&self.pool, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn strategy_row(kind: &str, status: &str) -> DbStrategy {
        DbStrategy {
            id: Uuid::new_v4(),
            name: "trend".to_string(),
            kind: kind.to_string(),
            target_symbols: vec!["BTCUSDT".to_string()],
            status: status.to_string(),
            confidence_threshold: dec!(30),
            performance_weight: dec!(1.2),
            total_trades: 12,
        }
    }

    #[test]
    fn strategy_rows_decode() {
        let strategy = Strategy::try_from(strategy_row("trend_following", "paused")).unwrap();
        assert_eq!(strategy.kind, StrategyKind::TrendFollowing);
        assert_eq!(strategy.status, StrategyStatus::Paused);
        assert_eq!(strategy.total_trades, 12);
        assert!(strategy.targets("BTCUSDT"));
    }

    #[test]
    fn unknown_enum_values_are_invalid_rows() {
        let err = Strategy::try_from(strategy_row("astrology", "active")).unwrap_err();
        assert!(matches!(err, DbError::InvalidRow(_)));

        let mut row = strategy_row("momentum", "active");
        row.total_trades = -1;
        assert!(matches!(Strategy::try_from(row), Err(DbError::InvalidRow(_))));
    }

    #[test]
    fn execution_rows_decode() {
        let row = DbExecutionRecord {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            signal_id: Uuid::new_v4(),
            symbol: "ETHUSDT".to_string(),
            side: "sell".to_string(),
            requested_size: dec!(1),
            filled_size: Decimal::ZERO,
            fill_price: dec!(3000),
            fee: Decimal::ZERO,
            balance_before: dec!(500),
            balance_after: dec!(500),
            outcome: "rejected".to_string(),
            reason: Some("insufficient holdings".to_string()),
            executed_at: Utc::now(),
        };
        let record = ExecutionRecord::try_from(row).unwrap();
        assert_eq!(record.side, Side::Sell);
        assert_eq!(record.outcome, ExecutionOutcome::Rejected);
        assert_eq!(record.balance_delta(), Decimal::ZERO);
    }
}
