use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream unavailable for {symbol}: {reason}")]
    UpstreamUnavailable { symbol: String, reason: String },

    #[error("No market data configured for symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid data format from upstream: {0}")]
    InvalidData(String),
}
