use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlerterError {
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Telegram rejected the message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}
