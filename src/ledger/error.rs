use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Payment already exists: {0}")]
    DuplicatePayment(String),

    #[error("Invalid payment amount {amount} for {order_id}")]
    InvalidAmount { order_id: String, amount: i64 },

    #[error("Payment {order_id} targets {expected}, settlement named {actual}")]
    CidMismatch {
        order_id: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
