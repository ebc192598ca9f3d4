//! Engine errors

use basket_core::{FillId, OrderId, Price, Volume};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Leg volume {computed} below minimum tradable volume {minimum}")]
    Sizing { computed: Volume, minimum: Volume },

    #[error("Duplicate fill: {0}")]
    DuplicateFill(FillId),

    #[error("Stale reference: price {price} is more than {max_gap} from {reference}")]
    StaleReference {
        price: Price,
        reference: Price,
        max_gap: Price,
    },

    #[error("Execution rejected for order {order_id}: {reason}")]
    ExecutionRejected { order_id: OrderId, reason: String },

    #[error("Invalid fill: {0}")]
    InvalidFill(String),

    #[error("Failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
