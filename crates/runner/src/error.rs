//! Runner errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Engine error: {0}")]
    Engine(#[from] basket_engine::Error),

    #[error("Failed to read tick file: {0}")]
    TickIo(#[from] std::io::Error),

    #[error("Invalid tick on line {line}: {source}")]
    TickParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Engine queue closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
