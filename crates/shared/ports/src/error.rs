use basket_core::OrderId;
use thiserror::Error;

/// Errors reported synchronously by an execution gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Order {order_id} rejected: {reason}")]
    Rejected { order_id: OrderId, reason: String },

    #[error("Gateway disconnected")]
    Disconnected,

    #[error("Unknown order: {0}")]
    Unknown(OrderId),
}

impl GatewayError {
    /// Order the error refers to, if any
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            GatewayError::Rejected { order_id, .. } | GatewayError::Unknown(order_id) => {
                Some(*order_id)
            }
            GatewayError::Disconnected => None,
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
