//! Order submission seam.
//!
//! The engine hands every deploy and cancel-all to an [`OrderGateway`].
//! Implementations decide how orders reach an exchange; the bundled
//! [`crate::paper_gateway::PaperGateway`] only simulates one.
//!
//! # Example
//!
//! ```no_run
//! use arb_ladder_engine::gateway::{DeployAck, DeployMode, GatewayError, OrderGateway};
//! use arb_ladder_engine::types::ActiveLadderOrder;
//!
//! async fn push(gateway: &dyn OrderGateway, orders: &[ActiveLadderOrder]) -> Result<(), GatewayError> {
//!     match gateway.deploy(orders, DeployMode::Replace).await? {
//!         DeployAck::Accepted => println!("deployed {} orders", orders.len()),
//!         DeployAck::Rejected { reason } => println!("rejected: {reason}"),
//!     }
//!     Ok(())
//! }
//! ```

use crate::types::ActiveLadderOrder;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How submitted orders relate to what is already resting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Cancel everything resting, then place the new set.
    Replace,
    /// Place the new orders alongside the resting ones.
    Append,
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployMode::Replace => write!(f, "replace"),
            DeployMode::Append => write!(f, "append"),
        }
    }
}

/// Gateway answer to a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployAck {
    Accepted,
    Rejected { reason: String },
}

impl DeployAck {
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        DeployAck::Rejected {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, DeployAck::Accepted)
    }
}

/// Errors talking to the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway could not be reached.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete in time.
    #[error("Gateway call timed out after {0:?}")]
    Timeout(Duration),

    /// Anything else reported by the gateway.
    #[error("Gateway error: {0}")]
    Other(String),
}

/// Submits ladder orders to a venue.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submits orders.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the call itself fails. A venue refusal is
    /// an `Ok(DeployAck::Rejected { .. })`.
    async fn deploy(&self, orders: &[ActiveLadderOrder], mode: DeployMode) -> Result<DeployAck, GatewayError>;

    /// Cancels every resting order.
    ///
    /// Returns the number of orders cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the call fails.
    async fn cancel_all(&self) -> Result<u32, GatewayError>;
}
