//! Error types for the dev-tools bridge.

use thiserror::Error;

/// Errors raised while encoding or delivering bridge messages.
#[derive(Debug, Error)]
pub enum BridgeError {
	/// The message could not be encoded as JSON.
	#[error("failed to encode bridge message: {0}")]
	Encode(#[from] serde_json::Error),

	/// A client refused or failed to take a message.
	#[error("bridge client disconnected: {0}")]
	Disconnected(String),
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
