//! Dev-tools bridge.
//!
//! The runtime emits [`BridgeMessage`]s (`render:done`, `runtime:success`,
//! `runtime:error`). In-process listeners see every message as it is emitted;
//! external clients receive the JSON encoding, queued (up to a limit) until
//! the first client connects. The transport behind a [`BridgeClient`] is not this crate's
//! concern.

mod bridge;
mod error;
mod message;

pub use bridge::{Bridge, BridgeClient, DEFAULT_MAX_QUEUED, Listener, MemoryClient};
pub use error::{BridgeError, Result};
pub use message::{BridgeMessage, Envelope, ErrorRecord, ErrorSite};
