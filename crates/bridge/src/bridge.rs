use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{BridgeMessage, Envelope, Result};

/// In-process listener invoked for every emitted message.
pub type Listener = Box<dyn FnMut(&BridgeMessage) + Send>;

/// Outbound connection to an external tool (a websocket peer, an overlay).
pub trait BridgeClient: Send {
	/// Delivers one encoded message. An error disconnects the client.
	fn send(&mut self, encoded: &str) -> Result<()>;
}

/// Client that appends every message to a shared buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryClient {
	received: Arc<Mutex<Vec<String>>>,
}

impl MemoryClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// Messages received so far, oldest first.
	pub fn received(&self) -> Vec<String> {
		self.received.lock().clone()
	}
}

impl BridgeClient for MemoryClient {
	fn send(&mut self, encoded: &str) -> Result<()> {
		self.received.lock().push(encoded.to_string());
		Ok(())
	}
}

/// Messages kept for a client that has not connected yet.
pub const DEFAULT_MAX_QUEUED: usize = 256;

/// Event fan-out between the runtime and dev tooling.
///
/// Encoded messages emitted while no client is connected are queued and
/// flushed, in order, when the first client connects. The queue holds at
/// most `max_queued` messages; the oldest are dropped first.
pub struct Bridge {
	clients: Vec<Box<dyn BridgeClient>>,
	queue: VecDeque<String>,
	max_queued: usize,
	listeners: Vec<Listener>,
}

impl Default for Bridge {
	fn default() -> Self {
		Self::with_max_queued(DEFAULT_MAX_QUEUED)
	}
}

impl Bridge {
	pub fn new() -> Self {
		Self::default()
	}

	/// Bridge whose pending queue holds at most `max_queued` messages.
	pub fn with_max_queued(max_queued: usize) -> Self {
		Self {
			clients: Vec::new(),
			queue: VecDeque::new(),
			max_queued,
			listeners: Vec::new(),
		}
	}

	/// Registers an in-process listener.
	pub fn on(&mut self, listener: impl FnMut(&BridgeMessage) + Send + 'static) {
		self.listeners.push(Box::new(listener));
	}

	/// Notifies listeners and forwards the message to clients.
	///
	/// Delivery problems are logged, never returned: emitting is
	/// fire-and-forget from the runtime's point of view.
	pub fn emit(&mut self, message: BridgeMessage) {
		for listener in &mut self.listeners {
			listener(&message);
		}
		if let Err(error) = self.message(message) {
			tracing::warn!(%error, "bridge.emit");
		}
	}

	/// Encodes and broadcasts a message, or queues it while disconnected.
	pub fn message(&mut self, message: BridgeMessage) -> Result<()> {
		let kind = message.kind();
		let encoded = Envelope::now(message).encode()?;
		if self.clients.is_empty() {
			tracing::trace!(kind, queued = self.queue.len() + 1, "bridge.queue");
			self.enqueue(encoded);
			return Ok(());
		}
		self.broadcast(&encoded);
		Ok(())
	}

	/// Attaches a client. The first client drains the pending queue.
	pub fn connect(&mut self, client: impl BridgeClient + 'static) {
		self.clients.push(Box::new(client));
		if self.clients.len() > 1 {
			return;
		}
		let pending: Vec<String> = self.queue.drain(..).collect();
		tracing::debug!(flushed = pending.len(), "bridge.connect");
		for encoded in &pending {
			self.broadcast(encoded);
		}
	}

	/// Detaches every client; later messages queue again.
	pub fn disconnect_all(&mut self) {
		self.clients.clear();
	}

	pub fn is_connected(&self) -> bool {
		!self.clients.is_empty()
	}

	/// Number of encoded messages waiting for a client.
	pub fn queued(&self) -> usize {
		self.queue.len()
	}

	fn broadcast(&mut self, encoded: &str) {
		self.clients.retain_mut(|client| match client.send(encoded) {
			Ok(()) => true,
			Err(error) => {
				tracing::warn!(%error, "bridge.client dropped");
				false
			}
		});
		if self.clients.is_empty() {
			self.enqueue(encoded.to_string());
		}
	}

	fn enqueue(&mut self, encoded: String) {
		if self.max_queued == 0 {
			return;
		}
		while self.queue.len() >= self.max_queued {
			self.queue.pop_front();
			tracing::trace!(max_queued = self.max_queued, "bridge.queue dropped oldest");
		}
		self.queue.push_back(encoded);
	}
}

impl std::fmt::Debug for Bridge {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Bridge")
			.field("clients", &self.clients.len())
			.field("queued", &self.queue.len())
			.field("max_queued", &self.max_queued)
			.field("listeners", &self.listeners.len())
			.finish()
	}
}
