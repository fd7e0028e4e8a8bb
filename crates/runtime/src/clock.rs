use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use web_time::Instant;

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Send + Sync {
	fn now(&self) -> Duration;
}

/// Wall clock backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
	origin: Instant,
}

impl Default for SystemClock {
	fn default() -> Self {
		Self { origin: Instant::now() }
	}
}

impl Clock for SystemClock {
	fn now(&self) -> Duration {
		self.origin.elapsed()
	}
}

/// Clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	nanos: Arc<AtomicU64>,
}

impl ManualClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Moves time forward.
	pub fn advance(&self, by: Duration) {
		self.nanos.fetch_add(by.as_nanos() as u64, Ordering::AcqRel);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Duration {
		Duration::from_nanos(self.nanos.load(Ordering::Acquire))
	}
}
