//! Runtime counters for observability.
//!
//! [`RuntimeMetrics`] tracks render and scheduling statistics. Counters can be
//! queried for debug displays or emitted through tracing with
//! [`RuntimeMetrics::emit`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Render and update counters.
///
/// All counters use relaxed ordering; exact interleavings don't matter, only
/// totals.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
	/// Completed top-level render passes.
	pub full_passes: AtomicU64,
	/// View body renders, including failed ones.
	pub renders: AtomicU64,
	/// Forced (non-soft) updates executed.
	pub forced_updates: AtomicU64,
	/// Soft updates executed.
	pub soft_updates: AtomicU64,
	/// Requests deferred behind an in-flight render or the first pass.
	pub deferred: AtomicU64,
	/// Requests folded into an already pending update.
	pub coalesced: AtomicU64,
	/// Soft requests dropped because the instance was paused.
	pub dropped: AtomicU64,
	/// Render failures caught since the last file load.
	pub caught_errors: AtomicU64,
}

impl RuntimeMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn inc_full_pass(&self) {
		self.full_passes.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_render(&self) {
		self.renders.fetch_add(1, Ordering::Relaxed);
	}

	/// Counts one executed update of the given kind.
	pub fn inc_update(&self, forced: bool) {
		let counter = if forced { &self.forced_updates } else { &self.soft_updates };
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_deferred(&self) {
		self.deferred.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_coalesced(&self) {
		self.coalesced.fetch_add(1, Ordering::Relaxed);
	}

	pub fn inc_dropped(&self) {
		self.dropped.fetch_add(1, Ordering::Relaxed);
	}

	/// Increments the caught error counter and returns the new total.
	pub fn inc_caught_error(&self) -> u64 {
		self.caught_errors.fetch_add(1, Ordering::Relaxed) + 1
	}

	/// Clears the caught error counter at the start of a file load.
	pub fn reset_caught_errors(&self) {
		self.caught_errors.store(0, Ordering::Relaxed);
	}

	pub fn full_pass_count(&self) -> u64 {
		self.full_passes.load(Ordering::Relaxed)
	}

	pub fn render_count(&self) -> u64 {
		self.renders.load(Ordering::Relaxed)
	}

	pub fn forced_update_count(&self) -> u64 {
		self.forced_updates.load(Ordering::Relaxed)
	}

	pub fn soft_update_count(&self) -> u64 {
		self.soft_updates.load(Ordering::Relaxed)
	}

	pub fn deferred_count(&self) -> u64 {
		self.deferred.load(Ordering::Relaxed)
	}

	pub fn coalesced_count(&self) -> u64 {
		self.coalesced.load(Ordering::Relaxed)
	}

	pub fn dropped_count(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	pub fn caught_error_count(&self) -> u64 {
		self.caught_errors.load(Ordering::Relaxed)
	}

	/// Zeroes every counter.
	pub fn reset(&self) {
		for counter in [
			&self.full_passes,
			&self.renders,
			&self.forced_updates,
			&self.soft_updates,
			&self.deferred,
			&self.coalesced,
			&self.dropped,
			&self.caught_errors,
		] {
			counter.store(0, Ordering::Relaxed);
		}
	}

	/// Emits the current totals as a tracing event.
	pub fn emit(&self) {
		tracing::debug!(
			full_passes = self.full_pass_count(),
			renders = self.render_count(),
			forced = self.forced_update_count(),
			soft = self.soft_update_count(),
			deferred = self.deferred_count(),
			coalesced = self.coalesced_count(),
			dropped = self.dropped_count(),
			caught_errors = self.caught_error_count(),
			"runtime.metrics"
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn caught_errors_reset_independently() {
		let metrics = RuntimeMetrics::new();
		metrics.inc_render();
		assert_eq!(metrics.inc_caught_error(), 1);
		assert_eq!(metrics.inc_caught_error(), 2);

		metrics.reset_caught_errors();
		assert_eq!(metrics.caught_error_count(), 0);
		assert_eq!(metrics.render_count(), 1);
	}

	#[test]
	fn update_kinds_count_separately() {
		let metrics = RuntimeMetrics::new();
		metrics.inc_update(true);
		metrics.inc_update(false);
		metrics.inc_update(false);
		assert_eq!(metrics.forced_update_count(), 1);
		assert_eq!(metrics.soft_update_count(), 2);

		metrics.reset();
		assert_eq!(metrics.soft_update_count(), 0);
	}
}
