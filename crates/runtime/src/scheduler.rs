//! Per-instance update serialization.
//!
//! Requests never queue. An instance that cannot render right now gets a
//! pending flag; the completion of its current render turns every request
//! that arrived meanwhile into at most one follow-up render.

use crate::{Instance, InstanceFlags};

/// What to do with an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
	/// Soft request to a paused instance.
	Dropped,
	/// Recorded as pending; `coalesced` when one was already pending.
	Deferred { coalesced: bool },
	/// Render now.
	Run { forced: bool },
}

/// Decides when update requests execute.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
	first_pass: bool,
	max_chained: u32,
}

impl UpdateScheduler {
	pub fn new(max_chained: u32) -> Self {
		Self {
			first_pass: true,
			max_chained,
		}
	}

	/// Whether the first top-level render has not started yet.
	pub fn is_first_pass(&self) -> bool {
		self.first_pass
	}

	pub fn finish_first_pass(&mut self) {
		self.first_pass = false;
	}

	pub fn reset(&mut self) {
		self.first_pass = true;
	}

	pub fn max_chained(&self) -> u32 {
		self.max_chained
	}

	/// Classifies a request and records it on the instance when deferred.
	pub fn request(&self, inst: &mut Instance, soft: bool) -> UpdateDecision {
		if soft && inst.flags.contains(InstanceFlags::PAUSED) {
			tracing::trace!(id = %inst.id, path = %inst.path, "scheduler.dropped");
			return UpdateDecision::Dropped;
		}

		let rendering = inst.flags.contains(InstanceFlags::RENDERING);
		if rendering || self.first_pass || !inst.flags.contains(InstanceFlags::MOUNTED) {
			let coalesced = inst.flags.contains(InstanceFlags::PENDING_UPDATE);
			inst.flags.insert(InstanceFlags::PENDING_UPDATE);
			if !soft {
				inst.flags.insert(InstanceFlags::PENDING_FORCED);
				if rendering {
					inst.flags.insert(InstanceFlags::UPDATING);
				}
			}
			tracing::trace!(id = %inst.id, soft, coalesced, "scheduler.deferred");
			return UpdateDecision::Deferred { coalesced };
		}

		UpdateDecision::Run { forced: !soft }
	}

	/// Ends a render and returns the follow-up to start, if any.
	///
	/// `chain` counts follow-ups already started back to back; past the
	/// configured limit the pending update is dropped.
	pub fn complete(&self, inst: &mut Instance, chain: u32) -> Option<bool> {
		inst.flags.remove(InstanceFlags::RENDERING | InstanceFlags::UPDATING);
		if !inst.flags.contains(InstanceFlags::PENDING_UPDATE) {
			return None;
		}
		let forced = inst.flags.contains(InstanceFlags::PENDING_FORCED);
		inst.flags.remove(InstanceFlags::PENDING_UPDATE | InstanceFlags::PENDING_FORCED);

		if !forced && inst.flags.contains(InstanceFlags::PAUSED) {
			tracing::trace!(id = %inst.id, "scheduler.dropped");
			return None;
		}
		if chain >= self.max_chained {
			tracing::warn!(id = %inst.id, path = %inst.path, chain, "scheduler.chain_limit");
			return None;
		}
		Some(forced)
	}
}
