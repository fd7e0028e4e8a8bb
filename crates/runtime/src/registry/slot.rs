use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use stasis_primitives::ViewName;

use crate::ViewDefinition;

/// Long-lived identity of a view name.
///
/// Instances hold the slot, never the definition. A reload swaps the current
/// definition in place; instances notice the bumped generation and re-run
/// setup before their next render.
pub struct ViewSlot {
	name: ViewName,
	current: ArcSwap<ViewDefinition>,
	generation: AtomicU64,
}

impl ViewSlot {
	pub(crate) fn new(definition: ViewDefinition) -> Self {
		Self {
			name: definition.name.clone(),
			current: ArcSwap::from_pointee(definition),
			generation: AtomicU64::new(1),
		}
	}

	pub fn name(&self) -> &ViewName {
		&self.name
	}

	/// Current definition.
	#[inline]
	pub fn load(&self) -> Arc<ViewDefinition> {
		self.current.load_full()
	}

	/// Bumped on every swap that changes behavior.
	#[inline]
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	pub fn is_placeholder(&self) -> bool {
		self.current.load().is_placeholder()
	}

	/// Installs `definition`. Identical bodies swap without a new generation.
	pub(crate) fn swap(&self, definition: ViewDefinition, bump: bool) {
		self.current.store(Arc::new(definition));
		if bump {
			self.generation.fetch_add(1, Ordering::AcqRel);
		}
	}
}

impl std::fmt::Debug for ViewSlot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewSlot")
			.field("name", &self.name)
			.field("generation", &self.generation())
			.field("current", &self.current.load().body_hash)
			.finish()
	}
}
