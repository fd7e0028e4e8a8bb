//! Mounted view instances and the table that owns them.

use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use slab::Slab;
use smallvec::SmallVec;
use stasis_primitives::{InstanceId, PathKey, Props, RenderNode, State, ViewName, ViewPath};

use crate::ViewSlot;

bitflags! {
	/// Per-instance lifecycle and scheduling state.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct InstanceFlags: u16 {
		/// Rendered at least once and still in the tree.
		const MOUNTED = 1 << 0;
		/// Soft updates are dropped.
		const PAUSED = 1 << 1;
		/// A deferred update waits for the current render to finish.
		const PENDING_UPDATE = 1 << 2;
		/// The pending update is forced.
		const PENDING_FORCED = 1 << 3;
		/// The body is executing.
		const RENDERING = 1 << 4;
		/// A forced update overlaps the current render.
		const UPDATING = 1 << 5;
		/// Setup failed; the instance shows its fallback until setup succeeds.
		const RECOVERING = 1 << 6;
	}
}

/// Coarse scheduling state derived from [`InstanceFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	Idle,
	Rendering,
	/// Rendering with a forced update pending.
	Updating,
}

/// One mounted occurrence of a view.
#[derive(Debug)]
pub struct Instance {
	pub(crate) id: InstanceId,
	pub(crate) slot: Arc<ViewSlot>,
	pub(crate) key: PathKey,
	pub(crate) path: ViewPath,
	pub(crate) parent: Option<InstanceId>,
	pub(crate) children: SmallVec<[InstanceId; 4]>,
	pub(crate) props: Props,
	pub(crate) state: State,
	pub(crate) flags: InstanceFlags,
	/// Slot generation setup last ran against; 0 before the first setup.
	pub(crate) setup_generation: u64,
	/// Decorated output of the last render, children as [`RenderNode::Mount`].
	pub(crate) output: RenderNode,
	pub(crate) render_count: u64,
	pub(crate) forced_updates: u64,
	/// Render epoch this instance last rendered in.
	pub(crate) rendered_epoch: u64,
}

impl Instance {
	pub(crate) fn new(
		id: InstanceId,
		slot: Arc<ViewSlot>,
		key: PathKey,
		path: ViewPath,
		parent: Option<InstanceId>,
		props: Props,
	) -> Self {
		Self {
			id,
			slot,
			key,
			path,
			parent,
			children: SmallVec::new(),
			props,
			state: State::new(),
			flags: InstanceFlags::empty(),
			setup_generation: 0,
			output: RenderNode::Empty,
			render_count: 0,
			forced_updates: 0,
			rendered_epoch: 0,
		}
	}

	pub fn id(&self) -> InstanceId {
		self.id
	}

	pub fn name(&self) -> &ViewName {
		self.slot.name()
	}

	pub fn slot(&self) -> &Arc<ViewSlot> {
		&self.slot
	}

	pub fn key(&self) -> &PathKey {
		&self.key
	}

	pub fn path(&self) -> &ViewPath {
		&self.path
	}

	pub fn parent(&self) -> Option<InstanceId> {
		self.parent
	}

	pub fn children(&self) -> &[InstanceId] {
		&self.children
	}

	pub fn props(&self) -> &Props {
		&self.props
	}

	pub fn state(&self) -> &State {
		&self.state
	}

	pub fn flags(&self) -> InstanceFlags {
		self.flags
	}

	pub fn output(&self) -> &RenderNode {
		&self.output
	}

	pub fn is_mounted(&self) -> bool {
		self.flags.contains(InstanceFlags::MOUNTED)
	}

	pub fn is_paused(&self) -> bool {
		self.flags.contains(InstanceFlags::PAUSED)
	}

	pub fn has_pending_update(&self) -> bool {
		self.flags.contains(InstanceFlags::PENDING_UPDATE)
	}

	pub fn is_recovering(&self) -> bool {
		self.flags.contains(InstanceFlags::RECOVERING)
	}

	/// Body executions, successful or not.
	pub fn render_count(&self) -> u64 {
		self.render_count
	}

	/// Forced updates executed for this instance.
	pub fn forced_updates(&self) -> u64 {
		self.forced_updates
	}

	pub fn lifecycle(&self) -> Lifecycle {
		if self.flags.contains(InstanceFlags::UPDATING) {
			Lifecycle::Updating
		} else if self.flags.contains(InstanceFlags::RENDERING) {
			Lifecycle::Rendering
		} else {
			Lifecycle::Idle
		}
	}

	/// Points the instance at another slot; setup runs again on next render.
	pub(crate) fn rebind(&mut self, slot: Arc<ViewSlot>) {
		if !Arc::ptr_eq(&self.slot, &slot) {
			self.slot = slot;
			self.setup_generation = 0;
		}
	}

	/// Whether the slot was swapped since setup last ran.
	pub(crate) fn needs_setup(&self) -> bool {
		self.setup_generation != self.slot.generation()
	}
}

/// Slab of live instances with a path index.
#[derive(Debug, Default)]
pub(crate) struct InstanceTable {
	slab: Slab<Instance>,
	next_serial: u32,
	by_path: FxHashMap<ViewPath, InstanceId>,
}

impl InstanceTable {
	pub fn insert(
		&mut self,
		slot: Arc<ViewSlot>,
		key: PathKey,
		path: ViewPath,
		parent: Option<InstanceId>,
		props: Props,
	) -> InstanceId {
		self.next_serial = self.next_serial.wrapping_add(1);
		let serial = self.next_serial;
		let entry = self.slab.vacant_entry();
		let id = InstanceId::new(entry.key(), serial);
		entry.insert(Instance::new(id, slot, key, path.clone(), parent, props));
		self.index_path(&path, id);
		id
	}

	pub fn get(&self, id: InstanceId) -> Option<&Instance> {
		self.slab.get(id.slot()).filter(|inst| inst.id == id)
	}

	pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
		self.slab.get_mut(id.slot()).filter(|inst| inst.id == id)
	}

	pub fn contains(&self, id: InstanceId) -> bool {
		self.get(id).is_some()
	}

	pub fn remove(&mut self, id: InstanceId) -> Option<Instance> {
		if !self.contains(id) {
			return None;
		}
		let inst = self.slab.remove(id.slot());
		if self.by_path.get(&inst.path) == Some(&id) {
			self.by_path.remove(&inst.path);
		}
		Some(inst)
	}

	/// Moves `id` to `path` in the path index.
	pub fn set_path(&mut self, id: InstanceId, path: ViewPath) {
		let Some(inst) = self.slab.get_mut(id.slot()).filter(|inst| inst.id == id) else {
			return;
		};
		if inst.path == path {
			return;
		}
		let old = std::mem::replace(&mut inst.path, path.clone());
		if self.by_path.get(&old) == Some(&id) {
			self.by_path.remove(&old);
		}
		self.index_path(&path, id);
	}

	pub fn by_path(&self, path: &ViewPath) -> Option<InstanceId> {
		self.by_path.get(path).copied()
	}

	pub fn len(&self) -> usize {
		self.slab.len()
	}

	pub fn clear(&mut self) {
		self.slab.clear();
		self.by_path.clear();
	}

	fn index_path(&mut self, path: &ViewPath, id: InstanceId) {
		if let Some(previous) = self.by_path.insert(path.clone(), id)
			&& previous != id
		{
			tracing::warn!(%path, %previous, %id, "instance.path_collision");
		}
	}
}
