//! View definitions, file manifests, and mount tracking.
//!
//! # Mental model
//!
//! Every view name maps to one [`ViewSlot`] for the lifetime of the runtime
//! (or until the view is removed). Defining a name again swaps the slot's
//! definition; it never replaces the slot. Names that are rendered before
//! they are defined get a slot holding a `NotFound` placeholder, so the later
//! definition reaches the instances already using it.
//!
//! The registry also keeps the bookkeeping reloads diff against: which file
//! declared which names, which instances are mounted per name, the last good
//! render per logical path, and the per-file dirty signal.

mod slot;

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
pub use slot::ViewSlot;
use stasis_primitives::{InstanceId, RenderNode, ViewName};

use crate::{ChangeDetector, ChangeKind, ChangeSet, Placeholder, ViewDecl, ViewDefinition};

/// Outcome of looking a name up for rendering.
#[derive(Debug, Clone)]
pub enum Resolution {
	Found(Arc<ViewSlot>),
	/// No definition; the slot renders [`Placeholder::NotFound`].
	NotFound(Arc<ViewSlot>),
}

impl Resolution {
	pub fn slot(&self) -> &Arc<ViewSlot> {
		match self {
			Self::Found(slot) | Self::NotFound(slot) => slot,
		}
	}

	pub fn into_slot(self) -> Arc<ViewSlot> {
		match self {
			Self::Found(slot) | Self::NotFound(slot) => slot,
		}
	}

	pub fn is_found(&self) -> bool {
		matches!(self, Self::Found(_))
	}
}

/// Process-scoped table of view definitions.
#[derive(Debug, Default)]
pub struct ViewRegistry {
	slots: FxHashMap<ViewName, Arc<ViewSlot>>,
	owners: FxHashMap<ViewName, String>,
	duplicates: FxHashSet<ViewName>,
	manifests: FxHashMap<String, Vec<ViewName>>,
	mounted: FxHashMap<ViewName, Vec<InstanceId>>,
	detector: ChangeDetector,
	changed_since_render: FxHashSet<ViewName>,
	last_good: FxHashMap<String, RenderNode>,
	dirty_files: FxHashSet<String>,
}

impl ViewRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `decl` as declared by `file` and records its classification.
	///
	/// New and changed bodies bump the slot generation so mounted instances
	/// re-run setup; an unchanged body is swapped in without one.
	pub fn define(&mut self, decl: ViewDecl, file: &str, changes: &mut ChangeSet) -> ChangeKind {
		let name = decl.name.clone();
		let definition = ViewDefinition::from_decl(decl, file);
		let kind = self.detector.classify(&name, definition.body_hash);
		changes.record(name.clone(), kind);
		self.owners.insert(name.clone(), file.to_string());
		self.duplicates.remove(&name);

		match self.slots.get(&name) {
			Some(slot) => {
				let bump = kind.is_change() || slot.is_placeholder();
				slot.swap(definition, bump);
			}
			None => {
				self.slots.insert(name.clone(), Arc::new(ViewSlot::new(definition)));
			}
		}
		if kind.is_change() {
			self.changed_since_render.insert(name.clone());
		}
		tracing::debug!(view = %name, file, ?kind, "registry.define");
		kind
	}

	/// Points `name` at the duplicate-definition placeholder.
	pub fn install_duplicate(&mut self, name: &ViewName) {
		self.install_placeholder(name, Placeholder::DefinedTwice(name.clone()));
		self.detector.forget(name);
		self.owners.remove(name);
		self.duplicates.insert(name.clone());
		tracing::error!(view = %name, "registry.duplicate");
	}

	/// Whether `name` currently resolves to the duplicate placeholder.
	pub fn is_duplicate(&self, name: &ViewName) -> bool {
		self.duplicates.contains(name)
	}

	/// Points `name` at `placeholder`, creating the slot if needed.
	pub fn install_placeholder(&mut self, name: &ViewName, placeholder: Placeholder) -> Arc<ViewSlot> {
		let definition = ViewDefinition::placeholder(name.clone(), placeholder);
		match self.slots.get(name) {
			Some(slot) => {
				let unchanged = slot.load().as_placeholder() == definition.as_placeholder();
				if !unchanged {
					slot.swap(definition, true);
				}
				Arc::clone(slot)
			}
			None => {
				let slot = Arc::new(ViewSlot::new(definition));
				self.slots.insert(name.clone(), Arc::clone(&slot));
				slot
			}
		}
	}

	/// Deletes `name` and returns the instances that were mounted under it.
	///
	/// The caller unmounts them; slots they hold stay alive until then.
	pub fn remove(&mut self, name: &ViewName) -> Vec<InstanceId> {
		self.slots.remove(name);
		self.owners.remove(name);
		self.duplicates.remove(name);
		self.detector.forget(name);
		self.changed_since_render.remove(name);
		let mounted = self.mounted.remove(name).unwrap_or_default();
		tracing::debug!(view = %name, mounted = mounted.len(), "registry.remove");
		mounted
	}

	/// Looks a name up, falling back to a `NotFound` placeholder slot.
	pub fn resolve(&mut self, name: &ViewName) -> Resolution {
		if let Some(slot) = self.slots.get(name) {
			let found = !matches!(slot.load().as_placeholder(), Some(Placeholder::NotFound(_)));
			return if found {
				Resolution::Found(Arc::clone(slot))
			} else {
				Resolution::NotFound(Arc::clone(slot))
			};
		}
		tracing::debug!(view = %name, "registry.not_found");
		Resolution::NotFound(self.install_placeholder(name, Placeholder::NotFound(name.clone())))
	}

	/// The slot for `name`, if one exists.
	pub fn get(&self, name: &ViewName) -> Option<&Arc<ViewSlot>> {
		self.slots.get(name)
	}

	/// Whether `name` has a real (non-placeholder) definition.
	pub fn is_defined(&self, name: &ViewName) -> bool {
		self.slots.get(name).is_some_and(|slot| !slot.is_placeholder())
	}

	pub fn definition(&self, name: &ViewName) -> Option<Arc<ViewDefinition>> {
		self.slots.get(name).map(|slot| slot.load())
	}

	/// File that declared `name`.
	pub fn owner_of(&self, name: &ViewName) -> Option<&str> {
		self.owners.get(name).map(String::as_str)
	}

	pub fn manifest_for(&self, file: &str) -> Option<&[ViewName]> {
		self.manifests.get(file).map(Vec::as_slice)
	}

	pub fn record_manifest(&mut self, file: &str, names: Vec<ViewName>) {
		self.manifests.insert(file.to_string(), names);
	}

	pub fn forget_manifest(&mut self, file: &str) -> Option<Vec<ViewName>> {
		self.manifests.remove(file)
	}

	pub fn knows_file(&self, file: &str) -> bool {
		self.manifests.contains_key(file)
	}

	pub fn track_mounted(&mut self, name: &ViewName, id: InstanceId) {
		let ids = self.mounted.entry(name.clone()).or_default();
		if !ids.contains(&id) {
			ids.push(id);
		}
	}

	pub fn untrack_mounted(&mut self, name: &ViewName, id: InstanceId) {
		if let Some(ids) = self.mounted.get_mut(name) {
			ids.retain(|other| *other != id);
			if ids.is_empty() {
				self.mounted.remove(name);
			}
		}
	}

	/// Drops tracked ids for `name` that fail `live`.
	pub fn retain_mounted(&mut self, name: &ViewName, mut live: impl FnMut(InstanceId) -> bool) {
		if let Some(ids) = self.mounted.get_mut(name) {
			ids.retain(|id| live(*id));
			if ids.is_empty() {
				self.mounted.remove(name);
			}
		}
	}

	/// Instances currently tracked as mounted under `name`.
	pub fn mounted(&self, name: &ViewName) -> &[InstanceId] {
		self.mounted.get(name).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Whether `name` was defined as new/changed since the last full pass.
	pub fn is_changed(&self, name: &ViewName) -> bool {
		self.changed_since_render.contains(name)
	}

	pub fn clear_changed(&mut self) {
		self.changed_since_render.clear();
	}

	pub fn last_good(&self, logical_path: &str) -> Option<&RenderNode> {
		self.last_good.get(logical_path)
	}

	/// Stores a successful render. Failed renders never reach here.
	pub fn record_last_good(&mut self, logical_path: &str, render: RenderNode) {
		self.last_good.insert(logical_path.to_string(), render);
	}

	pub fn mark_file_dirty(&mut self, file: &str) {
		self.dirty_files.insert(file.to_string());
	}

	/// Consumes the dirty signal of `file`.
	pub fn take_file_dirty(&mut self, file: &str) -> bool {
		self.dirty_files.remove(file)
	}

	pub fn detector(&self) -> &ChangeDetector {
		&self.detector
	}

	/// Names with a real definition, sorted.
	pub fn names(&self) -> Vec<ViewName> {
		let mut names: Vec<_> = self
			.slots
			.iter()
			.filter(|(_, slot)| !slot.is_placeholder())
			.map(|(name, _)| name.clone())
			.collect();
		names.sort();
		names
	}

	pub fn clear(&mut self) {
		*self = Self::default();
	}
}
