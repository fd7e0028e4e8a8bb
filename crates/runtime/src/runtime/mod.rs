//! The process-scoped runtime context.
//!
//! [`Runtime`] owns every table the reconciliation machinery needs (registry,
//! path cache, instances, inspector, bridge) and exposes the lifecycle:
//! load files, run top-level passes, drive per-instance updates, inspect.

mod render;
#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use stasis_bridge::{Bridge, BridgeMessage};
use stasis_primitives::{BoxFutureStatic, InstanceId, PathKey, Props, RenderNode, State, Value, ViewName, ViewPath};

use crate::inspect::WriteBack;
use crate::instance::InstanceTable;
use crate::{
	Clock, ErrorRecoveryRenderer, ErrorReporter, Inspector, Instance, InstanceFlags, PathAllocator, Placeholder, Result,
	RuntimeConfig, RuntimeError, RuntimeMetrics, SystemClock, UpdateDecision, UpdateScheduler, ViewDefinition, ViewError,
	ViewRegistry, ViewSlot,
};

pub(crate) use render::RenderCause;

/// Receives each composed tree; stands in for the external renderer.
pub trait RenderTarget: Send {
	fn commit(&mut self, tree: &RenderNode);
}

/// Discards every tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTarget;

impl RenderTarget for NullTarget {
	fn commit(&mut self, _tree: &RenderNode) {}
}

/// Keeps every committed tree. Clones share the same history.
#[derive(Debug, Default, Clone)]
pub struct MemoryTarget {
	commits: Arc<Mutex<Vec<RenderNode>>>,
}

impl MemoryTarget {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn commits(&self) -> usize {
		self.commits.lock().len()
	}

	/// Most recently committed tree.
	pub fn last(&self) -> Option<RenderNode> {
		self.commits.lock().last().cloned()
	}
}

impl RenderTarget for MemoryTarget {
	fn commit(&mut self, tree: &RenderNode) {
		self.commits.lock().push(tree.clone());
	}
}

/// View identity and reconciliation runtime.
///
/// Single writer: every mutation goes through `&mut self`.
pub struct Runtime {
	pub(crate) config: RuntimeConfig,
	pub(crate) entry: ViewName,
	pub(crate) registry: ViewRegistry,
	pub(crate) paths: PathAllocator,
	pub(crate) instances: InstanceTable,
	pub(crate) scheduler: UpdateScheduler,
	pub(crate) recovery: ErrorRecoveryRenderer,
	pub(crate) inspector: Inspector,
	pub(crate) bridge: Bridge,
	pub(crate) metrics: RuntimeMetrics,
	pub(crate) target: Box<dyn RenderTarget>,
	preloaders: Vec<BoxFutureStatic<std::result::Result<(), ViewError>>>,
	pub(crate) root: Option<InstanceId>,
	/// Bumped per top-level pass and per reload patch.
	pub(crate) epoch: u64,
	/// Set while a top-level pass re-allocates paths.
	pub(crate) full_pass: bool,
}

impl Runtime {
	pub fn new(config: RuntimeConfig) -> Self {
		Self::with_clock(config, Arc::new(SystemClock::default()))
	}

	/// Creates a runtime whose error debounce reads `clock`.
	pub fn with_clock(config: RuntimeConfig, clock: Arc<dyn Clock>) -> Self {
		Self {
			entry: config.entry_name(),
			scheduler: UpdateScheduler::new(config.max_chained_updates),
			recovery: ErrorRecoveryRenderer::new(config.error_debounce(), config.devtools_overlay, clock),
			registry: ViewRegistry::new(),
			paths: PathAllocator::new(),
			instances: InstanceTable::default(),
			inspector: Inspector::new(),
			bridge: Bridge::with_max_queued(config.bridge_max_queued),
			metrics: RuntimeMetrics::new(),
			target: Box::new(NullTarget),
			preloaders: Vec::new(),
			root: None,
			epoch: 0,
			full_pass: false,
			config,
		}
	}

	/// Drops all instances, definitions, manifests, cached paths and renders,
	/// inspectors, preloaders, and counters. The next load is a first load.
	///
	/// Reporter, render target, and bridge connections are kept.
	pub fn reset(&mut self) {
		self.instances.clear();
		self.registry.clear();
		self.paths.clear();
		self.inspector.clear();
		self.preloaders.clear();
		self.scheduler.reset();
		self.recovery.reset();
		self.metrics.reset();
		self.root = None;
		self.epoch = 0;
		self.full_pass = false;
		self.entry = self.config.entry_name();
		tracing::debug!("runtime.reset");
	}

	pub fn config(&self) -> &RuntimeConfig {
		&self.config
	}

	pub fn set_reporter(&mut self, reporter: impl ErrorReporter + 'static) {
		self.recovery.set_reporter(reporter);
	}

	pub fn set_target(&mut self, target: impl RenderTarget + 'static) {
		self.target = Box::new(target);
	}

	pub fn bridge(&self) -> &Bridge {
		&self.bridge
	}

	pub fn bridge_mut(&mut self) -> &mut Bridge {
		&mut self.bridge
	}

	pub fn entry(&self) -> &ViewName {
		&self.entry
	}

	/// Changes the view rendered at the root by the next top-level pass.
	pub fn set_entry(&mut self, name: impl Into<ViewName>) {
		self.entry = name.into();
	}

	/// Queues work that must finish before the first render.
	pub fn preload(&mut self, preloader: impl Future<Output = std::result::Result<(), ViewError>> + Send + 'static) {
		self.preloaders.push(Box::pin(preloader));
	}

	/// Joins every queued preloader concurrently, then runs the first pass.
	pub async fn start(&mut self) -> Result<()> {
		let preloaders = std::mem::take(&mut self.preloaders);
		let count = preloaders.len();
		try_join_all(preloaders).await.map_err(RuntimeError::Preload)?;
		tracing::debug!(preloaders = count, "runtime.start");
		self.run();
		Ok(())
	}

	/// One top-level render pass from the entry view.
	pub fn run(&mut self) {
		self.epoch += 1;
		self.scheduler.finish_first_pass();

		let entry = self.entry.clone();
		let slot = self.entry_slot(&entry);
		let props = Props::new();
		let (key, path) = self.paths.allocate(
			None,
			&entry,
			&self.config.default_key,
			&self.config.default_index,
			&props,
			self.registry.is_changed(&entry),
		);

		let reusable = self
			.root
			.filter(|id| self.instances.get(*id).is_some_and(|root| root.key == key));
		let root = match reusable {
			Some(id) => {
				if let Some(inst) = self.instances.get_mut(id) {
					inst.rebind(slot);
				}
				self.move_instance(id, path);
				id
			}
			None => {
				if let Some(old) = self.root.take() {
					self.unmount(old);
				}
				self.instances.insert(slot, key, path, None, props)
			}
		};
		self.root = Some(root);

		self.full_pass = true;
		self.render_instance(root, RenderCause::Parent, 0);
		self.full_pass = false;

		self.registry.clear_changed();
		self.metrics.inc_full_pass();
		self.commit();
		self.bridge.emit(BridgeMessage::RenderDone);
		tracing::debug!(epoch = self.epoch, instances = self.instances.len(), "runtime.run");
	}

	/// Requests an update of one instance.
	///
	/// Runs immediately when the instance is idle; otherwise the request is
	/// folded into the instance's pending update.
	pub fn request_update(&mut self, id: InstanceId, soft: bool) -> Result<UpdateDecision> {
		let decision = self.schedule(id, soft)?;
		if matches!(decision, UpdateDecision::Run { .. }) {
			self.commit();
		}
		Ok(decision)
	}

	/// Writes one state entry and requests a soft update.
	pub fn set_state(&mut self, id: InstanceId, key: impl Into<String>, value: impl Into<Value>) -> Result<UpdateDecision> {
		let inst = self.instances.get_mut(id).ok_or(RuntimeError::UnknownInstance(id))?;
		inst.state.insert(key.into(), value.into());
		self.request_update(id, true)
	}

	pub fn pause(&mut self, id: InstanceId) -> Result<()> {
		self.set_paused(id, true)
	}

	pub fn resume(&mut self, id: InstanceId) -> Result<()> {
		self.set_paused(id, false)
	}

	pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
		self.instances.get(id)
	}

	pub fn instance_at(&self, path: &ViewPath) -> Option<&Instance> {
		self.instances.by_path(path).and_then(|id| self.instances.get(id))
	}

	/// Mounted instances of `name`, in mount order.
	pub fn mounted(&self, name: &ViewName) -> Vec<&Instance> {
		self.registry
			.mounted(name)
			.iter()
			.filter_map(|id| self.instances.get(*id))
			.collect()
	}

	pub fn root(&self) -> Option<&Instance> {
		self.root.and_then(|id| self.instances.get(id))
	}

	/// The composed tree as the renderer last received it.
	pub fn tree(&self) -> RenderNode {
		self.root
			.and_then(|id| self.instances.get(id))
			.map(|root| self.compose(&root.output))
			.unwrap_or_default()
	}

	/// Render failures caught since the last file load.
	pub fn caught_errors(&self) -> u64 {
		self.metrics.caught_error_count()
	}

	pub fn metrics(&self) -> &RuntimeMetrics {
		&self.metrics
	}

	pub fn registry(&self) -> &ViewRegistry {
		&self.registry
	}

	/// Number of live instances.
	pub fn instance_count(&self) -> usize {
		self.instances.len()
	}

	/// Registers `callback` to observe the instance at `path`.
	///
	/// Fires right away when the instance exists, then after each render.
	/// The registration ends when the instance unmounts.
	pub fn inspect(
		&mut self,
		path: &ViewPath,
		callback: impl FnMut(&Props, &State, &WriteBack) + Send + 'static,
	) {
		self.inspector.register(path.clone(), Box::new(callback));
		if let Some(inst) = self.instances.by_path(path).and_then(|id| self.instances.get(id)) {
			self.inspector.notify(path, &inst.props, &inst.state);
		}
	}

	/// Applies queued inspector writes; returns how many reached an instance.
	///
	/// Writes for paths with no live instance are dropped.
	pub fn apply_inspector_writes(&mut self) -> usize {
		let mut applied = 0;
		for write in self.inspector.drain() {
			let Some(id) = self.instances.by_path(&write.path) else {
				tracing::trace!(path = %write.path, key = write.key, "inspector.write_dropped");
				continue;
			};
			if self.set_state(id, write.key, write.value).is_ok() {
				applied += 1;
			}
		}
		applied
	}

	pub(crate) fn commit(&mut self) {
		let tree = self.tree();
		self.target.commit(&tree);
	}

	/// Schedules an update without committing.
	pub(crate) fn schedule(&mut self, id: InstanceId, soft: bool) -> Result<UpdateDecision> {
		let inst = self.instances.get_mut(id).ok_or(RuntimeError::UnknownInstance(id))?;
		let decision = self.scheduler.request(inst, soft);
		let depth = inst.path.depth();
		match decision {
			UpdateDecision::Dropped => self.metrics.inc_dropped(),
			UpdateDecision::Deferred { coalesced } => {
				self.metrics.inc_deferred();
				if coalesced {
					self.metrics.inc_coalesced();
				}
			}
			UpdateDecision::Run { forced } => {
				let cause = if forced { RenderCause::Forced } else { RenderCause::Soft };
				self.render_instance(id, cause, depth);
			}
		}
		Ok(decision)
	}

	fn set_paused(&mut self, id: InstanceId, paused: bool) -> Result<()> {
		let inst = self.instances.get_mut(id).ok_or(RuntimeError::UnknownInstance(id))?;
		inst.flags.set(InstanceFlags::PAUSED, paused);
		Ok(())
	}

	/// Slot for the entry view, substituting an entry placeholder when the
	/// view has no real definition.
	fn entry_slot(&mut self, entry: &ViewName) -> Arc<ViewSlot> {
		let current = self.registry.definition(entry);
		let keep = matches!(
			current.as_deref().map(ViewDefinition::as_placeholder),
			Some(None | Some(Placeholder::DefinedTwice(_)))
		);
		if keep {
			return self.registry.resolve(entry).into_slot();
		}

		let root_key = PathKey::new(None, entry, &self.config.default_key, &self.config.default_index);
		let placeholder = match self.registry.last_good(root_key.as_str()) {
			Some(render) => Placeholder::LastWorkingEntry {
				entry: entry.clone(),
				markup: render.to_markup_stripped(),
			},
			None => Placeholder::MissingEntry(entry.clone()),
		};
		tracing::warn!(%entry, "runtime.entry_missing");
		self.registry.install_placeholder(entry, placeholder)
	}
}

impl std::fmt::Debug for Runtime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Runtime")
			.field("entry", &self.entry)
			.field("first_pass", &self.scheduler.is_first_pass())
			.field("instances", &self.instances.len())
			.field("epoch", &self.epoch)
			.field("bridge", &self.bridge)
			.finish_non_exhaustive()
	}
}
