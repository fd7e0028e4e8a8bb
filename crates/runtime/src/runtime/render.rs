//! Instance rendering: setup, body execution, child reconciliation,
//! decoration, and unmounting.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use stasis_bridge::{ErrorRecord, ErrorSite};
use stasis_primitives::{Element, InstanceId, PathKey, RenderNode, ViewCall, ViewName, ViewPath};

use super::Runtime;
use crate::view::CxEffects;
use crate::{ErrorRecoveryRenderer, Instance, InstanceFlags, UpdateDecision, ViewCx, ViewError};

/// Views nested deeper than this render nothing.
const MAX_TREE_DEPTH: usize = 256;

/// Tracking attribute carrying the instance path on its root element.
pub(crate) const PATH_ATTR: &str = "data-stasis-path";

/// Why an instance renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderCause {
	/// First render of a new instance.
	Mount,
	/// Its parent re-rendered, or a top-level pass reached it.
	Parent,
	Soft,
	Forced,
}

/// Child bookkeeping while one parent's output is walked.
struct ChildPass {
	parent: InstanceId,
	parent_path: ViewPath,
	/// Children of the previous render not matched yet.
	previous: SmallVec<[InstanceId; 4]>,
	next: SmallVec<[InstanceId; 4]>,
	ordinals: FxHashMap<(ViewName, String), u32>,
	keys: FxHashSet<PathKey>,
	depth: usize,
}

impl ChildPass {
	fn next_ordinal(&mut self, name: &ViewName, key: &str) -> String {
		let ordinal = self.ordinals.entry((name.clone(), key.to_string())).or_default();
		let index = format!("{ordinal:02}");
		*ordinal += 1;
		index
	}

	/// Claims a path key for this pass, suffixing repeated explicit indices.
	fn claim(&mut self, name: &ViewName, key: &str, index: String) -> (String, PathKey) {
		let mut candidate = index.clone();
		let mut attempt = 0u32;
		loop {
			let path_key = PathKey::new(Some(&self.parent_path), name, key, &candidate);
			if self.keys.insert(path_key.clone()) {
				if attempt > 0 {
					tracing::warn!(view = %name, key, index, "render.duplicate_key");
				}
				return (candidate, path_key);
			}
			attempt += 1;
			candidate = format!("{index}_{attempt}");
		}
	}
}

impl Runtime {
	/// Renders `id`, then any follow-up its scheduler state asks for.
	pub(crate) fn render_instance(&mut self, id: InstanceId, cause: RenderCause, depth: usize) {
		let mut cause = cause;
		let mut chain = 0;
		loop {
			self.render_once(id, cause, depth);
			let Some(inst) = self.instances.get_mut(id) else {
				return;
			};
			match self.scheduler.complete(inst, chain) {
				Some(forced) => {
					chain += 1;
					cause = if forced { RenderCause::Forced } else { RenderCause::Soft };
				}
				None => return,
			}
		}
	}

	fn render_once(&mut self, id: InstanceId, cause: RenderCause, depth: usize) {
		let epoch = self.epoch;
		let Some(inst) = self.instances.get_mut(id) else {
			return;
		};
		inst.flags.insert(InstanceFlags::RENDERING);
		match cause {
			RenderCause::Forced => {
				inst.forced_updates += 1;
				self.metrics.inc_update(true);
			}
			RenderCause::Soft => self.metrics.inc_update(false),
			RenderCause::Mount | RenderCause::Parent => {}
		}

		let slot = Arc::clone(&inst.slot);
		let definition = slot.load();
		let name = slot.name().clone();
		let path = inst.path.clone();
		let mut failure = None;

		if inst.needs_setup() {
			let generation = slot.generation();
			let mut cx = ViewCx::new(&name, &path, &inst.props, &mut inst.state);
			let result = ErrorRecoveryRenderer::guard(|| definition.body.setup(&mut cx));
			let effects = cx.into_effects();
			if let Some(paused) = effects.pause {
				inst.flags.set(InstanceFlags::PAUSED, paused);
			}
			match result {
				Ok(()) => {
					inst.setup_generation = generation;
					inst.flags.remove(InstanceFlags::RECOVERING);
				}
				Err(error) => {
					inst.flags.insert(InstanceFlags::RECOVERING);
					failure = Some((ErrorSite::Setup, error));
				}
			}
		}

		let mut effects = CxEffects::default();
		let result = match failure {
			Some(failure) => Err(failure),
			None => {
				let mut cx = ViewCx::new(&name, &path, &inst.props, &mut inst.state);
				let result = ErrorRecoveryRenderer::guard(|| definition.body.render(&mut cx));
				effects = cx.into_effects();
				result.map_err(|error| (ErrorSite::Render, error))
			}
		};
		inst.render_count += 1;
		self.metrics.inc_render();
		self.apply_effects(id, effects);

		let Some(inst) = self.instances.get_mut(id) else {
			return;
		};
		let previous = std::mem::take(&mut inst.children);

		let (output, children) = match result {
			Ok(node) => {
				let mut pass = ChildPass {
					parent: id,
					parent_path: path.clone(),
					previous,
					next: SmallVec::new(),
					ordinals: FxHashMap::default(),
					keys: FxHashSet::default(),
					depth,
				};
				let expanded = self.mount_children(node, &mut pass);
				for stale in pass.previous.drain(..) {
					self.unmount(stale);
				}
				let decorated = decorate(expanded, &name, &path);
				if !definition.is_placeholder() {
					let composed = self.compose(&decorated);
					self.registry.record_last_good(path.without_props(), composed);
				}
				(decorated, pass.next)
			}
			Err((site, error)) => {
				for stale in previous {
					self.unmount(stale);
				}
				(self.recover(&name, &path, site, &error), SmallVec::new())
			}
		};

		let Some(inst) = self.instances.get_mut(id) else {
			return;
		};
		inst.output = output;
		inst.children = children;
		inst.flags.insert(InstanceFlags::MOUNTED);
		inst.rendered_epoch = epoch;
		self.registry.track_mounted(&name, id);
		self.inspector.notify(&inst.path, &inst.props, &inst.state);
	}

	/// Accounts for a caught failure and returns the fallback output.
	fn recover(&mut self, name: &ViewName, path: &ViewPath, site: ErrorSite, error: &ViewError) -> RenderNode {
		let record = ErrorRecord::new(site, error.to_string())
			.with_view(name.as_str())
			.with_path(path.as_str());
		self.recovery.render_failed(record, &self.metrics, &mut self.bridge);
		self.recovery.fallback(name, error, self.registry.last_good(path.without_props()))
	}

	/// Applies pause changes and turns update requests into pending updates.
	fn apply_effects(&mut self, id: InstanceId, effects: CxEffects) {
		let Some(inst) = self.instances.get_mut(id) else {
			return;
		};
		if let Some(paused) = effects.pause {
			inst.flags.set(InstanceFlags::PAUSED, paused);
		}
		let requests = [(effects.forced, false), (effects.soft, true)];
		for (_, soft) in requests.into_iter().filter(|(requested, _)| *requested) {
			match self.scheduler.request(inst, soft) {
				UpdateDecision::Dropped => self.metrics.inc_dropped(),
				UpdateDecision::Deferred { coalesced } => {
					self.metrics.inc_deferred();
					if coalesced {
						self.metrics.inc_coalesced();
					}
				}
				UpdateDecision::Run { .. } => {}
			}
		}
	}

	/// Replaces view calls in `node` with mounted children.
	fn mount_children(&mut self, node: RenderNode, pass: &mut ChildPass) -> RenderNode {
		match node {
			RenderNode::View(call) => match self.mount_child(call, pass) {
				Some(instance) => RenderNode::Mount { instance },
				None => RenderNode::Empty,
			},
			RenderNode::Element(mut element) => {
				let children = std::mem::take(&mut element.children);
				element.children = children
					.into_iter()
					.map(|child| self.mount_children(child, pass))
					.collect();
				RenderNode::Element(element)
			}
			RenderNode::Fragment { children } => RenderNode::Fragment {
				children: children
					.into_iter()
					.map(|child| self.mount_children(child, pass))
					.collect(),
			},
			other => other,
		}
	}

	/// Reuses or creates the child instance for `call` and renders it.
	fn mount_child(&mut self, call: ViewCall, pass: &mut ChildPass) -> Option<InstanceId> {
		let ViewCall { name, key, index, props } = call;
		if pass.depth + 1 >= MAX_TREE_DEPTH {
			tracing::warn!(view = %name, depth = pass.depth, "render.depth_limit");
			return None;
		}
		let key = key.unwrap_or_else(|| self.config.default_key.clone());
		let index = match index {
			Some(index) => index,
			None => pass.next_ordinal(&name, &key),
		};
		let (index, path_key) = pass.claim(&name, &key, index);
		let slot = self.registry.resolve(&name).into_slot();
		let is_changed = self.registry.is_changed(&name);
		let depth = pass.depth + 1;

		let reused = pass
			.previous
			.iter()
			.position(|id| self.instances.get(*id).is_some_and(|child| child.key == path_key))
			.map(|pos| pass.previous.remove(pos));

		let id = match reused {
			Some(id) => {
				let path = self.full_pass.then(|| {
					self.paths
						.allocate(Some(&pass.parent_path), &name, &key, &index, &props, is_changed)
						.1
				});
				let inst = self.instances.get_mut(id)?;
				inst.props = props;
				inst.rebind(slot);
				let stale = inst.needs_setup();
				let skip = inst.is_paused() && !stale;
				if let Some(path) = path {
					self.move_instance(id, path);
				}
				if skip {
					tracing::trace!(%id, "render.paused_child");
				} else {
					let cause = if stale { RenderCause::Forced } else { RenderCause::Parent };
					self.render_instance(id, cause, depth);
				}
				id
			}
			None => {
				let (path_key, path) =
					self.paths
						.allocate(Some(&pass.parent_path), &name, &key, &index, &props, is_changed);
				let id = self.instances.insert(slot, path_key, path, Some(pass.parent), props);
				self.render_instance(id, RenderCause::Mount, depth);
				id
			}
		};
		pass.next.push(id);
		Some(id)
	}

	/// Moves an instance to a re-allocated path.
	pub(crate) fn move_instance(&mut self, id: InstanceId, path: ViewPath) {
		let Some(old) = self.instances.get(id).map(|inst| inst.path.clone()) else {
			return;
		};
		if old == path {
			return;
		}
		self.instances.set_path(id, path.clone());
		self.inspector.rekey(&old, &path);
		tracing::trace!(%id, %old, new = %path, "instance.moved");
	}

	/// Removes `id` and its subtree. Pending updates die with it.
	pub(crate) fn unmount(&mut self, id: InstanceId) {
		let Some(inst) = self.instances.get_mut(id) else {
			return;
		};
		let children = std::mem::take(&mut inst.children);
		for child in children {
			self.unmount(child);
		}
		let Some(inst) = self.instances.remove(id) else {
			return;
		};
		if let Some(parent) = inst.parent.and_then(|parent| self.instances.get_mut(parent)) {
			parent.children.retain(|child| *child != id);
		}
		self.registry.untrack_mounted(inst.name(), id);
		self.inspector.unregister(&inst.path);
		if self.root == Some(id) {
			self.root = None;
		}
		tracing::trace!(%id, path = %inst.path, "instance.unmount");
	}

	/// Expands [`RenderNode::Mount`] slots into the children's outputs.
	pub(crate) fn compose(&self, node: &RenderNode) -> RenderNode {
		match node {
			RenderNode::Mount { instance } => self
				.instances
				.get(*instance)
				.map(|child| self.compose(&child.output))
				.unwrap_or_default(),
			RenderNode::Element(element) => RenderNode::Element(Element {
				tag: element.tag.clone(),
				attrs: element.attrs.clone(),
				children: element.children.iter().map(|child| self.compose(child)).collect(),
			}),
			RenderNode::Fragment { children } => RenderNode::Fragment {
				children: children.iter().map(|child| self.compose(child)).collect(),
			},
			other => other.clone(),
		}
	}

	/// Instances in the subtree rooted at `id`, parents before children.
	pub fn subtree(&self, id: InstanceId) -> Vec<&Instance> {
		let mut out = Vec::new();
		let mut stack = vec![id];
		while let Some(next) = stack.pop() {
			if let Some(inst) = self.instances.get(next) {
				out.push(inst);
				stack.extend(inst.children.iter().rev().copied());
			}
		}
		out
	}
}

/// Marks a view's output: class and path on its root element, wrapping
/// anything that is not a single element.
fn decorate(node: RenderNode, name: &ViewName, path: &ViewPath) -> RenderNode {
	let mut element = match node {
		RenderNode::Element(element) => element,
		RenderNode::Empty => Element::new(name.wrapper_tag()),
		other => Element::new(name.wrapper_tag()).child(other),
	};
	element.prepend_class(&name.class_name());
	element.attrs.insert(PATH_ATTR.to_string(), path.to_string());
	element.into()
}
