//! Per-file reload cycles.
//!
//! A reload executes the file's declarations against a [`FileScope`],
//! commits them to the registry, diffs the file's manifest, and then either
//! stops (first load), re-renders the whole tree (views added or removed),
//! or force-updates only the mounted instances of changed views.

use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use stasis_bridge::{BridgeMessage, ErrorRecord, ErrorSite};
use stasis_primitives::ViewName;

use crate::{ChangeSet, ErrorRecoveryRenderer, Result, Runtime, RuntimeError, ViewDecl, ViewError, ViewRegistry};

/// Whether declarations belong to the first load or a later reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
	/// Before the first top-level pass; redefinitions are fatal.
	Initial,
	/// Redefinitions replace the previous version.
	Reload,
}

/// What a reload did to the rendered tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
	/// Loaded before the first render; nothing re-rendered.
	FirstPass,
	/// Views were added or removed, or the file is new.
	FullRender,
	/// Instances of changed views were force-updated.
	Patched { updated: usize },
	/// Nothing to re-render.
	Unchanged,
}

/// Result of a successful [`Runtime::load_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
	pub file: String,
	pub changes: ChangeSet,
	pub outcome: ReloadOutcome,
}

/// Resolves module specifiers relative to the file being executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
	base: PathBuf,
}

impl Resolver {
	pub fn for_file(file: &str) -> Self {
		let base = Path::new(file).parent().map(Path::to_path_buf).unwrap_or_default();
		Self { base }
	}

	/// Folder the file lives in.
	pub fn base(&self) -> &Path {
		&self.base
	}

	/// Resolves `./` and `../` specifiers against the file's folder; other
	/// specifiers are returned unchanged.
	pub fn resolve(&self, specifier: &str) -> PathBuf {
		if !(specifier.starts_with("./") || specifier.starts_with("../")) {
			return PathBuf::from(specifier);
		}
		let mut out = PathBuf::new();
		for component in self.base.join(specifier).components() {
			match component {
				Component::CurDir => {}
				Component::ParentDir => {
					if !out.pop() {
						out.push("..");
					}
				}
				other => out.push(other.as_os_str()),
			}
		}
		out
	}
}

/// Declaration context handed to a file executor.
///
/// Declarations are staged here and reach the registry only when the
/// executor succeeds.
#[derive(Debug)]
pub struct FileScope<'a> {
	file: &'a str,
	phase: LoadPhase,
	registry: &'a ViewRegistry,
	resolver: Resolver,
	staged: IndexMap<ViewName, ViewDecl>,
	duplicates: Vec<ViewName>,
}

impl<'a> FileScope<'a> {
	pub(crate) fn new(file: &'a str, phase: LoadPhase, registry: &'a ViewRegistry) -> Self {
		Self {
			file,
			phase,
			registry,
			resolver: Resolver::for_file(file),
			staged: IndexMap::new(),
			duplicates: Vec::new(),
		}
	}

	/// Declares a view.
	///
	/// During the first load a name may be declared once, by one file; any
	/// further declaration fails with [`ViewError::Duplicate`], including
	/// those after the name was already marked as a duplicate. On reload the
	/// last declaration wins.
	pub fn define(&mut self, decl: ViewDecl) -> std::result::Result<(), ViewError> {
		let name = decl.name.clone();
		if self.phase == LoadPhase::Initial {
			let foreign = self.registry.owner_of(&name).is_some_and(|owner| owner != self.file);
			if foreign || self.registry.is_duplicate(&name) || self.staged.contains_key(&name) {
				if !self.duplicates.contains(&name) {
					self.duplicates.push(name.clone());
				}
				return Err(ViewError::Duplicate(name));
			}
		}
		self.staged.insert(name, decl);
		Ok(())
	}

	pub fn file(&self) -> &str {
		self.file
	}

	pub fn phase(&self) -> LoadPhase {
		self.phase
	}

	pub fn resolver(&self) -> &Resolver {
		&self.resolver
	}

	/// Whether `name` is declared in this cycle or already registered.
	pub fn is_defined(&self, name: &ViewName) -> bool {
		self.staged.contains_key(name) || self.registry.is_defined(name)
	}

	fn finish(self) -> (IndexMap<ViewName, ViewDecl>, Vec<ViewName>) {
		(self.staged, self.duplicates)
	}
}

impl Runtime {
	/// Executes one source file's declarations and reconciles the tree.
	///
	/// Call once per file at initial load and again on every change to it.
	pub fn load_file<F>(&mut self, file: &str, executor: F) -> Result<ReloadReport>
	where
		F: FnOnce(&mut FileScope<'_>) -> std::result::Result<(), ViewError>,
	{
		let phase = if self.scheduler.is_first_pass() { LoadPhase::Initial } else { LoadPhase::Reload };
		self.metrics.reset_caught_errors();
		self.bridge.emit(BridgeMessage::RuntimeSuccess { file: file.to_string() });

		let known = self.registry.knows_file(file);
		let previous = self.registry.manifest_for(file).map(<[ViewName]>::to_vec).unwrap_or_default();

		let mut scope = FileScope::new(file, phase, &self.registry);
		let executed = ErrorRecoveryRenderer::guard(|| executor(&mut scope));
		let (mut staged, duplicates) = scope.finish();

		if duplicates.is_empty()
			&& let Err(source) = executed
		{
			tracing::error!(file, error = %source, "reload.failed");
			let record = ErrorRecord::new(ErrorSite::Reload, source.to_string()).with_file(file);
			self.recovery.report(record, &mut self.bridge);
			return Err(RuntimeError::ReloadExecution {
				file: file.to_string(),
				source,
			});
		}

		let declared: Vec<ViewName> = staged.keys().cloned().collect();
		for name in &duplicates {
			staged.shift_remove(name);
		}

		let mut changes = ChangeSet::new();
		for (_, decl) in staged {
			self.registry.define(decl, file, &mut changes);
		}
		changes.added = declared.iter().filter(|name| !previous.contains(name)).cloned().collect();
		changes.removed = previous.iter().filter(|name| !declared.contains(name)).cloned().collect();
		for name in &changes.removed {
			if self.registry.owner_of(name).is_none_or(|owner| owner == file) {
				self.remove_view(name);
			}
		}
		self.registry.record_manifest(file, declared.clone());
		let dirty = self.registry.take_file_dirty(file);

		if let Some(first) = duplicates.first() {
			for name in &duplicates {
				self.registry.install_duplicate(name);
				let record = ErrorRecord::new(ErrorSite::Duplicate, ViewError::Duplicate(name.clone()).to_string())
					.with_view(name.as_str())
					.with_file(file);
				self.recovery.report(record, &mut self.bridge);
			}
			return Err(RuntimeError::DuplicateDefinition {
				name: first.clone(),
				file: file.to_string(),
			});
		}

		tracing::debug!(
			file,
			?phase,
			added = changes.added.len(),
			removed = changes.removed.len(),
			changed = changes.changed.len(),
			dirty,
			"reload.diff"
		);

		let outcome = if phase == LoadPhase::Initial {
			ReloadOutcome::FirstPass
		} else if !known || changes.is_structural() {
			self.run();
			ReloadOutcome::FullRender
		} else {
			let targets = if changes.changed.is_empty() && dirty { declared } else { changes.changed.clone() };
			if targets.is_empty() {
				ReloadOutcome::Unchanged
			} else {
				let updated = self.patch(&targets);
				self.registry.clear_changed();
				if updated > 0 {
					self.commit();
					self.bridge.emit(BridgeMessage::RenderDone);
				}
				ReloadOutcome::Patched { updated }
			}
		};

		Ok(ReloadReport {
			file: file.to_string(),
			changes,
			outcome,
		})
	}

	/// Removes every view `file` declared and forgets its manifest, without
	/// re-rendering.
	pub fn remove_file(&mut self, file: &str) -> Vec<ViewName> {
		let names = self.registry.forget_manifest(file).unwrap_or_default();
		for name in &names {
			if self.registry.owner_of(name).is_none_or(|owner| owner == file) {
				self.remove_view(name);
			}
		}
		self.registry.take_file_dirty(file);
		tracing::debug!(file, removed = names.len(), "reload.remove_file");
		names
	}

	/// Removes the file's views, then re-renders the whole tree.
	pub fn delete_file(&mut self, file: &str) -> Vec<ViewName> {
		let names = self.remove_file(file);
		if !self.scheduler.is_first_pass() {
			self.run();
		}
		names
	}

	/// Flags `file` as changed outside any tracked view body.
	///
	/// If its next reload classifies no view as changed, every view the
	/// file declares is updated anyway.
	pub fn mark_file_dirty(&mut self, file: &str) {
		self.registry.mark_file_dirty(file);
	}

	/// Deletes a view and unmounts its instances.
	fn remove_view(&mut self, name: &ViewName) {
		for id in self.registry.remove(name) {
			self.unmount(id);
		}
	}

	/// Force-updates the mounted instances of `names`; returns how many ran.
	fn patch(&mut self, names: &[ViewName]) -> usize {
		self.epoch += 1;
		let epoch = self.epoch;
		let mut updated = 0;
		for name in names {
			for id in self.registry.mounted(name).to_vec() {
				let Some(inst) = self.instances.get(id) else {
					continue;
				};
				if inst.rendered_epoch == epoch {
					continue;
				}
				if self.schedule(id, false).is_ok() {
					updated += 1;
				}
			}
			let instances = &self.instances;
			self.registry.retain_mounted(name, |id| instances.contains(id));
		}
		tracing::debug!(views = names.len(), updated, "reload.patch");
		updated
	}
}
