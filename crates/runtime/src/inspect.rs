//! Dev-tools inspection of live instances.
//!
//! A collaborator registers a callback for a path and receives the
//! instance's props and state after every render, together with a
//! [`WriteBack`] handle. Writes are queued and applied by
//! [`crate::Runtime::apply_inspector_writes`].

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use stasis_primitives::{Props, State, Value, ViewPath};

use crate::ErrorRecoveryRenderer;

/// Called after each render of the inspected instance.
pub type InspectCallback = Box<dyn FnMut(&Props, &State, &WriteBack) + Send>;

/// A queued state write.
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
	pub path: ViewPath,
	pub key: String,
	pub value: Value,
}

/// Queues state writes for one inspected path.
#[derive(Debug, Clone)]
pub struct WriteBack {
	path: ViewPath,
	sink: Arc<Mutex<Vec<StateWrite>>>,
}

impl WriteBack {
	pub fn path(&self) -> &ViewPath {
		&self.path
	}

	/// Queues `key = value` for the inspected instance.
	pub fn write(&self, key: impl Into<String>, value: impl Into<Value>) {
		self.sink.lock().push(StateWrite {
			path: self.path.clone(),
			key: key.into(),
			value: value.into(),
		});
	}
}

/// Registered inspection callbacks keyed by instance path.
#[derive(Default)]
pub struct Inspector {
	callbacks: FxHashMap<ViewPath, InspectCallback>,
	sink: Arc<Mutex<Vec<StateWrite>>>,
}

impl Inspector {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `callback` for `path`, replacing any previous one.
	pub fn register(&mut self, path: ViewPath, callback: InspectCallback) {
		self.callbacks.insert(path, callback);
	}

	pub fn unregister(&mut self, path: &ViewPath) -> bool {
		self.callbacks.remove(path).is_some()
	}

	pub fn is_registered(&self, path: &ViewPath) -> bool {
		self.callbacks.contains_key(path)
	}

	/// Follows an instance whose path was re-allocated.
	pub fn rekey(&mut self, old: &ViewPath, new: &ViewPath) {
		if old == new {
			return;
		}
		if let Some(callback) = self.callbacks.remove(old) {
			self.callbacks.insert(new.clone(), callback);
		}
	}

	/// Invokes the callback registered for `path`, if any. A panicking
	/// callback is logged and left registered.
	pub fn notify(&mut self, path: &ViewPath, props: &Props, state: &State) {
		let Some(callback) = self.callbacks.get_mut(path) else {
			return;
		};
		let write_back = WriteBack {
			path: path.clone(),
			sink: Arc::clone(&self.sink),
		};
		if let Err(error) = ErrorRecoveryRenderer::guard(|| {
			callback(props, state, &write_back);
			Ok(())
		}) {
			tracing::warn!(%path, %error, "inspector.callback panicked");
		}
	}

	/// Takes every queued write, oldest first.
	pub fn drain(&self) -> Vec<StateWrite> {
		std::mem::take(&mut *self.sink.lock())
	}

	pub fn clear(&mut self) {
		self.callbacks.clear();
		self.sink.lock().clear();
	}
}

impl std::fmt::Debug for Inspector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Inspector")
			.field("paths", &self.callbacks.keys().collect::<Vec<_>>())
			.field("queued", &self.sink.lock().len())
			.finish()
	}
}
