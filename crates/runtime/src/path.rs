//! Deterministic path assignment for view instances.

use rustc_hash::FxHashMap;
use stasis_primitives::{PathKey, Props, ViewName, ViewPath, hash_props};

/// Assigns [`ViewPath`]s and remembers them per [`PathKey`].
///
/// A view whose body has not changed keeps the path recorded for its tree
/// position, whatever its props are now. Otherwise the path is recomputed
/// from the current props and recorded.
#[derive(Debug, Default)]
pub struct PathAllocator {
	paths: FxHashMap<PathKey, ViewPath>,
}

impl PathAllocator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the key and path for `name` rendered under `parent`.
	pub fn allocate(
		&mut self,
		parent: Option<&ViewPath>,
		name: &ViewName,
		key: &str,
		index: &str,
		props: &Props,
		is_changed: bool,
	) -> (PathKey, ViewPath) {
		let path_key = PathKey::new(parent, name, key, index);
		if !is_changed && let Some(path) = self.paths.get(&path_key) {
			return (path_key, path.clone());
		}
		let path = ViewPath::from_key(&path_key, &hash_props(props));
		self.paths.insert(path_key.clone(), path.clone());
		(path_key, path)
	}

	pub fn get(&self, key: &PathKey) -> Option<&ViewPath> {
		self.paths.get(key)
	}

	pub fn forget(&mut self, key: &PathKey) {
		self.paths.remove(key);
	}

	pub fn clear(&mut self) {
		self.paths.clear();
	}

	pub fn len(&self) -> usize {
		self.paths.len()
	}

	pub fn is_empty(&self) -> bool {
		self.paths.is_empty()
	}
}
