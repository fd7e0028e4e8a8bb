//! Body hash classification across reloads.

use rustc_hash::FxHashMap;
use stasis_primitives::{BodyHash, ViewName};

/// How a declared view compares with what was seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
	New,
	Unchanged,
	Changed,
}

impl ChangeKind {
	/// Whether instances of the view must re-render.
	pub fn is_change(self) -> bool {
		!matches!(self, Self::Unchanged)
	}
}

/// Remembers the last body hash of every view name.
#[derive(Debug, Default)]
pub struct ChangeDetector {
	hashes: FxHashMap<ViewName, BodyHash>,
}

impl ChangeDetector {
	pub fn new() -> Self {
		Self::default()
	}

	/// Classifies `hash` for `name`, recording it on `New` and `Changed`.
	pub fn classify(&mut self, name: &ViewName, hash: BodyHash) -> ChangeKind {
		match self.hashes.get(name) {
			Some(stored) if *stored == hash => ChangeKind::Unchanged,
			Some(_) => {
				self.hashes.insert(name.clone(), hash);
				ChangeKind::Changed
			}
			None => {
				self.hashes.insert(name.clone(), hash);
				ChangeKind::New
			}
		}
	}

	/// Classification `hash` would get, without recording anything.
	pub fn peek(&self, name: &ViewName, hash: BodyHash) -> ChangeKind {
		match self.hashes.get(name) {
			Some(stored) if *stored == hash => ChangeKind::Unchanged,
			Some(_) => ChangeKind::Changed,
			None => ChangeKind::New,
		}
	}

	pub fn stored(&self, name: &ViewName) -> Option<BodyHash> {
		self.hashes.get(name).copied()
	}

	/// Drops the stored hash, so the next declaration is `New` again.
	pub fn forget(&mut self, name: &ViewName) {
		self.hashes.remove(name);
	}

	pub fn clear(&mut self) {
		self.hashes.clear();
	}

	pub fn len(&self) -> usize {
		self.hashes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.hashes.is_empty()
	}
}

/// What one reload cycle did to a file's views.
///
/// `New` and `Changed` declarations both land in `changed`; `added` and
/// `removed` come from diffing the file's manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
	pub added: Vec<ViewName>,
	pub removed: Vec<ViewName>,
	pub changed: Vec<ViewName>,
	pub unchanged: Vec<ViewName>,
}

impl ChangeSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Files a classified declaration.
	pub fn record(&mut self, name: ViewName, kind: ChangeKind) {
		let bucket = if kind.is_change() { &mut self.changed } else { &mut self.unchanged };
		if !bucket.contains(&name) {
			bucket.push(name);
		}
	}

	/// Whether views were added or removed, which calls for a full render.
	pub fn is_structural(&self) -> bool {
		!self.added.is_empty() || !self.removed.is_empty()
	}

	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;
	use rstest::rstest;
	use stasis_primitives::hash_source;

	use super::*;

	#[rstest]
	#[case::first_sight(None, "a", ChangeKind::New)]
	#[case::same_body(Some("a"), "a", ChangeKind::Unchanged)]
	#[case::edited_body(Some("a"), "b", ChangeKind::Changed)]
	fn classify_cases(#[case] before: Option<&str>, #[case] now: &str, #[case] expected: ChangeKind) {
		let name = ViewName::new("Foo");
		let mut detector = ChangeDetector::new();
		if let Some(before) = before {
			detector.classify(&name, hash_source(before));
		}
		assert_eq!(detector.classify(&name, hash_source(now)), expected);
		assert_eq!(detector.stored(&name), Some(hash_source(now)));
	}

	#[test]
	fn forget_makes_name_new_again() {
		let name = ViewName::new("Foo");
		let mut detector = ChangeDetector::new();
		detector.classify(&name, hash_source("a"));
		detector.forget(&name);
		assert_eq!(detector.peek(&name, hash_source("a")), ChangeKind::New);
		assert!(detector.is_empty());
	}

	#[test]
	fn change_set_dedups_and_flags_structure() {
		let mut set = ChangeSet::new();
		set.record(ViewName::new("A"), ChangeKind::New);
		set.record(ViewName::new("A"), ChangeKind::Changed);
		set.record(ViewName::new("B"), ChangeKind::Unchanged);
		assert_eq!(set.changed, vec![ViewName::new("A")]);
		assert_eq!(set.unchanged, vec![ViewName::new("B")]);
		assert!(!set.is_structural());

		set.removed.push(ViewName::new("C"));
		assert!(set.is_structural());
	}

	proptest! {
		#[test]
		fn second_classify_with_same_hash_is_unchanged(bodies in proptest::collection::vec("[a-z<>/ ]{0,12}", 1..8)) {
			let name = ViewName::new("Foo");
			let mut detector = ChangeDetector::new();
			for body in &bodies {
				let hash = hash_source(body);
				let first = detector.classify(&name, hash);
				let stored = detector.stored(&name);
				prop_assert_eq!(detector.classify(&name, hash), ChangeKind::Unchanged);
				prop_assert_eq!(detector.stored(&name), stored);
				prop_assert!(first != ChangeKind::New || detector.len() == 1);
			}
		}
	}
}
