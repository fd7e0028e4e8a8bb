use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ViewName;

/// Logical tree position of a view instance, independent of its props.
///
/// Shape: `parentPath + sep + name + "-" + key + "/" + index`, where `sep` is
/// empty at the root and [`PathKey::SEPARATOR`] below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
	/// Delimiter between ancestor levels.
	pub const SEPARATOR: char = ',';

	/// Builds the key for `name` rendered under `parent` (`None` at the root).
	pub fn new(parent: Option<&ViewPath>, name: &ViewName, key: &str, index: &str) -> Self {
		let mut out = String::new();
		if let Some(parent) = parent {
			out.push_str(parent.as_str());
			out.push(Self::SEPARATOR);
		}
		out.push_str(name.as_str());
		out.push('-');
		out.push_str(key);
		out.push('/');
		out.push_str(index);
		Self(out)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PathKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Full identity of a view instance: its [`PathKey`] plus a props hash segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewPath(String);

impl ViewPath {
	/// Appends the props hash to a path key.
	pub fn from_key(key: &PathKey, props_hash: &str) -> Self {
		Self(format!("{}.{props_hash}", key.as_str()))
	}

	/// Wraps an already-formed path string.
	pub fn from_raw(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The path with its trailing `.<props hash>` segment removed.
	///
	/// Used to find renders across prop changes of the same tree position.
	pub fn without_props(&self) -> &str {
		strip_props_segment(&self.0)
	}

	/// Name of the view at the deepest level of this path.
	pub fn view_name(&self) -> &str {
		let last = self.0.rsplit(PathKey::SEPARATOR).next().unwrap_or(&self.0);
		last.split('-').next().unwrap_or(last)
	}

	/// Number of view levels from the root down to this instance.
	pub fn depth(&self) -> usize {
		self.0.matches(PathKey::SEPARATOR).count() + 1
	}
}

impl fmt::Display for ViewPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

fn strip_props_segment(path: &str) -> &str {
	match path.rsplit_once('.') {
		Some((head, tail))
			if !tail.is_empty()
				&& tail
					.bytes()
					.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') =>
		{
			head
		}
		_ => path,
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn root_key_has_no_separator() {
		let key = PathKey::new(None, &ViewName::new("Main"), "00", "00");
		assert_eq!(key.as_str(), "Main-00/00");
	}

	#[test]
	fn nested_key_extends_parent_path() {
		let parent = ViewPath::from_raw("Main-00/00.1f");
		let key = PathKey::new(Some(&parent), &ViewName::new("Sidebar"), "nav", "02");
		assert_eq!(key.as_str(), "Main-00/00.1f,Sidebar-nav/02");
	}

	#[test]
	fn without_props_strips_only_the_hash_segment() {
		let path = ViewPath::from_raw("Main-00/00.ab12,Inspector.View-00/01.9e");
		assert_eq!(path.without_props(), "Main-00/00.ab12,Inspector.View-00/01");

		let bare = ViewPath::from_raw("Inspector.View-00/00");
		assert_eq!(bare.without_props(), "Inspector.View-00/00");
	}

	#[test]
	fn view_name_reads_deepest_level() {
		let path = ViewPath::from_raw("Main-00/00.ab,Inspector.View-00/00.9e");
		assert_eq!(path.view_name(), "Inspector.View");
		assert_eq!(path.depth(), 2);
	}

	proptest! {
		#[test]
		fn strip_round_trips_from_key(name in "[A-Z][a-zA-Z]{0,8}", key in "[a-z0-9]{1,4}", hash in "[0-9a-f]{1,16}") {
			let key = PathKey::new(None, &ViewName::new(&name), &key, "00");
			let path = ViewPath::from_key(&key, &hash);
			prop_assert_eq!(path.without_props(), key.as_str());
			prop_assert_eq!(path.view_name(), name.as_str());
		}
	}
}
