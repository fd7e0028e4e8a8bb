use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Globally unique name of a view definition (`Main`, `Sidebar`, `Inspector.View`).
///
/// Cheap to clone; the string is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewName(Arc<str>);

impl ViewName {
	/// Creates a view name.
	pub fn new(name: impl AsRef<str>) -> Self {
		Self(Arc::from(name.as_ref()))
	}

	/// Returns the name as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Name with namespace dots replaced, usable inside class names.
	pub fn clean(&self) -> String {
		self.0.replace('.', "-")
	}

	/// CSS class attached to every root element this view renders.
	pub fn class_name(&self) -> String {
		format!("View{}", self.clean())
	}

	/// Tag used when a view's output must be wrapped in an element.
	pub fn wrapper_tag(&self) -> String {
		self.0.to_lowercase()
	}
}

impl fmt::Debug for ViewName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for ViewName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for ViewName {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for ViewName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ViewName {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for ViewName {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

impl PartialEq<str> for ViewName {
	fn eq(&self, other: &str) -> bool {
		&*self.0 == other
	}
}

impl PartialEq<&str> for ViewName {
	fn eq(&self, other: &&str) -> bool {
		&*self.0 == *other
	}
}

/// Handle to one mounted view instance.
///
/// `slot` indexes the runtime's instance slab; `serial` is never reused, so a
/// handle held past unmount cannot address the instance that later takes over
/// the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId {
	slot: u32,
	serial: u32,
}

impl InstanceId {
	/// Creates an id from a slab slot and a unique serial.
	pub const fn new(slot: usize, serial: u32) -> Self {
		Self {
			slot: slot as u32,
			serial,
		}
	}

	/// Slab slot.
	pub const fn slot(self) -> usize {
		self.slot as usize
	}

	/// Allocation serial.
	pub const fn serial(self) -> u32 {
		self.serial
	}
}

impl fmt::Display for InstanceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}:{}", self.slot, self.serial)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn view_name_serializes_as_plain_string() {
		let name = ViewName::new("Inspector.View");
		let encoded = serde_json::to_string(&name).unwrap();
		assert_eq!(encoded, "\"Inspector.View\"");

		let decoded: ViewName = serde_json::from_str(&encoded).unwrap();
		assert_eq!(decoded, name);
		assert_eq!(decoded.class_name(), "ViewInspector-View");
	}
}
