use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::Props;

/// Hashes any `Hash` value with FxHash.
///
/// FxHash has no per-process random seed, so the result is stable across runs
/// of the same build. Good enough for session-scoped identity, not for
/// anything adversarial.
pub fn content_hash<T: Hash + ?Sized>(value: &T) -> u64 {
	let mut hasher = FxHasher::default();
	value.hash(&mut hasher);
	hasher.finish()
}

/// Hash of a props snapshot, rendered as lowercase hex.
///
/// Props maps are sorted, so two equal snapshots always hash the same.
pub fn hash_props(props: &Props) -> String {
	let encoded = serde_json::to_string(props).unwrap_or_default();
	format!("{:x}", content_hash(encoded.as_str()))
}

/// Hash of a view body's source text.
pub fn hash_source(source: &str) -> BodyHash {
	BodyHash(content_hash(source))
}

/// Content hash of a view body, compared across reloads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyHash(pub u64);

impl fmt::Debug for BodyHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "BodyHash({:016x})", self.0)
	}
}

impl fmt::Display for BodyHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:x}", self.0)
	}
}
