//! Runtime configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stasis_primitives::ViewName;

use crate::ConfigError;

/// Tunables for a [`crate::Runtime`].
///
/// Every field has a default, so a TOML file only lists what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
	/// Root view rendered by a top-level pass.
	pub entry: String,
	/// Per-path window during which repeated render failures log once.
	pub error_debounce_ms: u64,
	/// Follow-up renders allowed back to back from one completion chain.
	pub max_chained_updates: u32,
	/// Render error fallbacks without the visible marker (host is the dev tools).
	pub devtools_overlay: bool,
	/// Key used in path keys when a view call has none.
	pub default_key: String,
	/// Index used for the root, which has no siblings.
	pub default_index: String,
	/// Bridge messages kept while no dev-tools client is connected.
	pub bridge_max_queued: usize,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			entry: "Main".into(),
			error_debounce_ms: 500,
			max_chained_updates: 8,
			devtools_overlay: false,
			default_key: "00".into(),
			default_index: "00".into(),
			bridge_max_queued: stasis_bridge::DEFAULT_MAX_QUEUED,
		}
	}
}

impl RuntimeConfig {
	/// Parses a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	/// Reads and parses a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	pub fn error_debounce(&self) -> Duration {
		Duration::from_millis(self.error_debounce_ms)
	}

	pub fn entry_name(&self) -> ViewName {
		ViewName::new(&self.entry)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn partial_toml_keeps_defaults() {
		let config = RuntimeConfig::from_toml_str("entry = \"App\"\nerror_debounce_ms = 250\n").unwrap();
		assert_eq!(config.entry, "App");
		assert_eq!(config.error_debounce(), Duration::from_millis(250));
		assert_eq!(config.max_chained_updates, 8);
		assert_eq!(config.default_key, "00");
		assert_eq!(config.bridge_max_queued, stasis_bridge::DEFAULT_MAX_QUEUED);
	}

	#[test]
	fn load_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "devtools_overlay = true").unwrap();

		let config = RuntimeConfig::load(file.path()).unwrap();
		assert!(config.devtools_overlay);
		assert_eq!(config.entry_name(), ViewName::new("Main"));
	}

	#[test]
	fn load_reports_missing_file() {
		let err = RuntimeConfig::load("/nonexistent/stasis.toml").unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }));
	}

	#[test]
	fn rejects_wrong_types() {
		let err = RuntimeConfig::from_toml_str("max_chained_updates = \"many\"").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}
}
