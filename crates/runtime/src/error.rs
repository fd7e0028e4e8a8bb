//! Error types for the view runtime.

use std::path::PathBuf;

use stasis_primitives::{InstanceId, ViewName};
use thiserror::Error;

/// Failure raised by a view body, a file executor, or a preloader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
	/// The body returned an error.
	#[error("{0}")]
	Message(String),

	/// The body panicked; carries the panic payload text.
	#[error("panicked: {0}")]
	Panicked(String),

	/// The view name was already declared during the first load.
	#[error("view `{0}` is defined twice")]
	Duplicate(ViewName),
}

impl ViewError {
	/// Shorthand for [`ViewError::Message`].
	pub fn msg(message: impl Into<String>) -> Self {
		Self::Message(message.into())
	}
}

/// Errors that can occur when loading runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
}

/// Errors surfaced by [`crate::Runtime`] operations.
///
/// Render failures are deliberately absent: they are recovered at the
/// instance boundary and never reach callers.
#[derive(Debug, Error)]
pub enum RuntimeError {
	/// A view name was declared twice during the first load.
	#[error("view `{name}` defined twice while loading {file}")]
	DuplicateDefinition { name: ViewName, file: String },

	/// A file's declarations failed; previous definitions stay active.
	#[error("failed to execute {file}: {source}")]
	ReloadExecution {
		file: String,
		#[source]
		source: ViewError,
	},

	#[error(transparent)]
	Config(#[from] ConfigError),

	/// A preloader failed, so the first render did not run.
	#[error("preloader failed: {0}")]
	Preload(#[source] ViewError),

	/// No live instance has this id.
	#[error("unknown instance {0}")]
	UnknownInstance(InstanceId),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
