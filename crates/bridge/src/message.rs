use serde::{Deserialize, Serialize};

/// Outbound runtime event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum BridgeMessage {
	/// A top-level render pass completed.
	#[serde(rename = "render:done")]
	RenderDone,
	/// A source file began loading; clears stale error overlays.
	#[serde(rename = "runtime:success")]
	RuntimeSuccess { file: String },
	/// A failure was caught at a view or file boundary.
	#[serde(rename = "runtime:error")]
	RuntimeError { error: ErrorRecord },
}

impl BridgeMessage {
	/// Wire name of this event.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::RenderDone => "render:done",
			Self::RuntimeSuccess { .. } => "runtime:success",
			Self::RuntimeError { .. } => "runtime:error",
		}
	}
}

/// Where a caught failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSite {
	/// Instance construction.
	Setup,
	/// Tree production.
	Render,
	/// Executing a file's declarations.
	Reload,
	/// A view name declared twice during the first load.
	Duplicate,
}

/// One caught failure, as handed to error reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
	pub site: ErrorSite,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub view: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file: Option<String>,
}

impl ErrorRecord {
	pub fn new(site: ErrorSite, message: impl Into<String>) -> Self {
		Self {
			site,
			message: message.into(),
			view: None,
			path: None,
			file: None,
		}
	}

	pub fn with_view(mut self, view: impl Into<String>) -> Self {
		self.view = Some(view.into());
		self
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	pub fn with_file(mut self, file: impl Into<String>) -> Self {
		self.file = Some(file.into());
		self
	}
}

/// Wire envelope: the message fields plus a millisecond Unix timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	#[serde(flatten)]
	pub message: BridgeMessage,
	pub timestamp: i64,
}

impl Envelope {
	/// Stamps `message` with the current wall-clock time.
	pub fn now(message: BridgeMessage) -> Self {
		Self {
			message,
			timestamp: chrono::Utc::now().timestamp_millis(),
		}
	}

	/// JSON encoding sent to clients.
	pub fn encode(&self) -> crate::Result<String> {
		Ok(serde_json::to_string(self)?)
	}
}
