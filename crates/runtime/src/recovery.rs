//! Failure isolation around view bodies.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use stasis_bridge::{Bridge, BridgeMessage, ErrorRecord};
use stasis_primitives::{RenderNode, ViewName};

use crate::{Clock, RuntimeMetrics, ViewError};

/// Receives every error record the runtime produces.
///
/// Reporting is fire-and-forget: a panic inside `report` is caught and
/// logged, never propagated into the runtime.
pub trait ErrorReporter: Send {
	fn report(&mut self, record: &ErrorRecord);
}

impl<F> ErrorReporter for F
where
	F: FnMut(&ErrorRecord) + Send,
{
	fn report(&mut self, record: &ErrorRecord) {
		self(record)
	}
}

/// Default reporter; forwards records to tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
	fn report(&mut self, record: &ErrorRecord) {
		tracing::debug!(
			site = ?record.site,
			view = record.view.as_deref(),
			path = record.path.as_deref(),
			message = %record.message,
			"report_error"
		);
	}
}

/// Per-key suppression window for diagnostics.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
	window: Duration,
	last_logged: FxHashMap<String, Duration>,
}

impl DiagnosticLog {
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			last_logged: FxHashMap::default(),
		}
	}

	/// Returns true when `key` has not been logged within the window ending
	/// at `now`, and starts a new window if so.
	pub fn should_log(&mut self, key: &str, now: Duration) -> bool {
		match self.last_logged.get(key) {
			Some(at) if now.saturating_sub(*at) < self.window => false,
			_ => {
				self.last_logged.insert(key.to_string(), now);
				true
			}
		}
	}

	pub fn clear(&mut self) {
		self.last_logged.clear();
	}
}

/// Catches render failures, reports them, and builds fallback output.
pub struct ErrorRecoveryRenderer {
	log: DiagnosticLog,
	clock: Arc<dyn Clock>,
	reporter: Box<dyn ErrorReporter>,
	overlay: bool,
	suppressed: u64,
}

impl ErrorRecoveryRenderer {
	pub fn new(window: Duration, overlay: bool, clock: Arc<dyn Clock>) -> Self {
		Self {
			log: DiagnosticLog::new(window),
			clock,
			reporter: Box::new(TracingReporter),
			overlay,
			suppressed: 0,
		}
	}

	pub fn set_reporter(&mut self, reporter: impl ErrorReporter + 'static) {
		self.reporter = Box::new(reporter);
	}

	/// Diagnostics skipped by the debounce window so far.
	pub fn suppressed(&self) -> u64 {
		self.suppressed
	}

	pub fn reset(&mut self) {
		self.log.clear();
		self.suppressed = 0;
	}

	/// Runs `f`, turning a panic into [`ViewError::Panicked`].
	pub fn guard<T>(f: impl FnOnce() -> Result<T, ViewError>) -> Result<T, ViewError> {
		match catch_unwind(AssertUnwindSafe(f)) {
			Ok(result) => result,
			Err(payload) => Err(ViewError::Panicked(panic_message(payload.as_ref()))),
		}
	}

	/// Forwards a record to the reporter and the bridge.
	///
	/// A panicking reporter is logged and otherwise ignored.
	pub fn report(&mut self, record: ErrorRecord, bridge: &mut Bridge) {
		let reporter = &mut self.reporter;
		if let Err(error) = Self::guard(|| {
			reporter.report(&record);
			Ok(())
		}) {
			tracing::warn!(%error, "report_error.panicked");
		}
		bridge.emit(BridgeMessage::RuntimeError { error: record });
	}

	/// Accounts for a caught render or setup failure.
	///
	/// The counter and the reporter see every failure; the warning is
	/// debounced per path.
	pub fn render_failed(&mut self, record: ErrorRecord, metrics: &RuntimeMetrics, bridge: &mut Bridge) {
		let total = metrics.inc_caught_error();
		let key = record.path.as_deref().unwrap_or_default();
		if self.log.should_log(key, self.clock.now()) {
			tracing::warn!(
				view = record.view.as_deref(),
				path = key,
				site = ?record.site,
				error = %record.message,
				total,
				"render.failed"
			);
		} else {
			self.suppressed += 1;
			tracing::trace!(path = key, "render.failed suppressed");
		}
		self.report(record, bridge);
	}

	/// Output shown in place of a failed render.
	///
	/// Replays `last_good` behind an error marker when there is one, or a
	/// minimal placeholder naming the view.
	pub fn fallback(&self, name: &ViewName, error: &ViewError, last_good: Option<&RenderNode>) -> RenderNode {
		let mut root = RenderNode::element("span")
			.attr("class", "stasisRecovered")
			.attr("style", "display: block; position: relative");
		match last_good {
			Some(render) => {
				if !self.overlay {
					root = root.child(
						RenderNode::element("span")
							.attr("class", "stasisError")
							.attr("title", error.to_string()),
					);
				}
				root = root.child(RenderNode::raw(render.to_markup_stripped()));
			}
			None => root = root.child(format!("Error in view {name}")),
		}
		root.into()
	}
}

impl std::fmt::Debug for ErrorRecoveryRenderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ErrorRecoveryRenderer")
			.field("log", &self.log)
			.field("overlay", &self.overlay)
			.field("suppressed", &self.suppressed)
			.finish_non_exhaustive()
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"non-string panic payload".to_string()
	}
}
