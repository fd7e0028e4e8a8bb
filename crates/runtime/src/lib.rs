//! View identity and reconciliation runtime.
//!
//! Keeps a tree of declarative views alive across partial reloads of their
//! source: every mounted instance gets a deterministic path, view bodies are
//! classified as new/unchanged/changed by content hash, instances address a
//! long-lived [`ViewSlot`] whose implementation is swapped in place, updates
//! are serialized and coalesced per instance, and a failing render shows the
//! last good output instead of tearing the tree down.
//!
//! # Mental model
//!
//! * A source file is executed through [`Runtime::load_file`]; the executor
//!   declares views on a [`FileScope`]. Declarations are committed together.
//! * [`Runtime::run`] is one top-level render pass from the entry view.
//! * After the first pass, reloading a file patches only the instances of
//!   changed views, or re-renders everything when views were added/removed.
//!
//! # Concurrency
//!
//! The runtime is a single-writer context object: every mutation goes
//! through `&mut Runtime`. Hosts that reload from another thread wrap it in a
//! mutex or drive it from one actor.

mod change;
mod clock;
mod config;
mod error;
mod inspect;
mod instance;
mod metrics;
mod path;
mod placeholder;
mod reconcile;
mod recovery;
mod registry;
mod runtime;
mod scheduler;
mod view;

pub use change::{ChangeDetector, ChangeKind, ChangeSet};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RuntimeConfig;
pub use error::{ConfigError, Result, RuntimeError, ViewError};
pub use inspect::{InspectCallback, Inspector, StateWrite, WriteBack};
pub use instance::{Instance, InstanceFlags, Lifecycle};
pub use metrics::RuntimeMetrics;
pub use path::PathAllocator;
pub use reconcile::{FileScope, LoadPhase, ReloadOutcome, ReloadReport, Resolver};
pub use recovery::{DiagnosticLog, ErrorRecoveryRenderer, ErrorReporter, TracingReporter};
pub use registry::{Resolution, ViewRegistry, ViewSlot};
pub use runtime::{MemoryTarget, NullTarget, RenderTarget, Runtime};
pub use scheduler::{UpdateDecision, UpdateScheduler};
pub use stasis_bridge::{Bridge, BridgeMessage, ErrorRecord, ErrorSite};
pub use stasis_primitives::{
	InstanceId, PathKey, Props, RenderNode, State, Value, ViewCall, ViewName, ViewPath,
};
pub use view::{Placeholder, ViewBody, ViewCx, ViewDecl, ViewDefinition, ViewFn, ViewKind, view_fn};
