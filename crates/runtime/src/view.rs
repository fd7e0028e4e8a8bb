//! View bodies, declarations, and the context handed to them.

use std::fmt;
use std::sync::Arc;

use stasis_primitives::{BodyHash, Props, RenderNode, State, Value, ViewName, ViewPath, hash_source};

use crate::ViewError;
pub use crate::placeholder::Placeholder;

/// How a view was written. Informational; every kind renders the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewKind {
	#[default]
	Function,
	Class,
	Declarative,
}

/// Implementation of a view.
///
/// `setup` runs when an instance is created and again whenever the slot's
/// definition is swapped; `render` produces the instance's output. Either may
/// fail by returning `Err` or by panicking.
pub trait ViewBody: Send + Sync {
	fn setup(&self, cx: &mut ViewCx<'_>) -> Result<(), ViewError> {
		let _ = cx;
		Ok(())
	}

	fn render(&self, cx: &mut ViewCx<'_>) -> Result<RenderNode, ViewError>;
}

type SetupFn = dyn Fn(&mut ViewCx<'_>) -> Result<(), ViewError> + Send + Sync;

/// [`ViewBody`] built from closures. See [`view_fn`].
pub struct ViewFn<R> {
	render: R,
	setup: Option<Box<SetupFn>>,
}

/// Wraps a render closure as a view body.
pub fn view_fn<R>(render: R) -> ViewFn<R>
where
	R: Fn(&mut ViewCx<'_>) -> Result<RenderNode, ViewError> + Send + Sync + 'static,
{
	ViewFn { render, setup: None }
}

impl<R> ViewFn<R> {
	/// Adds a construction step.
	pub fn with_setup(mut self, setup: impl Fn(&mut ViewCx<'_>) -> Result<(), ViewError> + Send + Sync + 'static) -> Self {
		self.setup = Some(Box::new(setup));
		self
	}
}

impl<R> ViewBody for ViewFn<R>
where
	R: Fn(&mut ViewCx<'_>) -> Result<RenderNode, ViewError> + Send + Sync,
{
	fn setup(&self, cx: &mut ViewCx<'_>) -> Result<(), ViewError> {
		match &self.setup {
			Some(setup) => setup(cx),
			None => Ok(()),
		}
	}

	fn render(&self, cx: &mut ViewCx<'_>) -> Result<RenderNode, ViewError> {
		(self.render)(cx)
	}
}

/// Side effects a body requested through its [`ViewCx`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CxEffects {
	pub soft: bool,
	pub forced: bool,
	/// `Some(true)` to pause, `Some(false)` to resume.
	pub pause: Option<bool>,
}

/// Instance context passed to [`ViewBody::setup`] and [`ViewBody::render`].
pub struct ViewCx<'a> {
	name: &'a ViewName,
	path: &'a ViewPath,
	props: &'a Props,
	state: &'a mut State,
	effects: CxEffects,
}

impl<'a> ViewCx<'a> {
	pub(crate) fn new(name: &'a ViewName, path: &'a ViewPath, props: &'a Props, state: &'a mut State) -> Self {
		Self {
			name,
			path,
			props,
			state,
			effects: CxEffects::default(),
		}
	}

	pub(crate) fn into_effects(self) -> CxEffects {
		self.effects
	}

	pub fn name(&self) -> &ViewName {
		self.name
	}

	pub fn path(&self) -> &ViewPath {
		self.path
	}

	pub fn props(&self) -> &Props {
		self.props
	}

	pub fn prop(&self, key: &str) -> Option<&Value> {
		self.props.get(key)
	}

	pub fn state(&self) -> &State {
		self.state
	}

	/// Seeds a state entry unless it already exists.
	///
	/// Setup re-runs after a reload; seeding this way keeps the live value.
	pub fn init_state(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.state.entry(key.into()).or_insert_with(|| value.into());
	}

	/// Writes a state entry and requests a soft update.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.state.insert(key.into(), value.into());
		self.effects.soft = true;
	}

	/// Requests a forced update of this instance.
	pub fn update(&mut self) {
		self.effects.forced = true;
	}

	/// Stops soft updates from reaching this instance.
	pub fn pause(&mut self) {
		self.effects.pause = Some(true);
	}

	pub fn resume(&mut self) {
		self.effects.pause = Some(false);
	}
}

/// A view as declared by a file executor.
#[derive(Clone)]
pub struct ViewDecl {
	pub name: ViewName,
	pub kind: ViewKind,
	/// Body source text; only its hash is kept.
	pub source: String,
	pub body: Arc<dyn ViewBody>,
}

impl ViewDecl {
	pub fn new(name: impl Into<ViewName>, source: impl Into<String>, body: impl ViewBody + 'static) -> Self {
		Self {
			name: name.into(),
			kind: ViewKind::default(),
			source: source.into(),
			body: Arc::new(body),
		}
	}

	pub fn kind(mut self, kind: ViewKind) -> Self {
		self.kind = kind;
		self
	}

	pub fn body_hash(&self) -> BodyHash {
		hash_source(&self.source)
	}
}

impl fmt::Debug for ViewDecl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ViewDecl")
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("body_hash", &self.body_hash())
			.finish_non_exhaustive()
	}
}

/// A registered, immutable view definition.
#[derive(Clone)]
pub struct ViewDefinition {
	pub name: ViewName,
	pub body_hash: BodyHash,
	/// File that declared it; `None` for placeholders.
	pub source_file: Option<String>,
	pub kind: ViewKind,
	pub body: Arc<dyn ViewBody>,
	placeholder: Option<Placeholder>,
}

impl ViewDefinition {
	pub fn from_decl(decl: ViewDecl, file: &str) -> Self {
		Self {
			body_hash: decl.body_hash(),
			name: decl.name,
			source_file: Some(file.to_string()),
			kind: decl.kind,
			body: decl.body,
			placeholder: None,
		}
	}

	/// Definition rendering a built-in placeholder under `name`.
	pub fn placeholder(name: ViewName, placeholder: Placeholder) -> Self {
		Self {
			body_hash: hash_source(&placeholder.to_string()),
			name,
			source_file: None,
			kind: ViewKind::Declarative,
			body: Arc::new(placeholder.clone()),
			placeholder: Some(placeholder),
		}
	}

	pub fn as_placeholder(&self) -> Option<&Placeholder> {
		self.placeholder.as_ref()
	}

	pub fn is_placeholder(&self) -> bool {
		self.placeholder.is_some()
	}
}

impl fmt::Debug for ViewDefinition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ViewDefinition")
			.field("name", &self.name)
			.field("body_hash", &self.body_hash)
			.field("source_file", &self.source_file)
			.field("kind", &self.kind)
			.field("placeholder", &self.placeholder)
			.finish_non_exhaustive()
	}
}
