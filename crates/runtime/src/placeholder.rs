use std::fmt;

use stasis_primitives::{RenderNode, ViewName};

use crate::{ViewBody, ViewCx, ViewError};

/// Built-in bodies rendered where a real definition is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
	/// The name was declared twice during the first load.
	DefinedTwice(ViewName),
	/// No definition is registered under the name.
	NotFound(ViewName),
	/// The entry view is gone; replays the markup of its last good render.
	LastWorkingEntry { entry: ViewName, markup: String },
	/// The entry view is gone and was never rendered.
	MissingEntry(ViewName),
}

impl Placeholder {
	fn class(&self) -> &'static str {
		match self {
			Self::DefinedTwice(_) => "stasisDefinedTwice",
			Self::NotFound(_) => "stasisNotFound",
			Self::LastWorkingEntry { .. } => "stasisLastWorking",
			Self::MissingEntry(_) => "stasisMissingEntry",
		}
	}
}

impl fmt::Display for Placeholder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::DefinedTwice(name) => write!(f, "View {name} is defined twice"),
			Self::NotFound(name) => write!(f, "View {name} not found"),
			Self::LastWorkingEntry { entry, .. } => {
				write!(f, "Entry view {entry} is missing, showing its last working render")
			}
			Self::MissingEntry(entry) => write!(f, "Entry view {entry} is not defined"),
		}
	}
}

impl ViewBody for Placeholder {
	fn render(&self, _cx: &mut ViewCx<'_>) -> Result<RenderNode, ViewError> {
		let notice = RenderNode::element("span")
			.attr("class", "stasisNotice")
			.child(self.to_string());
		let mut root = RenderNode::element("div").attr("class", self.class()).child(notice);
		if let Self::LastWorkingEntry { markup, .. } = self {
			root = root.child(RenderNode::raw(markup.clone()));
		}
		Ok(root.into())
	}
}
