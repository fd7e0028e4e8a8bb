//! Renderable node tree.
//!
//! View bodies produce [`RenderNode`]s. Child views appear as
//! [`RenderNode::View`] calls; the runtime resolves each call into a mounted
//! instance and replaces it with [`RenderNode::Mount`] in the stored output.
//! A fully composed tree contains neither variant and is what the external
//! renderer receives.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{InstanceId, Props, ViewName};

/// Attributes with this prefix track render bookkeeping (instance paths) and
/// are dropped when a render is serialized for replay.
pub const TRACKING_ATTR_PREFIX: &str = "data-stasis";

/// A node in a rendered view tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderNode {
	/// Renders nothing.
	#[default]
	Empty,
	/// Escaped text.
	Text { text: String },
	/// Pre-serialized markup inserted verbatim.
	Raw { markup: String },
	/// A host element.
	Element(Element),
	/// Several sibling nodes without a container.
	Fragment { children: Vec<RenderNode> },
	/// A child view occurrence, resolved by the runtime.
	View(ViewCall),
	/// A resolved child view slot.
	Mount { instance: InstanceId },
}

impl RenderNode {
	/// Text node.
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text { text: text.into() }
	}

	/// Verbatim markup node.
	pub fn raw(markup: impl Into<String>) -> Self {
		Self::Raw { markup: markup.into() }
	}

	/// Fragment node.
	pub fn fragment(children: impl IntoIterator<Item = RenderNode>) -> Self {
		Self::Fragment {
			children: children.into_iter().collect(),
		}
	}

	/// Starts an element builder.
	pub fn element(tag: impl Into<String>) -> Element {
		Element::new(tag)
	}

	/// Starts a child view call.
	pub fn view(name: impl Into<ViewName>) -> ViewCall {
		ViewCall::new(name)
	}

	/// Returns the element if this node is one.
	pub fn as_element(&self) -> Option<&Element> {
		match self {
			Self::Element(el) => Some(el),
			_ => None,
		}
	}

	/// Child nodes, for container variants.
	pub fn children(&self) -> &[RenderNode] {
		match self {
			Self::Element(el) => &el.children,
			Self::Fragment { children } => children,
			_ => &[],
		}
	}

	/// Mutable child nodes, for container variants.
	pub fn children_mut(&mut self) -> Option<&mut Vec<RenderNode>> {
		match self {
			Self::Element(el) => Some(&mut el.children),
			Self::Fragment { children } => Some(children),
			_ => None,
		}
	}

	/// Serializes the tree to HTML-like markup.
	pub fn to_markup(&self) -> String {
		let mut out = String::new();
		self.write_markup(&mut out, false);
		out
	}

	/// Serializes the tree, dropping [`TRACKING_ATTR_PREFIX`] attributes.
	pub fn to_markup_stripped(&self) -> String {
		let mut out = String::new();
		self.write_markup(&mut out, true);
		out
	}

	fn write_markup(&self, out: &mut String, strip_tracking: bool) {
		match self {
			Self::Empty => {}
			Self::Text { text } => escape_into(out, text),
			Self::Raw { markup } => out.push_str(markup),
			Self::Element(el) => {
				out.push('<');
				out.push_str(&el.tag);
				for (key, value) in &el.attrs {
					if strip_tracking && key.starts_with(TRACKING_ATTR_PREFIX) {
						continue;
					}
					out.push(' ');
					out.push_str(key);
					out.push_str("=\"");
					escape_into(out, value);
					out.push('"');
				}
				out.push('>');
				for child in &el.children {
					child.write_markup(out, strip_tracking);
				}
				out.push_str("</");
				out.push_str(&el.tag);
				out.push('>');
			}
			Self::Fragment { children } => {
				for child in children {
					child.write_markup(out, strip_tracking);
				}
			}
			Self::View(call) => {
				let _ = write!(out, "<!--view:{}-->", call.name);
			}
			Self::Mount { instance } => {
				let _ = write!(out, "<!--mount:{instance}-->");
			}
		}
	}
}

impl From<Element> for RenderNode {
	fn from(value: Element) -> Self {
		Self::Element(value)
	}
}

impl From<ViewCall> for RenderNode {
	fn from(value: ViewCall) -> Self {
		Self::View(value)
	}
}

impl From<&str> for RenderNode {
	fn from(value: &str) -> Self {
		Self::text(value)
	}
}

impl From<String> for RenderNode {
	fn from(value: String) -> Self {
		Self::text(value)
	}
}

/// Host element with sorted attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
	pub tag: String,
	pub attrs: BTreeMap<String, String>,
	pub children: Vec<RenderNode>,
}

impl Element {
	pub fn new(tag: impl Into<String>) -> Self {
		Self {
			tag: tag.into(),
			attrs: BTreeMap::new(),
			children: Vec::new(),
		}
	}

	/// Sets an attribute.
	pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.attrs.insert(key.into(), value.into());
		self
	}

	/// Appends a child node.
	pub fn child(mut self, child: impl Into<RenderNode>) -> Self {
		self.children.push(child.into());
		self
	}

	/// Appends several child nodes.
	pub fn children(mut self, children: impl IntoIterator<Item = RenderNode>) -> Self {
		self.children.extend(children);
		self
	}

	/// Prepends `class` to the element's class list.
	pub fn prepend_class(&mut self, class: &str) {
		let merged = match self.attrs.get("class") {
			Some(existing) if !existing.is_empty() => format!("{class} {existing}"),
			_ => class.to_string(),
		};
		self.attrs.insert("class".into(), merged);
	}

	/// Returns the class attribute, if any.
	pub fn class(&self) -> Option<&str> {
		self.attrs.get("class").map(String::as_str)
	}
}

/// A child view occurrence inside a render output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewCall {
	pub name: ViewName,
	/// Explicit instance key; defaults to the configured placeholder.
	pub key: Option<String>,
	/// Explicit repeat index; defaults to the sibling ordinal.
	pub index: Option<String>,
	pub props: Props,
}

impl ViewCall {
	pub fn new(name: impl Into<ViewName>) -> Self {
		Self {
			name: name.into(),
			key: None,
			index: None,
			props: Props::new(),
		}
	}

	pub fn key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}

	pub fn index(mut self, index: impl Into<String>) -> Self {
		self.index = Some(index.into());
		self
	}

	/// Sets one prop.
	pub fn prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.props.insert(key.into(), value.into());
		self
	}

	/// Replaces all props.
	pub fn props(mut self, props: Props) -> Self {
		self.props = props;
		self
	}
}

fn escape_into(out: &mut String, text: &str) {
	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(ch),
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn markup_escapes_text_and_attributes() {
		let node: RenderNode = RenderNode::element("p")
			.attr("title", "a \"b\"")
			.child("1 < 2 & 3")
			.into();

		assert_eq!(node.to_markup(), "<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3</p>");
	}

	#[test]
	fn stripped_markup_drops_tracking_attributes() {
		let node: RenderNode = RenderNode::element("span")
			.attr("class", "ViewFoo")
			.attr("data-stasis-path", "Foo-00/00.1")
			.child(RenderNode::raw("<b>x</b>"))
			.into();

		assert_eq!(
			node.to_markup(),
			"<span class=\"ViewFoo\" data-stasis-path=\"Foo-00/00.1\"><b>x</b></span>"
		);
		assert_eq!(node.to_markup_stripped(), "<span class=\"ViewFoo\"><b>x</b></span>");
	}

	#[test]
	fn prepend_class_keeps_existing_classes() {
		let mut el = Element::new("div").attr("class", "active");
		el.prepend_class("ViewSidebar");
		assert_eq!(el.class(), Some("ViewSidebar active"));

		let mut bare = Element::new("div");
		bare.prepend_class("ViewMain");
		assert_eq!(bare.class(), Some("ViewMain"));
	}

	#[test]
	fn fragments_serialize_children_in_order() {
		let node = RenderNode::fragment([RenderNode::text("a"), RenderNode::Empty, RenderNode::text("b")]);
		assert_eq!(node.to_markup(), "ab");
	}
}
