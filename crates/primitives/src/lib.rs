//! Value types for the stasis view runtime: names, instance ids, tree paths,
//! props/state maps, content hashes, and renderable nodes.

/// Boxed future alias for preload work.
pub mod future;
/// Deterministic content hashing for view bodies and props.
pub mod hash;
/// Identifier types for views and mounted instances.
pub mod ids;
/// Renderable node tree and markup serialization.
pub mod node;
/// Tree path identities (`PathKey`, `ViewPath`).
pub mod path;

pub use future::BoxFutureStatic;
pub use hash::{BodyHash, content_hash, hash_props, hash_source};
pub use ids::{InstanceId, ViewName};
pub use node::{Element, RenderNode, TRACKING_ATTR_PREFIX, ViewCall};
pub use path::{PathKey, ViewPath};

/// Input props handed to a view instance. Sorted, so serialization is stable.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// In-memory state of a view instance.
pub type State = serde_json::Map<String, serde_json::Value>;

pub use serde_json::Value;
