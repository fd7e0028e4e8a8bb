use std::future::Future;
use std::pin::Pin;

/// Owned, sendable future, as queued by runtime preloaders.
pub type BoxFutureStatic<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
