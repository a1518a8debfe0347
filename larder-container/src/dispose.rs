//! Teardown trait for objects that know how to release their resources.

use crate::error::Result;

/// Asynchronous teardown for container-built objects.
///
/// Register with [`Loader::disposing`](crate::Loader::disposing) to run
/// `dispose` when the object is cleaned up.
///
/// # Examples
/// ```
/// use larder_container::prelude::*;
/// use async_trait::async_trait;
///
/// struct Connection;
///
/// #[async_trait]
/// impl Dispose for Connection {
///     async fn dispose(&self) -> larder_container::Result<()> {
///         // flush, close sockets, ...
///         Ok(())
///     }
/// }
///
/// let id = ObjectId::<Connection>::new("connection");
/// let container = Container::new();
/// container.register_with(&id, Loader::disposing(|_| Ok(Connection)));
/// ```
#[async_trait::async_trait]
pub trait Dispose: Send + Sync + 'static {
    /// Releases resources held by `self`.
    async fn dispose(&self) -> Result<()>;
}
