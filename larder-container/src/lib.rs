//! Core container implementation for Larder.

pub mod container;
pub mod dispose;
pub mod error;
pub mod id;
pub mod loader;
pub mod provider;

pub use container::prelude;
pub use container::{Awaited, Container, ContainerBuilder, ContainerSettings, FailurePolicy, Instances};
pub use dispose::Dispose;
pub use error::{LarderError, Result};
pub use id::{AnyId, ObjectId};
pub use loader::Loader;
pub use provider::Provider;
