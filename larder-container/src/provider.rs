//! Provider trait: a module of related loader registrations.
//!
//! Providers group the loaders of one feature together, so an application
//! can assemble its container from independent modules.
//!
//! # Examples
//! ```rust
//! use larder_container::prelude::*;
//! use once_cell::sync::Lazy;
//!
//! struct Config { url: String }
//! struct Database { url: String }
//!
//! static CONFIG: Lazy<ObjectId<Config>> = Lazy::new(ObjectId::of);
//! static DATABASE: Lazy<ObjectId<Database>> = Lazy::new(ObjectId::of);
//!
//! struct StorageProvider;
//!
//! impl Provider for StorageProvider {
//!     fn register(&self, container: &Container) {
//!         container
//!             .register(&CONFIG, |_| Ok(Config { url: "postgres://localhost".into() }))
//!             .register(&DATABASE, |c| {
//!                 let config = c.get(&CONFIG)?;
//!                 Ok(Database { url: config.url.clone() })
//!             });
//!     }
//! }
//!
//! let container = Container::new();
//! container.add_provider(&StorageProvider);
//! assert_eq!(container.get(&DATABASE).unwrap().url, "postgres://localhost");
//! ```

use crate::container::Container;

/// A module that registers related loaders into a container.
pub trait Provider: Send + Sync {
    /// Register loaders into `container`.
    ///
    /// Called once per [`Container::add_provider`] call.
    fn register(&self, container: &Container);

    /// Optional: human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
