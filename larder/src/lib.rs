//! # Larder: a lazy IoC container for Rust
//!
//! Register a loader per identifier, ask for objects when you need them,
//! and tear them down in a known order when you are done.
//!
//! ```rust
//! use larder::prelude::*;
//!
//! let answer = ObjectId::<i32>::new("answer");
//! let container = Container::new();
//! container.register(&answer, |_| Ok(42));
//!
//! assert_eq!(*container.get(&answer).unwrap(), 42);
//! ```

pub use larder_container::*;
pub use larder_support::*;
