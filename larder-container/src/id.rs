//! Object identifiers.
//!
//! An [`ObjectId<T>`] is an opaque token that names one lazily built
//! object and fixes its type. Two identifiers are equal only if one was
//! copied from the other: the description is for humans and never takes
//! part in comparisons.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use larder_support::rendering::shorten_type_name;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Short type names handed out by [`ObjectId::of`], leaked once per type.
static TYPE_DESCRIPTIONS: Lazy<Mutex<HashMap<TypeId, &'static str>>> = Lazy::new(Default::default);

/// Type-erased identifier.
///
/// Carries the same identity as the [`ObjectId`] it was erased from.
/// Used wherever identifiers of different types have to share a list,
/// e.g. [`Container::cleanup`](crate::Container::cleanup) or
/// [`Container::await_all`](crate::Container::await_all).
#[derive(Clone, Copy)]
pub struct AnyId {
    raw: u64,
    description: &'static str,
}

impl AnyId {
    /// Human-readable description given at creation.
    #[inline]
    pub fn description(&self) -> &'static str {
        self.description
    }
}

impl PartialEq for AnyId {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for AnyId {}

impl Hash for AnyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for AnyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyId({}#{})", self.description, self.raw)
    }
}

impl fmt::Display for AnyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description)
    }
}

/// Uniquely identifies an object in a [`Container`](crate::Container)
/// and binds it to the result type `T`.
///
/// # Examples
/// ```
/// use larder_container::id::ObjectId;
///
/// let a = ObjectId::<String>::new("greeting");
/// let b = ObjectId::<String>::new("greeting");
///
/// // Same description, different identity.
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
/// assert_eq!(a.to_string(), "greeting");
/// ```
///
/// Identifiers are usually kept in statics:
/// ```
/// use larder_container::id::ObjectId;
/// use once_cell::sync::Lazy;
///
/// struct Logger;
/// static LOGGER: Lazy<ObjectId<Logger>> = Lazy::new(ObjectId::of);
///
/// assert_eq!(LOGGER.description(), "Logger");
/// ```
pub struct ObjectId<T: ?Sized> {
    any: AnyId,
    _type: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> ObjectId<T> {
    /// Creates a fresh identifier with the given description.
    pub fn new(description: &'static str) -> Self {
        let raw = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            any: AnyId { raw, description },
            _type: PhantomData,
        }
    }

    /// Human-readable description.
    #[inline]
    pub fn description(&self) -> &'static str {
        self.any.description
    }

    /// Erases the result type.
    #[inline]
    pub fn any(&self) -> AnyId {
        self.any
    }
}

impl<T: ?Sized + 'static> ObjectId<T> {
    /// Creates a fresh identifier described by the short name of `T`.
    ///
    /// Each call still yields a distinct identifier; the description is
    /// shared by every identifier of the same type.
    pub fn of() -> Self {
        let description = *TYPE_DESCRIPTIONS
            .lock()
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::leak(shorten_type_name(type_name::<T>()).into_boxed_str()));
        Self::new(description)
    }
}

// Manual impls: derives would require `T: Clone` and friends.
impl<T: ?Sized> Clone for ObjectId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ObjectId<T> {}

impl<T: ?Sized> PartialEq for ObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.any == other.any
    }
}

impl<T: ?Sized> Eq for ObjectId<T> {}

impl<T: ?Sized> Hash for ObjectId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.any.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId<{}>({}#{})", type_name::<T>(), self.any.description, self.any.raw)
    }
}

impl<T: ?Sized> fmt::Display for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.any, f)
    }
}

impl<T: ?Sized> From<ObjectId<T>> for AnyId {
    fn from(id: ObjectId<T>) -> Self {
        id.any
    }
}

impl<T: ?Sized> From<&ObjectId<T>> for AnyId {
    fn from(id: &ObjectId<T>) -> Self {
        id.any
    }
}

impl From<&AnyId> for AnyId {
    fn from(id: &AnyId) -> Self {
        *id
    }
}
