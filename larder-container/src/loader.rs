//! Loaders: how an object is built and how it is torn down.
//!
//! A [`Loader<T>`] pairs a factory with an optional cleaner. The container
//! keeps loaders type-erased in the [`Registry`], one per identifier.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::container::Container;
use crate::dispose::Dispose;
use crate::error::{LarderError, Result};
use crate::id::AnyId;

/// Type-erased instance as stored in the container.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type SyncFactoryFn = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;
pub(crate) type AsyncFactoryFn = Arc<dyn Fn(Container) -> BoxFuture<'static, Result<Instance>> + Send + Sync>;
pub(crate) type CleanerFn = Arc<dyn Fn(AnyId, Instance) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Erased factory. Async factories can only run through `resolve`.
#[derive(Clone)]
pub(crate) enum Factory {
    Sync(SyncFactoryFn),
    Async(AsyncFactoryFn),
}

impl Factory {
    pub fn is_async(&self) -> bool {
        matches!(self, Factory::Async(_))
    }
}

/// Factory plus optional cleaner for objects of type `T`.
///
/// # Examples
/// ```
/// use larder_container::prelude::*;
/// use std::sync::Arc;
///
/// struct Pool { url: String }
///
/// let pool = ObjectId::<Pool>::new("pool");
/// let container = Container::new();
/// container.register_with(
///     &pool,
///     Loader::new(|_| Ok(Pool { url: "postgres://localhost".into() }))
///         .with_sync_cleaner(|pool: &Pool| println!("closing {}", pool.url)),
/// );
///
/// assert_eq!(container.get(&pool).unwrap().url, "postgres://localhost");
/// ```
pub struct Loader<T> {
    factory: Factory,
    cleaner: Option<CleanerFn>,
    _type: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Loader<T> {
    /// Loader with a synchronous factory.
    pub fn new(factory: impl Fn(&Container) -> Result<T> + Send + Sync + 'static) -> Self {
        Self::from_factory(Factory::Sync(Arc::new(move |container: &Container| {
            Ok(Arc::new(factory(container)?) as Instance)
        })))
    }

    /// Loader with an asynchronous factory.
    ///
    /// The factory receives an owned handle to the container so the
    /// returned future may keep using it across `.await` points.
    pub fn from_async<F, Fut>(factory: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::from_factory(Factory::Async(Arc::new(move |container: Container| {
            factory(container).map(|result| result.map(|value| Arc::new(value) as Instance)).boxed()
        })))
    }

    fn from_factory(factory: Factory) -> Self {
        Self {
            factory,
            cleaner: None,
            _type: std::marker::PhantomData,
        }
    }

    /// Sets an asynchronous cleaner, replacing any previous one.
    ///
    /// The cleaner receives the resolved instance.
    pub fn with_cleaner<F, Fut>(mut self, cleaner: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.cleaner = Some(Arc::new(move |id: AnyId, instance: Instance| match instance.downcast::<T>() {
            Ok(value) => cleaner(value).boxed(),
            Err(_) => futures::future::ready(Err(LarderError::TypeMismatch {
                id,
                expected: type_name::<T>(),
            }))
            .boxed(),
        }));
        self
    }

    /// Sets a synchronous, infallible cleaner.
    pub fn with_sync_cleaner(self, cleaner: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.with_cleaner(move |value: Arc<T>| {
            cleaner(value.as_ref());
            futures::future::ready(Ok(()))
        })
    }

    pub(crate) fn erase(self) -> ErasedLoader {
        ErasedLoader {
            factory: self.factory,
            cleaner: self.cleaner,
        }
    }
}

impl<T: Dispose> Loader<T> {
    /// Loader whose cleaner calls [`Dispose::dispose`] on the instance.
    pub fn disposing(factory: impl Fn(&Container) -> Result<T> + Send + Sync + 'static) -> Self {
        Self::new(factory).with_dispose()
    }

    /// Async counterpart of [`Loader::disposing`].
    pub fn disposing_async<F, Fut>(factory: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::from_async(factory).with_dispose()
    }

    fn with_dispose(self) -> Self {
        self.with_cleaner(|value: Arc<T>| async move { value.dispose().await })
    }
}

impl<T> std::fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("type", &std::any::type_name::<T>())
            .field("async", &self.factory.is_async())
            .field("cleaner", &self.cleaner.is_some())
            .finish()
    }
}

/// Registration entry for a single identifier.
#[derive(Clone)]
pub(crate) struct ErasedLoader {
    pub factory: Factory,
    pub cleaner: Option<CleanerFn>,
}

/// Stores loaders keyed by identifier.
///
/// Registration order is remembered for "did you mean" hints.
#[derive(Default)]
pub(crate) struct Registry {
    loaders: HashMap<AnyId, ErasedLoader>,
    order: Vec<AnyId>,
}

impl Registry {
    /// Stores `loader` under `id`, returning the loader it replaced.
    pub fn register(&mut self, id: AnyId, loader: ErasedLoader) -> Option<ErasedLoader> {
        debug!(
            id = %id,
            is_async = loader.factory.is_async(),
            cleaner = loader.cleaner.is_some(),
            "Registered loader"
        );
        let replaced = self.loaders.insert(id, loader);
        match replaced {
            None => self.order.push(id),
            Some(_) => debug!(id = %id, "Replaced previous loader"),
        }
        replaced
    }

    pub fn get(&self, id: &AnyId) -> Option<&ErasedLoader> {
        self.loaders.get(id)
    }

    pub fn contains(&self, id: &AnyId) -> bool {
        self.loaders.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Registered identifiers, oldest first.
    pub fn ids(&self) -> &[AnyId] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ObjectId;

    fn dummy(value: i32) -> ErasedLoader {
        Loader::new(move |_| Ok(value)).erase()
    }

    #[test]
    fn register_and_get() {
        let mut reg = Registry::default();
        let id = ObjectId::<i32>::new("answer").any();
        assert!(reg.register(id, dummy(42)).is_none());
        assert!(reg.contains(&id));
        assert!(reg.get(&id).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reregister_overwrites_and_keeps_order() {
        let mut reg = Registry::default();
        let a = ObjectId::<i32>::new("a").any();
        let b = ObjectId::<i32>::new("b").any();
        let _ = reg.register(a, dummy(1));
        let _ = reg.register(b, dummy(2));
        assert!(reg.register(a, dummy(3)).is_some());

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.ids(), &[a, b]);

        let container = Container::new();
        let Factory::Sync(factory) = &reg.get(&a).unwrap().factory else {
            panic!("expected sync factory");
        };
        let value = factory(&container).unwrap().downcast::<i32>().unwrap();
        assert_eq!(*value, 3);
    }

    #[test]
    fn loader_flags() {
        let sync = Loader::<i32>::new(|_| Ok(1));
        assert!(!sync.factory.is_async());
        assert!(sync.cleaner.is_none());

        let with_cleaner = Loader::<i32>::from_async(|_| async { Ok(1) }).with_sync_cleaner(|_| {});
        assert!(with_cleaner.factory.is_async());
        assert!(with_cleaner.cleaner.is_some());
        assert!(format!("{with_cleaner:?}").contains("cleaner: true"));
    }

    #[test]
    fn cleaner_rejects_foreign_instance() {
        let id = ObjectId::<i32>::new("answer").any();
        let loader = Loader::<i32>::new(|_| Ok(1)).with_sync_cleaner(|_| {}).erase();
        let cleaner = loader.cleaner.unwrap();

        let foreign: Instance = Arc::new(String::from("not an i32"));
        match futures::executor::block_on(cleaner(id, foreign)) {
            Err(LarderError::TypeMismatch { id: failed, expected }) => {
                assert_eq!(failed, id);
                assert_eq!(expected, "i32");
            }
            other => panic!("Expected TypeMismatch, got: {other:?}"),
        }

        assert!(futures::executor::block_on(cleaner(id, Arc::new(7_i32))).is_ok());
    }
}
