//! # The Container: heart of Larder
//!
//! Maps identifiers to lazily built, memoized instances.
//!
//! # Slot lifecycle
//! ```text
//!             get / resolve                factory Ok
//!   Absent ─────────────────> Pending ─────────────────> Resolved
//!     ▲                          │                           │
//!     └──── factory Err ─────────┘                           │
//!     │     (FailurePolicy::Revert)                          │
//!     └──────────────────────── cleanup ─────────────────────┘
//! ```
//!
//! A second request for an identifier while it is Pending is reported as
//! [`LarderError::CycleDetected`]; cleaning up a Pending identifier is
//! reported as [`LarderError::CleanupDuringConstruction`].
//!
//! # Examples
//! ```rust
//! use larder_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Config { url: String }
//! struct Database { url: String }
//!
//! let config = ObjectId::<Config>::new("config");
//! let database = ObjectId::<Database>::new("database");
//!
//! let container = Container::new();
//! container
//!     .register(&config, |_| Ok(Config { url: "postgres://localhost".into() }))
//!     .register(&database, move |c| {
//!         let config = c.get(&config)?;
//!         Ok(Database { url: config.url.clone() })
//!     });
//!
//! let db = container.get(&database).expect("Failed to resolve");
//! assert_eq!(db.url, "postgres://localhost");
//!
//! // memoized
//! assert!(Arc::ptr_eq(&db, &container.get(&database).unwrap()));
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use larder_support::rendering::suggest_similar;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{LarderError, Result};
use crate::id::{AnyId, ObjectId};
use crate::loader::{Factory, Instance, Loader, Registry};
use crate::provider::Provider;

// ============================================================
// Settings
// ============================================================

/// What happens to a Pending slot when its factory fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Remove the slot, so a later request runs the factory again.
    ///
    /// Also applies when a `resolve` future is dropped before finishing.
    #[default]
    Revert,

    /// Leave the slot Pending.
    ///
    /// Every later request reports [`LarderError::CycleDetected`] until
    /// [`Container::set`] overwrites the slot.
    Block,
}

/// Tunables for a [`Container`].
#[derive(Debug, Clone)]
pub struct ContainerSettings {
    /// See [`FailurePolicy`].
    pub failure_policy: FailurePolicy,
    /// Upper bound on "did you mean" hints in
    /// [`LarderError::LoaderNotFound`]. Zero disables them.
    pub max_suggestions: usize,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Revert,
            max_suggestions: 3,
        }
    }
}

/// Builds a [`Container`] with non-default settings.
///
/// ```rust
/// use larder_container::prelude::*;
///
/// let container = Container::builder()
///     .failure_policy(FailurePolicy::Block)
///     .max_suggestions(0)
///     .build();
/// assert_eq!(container.settings().failure_policy, FailurePolicy::Block);
/// ```
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    settings: ContainerSettings,
}

impl ContainerBuilder {
    /// Set the [`FailurePolicy`].
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.settings.failure_policy = policy;
        self
    }

    /// Set how many "did you mean" hints a missing loader reports.
    pub fn max_suggestions(mut self, max: usize) -> Self {
        self.settings.max_suggestions = max;
        self
    }

    /// Build an empty container.
    pub fn build(self) -> Container {
        debug!(settings = ?self.settings, "Building container");
        Container {
            inner: Arc::new(Inner {
                settings: self.settings,
                state: Mutex::new(State::default()),
            }),
        }
    }
}

// ═══════════════════════════════════════════
// Internal state
// ═══════════════════════════════════════════

enum Slot {
    Pending,
    Resolved(Instance),
}

struct Entry {
    /// Creation order, used by `cleanup_all`.
    seq: u64,
    slot: Slot,
}

#[derive(Default)]
struct State {
    registry: Registry,
    instances: HashMap<AnyId, Entry>,
    next_seq: u64,
}

impl State {
    /// Stores `slot`, returning the one it displaced.
    ///
    /// The displaced slot may hold the last reference to a user value;
    /// callers drop it after releasing the lock.
    #[must_use]
    fn put(&mut self, id: AnyId, slot: Slot) -> Option<Slot> {
        match self.instances.get_mut(&id) {
            Some(entry) => Some(std::mem::replace(&mut entry.slot, slot)),
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.instances.insert(id, Entry { seq, slot });
                None
            }
        }
    }

    fn ids_in_order(&self) -> Vec<AnyId> {
        let mut ids: Vec<(u64, AnyId)> =
            self.instances.iter().map(|(id, entry)| (entry.seq, *id)).collect();
        ids.sort_unstable_by_key(|(seq, _)| *seq);
        ids.into_iter().map(|(_, id)| id).collect()
    }
}

struct Inner {
    settings: ContainerSettings,
    state: Mutex<State>,
}

/// Outcome of the locked part of a resolution.
enum Step {
    Cached(Instance),
    Build(Factory),
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Lazy, memoizing IoC container.
///
/// `Container` is a handle: clones share the same loaders and instances.
/// The internal lock is never held while factories or cleaners run, so
/// they may call back into the container.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Create an empty container with default settings.
    pub fn new() -> Self {
        ContainerBuilder::default().build()
    }

    /// Create a builder for custom settings.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Settings this container was built with.
    pub fn settings(&self) -> &ContainerSettings {
        &self.inner.settings
    }

    // ── Registration ──

    /// Register a synchronous factory for `id`.
    ///
    /// Replaces any previous loader. An already resolved instance stays
    /// cached until cleaned up.
    pub fn register<T: Send + Sync + 'static>(
        &self,
        id: &ObjectId<T>,
        factory: impl Fn(&Container) -> Result<T> + Send + Sync + 'static,
    ) -> &Self {
        self.register_with(id, Loader::new(factory))
    }

    /// Register an asynchronous factory for `id`.
    ///
    /// Instances are built by [`Container::resolve`] or
    /// [`Container::await_all`]; [`Container::get`] refuses them.
    pub fn register_async<T, F, Fut>(&self, id: &ObjectId<T>, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.register_with(id, Loader::from_async(factory))
    }

    /// Register a full [`Loader`] (factory and cleaner) for `id`.
    pub fn register_with<T: Send + Sync + 'static>(&self, id: &ObjectId<T>, loader: Loader<T>) -> &Self {
        let replaced = self.state().registry.register(id.any(), loader.erase());
        drop(replaced);
        self
    }

    /// Let a [`Provider`] register its loaders.
    pub fn add_provider(&self, provider: &dyn Provider) -> &Self {
        info!(provider = provider.name(), "Adding provider");
        provider.register(self);
        self
    }

    /// Place `value` directly in the Resolved state, bypassing loaders.
    ///
    /// Setting an identifier that is still being built does not stop the
    /// build: when its factory succeeds, the factory's result replaces
    /// `value`.
    pub fn set<T: Send + Sync + 'static>(&self, id: &ObjectId<T>, value: T) -> &Self {
        debug!(id = %id, "Setting instance");
        let displaced = self.state().put(id.any(), Slot::Resolved(Arc::new(value)));
        drop(displaced);
        self
    }

    // ── Resolution ──

    /// Resolve `id` synchronously.
    ///
    /// # Errors
    /// - [`LarderError::CycleDetected`] if `id` is still being built
    /// - [`LarderError::LoaderNotFound`] if nothing is registered for `id`
    /// - [`LarderError::AsyncLoader`] if the loader is asynchronous
    /// - whatever the factory returns
    pub fn get<T: Send + Sync + 'static>(&self, id: &ObjectId<T>) -> Result<Arc<T>> {
        trace!(id = %id, "Resolving");
        let factory = match self.begin(id.any(), false)? {
            Step::Cached(instance) => return downcast(id, instance),
            Step::Build(Factory::Sync(factory)) => factory,
            Step::Build(Factory::Async(_)) => return Err(LarderError::AsyncLoader { id: id.any() }),
        };

        let guard = PendingGuard::new(self, id.any());
        let instance = factory(self)?;
        guard.resolve(instance.clone());
        downcast(id, instance)
    }

    /// Resolve `id`, awaiting its factory if it is asynchronous.
    ///
    /// For async loaders the slot stays Pending until the factory's
    /// future completes. Nothing happens until the returned future is
    /// polled.
    pub async fn resolve<T: Send + Sync + 'static>(&self, id: &ObjectId<T>) -> Result<Arc<T>> {
        let instance = self.resolve_any(id.any()).await?;
        downcast(id, instance)
    }

    async fn resolve_any(&self, id: AnyId) -> Result<Instance> {
        trace!(id = %id, "Resolving");
        let factory = match self.begin(id, true)? {
            Step::Cached(instance) => return Ok(instance),
            Step::Build(factory) => factory,
        };

        let guard = PendingGuard::new(self, id);
        let instance = match factory {
            Factory::Sync(factory) => factory(self)?,
            Factory::Async(factory) => factory(self.clone()).await?,
        };
        guard.resolve(instance.clone());
        Ok(instance)
    }

    /// Checks the slot and, when a build is needed, marks it Pending.
    fn begin(&self, id: AnyId, allow_async: bool) -> Result<Step> {
        let mut state = self.state();

        match state.instances.get(&id).map(|entry| &entry.slot) {
            Some(Slot::Resolved(instance)) => {
                trace!(id = %id, "Cache hit");
                return Ok(Step::Cached(instance.clone()));
            }
            Some(Slot::Pending) => {
                warn!(id = %id, "Infinite loop detected");
                return Err(LarderError::CycleDetected { id });
            }
            None => {}
        }

        let Some(loader) = state.registry.get(&id) else {
            let registered: Vec<&str> = state.registry.ids().iter().map(AnyId::description).collect();
            let suggestions =
                suggest_similar(id.description(), &registered, self.inner.settings.max_suggestions);
            return Err(LarderError::LoaderNotFound { id, suggestions });
        };

        let factory = loader.factory.clone();
        if factory.is_async() && !allow_async {
            return Err(LarderError::AsyncLoader { id });
        }

        debug!(id = %id, "Building instance");
        // the slot was absent, nothing is displaced
        let _ = state.put(id, Slot::Pending);
        Ok(Step::Build(factory))
    }

    /// Resolve several identifiers concurrently.
    ///
    /// Each distinct identifier is resolved once, all resolutions are
    /// driven together, and the first failure fails the whole call.
    ///
    /// ```rust
    /// use larder_container::prelude::*;
    ///
    /// # futures::executor::block_on(async {
    /// let greeting = ObjectId::<String>::new("greeting");
    /// let answer = ObjectId::<i32>::new("answer");
    ///
    /// let container = Container::new();
    /// container
    ///     .register_async(&greeting, |_| async { Ok(String::from("foobar")) })
    ///     .register(&answer, |_| Ok(1337));
    ///
    /// let awaited = container
    ///     .await_all([("foobar", greeting.any()), ("number", answer.any())])
    ///     .await
    ///     .unwrap();
    ///
    /// assert_eq!(*awaited.get::<String>("foobar").unwrap(), "foobar");
    /// assert_eq!(*awaited.get::<i32>("number").unwrap(), 1337);
    /// # });
    /// ```
    #[instrument(skip_all, name = "await_all")]
    pub async fn await_all<I, N, K>(&self, names: I) -> Result<Awaited>
    where
        I: IntoIterator<Item = (N, K)>,
        N: Into<String>,
        K: Into<AnyId>,
    {
        let mut unique: Vec<AnyId> = Vec::new();
        let mut entries: Vec<(String, usize)> = Vec::new();
        for (name, id) in names {
            let id = id.into();
            let index = match unique.iter().position(|known| *known == id) {
                Some(index) => index,
                None => {
                    unique.push(id);
                    unique.len() - 1
                }
            };
            entries.push((name.into(), index));
        }

        debug!(names = entries.len(), ids = unique.len(), "Awaiting instances");
        let instances = try_join_all(unique.iter().map(|id| self.resolve_any(*id))).await?;

        let values = entries
            .into_iter()
            .map(|(name, index)| (name, (unique[index], instances[index].clone())))
            .collect();
        Ok(Awaited { values })
    }

    // ── Introspection ──

    /// Snapshot of every Resolved instance. Pending slots are left out.
    pub fn instances(&self) -> Instances {
        let state = self.state();
        let mut order = Vec::new();
        let mut values = HashMap::new();
        for id in state.ids_in_order() {
            if let Some(Entry { slot: Slot::Resolved(instance), .. }) = state.instances.get(&id) {
                order.push(id);
                values.insert(id, instance.clone());
            }
        }
        Instances { order, values }
    }

    /// `true` if a loader is registered for `id`.
    pub fn is_registered(&self, id: impl Into<AnyId>) -> bool {
        self.state().registry.contains(&id.into())
    }

    /// `true` if `id` holds a finished instance.
    pub fn is_resolved(&self, id: impl Into<AnyId>) -> bool {
        matches!(self.state().instances.get(&id.into()).map(|e| &e.slot), Some(Slot::Resolved(_)))
    }

    /// `true` if `id` is currently being built.
    pub fn is_pending(&self, id: impl Into<AnyId>) -> bool {
        matches!(self.state().instances.get(&id.into()).map(|e| &e.slot), Some(Slot::Pending))
    }

    // ── Cleanup ──

    /// Clean up the given identifiers, one after another.
    ///
    /// Uncached identifiers are skipped. Each cleaner is awaited before
    /// the next identifier is touched; the first failure stops the walk.
    ///
    /// # Errors
    /// - [`LarderError::CleanupDuringConstruction`] if an identifier is
    ///   still being built
    /// - whatever a cleaner returns
    #[instrument(skip_all, name = "cleanup")]
    pub async fn cleanup<I>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<AnyId>,
    {
        for id in ids {
            self.cleanup_one(id.into()).await?;
        }
        Ok(())
    }

    /// Clean up every cached identifier, oldest first.
    ///
    /// The set of targets is fixed when the call starts.
    pub async fn cleanup_all(&self) -> Result<()> {
        let ids = self.state().ids_in_order();
        debug!(count = ids.len(), "Cleaning up all instances");
        self.cleanup(ids).await
    }

    async fn cleanup_one(&self, id: AnyId) -> Result<()> {
        let (instance, cleaner) = {
            let state = self.state();
            match state.instances.get(&id).map(|e| &e.slot) {
                None => {
                    trace!(id = %id, "Nothing to clean up");
                    return Ok(());
                }
                Some(Slot::Pending) => {
                    warn!(id = %id, "Cleanup requested while building");
                    return Err(LarderError::CleanupDuringConstruction { id });
                }
                Some(Slot::Resolved(instance)) => (
                    instance.clone(),
                    state.registry.get(&id).and_then(|loader| loader.cleaner.clone()),
                ),
            }
        };

        if let Some(cleaner) = cleaner {
            trace!(id = %id, "Running cleaner");
            cleaner(id, instance).await?;
        }

        let removed = self.state().instances.remove(&id);
        drop(removed);
        debug!(id = %id, "Cleaned up instance");
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let pending = state.instances.values().filter(|e| matches!(e.slot, Slot::Pending)).count();
        f.debug_struct("Container")
            .field("loaders", &state.registry.len())
            .field("instances", &(state.instances.len() - pending))
            .field("pending", &pending)
            .field("failure_policy", &self.inner.settings.failure_policy)
            .finish()
    }
}

fn downcast<T: Send + Sync + 'static>(id: &ObjectId<T>, instance: Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| LarderError::TypeMismatch {
        id: id.any(),
        expected: type_name::<T>(),
    })
}

// ═══════════════════════════════════════════
// PendingGuard
// ═══════════════════════════════════════════

/// Owns a Pending slot for the duration of a build.
///
/// Dropped without [`resolve`](Self::resolve) (factory error, panic, or a
/// cancelled future) it applies the container's [`FailurePolicy`].
struct PendingGuard<'a> {
    container: &'a Container,
    id: AnyId,
    done: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(container: &'a Container, id: AnyId) -> Self {
        Self { container, id, done: false }
    }

    /// Stores the finished instance, replacing a value `set` in the meantime.
    fn resolve(mut self, instance: Instance) {
        let displaced = self.container.state().put(self.id, Slot::Resolved(instance));
        drop(displaced);
        self.done = true;
        debug!(id = %self.id, "Instance resolved");
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        match self.container.inner.settings.failure_policy {
            FailurePolicy::Revert => {
                let mut state = self.container.state();
                // a `set` during the build keeps its value
                if matches!(state.instances.get(&self.id).map(|e| &e.slot), Some(Slot::Pending)) {
                    state.instances.remove(&self.id);
                    debug!(id = %self.id, "Build failed, slot reverted");
                }
            }
            FailurePolicy::Block => {
                warn!(id = %self.id, "Build failed, slot stays pending");
            }
        }
    }
}

// ═══════════════════════════════════════════
// Snapshots
// ═══════════════════════════════════════════

/// Named results of [`Container::await_all`].
pub struct Awaited {
    values: HashMap<String, (AnyId, Instance)>,
}

impl Awaited {
    /// Value stored under `name`, if present and of type `T`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        let (_, instance) = self.values.get(name)?;
        instance.clone().downcast::<T>().ok()
    }

    /// Identifier that was resolved for `name`.
    pub fn id(&self, name: &str) -> Option<AnyId> {
        self.values.get(name).map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for Awaited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter().map(|(name, (id, _))| (name, id))).finish()
    }
}

/// Snapshot returned by [`Container::instances`].
///
/// Owns its own map: later changes to the container do not show up here,
/// and dropping it does not affect the container.
pub struct Instances {
    order: Vec<AnyId>,
    values: HashMap<AnyId, Instance>,
}

impl Instances {
    /// Instance for `id`, if it was resolved when the snapshot was taken.
    pub fn get<T: Send + Sync + 'static>(&self, id: &ObjectId<T>) -> Option<Arc<T>> {
        self.values.get(&id.any())?.clone().downcast::<T>().ok()
    }

    pub fn contains(&self, id: impl Into<AnyId>) -> bool {
        self.values.contains_key(&id.into())
    }

    /// Identifiers in the snapshot, oldest first.
    pub fn ids(&self) -> &[AnyId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Instances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.order).finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Awaited, Container, ContainerBuilder, ContainerSettings, FailurePolicy, Instances};
    pub use crate::dispose::Dispose;
    pub use crate::error::{LarderError, Result};
    pub use crate::id::{AnyId, ObjectId};
    pub use crate::loader::Loader;
    pub use crate::provider::Provider;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
