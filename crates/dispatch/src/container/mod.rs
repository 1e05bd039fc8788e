//! A small inversion-of-control container.
//!
//! Values are registered during start-up (`&mut Container`) and resolved while serving
//! (`&Container`). Resolution of a key follows a fixed priority:
//!
//! 1. a pre-built instance registered with [`Container::instance`];
//! 2. a singleton factory, run at most once and memoized;
//! 3. a transient binding, run on every resolution;
//! 4. an auto-wired constructor, see [`Injectable`].
//!
//! Anything else fails with [`ContainerError::UnresolvableType`].
//!
//! The container is shared between request tasks. A singleton is built by the first
//! thread that asks for it while later callers wait; a wait that would close a dependency
//! cycle across threads fails with [`ContainerError::CyclicDependency`] instead of blocking.
//!
//! # Example
//! ```
//! use micro_dispatch::container::{Container, Injectable, Resolver};
//! use micro_dispatch::ContainerError;
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 {
//!         42
//!     }
//! }
//!
//! struct Greeter {
//!     clock: Arc<dyn Clock>,
//! }
//!
//! impl Injectable for Greeter {
//!     fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
//!         Ok(Greeter { clock: resolver.resolve::<dyn Clock>()? })
//!     }
//! }
//!
//! let mut container = Container::new();
//! container.singleton::<dyn Clock, _>(|_| Ok(Arc::new(FixedClock) as Arc<dyn Clock>));
//!
//! let greeter = container.make::<Greeter>().unwrap();
//! assert_eq!(greeter.clock.now(), 42);
//! ```

mod key;

pub use key::Key;

use crate::error::ContainerError;
use once_cell::sync::OnceCell;
use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// A resolved value with its type erased; it always holds an `Arc<T>` for the registered `T`.
pub type Resolved = Arc<dyn Any + Send + Sync>;

type Factory = Box<dyn Fn(&Resolver<'_>) -> Result<Resolved, ContainerError> + Send + Sync>;

/// A type the container can construct on its own.
///
/// `inject` plays the role of the constructor: object dependencies are pulled from the
/// resolver, everything else gets a default. Types without dependencies can use
/// [`injectable_default!`](crate::injectable_default).
pub trait Injectable: Sized + Send + Sync + 'static {
    fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError>;
}

/// Implements [`Injectable`] through [`Default`] for types whose constructor takes nothing.
#[macro_export]
macro_rules! injectable_default {
    ($($ty:ty),+ $(,)?) => {
        $(
        impl $crate::container::Injectable for $ty {
            fn inject(_resolver: &$crate::container::Resolver<'_>) -> ::std::result::Result<Self, $crate::ContainerError> {
                ::std::result::Result::Ok(<$ty as ::std::default::Default>::default())
            }
        }
        )+
    };
}

struct Singleton {
    factory: Factory,
    cell: OnceCell<Resolved>,
}

/// Singletons under construction.
#[derive(Default)]
struct InFlight {
    state: Mutex<InFlightState>,
    finished: Condvar,
}

#[derive(Default)]
struct InFlightState {
    /// The thread running each singleton factory.
    owners: HashMap<Key, ThreadId>,
    /// The singleton each blocked thread waits for.
    waiting: HashMap<ThreadId, Key>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, InFlightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, InFlightState>) -> MutexGuard<'a, InFlightState> {
        self.finished.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

impl InFlightState {
    /// Follows the wait-for chain starting at `owner` of `wanted`. If it leads back to
    /// `current`, waiting would never end; returns the keys of that cycle.
    fn wait_cycle(&self, wanted: &Key, owner: ThreadId, current: ThreadId) -> Option<Vec<Key>> {
        let mut path = vec![wanted.clone()];
        let mut owner = owner;
        while owner != current {
            let next = self.waiting.get(&owner)?;
            if path.contains(next) {
                return None;
            }
            path.push(next.clone());
            owner = *self.owners.get(next)?;
        }

        // `current` builds the last key of the path
        let mut cycle = path.last().cloned().into_iter().collect::<Vec<_>>();
        cycle.extend(path);
        Some(cycle)
    }
}

/// Releases a singleton key when its factory returns or unwinds.
struct Building<'a> {
    in_flight: &'a InFlight,
    key: &'a Key,
}

impl Drop for Building<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().owners.remove(self.key);
        self.in_flight.finished.notify_all();
    }
}

#[derive(Default)]
pub struct Container {
    instances: HashMap<Key, Resolved>,
    singletons: HashMap<Key, Singleton>,
    bindings: HashMap<Key, Factory>,
    autowired: HashMap<Key, Factory>,
    in_flight: InFlight,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transient binding for `T`: `factory` runs on every resolution.
    pub fn bind<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
    {
        self.bind_named(Key::of::<T>(), factory)
    }

    pub fn bind_named<T, F>(&mut self, key: impl Into<Key>, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
    {
        self.bindings.insert(key.into(), erase(factory));
        self
    }

    /// Registers a singleton for `T`: `factory` runs once, on first resolution.
    pub fn singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
    {
        self.singleton_named(Key::of::<T>(), factory)
    }

    pub fn singleton_named<T, F>(&mut self, key: impl Into<Key>, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
    {
        self.singletons.insert(key.into(), Singleton { factory: erase(factory), cell: OnceCell::new() });
        self
    }

    /// Registers a pre-built value for `T`. It shadows every other registration of the key,
    /// and a later call for the same key replaces it.
    pub fn instance<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.instance_named(Key::of::<T>(), value)
    }

    pub fn instance_named<T>(&mut self, key: impl Into<Key>, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.instances.insert(key.into(), Arc::new(value));
        self
    }

    /// Makes [`Container::resolve`] able to construct `T` through [`Injectable::inject`].
    pub fn register<T: Injectable>(&mut self) -> &mut Self {
        self.autowired.insert(Key::of::<T>(), erase(|resolver: &Resolver<'_>| T::inject(resolver).map(Arc::new)));
        self
    }

    /// Returns true if anything is registered under `key`.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.instances.contains_key(&key)
            || self.singletons.contains_key(&key)
            || self.bindings.contains_key(&key)
            || self.autowired.contains_key(&key)
    }

    pub fn resolve<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Resolver::new(self).resolve::<T>()
    }

    pub fn resolve_named<T>(&self, key: impl Into<Key>) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Resolver::new(self).resolve_named::<T>(key)
    }

    pub fn resolve_any(&self, key: impl Into<Key>) -> Result<Resolved, ContainerError> {
        Resolver::new(self).resolve_any(key)
    }

    /// Like [`Container::resolve`], but falls back to [`Injectable::inject`] when nothing
    /// is registered for `T`.
    pub fn make<T: Injectable>(&self) -> Result<Arc<T>, ContainerError> {
        Resolver::new(self).make::<T>()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("instances", &self.instances.keys().collect::<Vec<_>>())
            .field("singletons", &self.singletons.keys().collect::<Vec<_>>())
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("autowired", &self.autowired.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One resolution chain over a [`Container`].
///
/// The resolver remembers which keys are being constructed so a dependency cycle fails
/// with [`ContainerError::CyclicDependency`] instead of recursing forever. Factories and
/// [`Injectable::inject`] receive the resolver so nested resolutions share that stack.
#[derive(Debug)]
pub struct Resolver<'c> {
    container: &'c Container,
    stack: RefCell<Vec<Key>>,
}

impl<'c> Resolver<'c> {
    fn new(container: &'c Container) -> Self {
        Self { container, stack: RefCell::new(Vec::new()) }
    }

    pub fn container(&self) -> &'c Container {
        self.container
    }

    pub fn resolve<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_named::<T>(Key::of::<T>())
    }

    pub fn resolve_named<T>(&self, key: impl Into<Key>) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = key.into();
        let resolved = self.resolve_any(&key)?;
        downcast::<T>(&key, &resolved)
    }

    /// Resolves `T`, or returns `None` when nothing can produce it.
    pub fn resolve_optional<T>(&self) -> Result<Option<Arc<T>>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.resolve::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(ContainerError::UnresolvableType { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn resolve_any(&self, key: impl Into<Key>) -> Result<Resolved, ContainerError> {
        let key = key.into();
        let container = self.container;

        if let Some(instance) = container.instances.get(&key) {
            return Ok(Arc::clone(instance));
        }

        self.enter(key, |key| {
            if let Some(singleton) = container.singletons.get(key) {
                return self.singleton(key, singleton);
            }
            if let Some(factory) = container.bindings.get(key) {
                return factory(self);
            }
            if let Some(factory) = container.autowired.get(key) {
                return factory(self);
            }
            Err(ContainerError::unresolvable(key))
        })
    }

    pub fn make<T: Injectable>(&self) -> Result<Arc<T>, ContainerError> {
        let key = Key::of::<T>();
        if self.container.has(&key) {
            return self.resolve_named::<T>(key);
        }
        self.enter(key, |_| T::inject(self).map(Arc::new))
    }

    /// Returns the singleton's value, running its factory if no other thread is.
    fn singleton(&self, key: &Key, singleton: &Singleton) -> Result<Resolved, ContainerError> {
        let in_flight = &self.container.in_flight;
        let current = thread::current().id();

        let mut state = in_flight.lock();
        loop {
            if let Some(value) = singleton.cell.get() {
                return Ok(Arc::clone(value));
            }

            let owner = state.owners.get(key).copied();
            let Some(owner) = owner else { break };
            if let Some(cycle) = state.wait_cycle(key, owner, current) {
                let e = ContainerError::CyclicDependency { cycle };
                warn!(cause = %e, "singleton wait would never end");
                return Err(e);
            }

            state.waiting.insert(current, key.clone());
            state = in_flight.wait(state);
            state.waiting.remove(&current);
        }
        state.owners.insert(key.clone(), current);
        drop(state);

        debug!(key = %key, "construct singleton");
        let _building = Building { in_flight, key };
        (singleton.factory)(self).map(|value| Arc::clone(singleton.cell.get_or_init(|| value)))
    }

    fn enter<R>(&self, key: Key, f: impl FnOnce(&Key) -> Result<R, ContainerError>) -> Result<R, ContainerError> {
        {
            let mut stack = self.stack.borrow_mut();
            if let Some(pos) = stack.iter().position(|k| *k == key) {
                let mut cycle = stack[pos..].to_vec();
                cycle.push(key);
                return Err(ContainerError::CyclicDependency { cycle });
            }
            stack.push(key.clone());
        }

        let result = f(&key);
        self.stack.borrow_mut().pop();
        result
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&Resolver<'_>) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
{
    Box::new(move |resolver| factory(resolver).map(|value| Arc::new(value) as Resolved))
}

fn downcast<T>(key: &Key, resolved: &Resolved) -> Result<Arc<T>, ContainerError>
where
    T: ?Sized + Send + Sync + 'static,
{
    resolved.downcast_ref::<Arc<T>>().map(Arc::clone).ok_or_else(|| ContainerError::type_mismatch(key, type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::{Container, Injectable, Key, Resolver};
    use crate::error::ContainerError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Config {
        name: &'static str,
    }

    crate::injectable_default!(Config);

    struct Repository {
        config: Arc<Config>,
        page_size: usize,
    }

    impl Injectable for Repository {
        fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
            Ok(Repository { config: resolver.make::<Config>()?, page_size: 20 })
        }
    }

    struct Service {
        repository: Arc<Repository>,
        mailer: Option<Arc<dyn Mailer>>,
    }

    impl Injectable for Service {
        fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
            Ok(Service { repository: resolver.make::<Repository>()?, mailer: resolver.resolve_optional::<dyn Mailer>()? })
        }
    }

    trait Mailer: Send + Sync {
        fn send(&self) -> &'static str;
    }

    struct SmtpMailer;

    impl Mailer for SmtpMailer {
        fn send(&self) -> &'static str {
            "smtp"
        }
    }

    struct Ping(Arc<Pong>);
    struct Pong(Arc<Ping>);

    impl Injectable for Ping {
        fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
            Ok(Ping(resolver.make::<Pong>()?))
        }
    }

    impl Injectable for Pong {
        fn inject(resolver: &Resolver<'_>) -> Result<Self, ContainerError> {
            Ok(Pong(resolver.make::<Ping>()?))
        }
    }

    #[test]
    fn auto_resolves_nested_dependencies() {
        let container = Container::new();
        let service = container.make::<Service>().unwrap();

        assert_eq!(service.repository.page_size, 20);
        assert_eq!(service.repository.config.name, "");
        assert!(service.mailer.is_none());
    }

    #[test]
    fn abstract_key_bound_to_concrete_type() {
        let mut container = Container::new();
        container.bind::<dyn Mailer, _>(|_| Ok(Arc::new(SmtpMailer) as Arc<dyn Mailer>));

        let service = container.make::<Service>().unwrap();
        assert_eq!(service.mailer.as_ref().unwrap().send(), "smtp");
    }

    #[test]
    fn transient_binding_is_fresh_every_time() {
        let mut container = Container::new();
        container.bind::<Config, _>(|_| Ok(Arc::new(Config { name: "bound" })));

        let first = container.resolve::<Config>().unwrap();
        let second = container.resolve::<Config>().unwrap();

        assert_eq!(first.name, "bound");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn auto_resolution_is_transient() {
        let container = Container::new();
        let first = container.make::<Config>().unwrap();
        let second = container.make::<Config>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn singleton_is_constructed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut container = Container::new();
        container.singleton::<Config, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Config { name: "single" }))
        });

        let first = container.resolve::<Config>().unwrap();
        let second = container.make::<Config>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_resolution_constructs_singleton_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut container = Container::new();
        container.singleton::<Config, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            Ok(Arc::new(Config { name: "single" }))
        });

        let threads = 8;
        let barrier = Barrier::new(threads);
        let resolved = std::thread::scope(|scope| {
            let handles = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        container.resolve::<Config>().unwrap()
                    })
                })
                .collect::<Vec<_>>();
            handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(resolved.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn instance_has_highest_priority_and_last_write_wins() {
        let mut container = Container::new();
        container.singleton::<Config, _>(|_| Ok(Arc::new(Config { name: "singleton" })));
        container.bind::<Config, _>(|_| Ok(Arc::new(Config { name: "binding" })));
        container.instance(Arc::new(Config { name: "first" }));
        container.instance(Arc::new(Config { name: "second" }));

        assert_eq!(container.resolve::<Config>().unwrap().name, "second");
        assert_eq!(container.make::<Config>().unwrap().name, "second");
    }

    #[test]
    fn singleton_wins_over_binding() {
        let mut container = Container::new();
        container.bind::<Config, _>(|_| Ok(Arc::new(Config { name: "binding" })));
        container.singleton::<Config, _>(|_| Ok(Arc::new(Config { name: "singleton" })));

        assert_eq!(container.resolve::<Config>().unwrap().name, "singleton");
    }

    #[test]
    fn unregistered_type_is_unresolvable() {
        let container = Container::new();
        let err = container.resolve::<Repository>().err().unwrap();

        match err {
            ContainerError::UnresolvableType { key } => assert_eq!(key, Key::of::<Repository>()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn registered_type_is_auto_resolved() {
        let mut container = Container::new();
        container.register::<Repository>();

        assert!(container.has(Key::of::<Repository>()));
        assert!(!container.has(std::any::type_name::<Repository>()));
        assert_eq!(container.resolve::<Repository>().unwrap().page_size, 20);
    }

    #[test]
    fn cycle_fails_fast() {
        let container = Container::new();
        let err = container.make::<Ping>().err().unwrap();

        match err {
            ContainerError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec![Key::of::<Ping>(), Key::of::<Pong>(), Key::of::<Ping>()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_referencing_singleton_is_a_cycle() {
        let mut container = Container::new();
        container.singleton_named::<Config, _>("config", |resolver| resolver.resolve_named::<Config>("config"));

        let err = container.resolve_named::<Config>("config").err().unwrap();
        assert!(matches!(err, ContainerError::CyclicDependency { .. }));
    }

    #[test]
    fn crossing_singletons_on_two_threads_fail_fast() {
        let barrier = Arc::new(Barrier::new(2));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut container = Container::new();
        for (key, dependency) in [("a", "b"), ("b", "a")] {
            let barrier = Arc::clone(&barrier);
            let calls = Arc::clone(&calls);
            container.singleton_named::<Config, _>(key, move |resolver| {
                // both threads hold their own singleton before asking for the other one
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    barrier.wait();
                }
                resolver.resolve_named::<Config>(dependency)
            });
        }

        let container = Arc::new(container);
        let (tx, rx) = mpsc::channel();
        for key in ["a", "b"] {
            let container = Arc::clone(&container);
            let tx = tx.clone();
            thread::spawn(move || {
                let _ = tx.send(container.resolve_named::<Config>(key).map(|_| ()));
            });
        }

        for _ in 0..2 {
            let result = rx.recv_timeout(Duration::from_secs(5)).expect("singleton resolution deadlocked");
            match result {
                Err(ContainerError::CyclicDependency { cycle }) => {
                    assert_eq!(cycle.first(), cycle.last());
                    assert_eq!(cycle.len(), 3);
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn waiting_for_a_singleton_built_by_the_same_thread_is_a_cycle() {
        let mut container = Container::new();
        container.singleton_named::<Config, _>("outer", |resolver| {
            // a fresh resolution chain does not see the outer stack
            resolver.container().resolve_named::<Config>("outer")
        });

        let err = container.resolve_named::<Config>("outer").err().unwrap();
        match err {
            ContainerError::CyclicDependency { cycle } => assert_eq!(cycle, vec![Key::from("outer"), Key::from("outer")]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn named_lookup_with_wrong_type_is_a_mismatch() {
        let mut container = Container::new();
        container.instance_named("config.app", Arc::new(Config { name: "app" }));

        assert_eq!(container.resolve_named::<Config>("config.app").unwrap().name, "app");
        let err = container.resolve_named::<Repository>("config.app").err().unwrap();
        assert!(matches!(err, ContainerError::TypeMismatch { .. }));
    }

    #[test]
    fn factory_failure_is_propagated() {
        let mut container = Container::new();
        container.bind_named::<Config, _>("broken", |_| Err(ContainerError::construction("broken", "disk full")));

        let err = container.resolve_named::<Config>("broken").err().unwrap();
        assert_eq!(err.to_string(), "failed to construct broken: disk full");
    }
}
