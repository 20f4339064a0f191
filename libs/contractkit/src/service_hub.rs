//! Instance resolution for contracts.
//!
//! Providers register an implementation under the *contract type* (usually a
//! trait object such as `dyn PeopleApi`); registration resolves it back by the
//! same type. Instances can be registered directly or through a factory that
//! runs on every resolution and may fail.
//!
//! - Key = `type_name::<T>()`, which works for `T = dyn Trait`.
//! - Value = `Arc<T>` or a factory producing one, stored behind `dyn Any`.
//! - Re-registering overwrites the previous entry.

use parking_lot::RwLock;
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

#[derive(Clone, Eq, PartialEq, Hash)]
struct TypeKey(&'static str);

impl TypeKey {
    #[inline]
    fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceHubError {
    #[error("no service registered for type {type_key}")]
    NotFound { type_key: String },

    #[error("type mismatch in hub for type {type_key}")]
    TypeMismatch { type_key: String },

    #[error("factory for type {type_key} failed: {source}")]
    Factory {
        type_key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

type Factory<T> = Arc<dyn Fn() -> anyhow::Result<Arc<T>> + Send + Sync>;

enum Slot<T: ?Sized> {
    Instance(Arc<T>),
    Factory(Factory<T>),
}

type Boxed = Box<dyn Any + Send + Sync>;

/// Type-keyed registry of contract implementations.
pub struct ServiceHub {
    map: RwLock<HashMap<TypeKey, Boxed>>,
}

impl ServiceHub {
    #[inline]
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Register a ready instance under the contract type `T`.
    pub fn register<T>(&self, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert::<T>(Slot::Instance(instance));
    }

    /// Register a factory invoked on each resolution of `T`.
    pub fn register_factory<T, F>(&self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.insert::<T>(Slot::Factory(Arc::new(factory)));
    }

    fn insert<T>(&self, slot: Slot<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        tracing::debug!(type_key = %key, "service registered");
        self.map.write().insert(key, Box::new(slot));
    }

    /// Resolve the implementation registered for `T`.
    pub fn resolve<T>(&self) -> Result<Arc<T>, ServiceHubError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        // Clone the factory out so it does not run under the read lock.
        let factory = {
            let r = self.map.read();
            let boxed = r.get(&key).ok_or_else(|| ServiceHubError::NotFound {
                type_key: key.to_string(),
            })?;
            match boxed.downcast_ref::<Slot<T>>() {
                Some(Slot::Instance(instance)) => return Ok(instance.clone()),
                Some(Slot::Factory(factory)) => factory.clone(),
                None => {
                    return Err(ServiceHubError::TypeMismatch {
                        type_key: key.to_string(),
                    })
                }
            }
        };

        factory().map_err(|source| ServiceHubError::Factory {
            type_key: key.to_string(),
            source: source.into(),
        })
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.map.read().contains_key(&TypeKey::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Default for ServiceHub {
    fn default() -> Self {
        Self::new()
    }
}
