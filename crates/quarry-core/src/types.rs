use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{QuarryError, Result};

/// Unique identifier of one resolution session.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A type-erased, cheaply cloneable value produced by a factory.
///
/// The box remembers the name of the type it was built from so that a failed
/// downcast can report both sides of the mismatch.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Box an already shared value without another allocation.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: type_name::<T>(),
        }
    }

    /// The value of factories that exist only for their side effects.
    pub fn unit() -> Self {
        Self::new(())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    /// Downcast, reporting a `TypeMismatch` attributed to `name` on failure.
    pub fn downcast_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.downcast::<T>().ok_or_else(|| QuarryError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
            actual: self.type_name,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&self.type_name).finish()
    }
}

/// Resolved dependencies handed to a factory.
///
/// Holds exactly the declared dependencies of that factory. A dependency whose
/// conditions were not met is present with no value.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    values: HashMap<String, Option<Value>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The raw value, `None` when absent or skipped.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).and_then(Option::as_ref)
    }

    /// A required dependency of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.value(name)
            .ok_or_else(|| QuarryError::MissingDependency(name.to_string()))?
            .downcast_named(name)
    }

    /// A conditional dependency: `Ok(None)` when it was skipped.
    pub fn get_optional<T: Any + Send + Sync>(&self, name: &str) -> Result<Option<Arc<T>>> {
        self.value(name)
            .map(|v| v.downcast_named(name))
            .transpose()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
