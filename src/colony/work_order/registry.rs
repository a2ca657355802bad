//! Name ↔ kind registry for polymorphic work orders
//!
//! Every concrete kind is registered under a unique tag name with a
//! zero-argument factory. The table is filled once at start-up and only read
//! afterwards; [`install`] publishes it process-wide.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::kinds::{BuildOrder, DecorationOrder};
use super::order::{WorkOrderError, WorkOrderKind};

/// Creates a fresh, default-initialised kind
pub type WorkOrderFactory = fn() -> Box<dyn WorkOrderKind>;

/// Fatal registry set-up errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Work order type name must not be empty")]
    EmptyName,
    #[error("Duplicate type '{0}' when adding work order mapping")]
    DuplicateName(String),
    #[error("Kind {kind} is already registered as '{existing}'")]
    DuplicateKind { kind: &'static str, existing: String },
    #[error("Work order registry is already installed")]
    AlreadyInstalled,
}

fn new_kind<K: WorkOrderKind + Default>() -> Box<dyn WorkOrderKind> {
    Box::new(K::default())
}

/// Bidirectional mapping between tag names and work order kinds
#[derive(Default)]
pub struct WorkOrderRegistry {
    by_name: HashMap<String, WorkOrderFactory>,
    by_kind: HashMap<TypeId, String>,
}

impl WorkOrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the kinds shipped with the server
    pub fn with_builtin_kinds() -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        registry.register::<BuildOrder>("build")?;
        registry.register::<DecorationOrder>("decoration")?;
        Ok(registry)
    }

    /// Register `K` under `name`
    ///
    /// The `Default` bound is the zero-argument construction requirement.
    pub fn register<K: WorkOrderKind + Default>(&mut self, name: &str) -> Result<(), ConfigurationError> {
        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        if self.by_name.contains_key(name) {
            return Err(ConfigurationError::DuplicateName(name.to_string()));
        }
        if let Some(existing) = self.by_kind.get(&TypeId::of::<K>()) {
            return Err(ConfigurationError::DuplicateKind {
                kind: std::any::type_name::<K>(),
                existing: existing.clone(),
            });
        }

        self.by_name.insert(name.to_string(), new_kind::<K>);
        self.by_kind.insert(TypeId::of::<K>(), name.to_string());
        Ok(())
    }

    /// Factory for a tag name, if registered
    pub fn resolve(&self, name: &str) -> Option<WorkOrderFactory> {
        self.by_name.get(name).copied()
    }

    /// Tag name of a live kind
    pub fn name_of(&self, kind: &dyn WorkOrderKind) -> Result<&str, WorkOrderError> {
        self.by_kind
            .get(&kind.as_any().type_id())
            .map(String::as_str)
            .ok_or(WorkOrderError::MissingMapping {
                kind: kind.kind_name(),
            })
    }

    /// Tag name of a kind type, if registered
    pub fn name_of_kind<K: WorkOrderKind>(&self) -> Option<&str> {
        self.by_kind.get(&TypeId::of::<K>()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered tag names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for WorkOrderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkOrderRegistry")
            .field("names", &self.names())
            .finish()
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<WorkOrderRegistry>> = OnceLock::new();

/// Publish the registry for the rest of the process lifetime
pub fn install(registry: WorkOrderRegistry) -> Result<Arc<WorkOrderRegistry>, ConfigurationError> {
    let mut installed = false;
    let global = GLOBAL_REGISTRY.get_or_init(|| {
        installed = true;
        Arc::new(registry)
    });
    if installed {
        Ok(Arc::clone(global))
    } else {
        Err(ConfigurationError::AlreadyInstalled)
    }
}

/// The installed registry, once [`install`] has run
pub fn global() -> Option<Arc<WorkOrderRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}
