//! Component registry (C2, §3): case-folded unique names, insertion-ordered
//! iteration, registration/deregistration, and lookup by name or tag.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::component::{case_fold, Capability, Component};
use crate::error::{Error, Result};

/// Shared, cloneable handle to the registry. Construction is cheap; clones
/// share the same underlying map.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, Arc<Component>>,
    /// Registration order, by case-folded name. Preserved across
    /// deregistration of unrelated entries (§3 "insertion-ordered
    /// iteration").
    order: Vec<String>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `component`. Fails with [`Error::AlreadyExists`] if a
    /// component with the same case-folded name is already registered (§3
    /// invariant: names are unique after folding).
    pub async fn register(&self, component: Component) -> Result<Arc<Component>> {
        let key = case_fold(&component.name);
        if key.is_empty() {
            return Err(Error::InvalidArgument(
                "component name must not be empty".to_string(),
            ));
        }
        let mut inner = self.inner.write().await;
        if inner.by_name.contains_key(&key) {
            return Err(Error::AlreadyExists(format!(
                "component '{}' is already registered",
                component.name
            )));
        }
        let arc = Arc::new(component);
        inner.order.push(key.clone());
        inner.by_name.insert(key, Arc::clone(&arc));
        Ok(arc)
    }

    /// Atomically replaces the component registered under `component`'s
    /// name. Custom plugins only (§4.2 `update`); readers see either the old
    /// or the new registration, never a torn combination, because the swap
    /// happens under a single write-lock acquisition. Fails with
    /// [`Error::NotFound`] if no component with that name is registered.
    pub async fn update(&self, component: Component) -> Result<Arc<Component>> {
        let key = case_fold(&component.name);
        let mut inner = self.inner.write().await;
        if !inner.by_name.contains_key(&key) {
            return Err(Error::NotFound(format!(
                "component '{}' is not registered",
                component.name
            )));
        }
        let arc = Arc::new(component);
        inner.by_name.insert(key, Arc::clone(&arc));
        Ok(arc)
    }

    /// Removes a component by name. Fails with [`Error::NotFound`] if no
    /// such component exists, or [`Error::FailedPrecondition`] if it exists
    /// but lacks [`Capability::Deregisterable`] (§3).
    pub async fn deregister(&self, name: &str) -> Result<()> {
        let key = case_fold(name);
        let mut inner = self.inner.write().await;
        let component = inner
            .by_name
            .get(&key)
            .ok_or_else(|| Error::NotFound(format!("component '{name}' is not registered")))?;
        if !component.has_capability(Capability::Deregisterable) {
            return Err(Error::FailedPrecondition(format!(
                "component '{name}' does not support deregistration"
            )));
        }
        inner.by_name.remove(&key);
        inner.order.retain(|n| n != &key);
        Ok(())
    }

    /// Looks up a single component by name (case-insensitive).
    pub async fn get(&self, name: &str) -> Result<Arc<Component>> {
        let key = case_fold(name);
        let inner = self.inner.read().await;
        inner
            .by_name
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("component '{name}' is not registered")))
    }

    /// Lists all registered components in registration order.
    pub async fn list(&self) -> Vec<Arc<Component>> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|key| inner.by_name.get(key).cloned())
            .collect()
    }

    /// Lists components carrying `tag`, in registration order.
    pub async fn list_by_tag(&self, tag: &str) -> Vec<Arc<Component>> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|key| inner.by_name.get(key))
            .filter(|c| c.has_tag(tag))
            .cloned()
            .collect()
    }

    /// Restricts `names` to those currently registered, preserving the
    /// registry's iteration order rather than the input order. Used by the
    /// HTTP façade's `components` filter (§6) so unknown names are reported
    /// as 404s by the caller instead of silently ignored here.
    pub async fn filter_known(&self, names: &[String]) -> (Vec<Arc<Component>>, Vec<String>) {
        let inner = self.inner.read().await;
        let wanted: std::collections::HashSet<String> =
            names.iter().map(|n| case_fold(n)).collect();
        let found: Vec<Arc<Component>> = inner
            .order
            .iter()
            .filter(|key| wanted.contains(*key))
            .filter_map(|key| inner.by_name.get(key).cloned())
            .collect();
        let present: std::collections::HashSet<String> =
            found.iter().map(|c| case_fold(&c.name)).collect();
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !present.contains(&case_fold(n)))
            .cloned()
            .collect();
        (found, missing)
    }

    #[must_use]
    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
