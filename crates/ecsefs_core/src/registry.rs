//! Shared-resource registry.
//!
//! Maps a human-chosen name to the handle of the resource constructed for it.
//! The first lookup of a name runs the constructor; every later lookup returns
//! the stored handle and never runs a constructor again. Entries are never
//! overwritten or removed.

use std::collections::HashMap;

use tracing::debug;

/// A registry of shared resource handles keyed by name.
pub struct SharedRegistry<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for SharedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Return the handle for `key`, constructing it with `factory` on first use.
    pub fn get_or_create<F>(&mut self, key: &str, factory: F) -> &T
    where
        F: FnOnce() -> T,
    {
        if let Some(i) = self.index.get(key).copied() {
            debug!("Reusing shared resource: {}", key);
            return &self.entries[i].1;
        }
        self.insert(key, factory())
    }

    /// Like [`get_or_create`](Self::get_or_create) for fallible constructors.
    ///
    /// A failing constructor leaves the registry unchanged.
    pub fn get_or_try_create<F, E>(&mut self, key: &str, factory: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(i) = self.index.get(key).copied() {
            debug!("Reusing shared resource: {}", key);
            return Ok(&self.entries[i].1);
        }
        let handle = factory()?;
        Ok(self.insert(key, handle))
    }

    fn insert(&mut self, key: &str, handle: T) -> &T {
        debug!("Registering shared resource: {}", key);
        let i = self.entries.len();
        self.index.insert(key.to_string(), i);
        self.entries.push((key.to_string(), handle));
        &self.entries[i].1
    }

    /// Get a handle by name.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Check if a name is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Registered names in first-reference order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Entries in first-reference order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Get the number of registered names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> std::fmt::Debug for SharedRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_registry_constructs_once() {
        let calls = Cell::new(0);
        let mut registry = SharedRegistry::new();

        let first = *registry.get_or_create("shared-alb", || {
            calls.set(calls.get() + 1);
            1
        });
        let second = *registry.get_or_create("shared-alb", || {
            calls.set(calls.get() + 1);
            2
        });

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_keeps_first_reference_order() {
        let mut registry = SharedRegistry::new();
        registry.get_or_create("b", || "lb-b");
        registry.get_or_create("a", || "lb-a");
        registry.get_or_create("b", || "lb-b2");

        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(registry.get("b"), Some(&"lb-b"));
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_failed_constructor_leaves_registry_unchanged() {
        let mut registry: SharedRegistry<u32> = SharedRegistry::new();

        let result: Result<&u32, String> =
            registry.get_or_try_create("shared-alb", || Err("boom".to_string()));
        assert!(result.is_err());
        assert!(!registry.contains("shared-alb"));

        let value = registry
            .get_or_try_create::<_, String>("shared-alb", || Ok(7))
            .unwrap();
        assert_eq!(*value, 7);
    }
}
