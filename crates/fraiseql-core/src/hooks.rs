//! Event-style before-hooks: a mapping from event name to an ordered list
//! of `(name, fn)` pairs, composing in registration order.

/// A hook receives the generated SQL and may return a rewritten string.
pub type HookFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// The fixed set of compilation-boundary events hooks may subscribe to.
pub const EVENTS: &[&str] = &[
    "database_create",
    "collection_create",
    "collection_delete",
    "attribute_create",
    "attribute_update",
    "attribute_delete",
    "attributes_create",
    "index_create",
    "index_rename",
    "index_delete",
    "document_create",
    "document_update",
    "document_delete",
    "document_find",
    "document_count",
    "document_sum",
    "document_increase",
    "permissions_create",
    "permissions_read",
    "permissions_update",
    "permissions_delete",
];

/// An ordered registry of named hooks per event, hanging off an adapter
/// instance (no global mutable state).
#[derive(Default)]
pub struct HookRegistry {
    hooks: std::collections::HashMap<String, Vec<(String, HookFn)>>,
}

impl HookRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook under `event`, appended after any existing hooks for
    /// that event.
    pub fn register(&mut self, event: &str, name: impl Into<String>, hook: HookFn) {
        self.hooks.entry(event.to_string()).or_default().push((name.into(), hook));
    }

    /// Deregister the first hook matching `name` under `event`.
    ///
    /// Returns `true` if a hook was removed.
    pub fn deregister(&mut self, event: &str, name: &str) -> bool {
        if let Some(list) = self.hooks.get_mut(event) {
            if let Some(pos) = list.iter().position(|(n, _)| n == name) {
                let _ = list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Run every hook registered for `event`, in registration order, each
    /// receiving the previous hook's output.
    #[must_use]
    pub fn run(&self, event: &str, sql: &str) -> String {
        let Some(list) = self.hooks.get(event) else {
            return sql.to_string();
        };
        let mut current = sql.to_string();
        for (_, hook) in list {
            current = hook(&current);
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_compose_in_registration_order() {
        let mut registry = HookRegistry::new();
        registry.register("document_create", "a", Box::new(|sql| format!("{sql} /*a*/")));
        registry.register("document_create", "b", Box::new(|sql| format!("{sql} /*b*/")));
        let out = registry.run("document_create", "INSERT");
        assert_eq!(out, "INSERT /*a*/ /*b*/");
    }

    #[test]
    fn deregister_removes_first_match_only() {
        let mut registry = HookRegistry::new();
        registry.register("document_create", "a", Box::new(|sql| sql.to_string()));
        assert!(registry.deregister("document_create", "a"));
        assert!(!registry.deregister("document_create", "a"));
    }

    #[test]
    fn unregistered_event_passes_sql_through_unchanged() {
        let registry = HookRegistry::new();
        assert_eq!(registry.run("document_create", "SELECT 1"), "SELECT 1");
    }
}
