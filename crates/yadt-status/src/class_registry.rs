use std::collections::HashMap;

use crate::error::Error;

/// A process-level map from a service spec's `class` string to the
/// built-in implementation it selects.
///
/// Replaces the original's `eval`-based dynamic class dispatch (spec.md
/// §9's redesign flag): every class name this registry doesn't recognize
/// — directly or via the legacy-alias table — is an error rather than an
/// arbitrary code execution path.
#[derive(Debug, Clone)]
pub struct ServiceClassRegistry {
    known: HashMap<String, &'static str>,
    legacy_aliases: HashMap<String, String>,
}

impl Default for ServiceClassRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ServiceClassRegistry {
    /// The registry seeded with the one built-in implementation this
    /// system ships (`"Service"`) plus the legacy names the original
    /// source's host records are known to still emit.
    pub fn with_builtins() -> Self {
        let mut known = HashMap::new();
        known.insert("Service".to_string(), "Service");

        let mut legacy_aliases = HashMap::new();
        legacy_aliases.insert("YadtService".to_string(), "Service".to_string());
        legacy_aliases.insert("yadtshell.components.Service".to_string(), "Service".to_string());

        Self { known, legacy_aliases }
    }

    /// Register an additional class name, e.g. from target configuration.
    pub fn register(&mut self, class: impl Into<String>) {
        let class = class.into();
        self.known.insert(class.clone(), "Service");
    }

    /// Register a legacy alias for an already-known class.
    pub fn alias(&mut self, legacy_name: impl Into<String>, canonical: impl Into<String>) {
        self.legacy_aliases.insert(legacy_name.into(), canonical.into());
    }

    /// Resolve a spec's `class` string (`None` defaults to `"Service"`)
    /// to the canonical class name it implements, or an
    /// `UnknownServiceClass` error if nothing matches.
    pub fn resolve(&self, class: Option<&str>) -> Result<&'static str, Error> {
        let name = class.unwrap_or("Service");
        if let Some(canonical) = self.known.get(name) {
            return Ok(canonical);
        }
        if let Some(aliased) = self.legacy_aliases.get(name) {
            if let Some(canonical) = self.known.get(aliased) {
                return Ok(canonical);
            }
        }
        Err(Error::Component(yadt_registry::ComponentError::UnknownServiceClass {
            class: name.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_service() {
        let registry = ServiceClassRegistry::with_builtins();
        assert_eq!(registry.resolve(None).unwrap(), "Service");
    }

    #[test]
    fn resolves_legacy_alias() {
        let registry = ServiceClassRegistry::with_builtins();
        assert_eq!(registry.resolve(Some("YadtService")).unwrap(), "Service");
    }

    #[test]
    fn unknown_class_errors() {
        let registry = ServiceClassRegistry::with_builtins();
        assert!(registry.resolve(Some("SomeUnknownClass")).is_err());
    }
}
