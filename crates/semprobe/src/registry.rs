//! Named component registry with aliases.
//!
//! Components are registered under a canonical name. Aliases map to exactly
//! one canonical name and never shadow a registered component. Registering
//! `loanApplication` also wires the aliases `loan` and `application`.
//!
//! ## Example
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new(ctx.timing());
//! registry.register("loanApplication", Arc::new(LoanApplicationPage::new(ctx)))?;
//! let page = registry.get_as::<LoanApplicationPage>("loan").unwrap();
//! ```

use crate::component::Component;
use crate::config::TimingConfig;
use crate::result::{SemprobeError, SemprobeResult};
use crate::wait::duration_ms;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Aliases wired automatically for well-known canonical names
pub const WELL_KNOWN_ALIASES: &[(&str, &[&str])] = &[("loanApplication", &["loan", "application"])];

/// Registry size summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Registered components
    pub total_components: usize,
    /// Registered aliases
    pub aliases: usize,
}

/// Components by canonical name, plus an alias table
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
    aliases: HashMap<String, String>,
    poll_interval: Duration,
    default_timeout: Duration,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.list())
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(&TimingConfig::default())
    }
}

impl ComponentRegistry {
    /// Create an empty registry using the registry poll and wait timings
    #[must_use]
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            components: HashMap::new(),
            aliases: HashMap::new(),
            poll_interval: timing.registry_poll(),
            default_timeout: timing.registry_wait(),
        }
    }

    /// Register a component under a canonical name, replacing any previous one.
    ///
    /// Fails when the name is already an alias.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
    ) -> SemprobeResult<()> {
        let name = name.into();
        if let Some(target) = self.aliases.get(&name) {
            return Err(SemprobeError::AliasConflict {
                alias: name.clone(),
                message: format!("name is already an alias of '{target}'"),
            });
        }
        debug!(component = %name, "registering component");
        let _ = self.components.insert(name.clone(), component);

        for (canonical, aliases) in WELL_KNOWN_ALIASES {
            if *canonical == name {
                for alias in *aliases {
                    if self.components.contains_key(*alias) {
                        continue;
                    }
                    match self.aliases.get(*alias) {
                        Some(existing) if *existing != name => {
                            warn!(alias, existing = %existing, "alias already taken; not rewiring");
                        }
                        _ => {
                            let _ = self.aliases.insert((*alias).to_string(), name.clone());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Point an alias at a registered canonical name
    pub fn alias(&mut self, alias: impl Into<String>, canonical: &str) -> SemprobeResult<()> {
        let alias = alias.into();
        if !self.components.contains_key(canonical) {
            return Err(SemprobeError::AliasConflict {
                alias,
                message: format!("no component named '{canonical}'"),
            });
        }
        if self.components.contains_key(&alias) {
            return Err(SemprobeError::AliasConflict {
                alias,
                message: "a component is registered under that name".to_string(),
            });
        }
        if let Some(existing) = self.aliases.get(&alias) {
            if existing != canonical {
                return Err(SemprobeError::AliasConflict {
                    message: format!("already an alias of '{existing}'"),
                    alias,
                });
            }
        }
        let _ = self.aliases.insert(alias, canonical.to_string());
        Ok(())
    }

    /// Canonical name for a name or alias
    #[must_use]
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Look up by canonical name or alias
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(self.resolve_name(name)).cloned()
    }

    /// Look up and downcast to a concrete component type
    #[must_use]
    pub fn get_as<T: Component>(&self, name: &str) -> Option<&T> {
        self.components
            .get(self.resolve_name(name))
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }

    /// Whether a name or alias resolves to a component
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.components.contains_key(self.resolve_name(name))
    }

    /// Canonical names, sorted
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Remove a component and every alias pointing at it
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.components.remove(name).is_some();
        self.aliases.retain(|_, target| target != name);
        removed
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.components.clear();
        self.aliases.clear();
    }

    /// Component and alias counts
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_components: self.components.len(),
            aliases: self.aliases.len(),
        }
    }

    /// `is_ready` of every component by canonical name
    pub async fn health_status(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for (name, component) in &self.components {
            let _ = health.insert(name.clone(), component.is_ready().await);
        }
        health
    }

    /// Poll until the named component exists and is ready.
    ///
    /// Fails with [`SemprobeError::ComponentNotReady`] after `timeout`
    /// (default: the registry wait).
    pub async fn wait_for_component(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> SemprobeResult<Arc<dyn Component>> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(component) = self.get(name) {
                if component.is_ready().await {
                    return Ok(component);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        warn!(component = name, timeout_ms = duration_ms(timeout), "component never became ready");
        Err(SemprobeError::ComponentNotReady {
            name: name.to_string(),
            timeout_ms: duration_ms(timeout),
        })
    }

    /// Run the component's initialization hook; `false` when missing or failing
    pub async fn initialize_component(&self, name: &str) -> bool {
        let Some(component) = self.get(name) else {
            return false;
        };
        match component.initialize().await {
            Ok(()) => true,
            Err(e) => {
                warn!(component = name, error = %e, "failed to initialize component");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Dummy {
        ready: AtomicBool,
        checks: AtomicUsize,
        fail_init: bool,
    }

    #[async_trait]
    impl Component for Dummy {
        fn name(&self) -> &str {
            "Dummy"
        }

        async fn is_ready(&self) -> bool {
            let _ = self.checks.fetch_add(1, Ordering::SeqCst);
            self.ready.load(Ordering::SeqCst)
        }

        async fn initialize(&self) -> SemprobeResult<()> {
            if self.fail_init {
                return Err(SemprobeError::InvalidState {
                    message: "boom".to_string(),
                });
            }
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn dummy(ready: bool) -> Arc<Dummy> {
        let p = Dummy::default();
        p.ready.store(ready, Ordering::SeqCst);
        Arc::new(p)
    }

    mod alias_tests {
        use super::*;

        #[test]
        fn test_well_known_aliases() {
            let mut registry = ComponentRegistry::default();
            registry.register("loanApplication", dummy(true)).unwrap();
            assert!(registry.has("loan"));
            assert!(registry.has("application"));
            assert!(registry.get_as::<Dummy>("loan").is_some());
            assert_eq!(registry.resolve_name("application"), "loanApplication");
            assert_eq!(registry.stats(), RegistryStats { total_components: 1, aliases: 2 });
        }

        #[test]
        fn test_remove_prunes_aliases() {
            let mut registry = ComponentRegistry::default();
            registry.register("loanApplication", dummy(true)).unwrap();
            registry.register("other", dummy(true)).unwrap();
            registry.alias("o", "other").unwrap();

            assert!(registry.remove("loanApplication"));
            assert!(!registry.has("loan"));
            assert!(registry.has("o"));
            assert!(!registry.remove("loanApplication"));
            assert_eq!(registry.list(), vec!["other"]);
        }

        #[test]
        fn test_alias_conflicts() {
            let mut registry = ComponentRegistry::default();
            registry.register("a", dummy(true)).unwrap();
            registry.register("b", dummy(true)).unwrap();
            registry.alias("x", "a").unwrap();
            registry.alias("x", "a").unwrap();

            assert!(matches!(
                registry.alias("x", "b"),
                Err(SemprobeError::AliasConflict { .. })
            ));
            assert!(registry.alias("b", "a").is_err());
            assert!(registry.alias("y", "missing").is_err());
            assert!(registry.register("x", dummy(true)).is_err());
        }

        #[test]
        fn test_well_known_alias_never_repoints_user_alias() {
            let mut registry = ComponentRegistry::default();
            registry.register("other", dummy(true)).unwrap();
            registry.alias("loan", "other").unwrap();

            registry.register("loanApplication", dummy(true)).unwrap();
            assert_eq!(registry.resolve_name("loan"), "other");
            assert_eq!(registry.resolve_name("application"), "loanApplication");
            assert_eq!(registry.stats(), RegistryStats { total_components: 2, aliases: 2 });
        }

        #[test]
        fn test_get_as_wrong_type_is_none() {
            let mut registry = ComponentRegistry::default();
            registry.register("p", dummy(true)).unwrap();
            assert!(registry.get_as::<crate::form::FormComponent>("p").is_none());
        }

        #[test]
        fn test_clear() {
            let mut registry = ComponentRegistry::default();
            registry.register("loanApplication", dummy(true)).unwrap();
            registry.clear();
            assert_eq!(registry.stats(), RegistryStats { total_components: 0, aliases: 0 });
        }
    }

    mod readiness_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_ready_component() {
            let mut registry = ComponentRegistry::default();
            registry.register("loanApplication", dummy(true)).unwrap();
            let component = registry.wait_for_component("loan", None).await.unwrap();
            assert_eq!(component.name(), "Dummy");
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_missing_component_times_out() {
            let registry = ComponentRegistry::default();
            let start = Instant::now();
            let err = registry
                .wait_for_component("ghost", Some(Duration::from_millis(2000)))
                .await
                .err().unwrap();
            assert!(matches!(
                err,
                SemprobeError::ComponentNotReady { timeout_ms: 2000, .. }
            ));
            assert!(start.elapsed() >= Duration::from_millis(2000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_polls_at_fixed_interval() {
            let mut registry = ComponentRegistry::default();
            let p = dummy(false);
            registry.register("p", p.clone()).unwrap();
            assert!(registry
                .wait_for_component("p", Some(Duration::from_millis(1900)))
                .await
                .is_err());
            assert_eq!(p.checks.load(Ordering::SeqCst), 4);
        }

        #[tokio::test]
        async fn test_health_and_initialize() {
            let mut registry = ComponentRegistry::default();
            let lazy = dummy(false);
            registry.register("lazy", lazy.clone()).unwrap();
            registry
                .register(
                    "broken",
                    Arc::new(Dummy {
                        fail_init: true,
                        ..Dummy::default()
                    }),
                )
                .unwrap();

            let health = registry.health_status().await;
            assert_eq!(health.get("lazy"), Some(&false));

            assert!(registry.initialize_component("lazy").await);
            assert!(!registry.initialize_component("broken").await);
            assert!(!registry.initialize_component("missing").await);
            assert_eq!(registry.health_status().await.get("lazy"), Some(&true));
        }
    }
}
