//! Catalog of everything that can be migrated.
//!
//! Built once during application wiring and shared by reference with the
//! orchestrator, the startup driver and the storage-mode resolver. Lookups
//! take a read lock; registration only happens before the registry is shared.

mod definition;

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

pub use definition::{
    GroupResource, MigrationDefinition, ResourceInfo, ResourceMigrator, Validator,
    ValidatorFactory,
};

#[derive(Default)]
pub struct MigrationRegistry {
    definitions: RwLock<IndexMap<String, Arc<MigrationDefinition>>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition.
    ///
    /// # Panics
    ///
    /// On a duplicate identifier or a definition without resources; both are
    /// wiring bugs that would otherwise corrupt the migration log.
    #[track_caller]
    pub fn register(&self, definition: MigrationDefinition) {
        assert!(
            !definition.resources.is_empty(),
            "migration definition '{}' declares no resources",
            definition.id
        );

        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if definitions.contains_key(&definition.id) {
            panic!("migration definition '{}' registered twice", definition.id);
        }
        definitions.insert(definition.id.clone(), Arc::new(definition));
    }

    pub fn get(&self, id: &str) -> Option<Arc<MigrationDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// All definitions in registration order
    pub fn all(&self) -> Vec<Arc<MigrationDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_resource(&self, group_resource: &GroupResource) -> bool {
        self.definition_for(group_resource).is_some()
    }

    pub fn get_migrator(&self, group_resource: &GroupResource) -> Option<Arc<dyn ResourceMigrator>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find_map(|definition| definition.migrators.get(group_resource).cloned())
    }

    /// First registered definition that declares the resource
    pub fn definition_for(&self, group_resource: &GroupResource) -> Option<Arc<MigrationDefinition>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|definition| definition.covers(group_resource))
            .cloned()
    }

    /// Registration index of the definition owning the resource, and the
    /// resource's position inside it. Sorting by this key yields dependency
    /// order.
    pub fn declaration_order(&self, group_resource: &GroupResource) -> Option<(usize, usize)> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .enumerate()
            .find_map(|(index, definition)| {
                definition
                    .position(group_resource)
                    .map(|position| (index, position))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MigrationResult;
    use crate::services::migration_run::{BulkSink, MigrationRun};
    use async_trait::async_trait;

    struct NoopMigrator;

    #[async_trait]
    impl ResourceMigrator for NoopMigrator {
        async fn migrate(&self, _run: &MigrationRun<'_>, _sink: &mut BulkSink) -> MigrationResult<()> {
            Ok(())
        }
    }

    fn definition(id: &str, resources: &[(&str, &str)]) -> MigrationDefinition {
        resources
            .iter()
            .fold(MigrationDefinition::new(id, format!("{} migration", id)), |def, (g, r)| {
                def.resource(
                    ResourceInfo::new(GroupResource::new(*g, *r), [*r]),
                    Arc::new(NoopMigrator),
                )
            })
    }

    #[test]
    fn test_all_returns_registration_order() {
        let registry = MigrationRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry.register(definition(id, &[("g.app", id)]));
        }

        let ids: Vec<String> = registry.all().iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let registry = MigrationRegistry::new();
        registry.register(definition("playlists", &[("playlist.app", "playlists")]));
        registry.register(definition("playlists", &[("other.app", "others")]));
    }

    #[test]
    #[should_panic(expected = "declares no resources")]
    fn test_empty_definition_panics() {
        MigrationRegistry::new().register(MigrationDefinition::new("empty", "empty migration"));
    }

    #[test]
    fn test_lookups_only_match_registered_resources() {
        let registry = MigrationRegistry::new();
        registry.register(definition("a", &[("a.app", "folders"), ("a.app", "dashboards")]));

        let folders = GroupResource::new("a.app", "folders");
        let missing = GroupResource::new("b.app", "folders");

        assert!(registry.has_resource(&folders));
        assert!(registry.get_migrator(&folders).is_some());
        assert!(!registry.has_resource(&missing));
        assert!(registry.get_migrator(&missing).is_none());
        assert_eq!(
            registry.declaration_order(&GroupResource::new("a.app", "dashboards")),
            Some((0, 1))
        );
        assert_eq!(registry.get("a").map(|d| d.id.clone()), Some("a".to_string()));
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Arc::new(MigrationRegistry::new());
        registry.register(definition("a", &[("a.app", "things")]));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let known = GroupResource::new("a.app", "things");
                    let unknown = GroupResource::new("a.app", format!("other-{}", i));
                    for _ in 0..500 {
                        assert!(registry.has_resource(&known));
                        assert!(registry.get_migrator(&unknown).is_none());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
