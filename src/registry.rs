//! Named filesystem registry.
//!
//! Holds the configuration snapshots for every named filesystem and
//! lazily builds one [`MediaFileSystem`] instance per name.  Instances
//! are immutable once handed out; a configuration update builds a fresh
//! instance and swaps it in, so callers holding the old `Arc` keep a
//! consistent view until they re-fetch.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::FilesystemConfig;
use crate::errors::{FsError, FsResult};
use crate::fs::MediaFileSystem;
use crate::store::aws::AwsObjectStore;
use crate::store::client::ObjectStore;
use crate::store::memory::MemoryStore;

/// Build the store client a configuration snapshot asks for.
async fn build_store(config: &FilesystemConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        _ => Ok(Arc::new(AwsObjectStore::new(config).await?)),
    }
}

/// Registry of named virtual filesystems.
pub struct FilesystemRegistry {
    configs: RwLock<HashMap<String, Arc<FilesystemConfig>>>,
    instances: RwLock<HashMap<String, Arc<MediaFileSystem>>>,
}

impl FilesystemRegistry {
    /// Create a registry from the configured filesystem definitions.
    /// Instances are built on first access, not up front.
    pub fn new(configs: &HashMap<String, FilesystemConfig>) -> Self {
        let configs = configs
            .iter()
            .map(|(name, config)| (name.clone(), Arc::new(config.clone())))
            .collect();
        Self {
            configs: RwLock::new(configs),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// The names of every configured filesystem.
    pub async fn names(&self) -> Vec<String> {
        self.configs.read().await.keys().cloned().collect()
    }

    /// Fetch the filesystem registered under `name`, building it on
    /// first access.
    ///
    /// Construction happens outside the locks; when two callers race on
    /// first access, both build an instance and the first insert wins, so
    /// every caller still ends up with the same instance.
    pub async fn get(&self, name: &str) -> FsResult<Arc<MediaFileSystem>> {
        if let Some(fs) = self.instances.read().await.get(name) {
            return Ok(fs.clone());
        }

        let config = self
            .configs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::invalid(format!("no filesystem named {name:?} is configured")))?;

        let store = build_store(&config).await.map_err(|e| FsError::Storage {
            message: format!("failed to build store for {name:?}: {e}"),
        })?;
        let fs = Arc::new(MediaFileSystem::new(name, config, store));

        let mut instances = self.instances.write().await;
        Ok(instances.entry(name.to_string()).or_insert(fs).clone())
    }

    /// Replace the configuration for `name` and swap in a fresh instance
    /// built from it.  Callers holding the previous instance keep their
    /// consistent snapshot; the next [`Self::get`] sees the new one.
    pub async fn update_config(&self, name: &str, config: FilesystemConfig) -> FsResult<()> {
        let config = Arc::new(config);
        let store = build_store(&config).await.map_err(|e| FsError::Storage {
            message: format!("failed to build store for {name:?}: {e}"),
        })?;
        let fs = Arc::new(MediaFileSystem::new(name, config.clone(), store));

        self.configs
            .write()
            .await
            .insert(name.to_string(), config);
        self.instances.write().await.insert(name.to_string(), fs);

        info!("filesystem {name:?} reconfigured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config(virtual_path: &str) -> FilesystemConfig {
        FilesystemConfig {
            backend: "memory".to_string(),
            key_prefix: "media".to_string(),
            virtual_path: virtual_path.to_string(),
            ..FilesystemConfig::default()
        }
    }

    fn registry() -> FilesystemRegistry {
        let mut configs = HashMap::new();
        configs.insert("media".to_string(), memory_config("/media"));
        FilesystemRegistry::new(&configs)
    }

    #[tokio::test]
    async fn test_get_returns_same_instance() {
        let registry = registry();
        let a = registry.get("media").await.unwrap();
        let b = registry.get("media").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_get_unknown_name_fails() {
        let registry = registry();
        let err = registry.get("nope").await.unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_update_config_swaps_instance() {
        let registry = registry();
        let before = registry.get("media").await.unwrap();
        assert_eq!(before.get_url("x.jpg"), "/media/x.jpg");

        registry
            .update_config("media", memory_config("/assets"))
            .await
            .unwrap();

        let after = registry.get("media").await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.get_url("x.jpg"), "/assets/x.jpg");

        // The old handle still answers with its own snapshot.
        assert_eq!(before.get_url("x.jpg"), "/media/x.jpg");
    }

    #[tokio::test]
    async fn test_update_config_registers_new_name() {
        let registry = registry();
        registry
            .update_config("forms", memory_config("/forms"))
            .await
            .unwrap();
        let fs = registry.get("forms").await.unwrap();
        assert_eq!(fs.name(), "forms");
        let mut names = registry.names().await;
        names.sort();
        assert_eq!(names, vec!["forms", "media"]);
    }
}
