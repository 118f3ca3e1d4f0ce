//! Collection registry
//!
//! `SimBase` maps collection names to independently locked tables. The
//! registry lock only guards the name -> table map; document operations take
//! the per-table lock, so different collections never contend.
//!
//! ## Lock order
//!
//! registry lock, then table lock. The registry lock is never held while
//! waiting on a table write lock.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rand::seq::SliceRandom;
use simdb_core::{DocId, Neighbor, SimError, SimResult, TableConfig};
use tracing::{debug, info, warn};

use crate::config::{SimDbConfig, CONFIG_FILE_NAME};
use crate::manifest::Manifest;
use crate::table::SimTable;

/// A table shared between the registry and its callers
pub type SharedTable = Arc<RwLock<SimTable>>;

/// Maximum collection name length
pub const MAX_COLLECTION_NAME_LEN: usize = 256;

/// Validate a collection name
///
/// Names become file names and are joined with `|` in the manifest, so
/// they must be non-empty, at most 256 characters, and free of `|`, `/`,
/// `\` and NUL.
pub fn validate_collection_name(name: &str) -> SimResult<()> {
    let reject = |reason: &str| {
        Err(SimError::InvalidCollectionName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("name cannot be empty");
    }
    if name.chars().count() > MAX_COLLECTION_NAME_LEN {
        return reject("name exceeds 256 characters");
    }
    if name.contains(['|', '/', '\\', '\0']) {
        return reject("name cannot contain '|', '/', '\\' or NUL");
    }
    if name == "." || name == ".." {
        return reject("name cannot be a relative path component");
    }
    Ok(())
}

/// Registry of named similarity tables
pub struct SimBase {
    config: SimDbConfig,
    table_config: TableConfig,
    manifest: Option<Manifest>,
    collections: RwLock<BTreeMap<String, SharedTable>>,
}

impl std::fmt::Debug for SimBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimBase")
            .field("table_config", &self.table_config)
            .field("data_dir", &self.manifest.as_ref().map(Manifest::dir))
            .field("collections", &self.collections.read().len())
            .finish()
    }
}

impl SimBase {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Create an in-memory registry with no data directory
    ///
    /// `save`/`load` return a `Configuration` error; background maintenance
    /// is off.
    pub fn ephemeral(table_config: TableConfig) -> SimResult<Self> {
        table_config.validate()?;
        let config = SimDbConfig {
            cron_interval_ms: 0,
            load_factor: table_config.load_factor,
            max_neighbors: table_config.max_neighbors,
            score_formula: table_config.score_formula,
        };
        Ok(SimBase {
            config,
            table_config,
            manifest: None,
            collections: RwLock::new(BTreeMap::new()),
        })
    }

    /// Open (or create) a data directory
    ///
    /// Writes a default `simdb.toml` on first open, then loads every
    /// collection listed in the manifest.
    pub fn open<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let data_dir = path.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        SimDbConfig::write_default_if_missing(&config_path)?;
        let config = SimDbConfig::from_file(&config_path)?;

        Self::open_with_config(data_dir, config)
    }

    /// Open a data directory with an explicit configuration
    ///
    /// The supplied config is written to `simdb.toml` so that later
    /// `open()` calls pick up the same settings.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: SimDbConfig) -> SimResult<Self> {
        let data_dir = path.as_ref();
        let table_config = config.table_config()?;
        std::fs::create_dir_all(data_dir)?;
        config.write_to_file(&data_dir.join(CONFIG_FILE_NAME))?;

        let base = SimBase {
            config,
            table_config,
            manifest: Some(Manifest::new(data_dir)),
            collections: RwLock::new(BTreeMap::new()),
        };
        let loaded = base.load_all()?;
        info!(
            target: "simdb::registry",
            path = %data_dir.display(),
            collections = loaded,
            "Opened simdb"
        );
        Ok(base)
    }

    /// Engine configuration
    pub fn config(&self) -> &SimDbConfig {
        &self.config
    }

    /// Table configuration used for every collection
    pub fn table_config(&self) -> TableConfig {
        self.table_config
    }

    /// Data directory, `None` for an ephemeral registry
    pub fn data_dir(&self) -> Option<&Path> {
        self.manifest.as_ref().map(Manifest::dir)
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Names of all collections, sorted
    pub fn collections(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Shared handle on a collection's table
    pub fn table(&self, name: &str) -> Option<SharedTable> {
        self.collections.read().get(name).cloned()
    }

    fn require(&self, name: &str) -> SimResult<SharedTable> {
        self.table(name).ok_or_else(|| SimError::CollectionNotFound {
            name: name.to_string(),
        })
    }

    fn get_or_create(&self, name: &str) -> SimResult<SharedTable> {
        if let Some(table) = self.table(name) {
            return Ok(table);
        }
        validate_collection_name(name)?;

        let mut collections = self.collections.write();
        if let Some(table) = collections.get(name) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(RwLock::new(SimTable::new(self.table_config)?));
        collections.insert(name.to_string(), Arc::clone(&table));
        debug!(target: "simdb::registry", collection = name, "Created collection");
        Ok(table)
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Insert or overwrite a document, creating the collection if needed
    pub fn add(&self, name: &str, docid: DocId, components: &[f32]) -> SimResult<()> {
        let table = self.get_or_create(name)?;
        let mut guard = table.write();
        guard.insert_or_update(docid, components)
    }

    /// Same as [`SimBase::add`]
    pub fn update(&self, name: &str, docid: DocId, components: &[f32]) -> SimResult<()> {
        self.add(name, docid, components)
    }

    /// Delete a document
    ///
    /// Returns whether the document existed.
    ///
    /// # Errors
    /// `CollectionNotFound` if the collection doesn't exist.
    pub fn delete(&self, name: &str, docid: DocId) -> SimResult<bool> {
        let table = self.require(name)?;
        let mut guard = table.write();
        Ok(guard.delete(docid))
    }

    /// Neighbors of a document, best first
    ///
    /// Empty for unknown collections and documents.
    pub fn retrieve(&self, name: &str, docid: DocId) -> Vec<Neighbor> {
        match self.table(name) {
            Some(table) => table.read().retrieve(docid),
            None => Vec::new(),
        }
    }

    /// Stored score between a document and one of its neighbors
    pub fn similarity(&self, name: &str, docid: DocId, other: DocId) -> SimResult<f32> {
        let table = self.require(name)?;
        let guard = table.read();
        guard.similarity(docid, other)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Rebuild a collection without its tombstones
    ///
    /// The new table is built under an upgradable read lock (readers keep
    /// going) and swapped in under the write lock.
    pub fn compact(&self, name: &str) -> SimResult<()> {
        let table = self.require(name)?;
        let guard = table.upgradable_read();
        if guard.tombstoned() == 0 {
            debug!(target: "simdb::registry", collection = name, "Nothing to compact");
            return Ok(());
        }
        let compacted = guard.compact();
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        *guard = compacted;
        Ok(())
    }

    /// Compact one randomly chosen collection
    ///
    /// Returns the chosen name, or `None` if there are no collections.
    pub fn compact_random(&self) -> SimResult<Option<String>> {
        let names = self.collections();
        let Some(name) = names.choose(&mut rand::thread_rng()) else {
            warn!(target: "simdb::registry", "No collections to compact");
            return Ok(None);
        };
        self.compact(name)?;
        Ok(Some(name.clone()))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn manifest(&self) -> SimResult<&Manifest> {
        self.manifest
            .as_ref()
            .ok_or_else(|| SimError::configuration("data_dir", "registry has no data directory"))
    }

    /// Persist one collection and refresh the manifest
    pub fn save(&self, name: &str) -> SimResult<()> {
        let manifest = self.manifest()?;
        let table = self.require(name)?;
        let bytes = table.read().serialize()?;
        manifest.write_dump(name, &bytes)?;
        manifest.write_names(&self.collections())?;
        Ok(())
    }

    /// Persist every collection and the manifest
    ///
    /// Returns the number of collections written.
    pub fn save_all(&self) -> SimResult<usize> {
        let manifest = self.manifest()?;
        let names = self.collections();
        for name in &names {
            let Some(table) = self.table(name) else {
                continue;
            };
            let bytes = table.read().serialize()?;
            manifest.write_dump(name, &bytes)?;
        }
        manifest.write_names(&names)?;
        info!(target: "simdb::registry", collections = names.len(), "Saved all collections");
        Ok(names.len())
    }

    /// Load (or reload) one collection from its dump
    ///
    /// Returns false, with a warning, if no dump exists. A loaded table
    /// replaces any in-memory collection of the same name.
    pub fn load(&self, name: &str) -> SimResult<bool> {
        validate_collection_name(name)?;
        let manifest = self.manifest()?;
        let Some(bytes) = manifest.read_dump(name)? else {
            warn!(target: "simdb::registry", collection = name, "No dump found, skipping");
            return Ok(false);
        };
        let table = SimTable::deserialize(self.table_config, &bytes)?;
        debug!(
            target: "simdb::registry",
            collection = name,
            documents = table.len(),
            "Loaded collection"
        );
        self.collections
            .write()
            .insert(name.to_string(), Arc::new(RwLock::new(table)));
        Ok(true)
    }

    /// Load every collection listed in the manifest
    ///
    /// Returns the number of collections loaded.
    pub fn load_all(&self) -> SimResult<usize> {
        let names = self.manifest()?.read_names()?;
        let mut loaded = 0;
        for name in &names {
            if self.load(name)? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}
