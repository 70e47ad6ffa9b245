//! Explicit cache of loaded models.
//!
//! Loading a model (parsing coefficient files) is expensive, so loaded
//! models are kept by identifier together with a change token of their
//! inputs. The owner decides when to look for changed inputs by calling
//! [`ModelCache::invalidate_if_changed`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use super::Model;
use crate::error::FusionResult;
use crate::storage::StorageError;

/// Hex blake3 digest used as a change token of model input bytes.
#[must_use]
pub fn change_token(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Loads models and reports the current state of their inputs.
pub trait ModelLoader: Send + Sync {
    /// Token that changes whenever the inputs of the model change.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the inputs cannot be inspected.
    fn change_token(&self, id: &str) -> Result<String, StorageError>;

    /// Loads the model.
    ///
    /// # Errors
    ///
    /// Fails when the model cannot be loaded.
    fn load(&self, id: &str) -> FusionResult<Arc<dyn Model>>;
}

struct Entry {
    token: String,
    model: Arc<dyn Model>,
}

/// Loaded models keyed by identifier.
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn lock_err(op: &str) -> StorageError {
    StorageError::BackendError(format!("model cache lock poisoned during {op}"))
}

impl ModelCache {
    #[must_use]
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of loaded models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the loaded model, loading it on first use.
    ///
    /// # Errors
    ///
    /// Propagates loader failures.
    pub fn get(&self, id: &str) -> FusionResult<Arc<dyn Model>> {
        {
            let entries = self.entries.read().map_err(|_| lock_err("get"))?;
            if let Some(entry) = entries.get(id) {
                return Ok(Arc::clone(&entry.model));
            }
        }

        let token = self.loader.change_token(id)?;
        let model = self.loader.load(id)?;
        debug!(model = id, "model loaded");

        let mut entries = self.entries.write().map_err(|_| lock_err("get"))?;
        let entry = entries.entry(id.to_string()).or_insert(Entry { token, model });
        Ok(Arc::clone(&entry.model))
    }

    /// Drops the models whose inputs changed since they were loaded.
    ///
    /// Returns the identifiers of the dropped models. Models whose inputs
    /// can no longer be inspected are dropped too.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the cache lock is poisoned.
    pub fn invalidate_if_changed(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| lock_err("invalidate_if_changed"))?;
        let mut dropped: Vec<String> = entries
            .iter()
            .filter(|(id, entry)| {
                self.loader
                    .change_token(id)
                    .map_or(true, |token| token != entry.token)
            })
            .map(|(id, _)| id.clone())
            .collect();
        dropped.sort();
        for id in &dropped {
            entries.remove(id);
        }
        if !dropped.is_empty() {
            info!(models = ?dropped, "changed models invalidated");
        }
        Ok(dropped)
    }
}
