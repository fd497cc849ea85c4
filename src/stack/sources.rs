//! In-tree [`ExportSource`] implementations.
//!
//! - [`MemoryExportSource`] keeps exports in memory. Stacks can be registered
//!   as already converged or as pending, to be resolved later through a
//!   [`Promise`].
//! - [`FileExportSource`] reads a JSON snapshot of exports, keyed by full stack
//!   reference, as written by the provisioning engine after it converges:
//!
//! ```json
//! {
//!   "integrail--prod": {
//!     "integrail--mongo-main-ab12-mongo-uri": "mongodb+srv://cluster0.example.net"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs;
use tracing::debug;

use super::{ExportSource, StackExports, StackReference};
use crate::core::{BindError, Output, Promise, promise};

/// Exports held in memory.
#[derive(Debug, Default)]
pub struct MemoryExportSource {
    stacks: DashMap<String, Output<Arc<StackExports>>>,
    opens: AtomicUsize,
}

impl MemoryExportSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register converged exports for `reference`.
    pub fn insert<K, V>(&self, reference: &str, exports: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let exports: StackExports =
            exports.into_iter().map(|(key, value)| (key.into(), value.into())).collect();
        self.stacks.insert(reference.to_string(), Output::ready(Arc::new(exports)));
    }

    /// Register a stack whose exports are not known yet.
    pub fn insert_pending(&self, reference: &str) -> Promise<Arc<StackExports>> {
        let (cell, exports) = promise(reference);
        self.stacks.insert(reference.to_string(), exports);
        cell
    }

    /// How many times a stack was opened through [`ExportSource::open`].
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ExportSource for MemoryExportSource {
    fn open(&self, reference: &StackReference) -> Output<Arc<StackExports>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.stacks.get(reference.full_reference()) {
            Some(exports) => exports.clone(),
            None => Output::failed(BindError::StackUnavailable {
                reference: reference.full_reference().to_string(),
                reason: "no exports recorded for this stack".to_string(),
            }),
        }
    }
}

/// Exports read from a JSON snapshot file.
#[derive(Debug)]
pub struct FileExportSource {
    inner: MemoryExportSource,
}

impl FileExportSource {
    /// Load the snapshot at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read exports snapshot {}", path.display()))?;
        let stacks: BTreeMap<String, StackExports> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse exports snapshot {}", path.display()))?;

        debug!("Loaded exports of {} stack(s) from {}", stacks.len(), path.display());
        let inner = MemoryExportSource::new();
        for (reference, exports) in stacks {
            inner.insert(&reference, exports);
        }
        Ok(Self {
            inner,
        })
    }
}

impl ExportSource for FileExportSource {
    fn open(&self, reference: &StackReference) -> Output<Arc<StackExports>> {
        self.inner.open(reference)
    }
}
