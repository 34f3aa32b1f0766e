//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracker_store::StoreNames;

use crate::{LmdbAuthStore, LmdbError, LmdbNodeStore, LmdbProgressStore};

const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    nodes_db: Database<Bytes, Bytes>,
    auth_db: Database<Bytes, Bytes>,
    progress_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at `path`, creating the named
    /// databases if needed.
    pub fn open(path: &Path, names: &StoreNames, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: each environment path is opened once per process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let nodes_db = env.create_database(&mut wtxn, Some(names.node_db.as_str()))?;
        let auth_db = env.create_database(&mut wtxn, Some(names.auth_db.as_str()))?;
        let progress_db = env.create_database(&mut wtxn, Some(names.progress_db.as_str()))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            nodes_db,
            auth_db,
            progress_db,
        })
    }

    pub fn node_store(&self) -> LmdbNodeStore {
        LmdbNodeStore {
            env: Arc::clone(&self.env),
            nodes_db: self.nodes_db,
        }
    }

    pub fn auth_store(&self) -> LmdbAuthStore {
        LmdbAuthStore {
            env: Arc::clone(&self.env),
            auth_db: self.auth_db,
        }
    }

    pub fn progress_store(&self) -> LmdbProgressStore {
        LmdbProgressStore {
            env: Arc::clone(&self.env),
            progress_db: self.progress_db,
        }
    }
}
