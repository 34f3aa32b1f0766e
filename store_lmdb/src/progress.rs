//! LMDB implementation of ProgressStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use tracker_store::{ProgressStore, StoreError};
use tracker_types::TrackProgress;

use crate::LmdbError;

pub struct LmdbProgressStore {
    pub(crate) env: Arc<Env>,
    pub(crate) progress_db: Database<Bytes, Bytes>,
}

fn encode(progress: &TrackProgress) -> Result<Vec<u8>, LmdbError> {
    bincode::serialize(progress).map_err(|e| LmdbError::Serialization(e.to_string()))
}

impl ProgressStore for LmdbProgressStore {
    fn get_progress(&self, source: i32) -> Result<TrackProgress, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .progress_db
            .get(&rtxn, source.to_be_bytes().as_slice())
            .map_err(LmdbError::from)?
            .ok_or_else(|| StoreError::NotFound(format!("progress of source {source}")))?;
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn insert_progress(&self, progress: &TrackProgress) -> Result<(), StoreError> {
        let key = progress.id.to_be_bytes();
        let bytes = encode(progress)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .progress_db
            .get(&wtxn, key.as_slice())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!(
                "progress of source {}",
                progress.id
            )));
        }
        self.progress_db
            .put(&mut wtxn, key.as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn update_progress(&self, progress: &TrackProgress) -> Result<(), StoreError> {
        let key = progress.id.to_be_bytes();
        let bytes = encode(progress)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .progress_db
            .get(&wtxn, key.as_slice())
            .map_err(LmdbError::from)?
            .is_none()
        {
            return Err(StoreError::NotFound(format!(
                "progress of source {}",
                progress.id
            )));
        }
        self.progress_db
            .put(&mut wtxn, key.as_slice(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
