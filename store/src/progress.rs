//! Tracking cursor storage trait.

use crate::StoreError;
use tracker_types::TrackProgress;

pub trait ProgressStore {
    fn get_progress(&self, source: i32) -> Result<TrackProgress, StoreError>;
    /// Fails with [`StoreError::Duplicate`] if the source already has a cursor.
    fn insert_progress(&self, progress: &TrackProgress) -> Result<(), StoreError>;
    fn update_progress(&self, progress: &TrackProgress) -> Result<(), StoreError>;

    /// Load the cursor, creating it at offset 0 on first use.
    fn get_or_create_progress(&self, source: i32, now: i64) -> Result<TrackProgress, StoreError> {
        match self.get_progress(source) {
            Ok(p) => Ok(p),
            Err(StoreError::NotFound(_)) => {
                let fresh = TrackProgress::new(source, now);
                match self.insert_progress(&fresh) {
                    Ok(()) => Ok(fresh),
                    Err(StoreError::Duplicate(_)) => self.get_progress(source),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}
