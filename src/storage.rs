//! Injected local persistence
//!
//! The engine specifies only the shape of what it stores (profile and weekly
//! snapshots), never the storage technology. Hosts inject an implementation
//! backed by whatever local key-value or document store they use; [`MemoryStore`]
//! backs tests and the CLI. Nothing here ever touches a network.

use crate::error::EngineError;
use crate::profile::UserCrisisProfile;
use crate::recovery::snapshot::WeeklySnapshot;

/// Local persistence collaborator for engine state
pub trait StateStore {
    /// Load the user profile; `Ok(None)` when none was saved yet.
    fn load_profile(&self) -> Result<Option<UserCrisisProfile>, EngineError>;

    /// Persist the user profile.
    fn save_profile(&mut self, profile: &UserCrisisProfile) -> Result<(), EngineError>;

    /// Load all finalized weekly snapshots.
    fn load_snapshots(&self) -> Result<Vec<WeeklySnapshot>, EngineError>;

    /// Persist the finalized weekly snapshots.
    fn save_snapshots(&mut self, snapshots: &[WeeklySnapshot]) -> Result<(), EngineError>;
}

/// In-memory document store for tests and offline replay
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    profile: Option<String>,
    snapshots: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a raw profile document (tests use this to model
    /// corruption).
    pub fn with_profile_document(document: impl Into<String>) -> Self {
        Self {
            profile: Some(document.into()),
            snapshots: None,
        }
    }
}

impl StateStore for MemoryStore {
    fn load_profile(&self) -> Result<Option<UserCrisisProfile>, EngineError> {
        match &self.profile {
            None => Ok(None),
            Some(document) => UserCrisisProfile::from_json(document)
                .map(Some)
                .map_err(|e| EngineError::InvalidProfile(e.to_string())),
        }
    }

    fn save_profile(&mut self, profile: &UserCrisisProfile) -> Result<(), EngineError> {
        self.profile = Some(profile.to_json()?);
        Ok(())
    }

    fn load_snapshots(&self) -> Result<Vec<WeeklySnapshot>, EngineError> {
        match &self.snapshots {
            None => Ok(Vec::new()),
            Some(document) => serde_json::from_str(document)
                .map_err(|e| EngineError::StorageError(e.to_string())),
        }
    }

    fn save_snapshots(&mut self, snapshots: &[WeeklySnapshot]) -> Result<(), EngineError> {
        self.snapshots = Some(serde_json::to_string(snapshots)?);
        Ok(())
    }
}
