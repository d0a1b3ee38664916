//! Single-slot store for the last campaign result

use super::{PersistenceError, SharedStore, RESULT_DOC};
use crate::campaign::CampaignResult;

#[derive(Clone)]
pub struct ResultStore {
    store: SharedStore,
}

impl ResultStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Replace the stored result
    pub fn save(&self, result: &CampaignResult) -> Result<(), PersistenceError> {
        let doc = serde_json::to_string_pretty(result).map_err(|source| {
            PersistenceError::Encode {
                name: RESULT_DOC.to_string(),
                source,
            }
        })?;
        self.store.write(RESULT_DOC, &doc)
    }

    /// Last stored result, if any campaign has finished
    pub fn load(&self) -> Result<Option<CampaignResult>, PersistenceError> {
        let Some(doc) = self.store.read(RESULT_DOC)? else {
            return Ok(None);
        };
        serde_json::from_str(&doc)
            .map(Some)
            .map_err(|source| PersistenceError::Decode {
                name: RESULT_DOC.to_string(),
                source,
            })
    }
}
