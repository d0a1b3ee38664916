//! Durable, deduplicated recipient list
//!
//! The list is one address per line. Identity is the lowercased address;
//! the first spelling seen is the one kept. Every merge reshuffles the
//! whole list so delivery order differs from insertion order across runs.

use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashSet;

use super::{PersistenceError, SharedStore, RECIPIENTS_DOC};

/// Outcome of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Store size after the merge
    pub total: usize,

    /// Addresses that were not present before
    pub appended: usize,
}

/// Recipient list persisted in a [`DocumentStore`](super::DocumentStore)
#[derive(Clone)]
pub struct RecipientStore {
    store: SharedStore,
}

impl RecipientStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Current list in persisted order
    pub fn load_all(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .store
            .read(RECIPIENTS_DOC)?
            .map(|doc| parse_lines(&doc))
            .unwrap_or_default())
    }

    /// Number of stored recipients
    pub fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.load_all()?.len())
    }

    /// First `limit` recipients in persisted order
    pub fn preview(&self, limit: usize) -> Result<Vec<String>, PersistenceError> {
        let mut all = self.load_all()?;
        all.truncate(limit);
        Ok(all)
    }

    /// Raw persisted document
    pub fn export(&self) -> Result<String, PersistenceError> {
        Ok(self.store.read(RECIPIENTS_DOC)?.unwrap_or_default())
    }

    /// Union `new_addresses` into the store, then reshuffle everything
    ///
    /// This is a read-modify-write of the whole document. Two concurrent
    /// merges can lose one another's additions.
    pub fn merge<S: AsRef<str>>(
        &self,
        new_addresses: &[S],
    ) -> Result<MergeOutcome, PersistenceError> {
        let existing = self.load_all()?;
        let mut seen: HashSet<String> = HashSet::with_capacity(existing.len());
        let mut merged: Vec<String> = Vec::with_capacity(existing.len() + new_addresses.len());

        for address in existing {
            if seen.insert(address.to_lowercase()) {
                merged.push(address);
            }
        }
        let before = merged.len();

        for address in new_addresses {
            let address = address.as_ref().trim();
            if address.is_empty() {
                continue;
            }
            if seen.insert(address.to_lowercase()) {
                merged.push(address.to_string());
            }
        }
        let appended = merged.len() - before;

        merged.shuffle(&mut rand::thread_rng());
        self.store.write(RECIPIENTS_DOC, &render_lines(&merged))?;

        tracing::info!(total = merged.len(), appended, "Recipients merged");
        Ok(MergeOutcome {
            total: merged.len(),
            appended,
        })
    }

    /// Truncate the list to empty
    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.store.write(RECIPIENTS_DOC, "")?;
        tracing::info!("Recipients cleared");
        Ok(())
    }
}

fn parse_lines(doc: &str) -> Vec<String> {
    doc.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn render_lines(addresses: &[String]) -> String {
    let mut doc = addresses.join("\n");
    if !doc.is_empty() {
        doc.push('\n');
    }
    doc
}
