//! Last-used HTML template, overwritten on every save

use super::{PersistenceError, SharedStore, TEMPLATE_DOC};

#[derive(Clone)]
pub struct TemplateStore {
    store: SharedStore,
}

impl TemplateStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn save(&self, html: &str) -> Result<(), PersistenceError> {
        self.store.write(TEMPLATE_DOC, html)
    }

    pub fn load(&self) -> Result<Option<String>, PersistenceError> {
        self.store.read(TEMPLATE_DOC)
    }
}
