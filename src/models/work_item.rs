//! Work items dispatched through the worker pool.

use serde::{Deserialize, Serialize};

/// A unit of work with a stable identity used for dedup and journaling.
pub trait WorkItem {
    fn item_id(&self) -> &str;
}

impl WorkItem for String {
    fn item_id(&self) -> &str {
        self
    }
}

impl<T: WorkItem + ?Sized> WorkItem for Box<T> {
    fn item_id(&self) -> &str {
        (**self).item_id()
    }
}

/// An item identified only by the id of a record already present in the index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedId {
    pub id: String,
}

impl IndexedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl WorkItem for IndexedId {
    fn item_id(&self) -> &str {
        &self.id
    }
}

impl From<&str> for IndexedId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
