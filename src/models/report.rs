use serde::Serialize;

use crate::services::Tally;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryIngest {
    pub category: String,
    pub fetched: usize,
    pub inserted: usize,
    /// Set when the category was skipped for this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub categories: Vec<CategoryIngest>,
    pub fetched: usize,
    pub inserted: usize,
}

impl IngestReport {
    pub fn push(&mut self, category: CategoryIngest) {
        self.fetched += category.fetched;
        self.inserted += category.inserted;
        self.categories.push(category);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummarizeReport {
    pub picked: usize,
    pub ok: usize,
    pub fail: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryKeep {
    pub category: String,
    pub ready_primary: usize,
    pub topup: Tally,
    pub used_fallback: bool,
    pub cached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAbort {
    pub category: String,
    pub error: String,
    /// The store rejected a read or write, as opposed to a bad input.
    pub store_failure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeeperReport {
    pub categories: Vec<CategoryKeep>,
    pub aborted: Vec<CategoryAbort>,
}

impl KeeperReport {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_empty()
    }
}
