use std::path::Path;

use tracing::info;

use super::CompanyStore;
use crate::errors::StoreResult;
use crate::models::company::CompanyRecord;

/// A catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<CompanyRecord>,
}

impl MemoryStore {
    pub fn new(records: Vec<CompanyRecord>) -> Self {
        Self { records }
    }

    /// Load a catalog from a JSON file holding an array of company records
    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<CompanyRecord> = serde_json::from_str(&raw)?;
        info!("loaded {} companies from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CompanyStore for MemoryStore {
    fn scan(&self, visit: &mut dyn FnMut(&CompanyRecord) -> bool) -> StoreResult<()> {
        for record in &self.records {
            if !visit(record) {
                break;
            }
        }
        Ok(())
    }
}
