//! Read-only access to the company catalog.
//!
//! The catalog is populated elsewhere; the search tool only ever scans it.
pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::errors::StoreResult;
use crate::models::company::CompanyRecord;

/// A source of company records, visited in catalog order
pub trait CompanyStore: Send + Sync {
    /// Call `visit` for each record in catalog order until it returns false
    fn scan(&self, visit: &mut dyn FnMut(&CompanyRecord) -> bool) -> StoreResult<()>;
}
