//! redb table definitions and key helpers.

use chrono::{DateTime, Utc};
use redb::TableDefinition;

/// File name for the redb database within the configured DB directory.
pub(super) const REDB_FILE_NAME: &str = "data.redb";

/// Canonical document rows (`Document`, bincode-encoded).
pub(super) const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// Recency index ordered by reverse-millis then id.
pub(super) const DOCUMENTS_BY_UPDATED: TableDefinition<(u64, &str), ()> =
    TableDefinition::new("documents_by_updated");

pub(super) fn reverse_timestamp_key(updated_at: DateTime<Utc>) -> u64 {
    // Pre-epoch timestamps clamp to zero so the subtraction cannot wrap.
    let millis = updated_at.timestamp_millis().max(0) as u64;
    u64::MAX.saturating_sub(millis)
}
