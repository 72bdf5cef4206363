//! Data models used by the store and the editor pipeline.

/// Document rows, patches, and list summaries.
pub mod document;

#[cfg(test)]
mod tests;
