/// Blob store contract for uploaded submission images.
pub mod blob;
/// Row-change notification payloads.
pub mod changes;
/// Database model definitions.
pub mod models;
/// Tournament state storage and retrieval operations.
pub mod store;
/// Storage abstraction layer for database operations.
pub mod storage;
