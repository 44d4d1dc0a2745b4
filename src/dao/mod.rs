/// Poll and history persistence backends.
pub mod history_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
