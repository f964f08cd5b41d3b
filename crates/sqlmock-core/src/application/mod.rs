/// Step engine and contexts
pub mod engine;

/// Type-keyed engine extensions
pub mod extensions;

/// SQL file loading
pub mod file_loader;

/// Connection and transaction strategies
pub mod hooks;
