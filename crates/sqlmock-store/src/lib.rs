//! In-memory mock store for sqlmock
//!
//! This crate holds registered SQL mocks in named namespaces and normalizes
//! every registration (callback, partial descriptor or literal value) into a
//! canonical [`MockDescriptor`].

pub mod descriptor;
pub use descriptor::{normalize_wait, MockDescriptor, MockSpec, RawMock, ResultProducer};

pub mod store;
pub use store::{MockOptions, MockStore, FILE_NAMESPACE, ROOT_NAMESPACE};

#[cfg(test)]
mod tests;
