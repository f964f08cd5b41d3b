//! Ordered mock lookup for a step invocation
//!
//! Candidates are tried in order: the step name, then the statement options
//! (`query`, `prepared_sql`, `procedure`). Each candidate is looked up in the
//! default namespace and, if it is a `file://` reference, in the file
//! namespace under the referenced path.
//!
//! Finding a mock and consuming a one-shot mock are separate steps:
//! [`MockResolver::find_mock`] has no side effects, while
//! [`MockResolver::resolve_mock`] also removes `once` mocks it hands out.

use sqlmock_core::{strip_file_reference, StepOptions};
use sqlmock_store::{MockDescriptor, MockOptions, MockStore, FILE_NAMESPACE, ROOT_NAMESPACE};
use std::sync::Arc;
use tracing::{debug, trace};

/// A descriptor found for a step, with where it was found
#[derive(Debug, Clone)]
pub struct MockMatch {
    /// Namespace holding the descriptor
    pub namespace: String,

    /// Key the descriptor is stored under
    pub key: String,

    /// The descriptor
    pub descriptor: Arc<MockDescriptor>,
}

/// Resolves step invocations against a [`MockStore`]
#[derive(Debug, Clone, Copy)]
pub struct MockResolver<'a> {
    store: &'a MockStore,
}

impl<'a> MockResolver<'a> {
    /// Resolver over the given store
    pub fn new(store: &'a MockStore) -> Self {
        Self { store }
    }

    /// First matching mock, without consuming it
    pub fn find_mock(&self, step: &str, options: &StepOptions) -> Option<MockMatch> {
        lookups(step, options).find_map(|(namespace, key)| self.lookup(namespace, key))
    }

    /// Remove a one-shot mock from the store.
    ///
    /// Returns whether the match may be used: always for ordinary mocks, and
    /// for one-shot mocks only when this call removed the entry.
    pub fn consume(&self, found: &MockMatch) -> bool {
        if !found.descriptor.once {
            return true;
        }
        self.store
            .take_if_current(&found.namespace, &found.key, &found.descriptor)
    }

    /// First matching mock, consuming it if it is one-shot
    pub fn resolve_mock(&self, step: &str, options: &StepOptions) -> Option<MockMatch> {
        let found = lookups(step, options)
            .filter_map(|(namespace, key)| self.lookup(namespace, key))
            .find(|found| self.consume(found));

        match &found {
            Some(found) => debug!(
                "Resolved mock for step '{}' via {}:{}",
                step, found.namespace, found.key
            ),
            None => trace!("No mock for step '{}'", step),
        }
        found
    }

    fn lookup(&self, namespace: &str, key: &str) -> Option<MockMatch> {
        self.store
            .get_mock(key, &MockOptions::namespace(namespace))
            .map(|descriptor| MockMatch {
                namespace: namespace.to_string(),
                key: key.to_string(),
                descriptor,
            })
    }
}

fn lookups<'o>(step: &'o str, options: &'o StepOptions) -> impl Iterator<Item = (&'static str, &'o str)> {
    std::iter::once(step)
        .chain(options.statements())
        .flat_map(|candidate| {
            std::iter::once((ROOT_NAMESPACE, candidate)).chain(
                strip_file_reference(candidate).map(|path| (FILE_NAMESPACE, path)),
            )
        })
}
