//! Validators and messages shared by every schema built against a registry

use std::fmt;
use std::sync::Arc;

use crate::messages::MessageBook;
use crate::schema::CustomFn;
use crate::validation::CustomContext;

/// Shared validation state.
///
/// Built once, then handed to schemas behind an `Arc`. Validators registered
/// here run after a field's own validator and the schema's validators.
#[derive(Clone)]
pub struct Registry {
    validators: Vec<CustomFn>,
    messages: MessageBook,
}

impl Registry {
    /// A registry with the default messages and no validators.
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
            messages: MessageBook::defaults(),
        }
    }

    pub fn with_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&CustomContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
        self
    }

    /// Adds or replaces message templates.
    pub fn with_messages(mut self, messages: MessageBook) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn validators(&self) -> &[CustomFn] {
        &self.validators
    }

    pub fn messages(&self) -> &MessageBook {
        &self.messages
    }

    pub fn into_shared(self) -> Arc<Registry> {
        Arc::new(self)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("validators", &self.validators.len())
            .field("messages", &self.messages.len())
            .finish()
    }
}
