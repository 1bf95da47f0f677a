use std::collections::BTreeMap;

use crate::handler::FunctionHandler;

/// Immutable map from function code to handler.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<u64, FunctionHandler>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn get(&self, code: u64) -> Option<&FunctionHandler> {
        self.handlers.get(&code)
    }

    /// Registered handlers in ascending function code order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionHandler> {
        self.handlers.values()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Collects handlers before freezing them into a [`HandlerRegistry`].
#[derive(Debug, Default)]
pub struct HandlerRegistryBuilder {
    handlers: BTreeMap<u64, FunctionHandler>,
}

impl HandlerRegistryBuilder {
    /// Register `handler` under its function code, replacing any previous one.
    pub fn register(mut self, handler: FunctionHandler) -> Self {
        self.handlers.insert(handler.code(), handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}
