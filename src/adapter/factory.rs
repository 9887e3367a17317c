//! Registry of adapter constructors keyed by adapter kind.

use super::{AdapterError, GenericAdapter, InteractiveAssistantAdapter, ToolAdapter};
use crate::config::AssistantSettings;
use crate::envelope::SharedClock;
use crate::tool_definition::domain::{AdapterKind, ToolDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared inputs every adapter constructor receives.
#[derive(Clone)]
pub struct AdapterContext {
    /// Clock used to stamp decoded envelopes.
    pub clock: SharedClock,
    /// Session policy for interactive assistants.
    pub assistant: AssistantSettings,
}

/// Builds an adapter for one definition.
pub type AdapterConstructor =
    fn(ToolDefinition, &AdapterContext) -> Result<Arc<dyn ToolAdapter>, AdapterError>;

/// Selects and constructs adapters by [`AdapterKind`].
pub struct AdapterFactory {
    constructors: HashMap<AdapterKind, AdapterConstructor>,
    context: AdapterContext,
}

impl AdapterFactory {
    /// Creates a factory with constructors for every built-in kind.
    #[must_use]
    pub fn new(context: AdapterContext) -> Self {
        let mut factory = Self {
            constructors: HashMap::new(),
            context,
        };
        factory.register(AdapterKind::GenericJson, generic);
        factory.register(AdapterKind::GenericText, generic);
        factory.register(AdapterKind::InteractiveAssistant, assistant);
        factory
    }

    /// Registers or replaces the constructor for `kind`.
    pub fn register(&mut self, kind: AdapterKind, constructor: AdapterConstructor) {
        self.constructors.insert(kind, constructor);
    }

    /// Constructs a fresh adapter for `definition`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedKind`] when no constructor is
    /// registered, or the constructor's own error.
    pub fn create(&self, definition: &ToolDefinition) -> Result<Arc<dyn ToolAdapter>, AdapterError> {
        let kind = definition.adapter_kind();
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or(AdapterError::UnsupportedKind(kind))?;
        constructor(definition.clone(), &self.context)
    }
}

fn generic(
    definition: ToolDefinition,
    context: &AdapterContext,
) -> Result<Arc<dyn ToolAdapter>, AdapterError> {
    Ok(Arc::new(GenericAdapter::new(definition, Arc::clone(&context.clock))))
}

fn assistant(
    definition: ToolDefinition,
    context: &AdapterContext,
) -> Result<Arc<dyn ToolAdapter>, AdapterError> {
    let adapter = InteractiveAssistantAdapter::new(
        definition,
        Arc::clone(&context.clock),
        context.assistant.clone(),
    )?;
    Ok(Arc::new(adapter))
}
