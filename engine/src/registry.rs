//! Operation registry — stores and retrieves operation descriptors
//!
//! The orchestrator discovers the callable surface through
//! [`Registry::list_operations`] and invokes by name through the executor.

use std::collections::HashMap;
use tracing::debug;

/// Descriptor for one callable operation
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema the executor validates input against before dispatch
    pub input_schema: serde_json::Value,
    /// True when repeated calls with the same arguments observe rather
    /// than mutate (everything except the monitoring lifecycle toggles)
    pub idempotent: bool,
    /// Hard bound on one invocation, enforced by the executor
    pub timeout_ms: u64,
}

/// In-memory operation registry
pub struct Registry {
    operations: HashMap<String, OperationSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register an operation descriptor
    pub fn register(&mut self, spec: OperationSpec) {
        debug!("Registered operation: {}", spec.name);
        self.operations.insert(spec.name.clone(), spec);
    }

    /// Get an operation by name
    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.get(name)
    }

    /// List all operations, sorted by name for a stable catalog
    pub fn list_operations(&self) -> Vec<&OperationSpec> {
        let mut specs: Vec<&OperationSpec> = self.operations.values().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to create an OperationSpec
pub fn make_operation(
    name: &str,
    description: &str,
    input_schema: serde_json::Value,
    idempotent: bool,
    timeout_ms: u64,
) -> OperationSpec {
    OperationSpec {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        idempotent,
        timeout_ms,
    }
}
