//! The request envelope a module receives on stdin.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ModuleResult;

/// Everything a module is told about its invocation.
///
/// Serialized as:
///
/// ```json
/// { "target": "10.0.0.1", "parameters": {}, "results": {},
///   "workflow_id": null, "step_id": null }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub target: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Results of earlier workflow steps, keyed by step name.
    #[serde(default)]
    pub results: HashMap<String, ModuleResult>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub step_id: Option<String>,
}

impl ExecutionContext {
    /// Context for a standalone invocation.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Replace the parameters.
    pub fn with_parameters(mut self, parameters: HashMap<String, serde_json::Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set a single parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Attach prior step results.
    pub fn with_results(mut self, results: HashMap<String, ModuleResult>) -> Self {
        self.results = results;
        self
    }

    /// Tag the context with the workflow execution and step it belongs to.
    pub fn for_step(mut self, workflow_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self.step_id = Some(step_id.into());
        self
    }
}
