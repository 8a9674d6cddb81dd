//! Declarative workflow definitions.
//!
//! Workflows are JSON (`.json`) or YAML (`.yml`/`.yaml`) files describing an
//! ordered list of module invocations.
//!
//! # Example YAML
//!
//! ```yaml
//! name: recon
//! description: Port scan then banner grab on whatever is open
//! version: "1.0"
//! parameters:
//!   verbose: true
//! steps:
//!   - name: scan
//!     module: portscan
//!     inputs:
//!       ports: "1-1024"
//!   - name: banners
//!     module: banner-grab
//!     condition: scan.success
//!     on_error: continue
//!     timeout: 60
//!     inputs:
//!       host: "${target}"
//!       ports: "${results.scan.open_ports}"
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::condition::Condition;
use crate::error::{Result, WorkflowError};

/// What to do when a step's result is unsuccessful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Mark the workflow failed and run no further steps.
    #[default]
    Stop,
    /// Record the failure and carry on with the next step.
    Continue,
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub author: String,

    /// Parameters given to every step, below the step's own inputs.
    #[serde(default, alias = "global_settings")]
    pub parameters: HashMap<String, Value>,

    /// Steps, run strictly in this order.
    pub steps: Vec<WorkflowStep>,
}

/// A single module invocation within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique within the workflow; results are recorded under this name.
    pub name: String,

    /// Registry name of the module to run.
    pub module: String,

    /// Step parameters. String values may contain `${...}` references.
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,

    /// Optional `<step>.success` predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Seconds; overrides the module's declared timeout.
    #[serde(default, alias = "timeout_seconds", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl WorkflowStep {
    /// Create a step with no inputs, condition or timeout.
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            inputs: BTreeMap::new(),
            condition: None,
            on_error: ErrorPolicy::Stop,
            timeout: None,
        }
    }

    /// Add an input.
    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    /// Set the condition expression.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set the error policy.
    pub fn with_on_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Set a timeout override in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    /// The parsed condition, if any.
    pub fn parsed_condition(&self) -> Option<std::result::Result<Condition, String>> {
        self.condition.as_deref().map(str::parse)
    }
}

impl WorkflowDefinition {
    /// Create an empty definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: String::new(),
            author: String::new(),
            parameters: HashMap::new(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Parse a JSON definition.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    /// Parse a YAML definition.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| e.to_string())
    }

    /// Load and validate a definition file.
    ///
    /// `.yml` and `.yaml` files are read as YAML, everything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| WorkflowError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));

        let parsed = if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        };
        let definition = parsed.map_err(|reason| WorkflowError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;

        definition.validate()?;
        debug!(
            workflow = %definition.name,
            steps = definition.steps.len(),
            path = %path.display(),
            "loaded workflow definition"
        );
        Ok(definition)
    }

    /// Validate the definition.
    ///
    /// Checks:
    /// - Non-empty workflow name
    /// - At least one step
    /// - Unique, non-empty step names
    /// - Every step names a module
    /// - Conditions parse and refer to an earlier step
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::InvalidWorkflow(
                "workflow name cannot be empty".into(),
            ));
        }

        if self.steps.is_empty() {
            return Err(WorkflowError::InvalidWorkflow(
                "workflow must have at least one step".into(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(WorkflowError::InvalidWorkflow(
                    "step name cannot be empty".into(),
                ));
            }

            // `${results.<step>.<field>}` splits on dots.
            if step.name.contains('.') {
                return Err(WorkflowError::InvalidWorkflow(format!(
                    "step name '{}' cannot contain '.'",
                    step.name
                )));
            }

            if step.module.trim().is_empty() {
                return Err(WorkflowError::InvalidWorkflow(format!(
                    "step '{}' does not name a module",
                    step.name
                )));
            }

            if let Some(condition) = step.parsed_condition() {
                let condition = condition.map_err(|e| {
                    WorkflowError::InvalidWorkflow(format!("step '{}': {e}", step.name))
                })?;
                if !seen.contains(condition.step()) {
                    return Err(WorkflowError::InvalidWorkflow(format!(
                        "step '{}' has a condition on '{}', which is not an earlier step",
                        step.name,
                        condition.step()
                    )));
                }
            }

            if !seen.insert(step.name.as_str()) {
                return Err(WorkflowError::InvalidWorkflow(format!(
                    "duplicate step name: {}",
                    step.name
                )));
            }
        }

        Ok(())
    }

    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
name: recon
description: Port scan then banner grab
version: "1.0"
parameters:
  verbose: true
steps:
  - name: scan
    module: portscan
    inputs:
      ports: "1-1024"
  - name: banners
    module: banner-grab
    condition: scan.success
    on_error: continue
    timeout: 60
    inputs:
      host: "${target}"
"#;

    #[test]
    fn test_parse_yaml() {
        let def = WorkflowDefinition::from_yaml(YAML).unwrap();
        assert_eq!(def.name, "recon");
        assert_eq!(def.version, "1.0");
        assert_eq!(def.parameters["verbose"], json!(true));
        assert_eq!(def.steps.len(), 2);

        let scan = &def.steps[0];
        assert_eq!(scan.module, "portscan");
        assert_eq!(scan.on_error, ErrorPolicy::Stop);
        assert!(scan.condition.is_none());
        assert_eq!(scan.inputs["ports"], json!("1-1024"));

        let banners = def.step("banners").unwrap();
        assert_eq!(banners.on_error, ErrorPolicy::Continue);
        assert_eq!(banners.timeout, Some(60));
        assert_eq!(banners.condition.as_deref(), Some("scan.success"));
        def.validate().unwrap();
    }

    #[test]
    fn test_parse_json_with_legacy_keys() {
        let def = WorkflowDefinition::from_json(
            r#"{
                "name": "legacy",
                "global_settings": {"threads": 4},
                "steps": [
                    {"name": "a", "module": "m", "timeout_seconds": 5}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(def.parameters["threads"], json!(4));
        assert_eq!(def.steps[0].timeout, Some(5));
        assert!(def.steps[0].inputs.is_empty());
    }

    #[test]
    fn test_unknown_error_policy_rejected() {
        let err = WorkflowDefinition::from_json(
            r#"{"name": "w", "steps": [{"name": "a", "module": "m", "on_error": "retry"}]}"#,
        )
        .unwrap_err();
        assert!(err.contains("retry"));
    }

    fn invalid(def: WorkflowDefinition) -> String {
        match def.validate().unwrap_err() {
            WorkflowError::InvalidWorkflow(msg) => msg,
            other => panic!("expected InvalidWorkflow, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_name() {
        let def = WorkflowDefinition::new(" ").with_step(WorkflowStep::new("a", "m"));
        assert!(invalid(def).contains("name"));
    }

    #[test]
    fn test_validate_no_steps() {
        assert!(invalid(WorkflowDefinition::new("w")).contains("at least one step"));
    }

    #[test]
    fn test_validate_duplicate_steps() {
        let def = WorkflowDefinition::new("w")
            .with_step(WorkflowStep::new("a", "m"))
            .with_step(WorkflowStep::new("a", "n"));
        assert!(invalid(def).contains("duplicate step name: a"));
    }

    #[test]
    fn test_validate_dotted_step_name() {
        let def = WorkflowDefinition::new("w").with_step(WorkflowStep::new("stage.1", "m"));
        assert!(invalid(def).contains("cannot contain '.'"));

        // Such a step could never be the target of a condition either.
        let def = WorkflowDefinition::new("w")
            .with_step(WorkflowStep::new("stage", "m"))
            .with_step(WorkflowStep::new("b", "m").with_condition("stage.1.success"));
        assert!(invalid(def).contains("not an earlier step"));
    }

    #[test]
    fn test_validate_missing_module() {
        let def = WorkflowDefinition::new("w").with_step(WorkflowStep::new("a", ""));
        assert!(invalid(def).contains("does not name a module"));
    }

    #[test]
    fn test_validate_condition_must_reference_earlier_step() {
        let def = WorkflowDefinition::new("w")
            .with_step(WorkflowStep::new("a", "m").with_condition("b.success"))
            .with_step(WorkflowStep::new("b", "m"));
        assert!(invalid(def).contains("not an earlier step"));

        // A step cannot depend on itself.
        let def = WorkflowDefinition::new("w")
            .with_step(WorkflowStep::new("a", "m").with_condition("a.success"));
        assert!(invalid(def).contains("not an earlier step"));
    }

    #[test]
    fn test_validate_condition_syntax() {
        let def = WorkflowDefinition::new("w")
            .with_step(WorkflowStep::new("a", "m"))
            .with_step(WorkflowStep::new("b", "m").with_condition("a.failed"));
        assert!(invalid(def).contains("unsupported condition"));
    }

    #[test]
    fn test_from_file_by_extension() {
        let tmp = tempfile::TempDir::new().unwrap();

        let yaml = tmp.path().join("recon.yaml");
        std::fs::write(&yaml, YAML).unwrap();
        assert_eq!(WorkflowDefinition::from_file(&yaml).unwrap().name, "recon");

        let json = tmp.path().join("recon.json");
        std::fs::write(
            &json,
            r#"{"name": "j", "steps": [{"name": "a", "module": "m"}]}"#,
        )
        .unwrap();
        assert_eq!(WorkflowDefinition::from_file(&json).unwrap().name, "j");

        // YAML content in a .json file is a parse error.
        let wrong = tmp.path().join("wrong.json");
        std::fs::write(&wrong, YAML).unwrap();
        assert!(matches!(
            WorkflowDefinition::from_file(&wrong).unwrap_err(),
            WorkflowError::Parse { .. }
        ));

        assert!(matches!(
            WorkflowDefinition::from_file(&tmp.path().join("missing.yml")).unwrap_err(),
            WorkflowError::Io { .. }
        ));
    }

    #[test]
    fn test_from_file_validates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty.yml");
        std::fs::write(&path, "name: empty\nsteps: []\n").unwrap();
        assert!(matches!(
            WorkflowDefinition::from_file(&path).unwrap_err(),
            WorkflowError::InvalidWorkflow(_)
        ));
    }
}
