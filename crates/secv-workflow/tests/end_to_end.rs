//! Registry on disk + workflow file + real module processes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use secv_exec::ExecutionEngine;
use secv_registry::{ModuleRegistry, ModuleRoot};
use secv_workflow::{ExecutionStatus, StepStatus, WorkflowEngine};
use serde_json::json;
use tempfile::TempDir;

fn write_module(root: &Path, name: &str, script: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("module.json"),
        json!({
            "name": name,
            "version": "1.0.0",
            "category": "test",
            "executable": "sh run.sh",
            "timeout": 10
        })
        .to_string(),
    )
    .unwrap();
    fs::write(dir.join("run.sh"), script).unwrap();
}

#[tokio::test]
async fn yaml_workflow_flows_data_between_steps() {
    let tmp = TempDir::new().unwrap();
    let tools = tmp.path().join("tools");

    write_module(
        &tools,
        "discover",
        "cat > /dev/null\necho '{\"success\":true,\"data\":{\"open_ports\":[22,443]},\"errors\":[]}'\n",
    );
    // Reports the ports parameter it was given.
    write_module(
        &tools,
        "report",
        "input=$(cat)\necho \"{\\\"success\\\":true,\\\"data\\\":$input}\"\n",
    );

    let workflow = tmp.path().join("recon.yml");
    fs::write(
        &workflow,
        r#"
name: recon
version: "1.0"
steps:
  - name: discover
    module: discover
  - name: skipped
    module: report
    condition: missing_step_guard.success
  - name: report
    module: report
    condition: discover.success
    inputs:
      ports: "${results.discover.open_ports}"
      label: "ports on ${target}"
"#,
    )
    .unwrap();

    let registry = Arc::new(ModuleRegistry::load(vec![ModuleRoot::local(&tools)]));
    assert_eq!(registry.len(), 2);
    let engine = WorkflowEngine::new(registry, ExecutionEngine::new());

    // The condition on an unknown step makes the file invalid.
    assert!(engine.load_workflow(&workflow).is_err());

    let fixed = fs::read_to_string(&workflow)
        .unwrap()
        .replace("missing_step_guard.success", "report_guard.success")
        .replace(
            "  - name: skipped",
            "  - name: report_guard\n    module: ghost\n    on_error: continue\n  - name: skipped",
        );
    fs::write(&workflow, fixed).unwrap();

    let definition = engine.load_workflow(&workflow).unwrap();
    let exec = engine
        .run_workflow(definition, "10.1.1.1", HashMap::new())
        .await
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.step_status("discover"), Some(StepStatus::Succeeded));
    assert_eq!(exec.step_status("report_guard"), Some(StepStatus::Failed));
    assert_eq!(exec.step_status("skipped"), Some(StepStatus::Skipped));
    assert_eq!(exec.step_status("report"), Some(StepStatus::Succeeded));

    let params = &exec.results["report"].data["parameters"];
    assert_eq!(params["ports"], json!([22, 443]));
    assert_eq!(params["label"], "ports on 10.1.1.1");

    assert_eq!(engine.list_executions().len(), 1);
}
