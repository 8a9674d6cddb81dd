//! End-to-end tests against real module scripts.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use secv_exec::ExecutionEngine;
use secv_types::{ExecutionContext, ModuleDescriptor};
use serde_json::json;
use tempfile::TempDir;

fn sh_module(dir: &Path, name: &str, script: &str, timeout_secs: u64) -> ModuleDescriptor {
    let module_dir = dir.join(name);
    fs::create_dir_all(&module_dir).unwrap();
    fs::write(module_dir.join("run.sh"), script).unwrap();
    ModuleDescriptor::new(name, "sh run.sh", module_dir).with_timeout_secs(timeout_secs)
}

#[cfg(target_os = "linux")]
fn is_running(pid: i32) -> bool {
    // Zombies awaiting their (re)parent's reap count as gone.
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            let state = stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next());
            !matches!(state, Some("Z" | "X") | None)
        }
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn timeout_kills_entire_process_group() {
    let tmp = TempDir::new().unwrap();
    let module = sh_module(
        tmp.path(),
        "hang",
        "echo $$ > shell.pid\nsleep 30 &\necho $! > child.pid\nwait\n",
        1,
    );

    let start = Instant::now();
    let result = ExecutionEngine::new()
        .execute(&module, &ExecutionContext::new("t"))
        .await;
    let elapsed = start.elapsed();

    assert!(!result.success);
    assert_eq!(result.first_error(), Some("execution timed out after 1s"));
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");

    for file in ["shell.pid", "child.pid"] {
        let pid: i32 = fs::read_to_string(module.module_dir.join(file))
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while is_running(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!is_running(pid), "{file} ({pid}) still running");
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn timeout_kills_background_process_after_shell_exits() {
    let tmp = TempDir::new().unwrap();
    // The shell is reaped at once; `sleep` keeps the group and stdout alive.
    let module = sh_module(
        tmp.path(),
        "orphan",
        "sleep 30 &\necho $! > child.pid\n",
        1,
    );

    let result = ExecutionEngine::new()
        .execute(&module, &ExecutionContext::new("t"))
        .await;
    assert!(!result.success);
    assert_eq!(result.first_error(), Some("execution timed out after 1s"));

    let pid: i32 = fs::read_to_string(module.module_dir.join("child.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while is_running(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!is_running(pid), "background sleep ({pid}) still running");
}

#[tokio::test]
async fn concurrent_executions_are_independent() {
    let tmp = TempDir::new().unwrap();
    let a = sh_module(
        tmp.path(),
        "a",
        "sleep 0.3\necho '{\"success\":true,\"data\":\"a\"}'\n",
        10,
    );
    let b = sh_module(
        tmp.path(),
        "b",
        "sleep 0.3\necho '{\"success\":true,\"data\":\"b\"}'\n",
        10,
    );
    let engine = ExecutionEngine::new();
    let ctx = ExecutionContext::new("t");

    let start = Instant::now();
    let (ra, rb) = tokio::join!(engine.execute(&a, &ctx), engine.execute(&b, &ctx));

    assert!(ra.success && rb.success);
    assert_eq!(ra.data, json!("a"));
    assert_eq!(rb.data, json!("b"));
    assert_eq!(ra.module_name, "a");
    assert_eq!(rb.module_name, "b");
    // Run side by side, not one after the other.
    assert!(start.elapsed() < Duration::from_millis(1500));
}

#[cfg(unix)]
#[tokio::test]
async fn relative_executable_runs_from_module_dir() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let module_dir = tmp.path().join("direct");
    fs::create_dir_all(&module_dir).unwrap();
    let script = module_dir.join("module.sh");
    fs::write(
        &script,
        "#!/bin/sh\ncat > /dev/null\necho '{\"success\":true,\"data\":{\"args\":\"'\"$*\"'\"}}'\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let module = ModuleDescriptor::new("direct", "./module.sh --fast -v", &module_dir);
    let result = ExecutionEngine::new()
        .execute(&module, &ExecutionContext::new("t"))
        .await;

    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.data, json!({"args": "--fast -v"}));
}

#[tokio::test]
async fn per_os_command_is_preferred() {
    let tmp = TempDir::new().unwrap();
    let module = sh_module(
        tmp.path(),
        "multi",
        "echo '{\"success\":true,\"data\":\"os-specific\"}'\n",
        10,
    );
    let module = ModuleDescriptor {
        executable: Some("sh missing.sh".to_string()),
        ..module
    }
    .with_os_executable("testos", "sh run.sh");

    let result = ExecutionEngine::for_os("testos")
        .execute(&module, &ExecutionContext::new("t"))
        .await;
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.data, json!("os-specific"));
}
