//! The uniform outcome of one module invocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Outcome of running a module, successful or not.
///
/// Every field is populated on every path: a module that never started
/// still yields a result carrying its name, a timestamp and the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub success: bool,
    /// Opaque module payload; never inspected by the orchestrator.
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub module_name: String,
    /// When the invocation started.
    #[serde(default)]
    pub timestamp: Timestamp,
}

impl ModuleResult {
    /// A failed result with a single error message.
    pub fn failure(
        module_name: impl Into<String>,
        started: Timestamp,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            errors: vec![error.into()],
            execution_time_ms: elapsed_ms(elapsed),
            module_name: module_name.into(),
            timestamp: started,
        }
    }

    /// A failed result for something that never ran (unknown module, bad inputs).
    pub fn not_run(module_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::failure(module_name, crate::now(), Duration::ZERO, error)
    }

    /// A successful result from a module's reported payload.
    pub fn success(module_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            errors: Vec::new(),
            execution_time_ms: 0,
            module_name: module_name.into(),
            timestamp: crate::now(),
        }
    }

    /// Overwrite the bookkeeping fields the orchestrator owns.
    pub fn stamped(
        mut self,
        module_name: impl Into<String>,
        started: Timestamp,
        elapsed: Duration,
    ) -> Self {
        self.module_name = module_name.into();
        self.timestamp = started;
        self.execution_time_ms = elapsed_ms(elapsed);
        self
    }

    /// The first recorded error, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

/// Milliseconds for a measured duration, rounded up.
///
/// Any process that actually ran reports at least 1ms; only `Duration::ZERO`
/// (nothing ran) maps to 0.
pub fn elapsed_ms(elapsed: Duration) -> u64 {
    let micros = elapsed.as_micros();
    u64::try_from(micros.div_ceil(1000)).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_is_fully_populated() {
        let started = crate::now();
        let r = ModuleResult::failure("scan", started, Duration::from_millis(12), "boom");
        assert!(!r.success);
        assert_eq!(r.module_name, "scan");
        assert_eq!(r.timestamp, started);
        assert_eq!(r.execution_time_ms, 12);
        assert_eq!(r.first_error(), Some("boom"));
        assert!(r.data.is_null());
    }

    #[test]
    fn test_not_run_has_timestamp() {
        let r = ModuleResult::not_run("ghost", "module not found: ghost");
        assert!(r.timestamp.timestamp() > 0);
        assert_eq!(r.execution_time_ms, 0);
        assert_eq!(r.module_name, "ghost");
    }

    #[test]
    fn test_elapsed_rounds_up() {
        assert_eq!(elapsed_ms(Duration::ZERO), 0);
        assert_eq!(elapsed_ms(Duration::from_micros(1)), 1);
        assert_eq!(elapsed_ms(Duration::from_micros(1500)), 2);
        assert_eq!(elapsed_ms(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_stamped_overrides_bookkeeping() {
        let started = crate::now();
        let r = ModuleResult::success("wrong", json!({"x": 1})).stamped(
            "scan",
            started,
            Duration::from_millis(5),
        );
        assert!(r.success);
        assert_eq!(r.module_name, "scan");
        assert_eq!(r.timestamp, started);
        assert_eq!(r.execution_time_ms, 5);
        assert_eq!(r.data, json!({"x": 1}));
    }

    #[test]
    fn test_wire_shape() {
        let r = ModuleResult::success("scan", json!([1, 2]));
        let value = serde_json::to_value(&r).unwrap();
        for key in ["success", "data", "errors", "execution_time_ms", "module_name", "timestamp"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
