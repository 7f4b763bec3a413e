//! Remediation log lines.
//!
//! Every line is `[run=..] [incident=..] EVENT key=value ...`, so one grep on
//! a run id or ticket number shows the whole path from poll to annotation.

use std::fmt;

/// Logging context for one monitor run or single-incident invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub incident: Option<String>,
}

impl LogContext {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            incident: None,
        }
    }

    pub fn with_incident(&self, number: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            incident: Some(number.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.incident {
            Some(number) => write!(f, "[run={}] [incident={}]", self.run_id, number),
            None => write!(f, "[run={}]", self.run_id),
        }
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::info!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::warn!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::error!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::debug!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("run-123");
        assert_eq!(format!("{}", ctx), "[run=run-123]");

        let ctx_with_incident = ctx.with_incident("INC0010022");
        assert_eq!(
            format!("{}", ctx_with_incident),
            "[run=run-123] [incident=INC0010022]"
        );
    }

    #[test]
    fn test_log_macros_expand() {
        let ctx = LogContext::new("run-1").with_incident("INC1");
        crate::log_info!(ctx, "TEST_EVENT", family = "network_rule_change", items = 2);
        crate::log_debug!(ctx, "TEST_EVENT", pattern = r"sg-\w+");
    }
}
