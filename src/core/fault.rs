//! Step panics turned into errors where the step's code runs
//!
//! A built unit carries its own copy of std, so an unwind that leaves the
//! unit cannot be caught by the host. Every step action is wrapped with
//! [`catch_step`], which is instantiated inside the unit that declared it.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    static LAST_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// A panic raised by a step action
#[derive(Debug, Clone)]
pub struct StepPanic {
    message: String,
    trace: String,
}

impl StepPanic {
    /// Build from a caught payload, taking the trace recorded at the panic site
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let trace = LAST_TRACE
            .with(|t| t.borrow_mut().take())
            .unwrap_or_else(|| Backtrace::force_capture().to_string());

        Self {
            message: panic_message(payload),
            trace,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }
}

impl fmt::Display for StepPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step panicked: {}", self.message)
    }
}

impl std::error::Error for StepPanic {}

/// Run `action`, returning a panic as a [`StepPanic`] error
pub fn catch_step<F>(action: F) -> anyhow::Result<bool>
where
    F: FnOnce() -> anyhow::Result<bool>,
{
    install_trace_hook();
    match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(result) => result,
        Err(payload) => Err(StepPanic::from_payload(payload.as_ref()).into()),
    }
}

/// Chain a hook onto this copy of std that keeps the backtrace of the
/// panicking frame for [`StepPanic::from_payload`]
fn install_trace_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = LAST_TRACE.try_with(|t| *t.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_becomes_error_with_trace() {
        let err = catch_step(|| panic!("row {} has no key", 7)).unwrap_err();

        let fault = err.downcast_ref::<StepPanic>().unwrap();
        assert_eq!(fault.message(), "row 7 has no key");
        assert!(!fault.trace().is_empty());
        assert_eq!(err.to_string(), "step panicked: row 7 has no key");
    }

    #[test]
    fn test_results_pass_through() {
        assert!(catch_step(|| Ok(true)).unwrap());
        assert!(!catch_step(|| Ok(false)).unwrap());
        assert!(catch_step(|| Err(anyhow::anyhow!("disk full"))).is_err());
    }
}
