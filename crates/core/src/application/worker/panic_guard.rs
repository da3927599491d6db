// Panic isolation for worker units
use super::constants::UNKNOWN_PANIC_MESSAGE;
use std::any::Any;
use std::panic::{catch_unwind, UnwindSafe};

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed (the closure's own result may still be an error)
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Execute a closure with panic isolation
///
/// A panic inside `f` is caught and returned as `PanicGuardResult::Panicked`
/// so one bad item cannot take its worker thread down.
///
/// # Example
/// ```text
/// let result = execute_guarded(AssertUnwindSafe(|| stage.process(item)));
///
/// if let PanicGuardResult::Panicked(msg) = result {
///     eprintln!("item failed: {}", msg);
/// }
/// ```
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + UnwindSafe,
{
    match catch_unwind(f) {
        Ok(result) => PanicGuardResult::Success(result),
        Err(payload) => PanicGuardResult::Panicked(panic_message(payload.as_ref())),
    }
}

/// Extract the text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNKNOWN_PANIC_MESSAGE.to_string()
    }
}
