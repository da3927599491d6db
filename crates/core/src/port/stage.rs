// Stage Port
// Abstraction for the transformation a worker pool applies to each item

use std::fmt::Display;
use thiserror::Error;

/// Stage function errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Stage failed: {0}")]
    Failed(String),

    #[error("Stage panicked: {0}")]
    Panicked(String),
}

/// Transformation run by every worker of a pool
///
/// `Ok(Some(v))` is forwarded downstream, `Ok(None)` is an empty result and
/// is discarded. Implementations are invoked concurrently from several
/// worker threads with different inputs.
///
/// Any `Fn(T) -> Option<U>` closure is a `Stage<T>`; use [`fallible`] for
/// closures returning `Result`.
pub trait Stage<T>: Send + Sync {
    type Output;

    /// Process one item
    ///
    /// # Errors
    /// - StageError::Failed if the item cannot be processed
    fn process(&self, item: T) -> Result<Option<Self::Output>, StageError>;
}

impl<T, U, F> Stage<T> for F
where
    F: Fn(T) -> Option<U> + Send + Sync,
{
    type Output = U;

    fn process(&self, item: T) -> Result<Option<U>, StageError> {
        Ok(self(item))
    }
}

/// Stage built from a closure that can fail
pub struct Fallible<F>(F);

/// Wrap `f: Fn(T) -> Result<Option<U>, E>` as a [`Stage`]
///
/// The error's `Display` text becomes `StageError::Failed`.
pub fn fallible<F>(f: F) -> Fallible<F> {
    Fallible(f)
}

impl<T, U, E, F> Stage<T> for Fallible<F>
where
    F: Fn(T) -> Result<Option<U>, E> + Send + Sync,
    E: Display,
{
    type Output = U;

    fn process(&self, item: T) -> Result<Option<U>, StageError> {
        (self.0)(item).map_err(|e| StageError::Failed(e.to_string()))
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Mock stage behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Forward the input unchanged
        Forward,
        /// Return an empty result
        Drop,
        /// Always fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Stage double that records every input it sees
    pub struct RecordingStage<T> {
        behavior: MockBehavior,
        seen: Mutex<Vec<T>>,
    }

    impl<T: Clone> RecordingStage<T> {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn forwarding() -> Self {
            Self::new(MockBehavior::Forward)
        }

        pub fn dropping() -> Self {
            Self::new(MockBehavior::Drop)
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn panicking(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        /// Inputs in the order the stage received them
        pub fn seen(&self) -> Vec<T> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl<T: Clone + Send> Stage<T> for RecordingStage<T> {
        type Output = T;

        fn process(&self, item: T) -> Result<Option<T>, StageError> {
            self.seen.lock().unwrap().push(item.clone());

            match &self.behavior {
                MockBehavior::Forward => Ok(Some(item)),
                MockBehavior::Drop => Ok(None),
                MockBehavior::Fail(msg) => Err(StageError::Failed(msg.clone())),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
