//! # Task System Core Traits
//!
//! ## Core Components
//! - `Task`: Represents a unit of work that can be executed on a worker thread
//! - `TaskResult`: Represents the result of a completed task
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the main thread and may
//!    produce an event for the engine
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the main thread

use crate::engine_state::events::WorldEvent;

/// A unit of work executed on a worker thread.
///
/// Tasks own all the data they need; they must not hold references into
/// state the main thread keeps mutating.
pub trait Task: Send {
    /// Processes the task and returns a result.
    ///
    /// Runs on a background thread. Errors are reported through the result,
    /// never by panicking across the channel.
    fn process(&self) -> Box<dyn TaskResult>;

    /// Whether the task has been superseded and should not run at all.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// The result of processing a `Task`, handled on the main thread.
pub trait TaskResult: Send {
    /// Turns the result into the event the engine should see, if any.
    fn handle_result(self: Box<Self>) -> Option<WorldEvent>;
}
