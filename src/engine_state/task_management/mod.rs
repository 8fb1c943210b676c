//! # Task Management System
//!
//! This module provides the worker pool that runs section builds off the main
//! thread. Workers only ever see the data a task owns; everything they produce
//! comes back to the main thread as a [`WorldEvent`] and is applied there.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskResult`: The result of a completed task, turned into an event on the main thread
//! - `TaskChannel`: Communication channel between the main thread and one worker thread
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send their results back
//! 4. Results are collected on the main thread in `process_completed_tasks()`
//!    and forwarded to the event bus
//! 5. Tasks that were queued because every worker was busy are dispatched by
//!    `process_queued_tasks()`
//!
//! ## Performance Considerations
//! - **Task Granularity**: one section per task keeps workers evenly loaded
//! - **Memory**: Each task owns its snapshot so nothing is shared with the world
//! - **Cancellation**: tasks that are already cancelled are dropped at dispatch
//!   instead of occupying a worker

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, info, trace, warn};
use task::{Task, TaskResult};

use super::events::{emit, EventSender};

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `result_receiver`: Receives task results from worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `_worker`: Handle to the worker thread (kept alive by this struct)
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Sender<Box<dyn Task>>,
    result_receiver: Receiver<Box<dyn TaskResult>>,
    num_tasks_in_flight: usize,
    _worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and managing worker threads
/// - Distributing tasks across available workers
/// - Collecting task results and forwarding them as events
/// - Handling task queuing when all workers are busy
///
/// Dropping the manager closes every task channel, which ends the worker loops.
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping this at 1 leaves pending work in `queued_tasks` on the main thread,
/// where it can still be dropped once cancelled.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl TaskManager {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create
    ///
    /// # Returns
    /// The manager, or the I/O error raised while spawning a worker.
    pub fn new(num_workers: usize) -> Result<Self, std::io::Error> {
        let mut channels = Vec::with_capacity(num_workers);

        info!(
            "Available parallelism: {:?}, spawning {} mesh builders",
            thread::available_parallelism(),
            num_workers
        );

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult>>();

            let worker = thread::Builder::new()
                .name(format!("mesh-builder-{index}"))
                .spawn(move || {
                    while let Ok(task) = task_rx.recv() {
                        let result = task.process();
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                })?;

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                _worker: worker,
            });
        }

        Ok(TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        })
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was sent, incrementing the channel's in-flight count
    /// - `Err(task)` if the worker is gone, handing the task back for requeueing
    fn try_send_task(
        &mut self,
        task: Box<dyn Task>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => {
                warn!("Mesh builder {channel_idx} disconnected");
                Err(task.0)
            }
        }
    }

    /// Finds an available worker channel that can accept a new task.
    ///
    /// Round-robin starting from the channel after the last one used; channels
    /// that have reached `MAX_TASKS_IN_FLIGHT` are skipped.
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel;
        let mut current = start_channel;

        loop {
            if self.channels[current].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a new task for execution.
    ///
    /// The task runs as soon as a worker is free, or waits in the queue.
    /// Tasks that report themselves cancelled are dropped instead.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on an available worker
    /// - `false` if the task was queued or dropped
    pub fn publish_task(&mut self, task: Box<dyn Task>) -> bool {
        if task.is_cancelled() {
            trace!("Dropping cancelled task before dispatch");
            return false;
        }

        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Dispatches queued tasks while workers are available.
    ///
    /// Tasks are taken in FIFO order. Cancelled tasks are discarded first, even
    /// when every worker is busy, so superseded work never accumulates.
    pub fn process_queued_tasks(&mut self) {
        let queued = self.queued_tasks.len();
        self.queued_tasks.retain(|task| !task.is_cancelled());
        let mut dropped = queued - self.queued_tasks.len();
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            if task.is_cancelled() {
                dropped += 1;
                continue;
            }
            match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                }
                Err(task) => {
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }

        if dropped > 0 {
            debug!("Dropped {dropped} cancelled queued tasks");
        }
    }

    /// Collects every finished task result and forwards it to the event bus.
    ///
    /// # Arguments
    /// * `events` - Sender half of the engine's event bus
    ///
    /// # Returns
    /// The number of results collected.
    pub fn process_completed_tasks(&mut self, events: &EventSender) -> usize {
        let mut collected = 0;
        for channel in &mut self.channels {
            while let Ok(result) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                collected += 1;
                if let Some(event) = result.handle_result() {
                    emit(events, event);
                }
            }
        }
        collected
    }

    /// Number of tasks currently running on workers.
    pub fn in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    /// Number of tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }
}
