//! Parallel subtask execution.
//!
//! Runs each layer's subtasks against a pluggable worker capability,
//! bounded by a worker limit and a per-subtask timeout. Individual
//! failures and timeouts are recorded, never propagated: a bad subtask
//! cannot abort its batch, its layer, or the run.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::config::ExecutionConfig;
use crate::core::subtask::{ExecutionResult, Subtask, SubtaskId};
use crate::error::Result;
use crate::schedule::Layer;
use crate::{flog_debug, flog_trace};

/// The subtask-execution capability supplied by the caller.
///
/// The scheduler is agnostic to what this does; an error return is
/// recorded as a failed subtask and contained.
#[async_trait]
pub trait SubtaskWorker: Send + Sync {
    async fn execute(&self, subtask: &Subtask) -> Result<serde_json::Value>;
}

/// Default worker: a pure delay proportional to the subtask's estimated
/// duration, returning a synthetic completion payload. Exists so the
/// scheduler is testable without a real executor.
#[derive(Debug, Clone)]
pub struct SimulatedWorker {
    /// Multiplier applied to `estimated_duration_ms`. Tests use a small
    /// scale to run the full pipeline quickly.
    time_scale: f64,
}

impl SimulatedWorker {
    pub fn new() -> Self {
        Self { time_scale: 1.0 }
    }

    pub fn with_scale(time_scale: f64) -> Self {
        Self { time_scale }
    }
}

impl Default for SimulatedWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubtaskWorker for SimulatedWorker {
    async fn execute(&self, subtask: &Subtask) -> Result<serde_json::Value> {
        let delay_ms = (subtask.estimated_duration_ms as f64 * self.time_scale) as u64;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        Ok(serde_json::json!({
            "completed": true,
            "subtask": subtask.id.as_str(),
            "target": subtask.target,
        }))
    }
}

/// Batch executor over an ordered layer sequence.
///
/// Layers run strictly in sequence; batches within a layer run in
/// sequence; only subtasks within one batch run concurrently, capped by
/// `max_workers` permits.
pub struct ParallelExecutor {
    worker: Arc<dyn SubtaskWorker>,
    max_workers: usize,
    batch_size: usize,
    timeout: Duration,
}

impl ParallelExecutor {
    pub fn new(worker: Arc<dyn SubtaskWorker>, config: &ExecutionConfig) -> Self {
        Self {
            worker,
            max_workers: config.max_workers.max(1),
            batch_size: config.batch_size.max(1),
            timeout: Duration::from_millis(config.subtask_timeout_ms),
        }
    }

    /// Executor backed by the simulated delay worker.
    pub fn with_default_worker(config: &ExecutionConfig) -> Self {
        Self::new(Arc::new(SimulatedWorker::new()), config)
    }

    /// Run every layer in order and collect one result per subtask.
    ///
    /// The results map is owned exclusively by this call for the duration
    /// of the run; a timeout stops waiting on a subtask without cancelling
    /// its batch siblings.
    pub async fn run_layers(
        &self,
        layers: &[Layer],
        subtasks: &HashMap<SubtaskId, Subtask>,
    ) -> HashMap<SubtaskId, ExecutionResult> {
        let mut results = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));

        for (layer_index, layer) in layers.iter().enumerate() {
            flog_debug!(
                "executor: layer {}/{} with {} subtasks",
                layer_index + 1,
                layers.len(),
                layer.len()
            );
            for batch in layer.chunks(self.batch_size) {
                let outcomes = self.run_batch(batch, subtasks, &semaphore).await;
                for result in outcomes {
                    results.insert(result.subtask_id.clone(), result);
                }
            }
        }

        results
    }

    /// Run one batch concurrently and wait for every member to resolve.
    async fn run_batch(
        &self,
        batch: &[SubtaskId],
        subtasks: &HashMap<SubtaskId, Subtask>,
        semaphore: &Arc<Semaphore>,
    ) -> Vec<ExecutionResult> {
        let invocations = batch.iter().map(|id| {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(semaphore);
            let subtask = subtasks.get(id).cloned();
            let id = id.clone();
            let timeout = self.timeout;

            async move {
                let Some(subtask) = subtask else {
                    return ExecutionResult::failed(id, "subtask not found in run", 0);
                };

                // Semaphore may close only on drop, which cannot happen
                // while this future runs.
                let _permit = semaphore.acquire().await;

                let start = Instant::now();
                match tokio::time::timeout(timeout, worker.execute(&subtask)).await {
                    Ok(Ok(output)) => {
                        let duration = start.elapsed().as_millis() as u64;
                        flog_trace!("executor: {} succeeded in {}ms", id, duration);
                        ExecutionResult::succeeded(id, output, duration)
                    }
                    Ok(Err(err)) => {
                        let duration = start.elapsed().as_millis() as u64;
                        flog_trace!("executor: {} failed: {}", id, err);
                        ExecutionResult::failed(id, &err.to_string(), duration)
                    }
                    Err(_) => {
                        flog_trace!("executor: {} timed out", id);
                        ExecutionResult::timed_out(id, timeout.as_millis() as u64)
                    }
                }
            }
        });

        join_all(invocations).await
    }
}
