// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The command processor: per-device serialization, batching, rate limiting, and retry of
//! commands issued by session handlers or the pattern engine (design note 4.5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex as AsyncMutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::command::model::{Command, CommandKind};
use crate::command::queue::DeviceQueue;
use crate::command::rate::{DeviceRateConfig, DeviceTokenBucket};
use crate::error::{ErrorKind, GatewayError};
use crate::recovery::{FaultKind, RecoveryTable};
use crate::registry::device::{DeviceConfig, DeviceId};
use crate::registry::Registry;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone)]
pub struct CommandProcessorConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub max_queue_age: Duration,
    pub max_attempts: u32,
    pub default_rate: DeviceRateConfig,
}

impl Default for CommandProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            batch_timeout: Duration::from_millis(20),
            max_queue_age: Duration::from_secs(5),
            max_attempts: 3,
            default_rate: DeviceRateConfig { burst_size: 20, tokens_per_interval: 10, interval: Duration::from_millis(100) },
        }
    }
}

type CommandKey = (String, u64);

struct DeviceWorker {
    queue: AsyncMutex<DeviceQueue>,
    pending: AsyncMutex<HashMap<CommandKey, oneshot::Sender<Result<Value, GatewayError>>>>,
    /// Member keys deduped away from a representative that is currently mid-retry,
    /// keyed by the representative's own key; resolved together once it settles
    /// (design note 4.5).
    retry_members: AsyncMutex<HashMap<CommandKey, Vec<CommandKey>>>,
    bucket: DeviceTokenBucket,
    notify: Notify,
    cancel: CancellationToken,
}

/// Validates, queues, batches, rate-limits, and retries commands for every device, serialized
/// one FIFO-per-device queue at a time while cross-device work proceeds in parallel
/// (design note 5).
pub struct CommandProcessor {
    registry: Arc<Registry>,
    recovery: Arc<RecoveryTable>,
    scheduler: Scheduler,
    config: CommandProcessorConfig,
    /// `IndexMap` so sweep-adjacent enumeration (e.g. a future per-device metrics dump)
    /// iterates devices in the stable order they were first submitted to, matching the
    /// registry's own device-keyed maps (design note 4.5, 4.3).
    workers: AsyncMutex<IndexMap<DeviceId, Arc<DeviceWorker>>>,
}

impl CommandProcessor {
    pub fn new(registry: Arc<Registry>, recovery: Arc<RecoveryTable>, scheduler: Scheduler, config: CommandProcessorConfig) -> Arc<Self> {
        Arc::new(Self { registry, recovery, scheduler, config, workers: AsyncMutex::new(IndexMap::new()) })
    }

    /// Validate against the device's configured intensity cap and allowed-pattern set
    /// before a command ever reaches a queue (design note 4.5, "Safety validation";
    /// section 8, invariant 8: validation failure never causes adapter I/O).
    pub fn validate(command: &Command, device_config: &DeviceConfig) -> Result<(), GatewayError> {
        if command.intensity > device_config.intensity_cap {
            return Err(GatewayError::new(
                ErrorKind::Validation,
                format!("intensity {} exceeds device cap {}", command.intensity, device_config.intensity_cap),
            ));
        }
        if !device_config.allows_pattern(command.pattern_ref.as_deref()) {
            return Err(GatewayError::new(
                ErrorKind::Validation,
                format!("pattern '{}' is not allowed on this device", command.pattern_ref.as_deref().unwrap_or("")),
            ));
        }
        Ok(())
    }

    async fn worker_for(self: &Arc<Self>, device_id: &DeviceId) -> Arc<DeviceWorker> {
        let mut workers = self.workers.lock().await;
        if let Some(existing) = workers.get(device_id) {
            return existing.clone();
        }
        let worker = Arc::new(DeviceWorker {
            queue: AsyncMutex::new(DeviceQueue::new()),
            pending: AsyncMutex::new(HashMap::new()),
            retry_members: AsyncMutex::new(HashMap::new()),
            bucket: DeviceTokenBucket::new(self.config.default_rate),
            notify: Notify::new(),
            cancel: self.scheduler.child_token(),
        });
        workers.insert(device_id.clone(), worker.clone());

        let processor = self.clone();
        let device_id = device_id.clone();
        let worker_for_loop = worker.clone();
        tokio::spawn(async move { processor.run_device_loop(device_id, worker_for_loop).await });

        worker
    }

    /// Submit a command for dispatch, validated and enqueued after first checking safety.
    /// Returns a receiver that resolves once the command's batch is dispatched (or the
    /// command is dropped stale, retried out, or cancelled).
    pub async fn submit(
        self: &Arc<Self>,
        command: Command,
        device_config: &DeviceConfig,
    ) -> Result<oneshot::Receiver<Result<Value, GatewayError>>, GatewayError> {
        Self::validate(&command, device_config)?;

        let worker = self.worker_for(&command.device_id).await;
        let key = (command.session_id.clone(), command.session_seq);
        let (tx, rx) = oneshot::channel();
        worker.pending.lock().await.insert(key, tx);
        worker.queue.lock().await.push(command);
        worker.notify.notify_one();
        Ok(rx)
    }

    /// Cancel every queued-but-not-dispatched command for a device, resolving each with
    /// `cancelled` (design note 5, session close / device removal).
    pub async fn drain_device(&self, device_id: &DeviceId, reason: GatewayError) {
        let worker = {
            let workers = self.workers.lock().await;
            match workers.get(device_id) {
                Some(w) => w.clone(),
                None => return,
            }
        };
        let drained = worker.queue.lock().await.drain_all();
        let mut pending = worker.pending.lock().await;
        for command in drained {
            let key = (command.session_id, command.session_seq);
            if let Some(tx) = pending.remove(&key) {
                let _ = tx.send(Err(reason.clone()));
            }
        }

        // Commands currently sitting out a retry delay aren't in the queue; flush their
        // accumulated deduped members too, or their receivers would hang forever.
        let mut retry_members = worker.retry_members.lock().await;
        for (representative, members) in retry_members.drain() {
            for key in std::iter::once(representative).chain(members) {
                if let Some(tx) = pending.remove(&key) {
                    let _ = tx.send(Err(reason.clone()));
                }
            }
        }
    }

    async fn run_device_loop(self: Arc<Self>, device_id: DeviceId, worker: Arc<DeviceWorker>) {
        loop {
            loop {
                if worker.cancel.is_cancelled() {
                    return;
                }
                if worker.queue.lock().await.len() > 0 {
                    break;
                }
                tokio::select! {
                    _ = worker.cancel.cancelled() => return,
                    _ = worker.notify.notified() => {}
                }
            }

            let deadline = Instant::now() + self.config.batch_timeout;
            loop {
                let len = worker.queue.lock().await.len();
                if len >= self.config.batch_size.max(1) {
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                tokio::select! {
                    _ = worker.cancel.cancelled() => return,
                    _ = tokio::time::sleep(remaining) => break,
                    _ = worker.notify.notified() => continue,
                }
            }

            self.flush_batch(&device_id, &worker).await;
        }
    }

    async fn flush_batch(self: &Arc<Self>, device_id: &DeviceId, worker: &Arc<DeviceWorker>) {
        let now_ms = now_ms();
        let mut batch = Vec::new();
        {
            let mut queue = worker.queue.lock().await;
            let mut pending = worker.pending.lock().await;
            while batch.len() < self.config.batch_size.max(1) {
                let (next, dropped) = queue.pop_next(now_ms, self.config.max_queue_age.as_millis() as u64);
                for stale in dropped {
                    let key = (stale.session_id, stale.session_seq);
                    if let Some(tx) = pending.remove(&key) {
                        let _ = tx.send(Err(GatewayError::new(ErrorKind::Validation, "command expired in queue").with_details(
                            serde_json::json!({ "cause": "stale" }),
                        )));
                    }
                }
                match next {
                    Some(command) => batch.push(command),
                    None => break,
                }
            }
        }

        if batch.is_empty() {
            return;
        }

        let (representatives, resolutions) = dedup_batch(batch);

        for (key, canceled) in &resolutions {
            if *canceled {
                if let Some(tx) = worker.pending.lock().await.remove(key) {
                    let _ = tx.send(Ok(Value::Null));
                }
            }
        }

        for group in representatives {
            worker.bucket.acquire().await;
            let rep_key = (group.representative.session_id.clone(), group.representative.session_seq);
            let extra_members: Vec<CommandKey> = group.member_keys.into_iter().filter(|k| *k != rep_key).collect();

            match self.dispatch_with_retry(device_id, worker, group.representative).await {
                DispatchOutcome::Resolved(result) => {
                    let mut pending = worker.pending.lock().await;
                    let mut keys = vec![rep_key.clone()];
                    keys.extend(extra_members);
                    if let Some(stored) = worker.retry_members.lock().await.remove(&rep_key) {
                        keys.extend(stored);
                    }
                    for key in keys {
                        if let Some(tx) = pending.remove(&key) {
                            let _ = tx.send(result.clone());
                        }
                    }
                }
                DispatchOutcome::Retrying => {
                    if !extra_members.is_empty() {
                        worker.retry_members.lock().await.entry(rep_key).or_default().extend(extra_members);
                    }
                }
            }
        }
    }

    /// Dispatch one attempt. On a retryable failure this re-enqueues `command` at the
    /// front of its priority band (via [`DeviceQueue::push_front`]) with `attempt`
    /// incremented, after a cancellable backoff delay — never blocking the device's
    /// worker loop, which stays free to pop newly-arrived higher-priority commands in
    /// the meantime (design note 4.5, "Retries"; design note 5, intra-device ordering).
    async fn dispatch_with_retry(self: &Arc<Self>, device_id: &DeviceId, worker: &Arc<DeviceWorker>, command: Command) -> DispatchOutcome {
        let payload = to_payload(&command);
        match self.registry.send(device_id, &payload).await {
            Ok(value) => DispatchOutcome::Resolved(Ok(value)),
            Err(e) => {
                let next_attempt = command.attempt + 1;
                if next_attempt >= self.config.max_attempts {
                    return DispatchOutcome::Resolved(Err(GatewayError::new(ErrorKind::CommandFailed, e.message).with_details(
                        serde_json::json!({ "cause": "disconnected", "attempts": next_attempt }),
                    )));
                }

                let policy = self.recovery.policy_for(FaultKind::Command);
                let delay = policy.delay_for_attempt(next_attempt);
                let mut retried = command;
                retried.attempt = next_attempt;

                let worker = worker.clone();
                let scheduler = self.scheduler.clone();
                tokio::spawn(async move {
                    let cancel = worker.cancel.clone();
                    if scheduler.sleep(delay, &cancel).await {
                        worker.queue.lock().await.push_front(retried);
                        worker.notify.notify_one();
                    }
                });

                DispatchOutcome::Retrying
            }
        }
    }
}

/// Outcome of one [`CommandProcessor::dispatch_with_retry`] call.
enum DispatchOutcome {
    /// The command's final result, ready to send to every deduped caller.
    Resolved(Result<Value, GatewayError>),
    /// Re-enqueued for a later attempt; callers stay parked until it settles.
    Retrying,
}

struct RepresentativeGroup {
    representative: Command,
    member_keys: Vec<CommandKey>,
}

/// Collapses a batch by `(kind, pattern_ref)`: the last command in queue order wins per key.
/// A `PatternStart`/`PatternStop` pair sharing a `pattern_ref` cancels both and dispatches
/// neither (design note 4.5).
fn dedup_batch(batch: Vec<Command>) -> (Vec<RepresentativeGroup>, Vec<(CommandKey, bool)>) {
    let mut order: Vec<(CommandKind, Option<String>)> = Vec::new();
    let mut groups: HashMap<(CommandKind, Option<String>), (Command, Vec<CommandKey>)> = HashMap::new();

    for command in batch {
        let dedup_key = command.dedup_key();
        let member_key = (command.session_id.clone(), command.session_seq);
        match groups.get_mut(&dedup_key) {
            Some((representative, members)) => {
                *representative = command;
                members.push(member_key);
            }
            None => {
                order.push(dedup_key.clone());
                groups.insert(dedup_key, (command, vec![member_key]));
            }
        }
    }

    let pattern_refs_started: std::collections::HashSet<String> = order
        .iter()
        .filter(|(kind, _)| *kind == CommandKind::PatternStart)
        .filter_map(|(_, pattern_ref)| pattern_ref.clone())
        .collect();
    let canceled_refs: std::collections::HashSet<String> = order
        .iter()
        .filter(|(kind, pattern_ref)| *kind == CommandKind::PatternStop && pattern_ref.as_ref().is_some_and(|p| pattern_refs_started.contains(p)))
        .filter_map(|(_, pattern_ref)| pattern_ref.clone())
        .collect();

    let mut representatives = Vec::new();
    let mut resolutions = Vec::new();

    for key in order {
        let (kind, pattern_ref) = &key;
        let is_canceled_pattern = matches!(kind, CommandKind::PatternStart | CommandKind::PatternStop)
            && pattern_ref.as_ref().is_some_and(|p| canceled_refs.contains(p));

        let Some((representative, members)) = groups.remove(&key) else { continue };
        if is_canceled_pattern {
            for member in members {
                resolutions.push((member, true));
            }
        } else {
            representatives.push(RepresentativeGroup { representative, member_keys: members });
        }
    }

    (representatives, resolutions)
}

fn to_payload(command: &Command) -> Value {
    serde_json::to_value(command).unwrap_or(Value::Null)
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
