//! Leader-side job and worker bookkeeping.
//!
//! Pure state: no I/O happens here. Operations that move a job into a terminal
//! state hand back the [`JobRecord`] the caller must persist.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cluster::ClusterOverview;
use crate::cluster::JobId;
use crate::cluster::JobSpec;
use crate::cluster::JobStatus;
use crate::cluster::TaskAssignment;
use crate::cluster::TaskKind;
use crate::cluster::TaskOutcome;
use crate::cluster::TaskOutput;
use crate::coordination::JobRecord;
use crate::errors::TaskFailure;

#[derive(Debug)]
struct WorkerEntry {
    slots: u32,
    last_seen: Instant,
}

#[derive(Debug)]
struct InFlight {
    worker_id: String,
    task: TaskAssignment,
}

#[derive(Debug)]
struct JobEntry {
    job_id: JobId,
    spec: JobSpec,
    status: JobStatus,
    attempt: u32,
    restarts: u32,
    pending: VecDeque<TaskAssignment>,
    in_flight: HashMap<u32, InFlight>,
    partials: BTreeMap<u32, u64>,
    eligible_at: Instant,
}

impl JobEntry {
    fn record(&self) -> JobRecord {
        JobRecord {
            job_id: self.job_id.clone(),
            spec: self.spec.clone(),
            status: self.status.clone(),
        }
    }

    fn parallelism(&self) -> u32 {
        self.spec.workload.parallelism
    }

    fn assignment(
        &self,
        task_index: u32,
        kind: TaskKind,
    ) -> TaskAssignment {
        TaskAssignment {
            job_id: self.job_id.clone(),
            attempt: self.attempt,
            task_index,
            kind,
            workload: self.spec.workload.clone(),
        }
    }

    fn start_attempt(
        &mut self,
        attempt: u32,
        eligible_at: Instant,
    ) {
        self.attempt = attempt;
        self.eligible_at = eligible_at;
        self.in_flight.clear();
        self.partials.clear();
        self.pending = (0..self.parallelism())
            .map(|subtask| self.assignment(subtask, TaskKind::Map { subtask }))
            .collect();
    }

    fn finish(
        &mut self,
        status: JobStatus,
    ) -> JobRecord {
        self.status = status;
        self.pending.clear();
        self.in_flight.clear();
        self.record()
    }

    /// Applies the restart strategy; returns the terminal record once exhausted.
    fn fail(
        &mut self,
        failure: TaskFailure,
        now: Instant,
    ) -> Option<JobRecord> {
        let strategy = self.spec.restart;
        if self.restarts < strategy.max_attempts {
            self.restarts += 1;
            warn!(
                job_id = %self.job_id,
                "attempt {} failed with {}: {}; restarting ({}/{})",
                self.attempt,
                failure.error_type,
                failure.message,
                self.restarts,
                strategy.max_attempts
            );
            let next = self.attempt + 1;
            self.start_attempt(next, now + Duration::from_millis(strategy.delay_ms));
            return None;
        }

        warn!(
            job_id = %self.job_id,
            "job failed with {}: {}", failure.error_type, failure.message
        );
        Some(self.finish(JobStatus::Failed(failure)))
    }
}

pub(crate) struct Scheduler {
    session_id: String,
    worker_timeout: Duration,
    workers: HashMap<String, WorkerEntry>,
    jobs: BTreeMap<JobId, JobEntry>,
}

impl Scheduler {
    pub(crate) fn new(
        session_id: impl Into<String>,
        worker_timeout: Duration,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            worker_timeout,
            workers: HashMap::new(),
            jobs: BTreeMap::new(),
        }
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn overview(&self) -> ClusterOverview {
        ClusterOverview {
            workers_connected: self.workers.len() as u32,
            slots_total: self.workers.values().map(|w| w.slots).sum(),
            jobs_running: self.jobs.values().filter(|j| !j.status.is_terminal()).count() as u32,
        }
    }

    /// Registers (or re-registers) a worker; work it held is handed out again.
    pub(crate) fn register_worker(
        &mut self,
        worker_id: &str,
        slots: u32,
        now: Instant,
    ) {
        let previous = self.workers.insert(worker_id.to_string(), WorkerEntry { slots, last_seen: now });
        if previous.is_some() {
            self.requeue_tasks_of(worker_id);
        }
        info!(worker_id, slots, "worker registered");
    }

    /// Schedules a new job, starting its first attempt.
    pub(crate) fn add_job(
        &mut self,
        job_id: JobId,
        spec: JobSpec,
        now: Instant,
    ) {
        let mut entry = JobEntry {
            job_id: job_id.clone(),
            spec,
            status: JobStatus::Running,
            attempt: 0,
            restarts: 0,
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
            partials: BTreeMap::new(),
            eligible_at: now,
        };
        entry.start_attempt(1, now);
        info!(%job_id, parallelism = entry.parallelism(), "job scheduled");
        self.jobs.insert(job_id, entry);
    }

    pub(crate) fn job_status(
        &self,
        job_id: &JobId,
    ) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|entry| entry.status.clone())
    }

    /// Hands out up to `free_slots` runnable tasks to a known worker.
    ///
    /// # Errors
    /// A rejection reason when the worker is not (or no longer) registered.
    pub(crate) fn poll(
        &mut self,
        worker_id: &str,
        free_slots: u32,
        now: Instant,
    ) -> std::result::Result<Vec<TaskAssignment>, String> {
        let Some(worker) = self.workers.get_mut(worker_id) else {
            return Err(format!("worker {worker_id} is not registered"));
        };
        worker.last_seen = now;

        let mut assigned = Vec::new();
        for entry in self.jobs.values_mut() {
            if entry.status.is_terminal() || entry.eligible_at > now {
                continue;
            }
            while assigned.len() < free_slots as usize {
                let Some(task) = entry.pending.pop_front() else {
                    break;
                };
                debug!(worker_id, job_id = %task.job_id, "assigned {:?}", task.kind);
                entry.in_flight.insert(
                    task.task_index,
                    InFlight {
                        worker_id: worker_id.to_string(),
                        task: task.clone(),
                    },
                );
                assigned.push(task);
            }
        }
        Ok(assigned)
    }

    /// Applies a task outcome; stale or unknown reports are ignored.
    pub(crate) fn report(
        &mut self,
        worker_id: &str,
        job_id: &JobId,
        attempt: u32,
        task_index: u32,
        outcome: TaskOutcome,
        now: Instant,
    ) -> Option<JobRecord> {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.last_seen = now;
        }
        let Some(entry) = self.jobs.get_mut(job_id) else {
            debug!(%job_id, "report for unknown job ignored");
            return None;
        };
        let assigned_to = entry.in_flight.get(&task_index).map(|f| f.worker_id.as_str());
        if entry.status.is_terminal() || entry.attempt != attempt || assigned_to != Some(worker_id) {
            debug!(
                %job_id,
                attempt, task_index, worker_id, "stale report ignored (current attempt {})", entry.attempt
            );
            return None;
        }
        entry.in_flight.remove(&task_index);

        let parallelism = entry.parallelism();
        match outcome {
            TaskOutcome::Failed(failure) => entry.fail(failure, now),
            TaskOutcome::Succeeded(TaskOutput::Partial(partial)) if task_index < parallelism => {
                entry.partials.insert(task_index, partial);
                if entry.partials.len() == parallelism as usize {
                    let partials = entry.partials.values().copied().collect();
                    let reduce = entry.assignment(parallelism, TaskKind::Reduce { partials });
                    entry.pending.push_back(reduce);
                }
                None
            }
            TaskOutcome::Succeeded(TaskOutput::Sum(sum)) => {
                let verify = entry.assignment(parallelism + 1, TaskKind::Verify { subtask: 0, sum });
                entry.pending.push_back(verify);
                None
            }
            TaskOutcome::Succeeded(TaskOutput::Verified) => {
                info!(%job_id, attempt, "job finished");
                Some(entry.finish(JobStatus::Finished))
            }
            TaskOutcome::Succeeded(other) => {
                let failure = TaskFailure {
                    error_type: "UnexpectedOutput".to_string(),
                    message: format!("task {task_index} produced {other:?}"),
                };
                entry.fail(failure, now)
            }
        }
    }

    /// Drops workers that stopped polling and fails the tasks they held.
    pub(crate) fn expire_workers(
        &mut self,
        now: Instant,
    ) -> Vec<JobRecord> {
        let timeout = self.worker_timeout;
        let expired: Vec<String> = self
            .workers
            .iter()
            .filter(|(_, w)| now.saturating_duration_since(w.last_seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        let mut terminal = Vec::new();
        for worker_id in expired {
            warn!(worker_id = %worker_id, "worker timed out after {:?}", timeout);
            self.workers.remove(&worker_id);
            for entry in self.jobs.values_mut() {
                if entry.status.is_terminal() || !entry.in_flight.values().any(|f| f.worker_id == worker_id) {
                    continue;
                }
                let failure = TaskFailure {
                    error_type: "WorkerLost".to_string(),
                    message: format!("worker {worker_id} stopped heartbeating"),
                };
                if let Some(record) = entry.fail(failure, now) {
                    terminal.push(record);
                }
            }
        }
        terminal
    }

    fn requeue_tasks_of(
        &mut self,
        worker_id: &str,
    ) {
        for entry in self.jobs.values_mut() {
            let held: Vec<u32> = entry
                .in_flight
                .iter()
                .filter(|(_, f)| f.worker_id == worker_id)
                .map(|(index, _)| *index)
                .collect();
            for task_index in held {
                if let Some(in_flight) = entry.in_flight.remove(&task_index) {
                    debug!(worker_id, job_id = %entry.job_id, task_index, "task requeued");
                    entry.pending.push_front(in_flight.task);
                }
            }
        }
    }
}
