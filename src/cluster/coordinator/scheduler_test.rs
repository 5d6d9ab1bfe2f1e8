use std::time::Duration;

use tokio::time::Instant;

use super::scheduler::Scheduler;
use crate::cluster::JobId;
use crate::cluster::JobSpec;
use crate::cluster::JobStatus;
use crate::cluster::RestartStrategy;
use crate::cluster::TaskKind;
use crate::cluster::TaskOutcome;
use crate::cluster::TaskOutput;
use crate::cluster::WorkloadSpec;
use crate::errors::TaskFailure;

const WORKER_TIMEOUT: Duration = Duration::from_secs(3);

fn spec(
    parallelism: u32,
    restart: RestartStrategy,
) -> JobSpec {
    JobSpec {
        name: "paced-sum".into(),
        workload: WorkloadSpec {
            num_elements: 8,
            parallelism,
            pace_delay_ms: 0,
            coordinate_dir: "/tmp/coordinate".into(),
        },
        restart,
    }
}

fn failure() -> TaskFailure {
    TaskFailure {
        error_type: "WorkloadAssertionFailure".into(),
        message: "Sum of 1..=8 expected 36 but was 35".into(),
    }
}

fn scheduler_with_job(
    parallelism: u32,
    restart: RestartStrategy,
    now: Instant,
) -> (Scheduler, JobId) {
    let mut scheduler = Scheduler::new("session-1", WORKER_TIMEOUT);
    scheduler.register_worker("w0", 2, now);
    scheduler.register_worker("w1", 2, now);
    let job_id = JobId("job".into());
    scheduler.add_job(job_id.clone(), spec(parallelism, restart), now);
    (scheduler, job_id)
}

#[test]
fn test_overview_counts_workers_slots_and_jobs() {
    let now = Instant::now();
    let (scheduler, _) = scheduler_with_job(4, RestartStrategy::default(), now);

    let overview = scheduler.overview();
    assert_eq!(overview.workers_connected, 2);
    assert_eq!(overview.slots_total, 4);
    assert_eq!(overview.jobs_running, 1);
}

#[test]
fn test_poll_respects_free_slots_and_rejects_unknown_workers() {
    let now = Instant::now();
    let (mut scheduler, _) = scheduler_with_job(4, RestartStrategy::default(), now);

    let first = scheduler.poll("w0", 2, now).unwrap();
    let second = scheduler.poll("w1", 5, now).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert!(scheduler.poll("w1", 5, now).unwrap().is_empty());

    let subtasks: Vec<_> = first
        .iter()
        .chain(second.iter())
        .map(|t| t.kind.clone())
        .collect();
    assert_eq!(
        subtasks,
        (0..4).map(|subtask| TaskKind::Map { subtask }).collect::<Vec<_>>()
    );

    assert!(scheduler.poll("stranger", 1, now).is_err());
}

#[test]
fn test_map_reduce_verify_pipeline_finishes_job() {
    let now = Instant::now();
    let (mut scheduler, job_id) = scheduler_with_job(2, RestartStrategy::default(), now);

    let maps = scheduler.poll("w0", 2, now).unwrap();
    for (task, partial) in maps.iter().zip([16, 20]) {
        let terminal = scheduler.report(
            "w0",
            &job_id,
            task.attempt,
            task.task_index,
            TaskOutcome::Succeeded(TaskOutput::Partial(partial)),
            now,
        );
        assert!(terminal.is_none());
    }

    let reduce = scheduler.poll("w1", 2, now).unwrap();
    assert_eq!(reduce.len(), 1);
    assert_eq!(reduce[0].kind, TaskKind::Reduce { partials: vec![16, 20] });
    scheduler.report(
        "w1",
        &job_id,
        reduce[0].attempt,
        reduce[0].task_index,
        TaskOutcome::Succeeded(TaskOutput::Sum(36)),
        now,
    );

    let verify = scheduler.poll("w0", 2, now).unwrap();
    assert_eq!(verify[0].kind, TaskKind::Verify { subtask: 0, sum: 36 });
    let terminal = scheduler
        .report(
            "w0",
            &job_id,
            verify[0].attempt,
            verify[0].task_index,
            TaskOutcome::Succeeded(TaskOutput::Verified),
            now,
        )
        .unwrap();

    assert_eq!(terminal.status, JobStatus::Finished);
    assert_eq!(scheduler.job_status(&job_id), Some(JobStatus::Finished));
    assert_eq!(scheduler.overview().jobs_running, 0);
}

#[test]
fn test_failure_restarts_once_then_fails_job() {
    let now = Instant::now();
    let (mut scheduler, job_id) = scheduler_with_job(1, RestartStrategy::default(), now);

    let first = scheduler.poll("w0", 1, now).unwrap().remove(0);
    assert_eq!(first.attempt, 1);
    let terminal = scheduler.report(
        "w0",
        &job_id,
        first.attempt,
        first.task_index,
        TaskOutcome::Failed(failure()),
        now,
    );
    assert!(terminal.is_none());
    assert_eq!(scheduler.job_status(&job_id), Some(JobStatus::Running));

    let second = scheduler.poll("w0", 1, now).unwrap().remove(0);
    assert_eq!(second.attempt, 2);
    let terminal = scheduler
        .report(
            "w0",
            &job_id,
            second.attempt,
            second.task_index,
            TaskOutcome::Failed(failure()),
            now,
        )
        .unwrap();
    assert_eq!(terminal.status, JobStatus::Failed(failure()));
}

#[test]
fn test_restart_delay_holds_back_next_attempt() {
    let now = Instant::now();
    let restart = RestartStrategy {
        max_attempts: 1,
        delay_ms: 500,
    };
    let (mut scheduler, job_id) = scheduler_with_job(1, restart, now);

    let task = scheduler.poll("w0", 1, now).unwrap().remove(0);
    scheduler.report("w0", &job_id, task.attempt, task.task_index, TaskOutcome::Failed(failure()), now);

    assert!(scheduler.poll("w0", 1, now + Duration::from_millis(100)).unwrap().is_empty());
    assert_eq!(scheduler.poll("w0", 1, now + Duration::from_millis(600)).unwrap().len(), 1);
}

#[test]
fn test_stale_reports_are_ignored() {
    let now = Instant::now();
    let (mut scheduler, job_id) = scheduler_with_job(2, RestartStrategy::default(), now);
    let tasks = scheduler.poll("w0", 2, now).unwrap();

    // wrong worker
    scheduler.report(
        "w1",
        &job_id,
        tasks[0].attempt,
        tasks[0].task_index,
        TaskOutcome::Failed(failure()),
        now,
    );
    // wrong attempt
    scheduler.report(
        "w0",
        &job_id,
        tasks[0].attempt + 7,
        tasks[0].task_index,
        TaskOutcome::Failed(failure()),
        now,
    );
    // unknown job
    scheduler.report("w0", &JobId("other".into()), 1, 0, TaskOutcome::Failed(failure()), now);

    // nothing restarted: the next poll hands out no fresh attempt
    assert!(scheduler.poll("w1", 2, now).unwrap().is_empty());
    assert_eq!(scheduler.job_status(&job_id), Some(JobStatus::Running));
}

#[test]
fn test_expired_worker_fails_its_tasks() {
    let now = Instant::now();
    let (mut scheduler, job_id) = scheduler_with_job(1, RestartStrategy::default(), now);
    let task = scheduler.poll("w0", 1, now).unwrap().remove(0);

    let later = now + Duration::from_secs(2);
    scheduler.poll("w1", 0, later).unwrap();
    let much_later = now + WORKER_TIMEOUT + Duration::from_secs(1);
    scheduler.poll("w1", 0, much_later).unwrap();

    let terminal = scheduler.expire_workers(much_later);
    assert!(terminal.is_empty());
    assert_eq!(scheduler.overview().workers_connected, 1);

    // the attempt was restarted on the remaining worker
    let retried = scheduler.poll("w1", 1, much_later).unwrap().remove(0);
    assert_eq!(retried.attempt, task.attempt + 1);
    assert_eq!(scheduler.job_status(&job_id), Some(JobStatus::Running));
}

#[test]
fn test_reregistration_requeues_held_tasks() {
    let now = Instant::now();
    let (mut scheduler, _) = scheduler_with_job(2, RestartStrategy::default(), now);
    let held = scheduler.poll("w0", 2, now).unwrap();
    assert_eq!(held.len(), 2);

    scheduler.register_worker("w0", 2, now);

    let again = scheduler.poll("w1", 2, now).unwrap();
    assert_eq!(again.len(), 2);
    assert!(again.iter().all(|t| t.attempt == 1));
}
