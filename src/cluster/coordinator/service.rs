use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::scheduler::Scheduler;
use crate::cluster::protocol::framed;
use crate::cluster::protocol::recv_message;
use crate::cluster::protocol::send_message;
use crate::cluster::JobId;
use crate::cluster::JobStatus;
use crate::cluster::Request;
use crate::cluster::Response;
use crate::coordination::JobGraphStore;
use crate::coordination::JobRecord;
use crate::Result;

/// Leader-only state, installed once leadership is confirmed.
pub(crate) struct LeaderContext {
    pub(crate) scheduler: Mutex<Scheduler>,
    pub(crate) job_store: JobGraphStore,
}

impl LeaderContext {
    pub(crate) fn new(
        scheduler: Scheduler,
        job_store: JobGraphStore,
    ) -> Self {
        Self {
            scheduler: Mutex::new(scheduler),
            job_store,
        }
    }

    fn session_id(&self) -> String {
        self.scheduler.lock().session_id().to_string()
    }

    /// Best effort: a lost write only means a new leader re-runs the job.
    pub(crate) async fn persist(
        &self,
        records: Vec<JobRecord>,
    ) {
        for record in records {
            if let Err(e) = self.job_store.put(&record).await {
                error!(job_id = %record.job_id, "failed to persist job status: {}", e);
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct CoordinatorState {
    leader: RwLock<Option<Arc<LeaderContext>>>,
}

impl CoordinatorState {
    pub(crate) fn leader(&self) -> Option<Arc<LeaderContext>> {
        self.leader.read().clone()
    }

    pub(crate) fn become_leader(
        &self,
        context: Arc<LeaderContext>,
    ) {
        *self.leader.write() = Some(context);
    }

    pub(crate) fn step_down(&self) {
        self.leader.write().take();
    }
}

/// Accepts connections until `shutdown` fires.
pub(crate) async fn serve(
    listener: TcpListener,
    state: Arc<CoordinatorState>,
    max_frame_bytes: usize,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("request server shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state, max_frame_bytes).await {
                            debug!("connection from {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => warn!("accept failed: {}", e),
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<CoordinatorState>,
    max_frame_bytes: usize,
) -> Result<()> {
    stream.set_nodelay(true).ok();
    let mut stream = framed(stream, max_frame_bytes);
    let Some(request) = recv_message::<Request>(&mut stream).await else {
        return Ok(());
    };
    let response = match request {
        Ok(request) => handle_request(&state, request).await,
        Err(e) => Response::Rejected(format!("malformed request: {e}")),
    };
    send_message(&mut stream, &response).await?;
    Ok(())
}

pub(crate) async fn handle_request(
    state: &CoordinatorState,
    request: Request,
) -> Response {
    let Some(leader) = state.leader() else {
        return Response::NotLeader;
    };
    let now = Instant::now();

    match request {
        Request::ClusterOverview => Response::Overview(leader.scheduler.lock().overview()),

        Request::SubmitJob(spec) => {
            let job_id = JobId::generate();
            let record = JobRecord {
                job_id: job_id.clone(),
                spec: spec.clone(),
                status: JobStatus::Running,
            };
            if let Err(e) = leader.job_store.put(&record).await {
                error!(%job_id, "failed to persist submitted job: {}", e);
                return Response::Rejected(format!("job store unavailable: {e}"));
            }
            info!(%job_id, name = %spec.name, "job submitted");
            leader.scheduler.lock().add_job(job_id.clone(), spec, now);
            Response::Submitted(job_id)
        }

        Request::JobStatus(job_id) => {
            let known = leader.scheduler.lock().job_status(&job_id);
            if let Some(status) = known {
                return Response::Status(status);
            }
            match leader.job_store.get(&job_id).await {
                Ok(Some(record)) => Response::Status(record.status),
                Ok(None) => Response::Rejected(format!("job {job_id} not found")),
                Err(e) => Response::Rejected(format!("job store unavailable: {e}")),
            }
        }

        Request::RegisterWorker { worker_id, slots } => {
            let mut scheduler = leader.scheduler.lock();
            scheduler.register_worker(&worker_id, slots, now);
            Response::Registered {
                session_id: scheduler.session_id().to_string(),
            }
        }

        Request::PollTasks {
            worker_id,
            session_id,
            free_slots,
        } => {
            if session_id != leader.session_id() {
                return Response::Rejected(format!("session {session_id} is over"));
            }
            match leader.scheduler.lock().poll(&worker_id, free_slots, now) {
                Ok(tasks) => Response::Tasks(tasks),
                Err(reason) => Response::Rejected(reason),
            }
        }

        Request::ReportTask {
            worker_id,
            session_id,
            job_id,
            attempt,
            task_index,
            outcome,
        } => {
            if session_id != leader.session_id() {
                return Response::Rejected(format!("session {session_id} is over"));
            }
            let terminal = leader
                .scheduler
                .lock()
                .report(&worker_id, &job_id, attempt, task_index, outcome, now);
            if let Some(record) = terminal {
                leader.persist(vec![record]).await;
            }
            Response::Ack
        }
    }
}
