//! The background execution context. One tokio task owns the proving
//! capability; requests arrive on a bounded queue and every outcome leaves
//! as a `ResponseEnvelope` on the reverse channel. A failing or panicking
//! capability call is converted into an `Err` envelope and the task keeps
//! serving.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zkdesk_proto::{
    ExecutorMsg, OpResult, Operation, Request, ResponseEnvelope, NOT_READY_MSG,
};

use crate::backend::{ProofOutput, ProofSystem};
use crate::error::EngineError;
use crate::seed::SeedSource;

pub const REQUEST_QUEUE_SIZE: usize = 64;
pub const MSG_QUEUE_SIZE: usize = 256;

/// Foreground-side handle. `submit` enqueues without blocking the caller on
/// the computation; results come back on the message receiver returned by
/// [`Executor::spawn`].
#[derive(Clone)]
pub struct ExecutorHandle {
    req_tx: mpsc::Sender<Request>,
    ready_rx: watch::Receiver<bool>,
}

impl ExecutorHandle {
    pub fn ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    pub async fn submit(&self, request: Request) -> Result<(), EngineError> {
        self.req_tx
            .send(request)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}

pub struct Executor;

impl Executor {
    /// Spawn the background task. The loader is the asynchronous module
    /// load; until it resolves, every request is answered with an `Err`
    /// envelope carrying [`NOT_READY_MSG`]. On completion the task emits
    /// `ExecutorMsg::Ready` exactly once and flips the readiness flag.
    pub fn spawn<L>(
        loader: L,
        seeds: Arc<dyn SeedSource>,
    ) -> (ExecutorHandle, mpsc::Receiver<ExecutorMsg>, JoinHandle<()>)
    where
        L: Future<Output = Arc<dyn ProofSystem>> + Send + 'static,
    {
        let (req_tx, mut req_rx) = mpsc::channel::<Request>(REQUEST_QUEUE_SIZE);
        let (msg_tx, msg_rx) = mpsc::channel::<ExecutorMsg>(MSG_QUEUE_SIZE);
        let (ready_tx, ready_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut backend: Option<Arc<dyn ProofSystem>> = None;
            tokio::pin!(loader);
            loop {
                tokio::select! {
                    loaded = &mut loader, if backend.is_none() => {
                        backend = Some(loaded);
                        let _ = ready_tx.send(true);
                        info!("proving backend loaded");
                        if msg_tx.send(ExecutorMsg::Ready).await.is_err() {
                            break;
                        }
                    }
                    request = req_rx.recv() => {
                        let Some(request) = request else { break };
                        let envelope = match backend.as_ref() {
                            Some(backend) => {
                                execute(Arc::clone(backend), seeds.as_ref(), request).await
                            }
                            None => {
                                debug!(panel = %request.panel, kind = %request.kind(),
                                    "request before backend load");
                                ResponseEnvelope::err(&request, NOT_READY_MSG)
                            }
                        };
                        if msg_tx.send(ExecutorMsg::Response(envelope)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("executor task stopped");
        });

        (ExecutorHandle { req_tx, ready_rx }, msg_rx, task)
    }
}

enum Computed {
    Generated(zkdesk_proto::Params),
    Proved(ProofOutput),
    Verified(bool),
}

impl Computed {
    fn into_result(self, millis: u64) -> OpResult {
        match self {
            Computed::Generated(params) => OpResult::Generated { params, millis },
            Computed::Proved(out) => OpResult::Proved {
                proof: out.proof,
                h: out.h,
                millis,
            },
            Computed::Verified(accepted) => OpResult::Verified {
                result: accepted,
                millis,
            },
        }
    }
}

/// Run one request to completion on the blocking pool. The seed, when the
/// operation needs one, is drawn here, immediately before the dispatch.
async fn execute(
    backend: Arc<dyn ProofSystem>,
    seeds: &dyn SeedSource,
    request: Request,
) -> ResponseEnvelope {
    let circuit = request.circuit;
    let work: Box<dyn FnOnce() -> Result<Computed, EngineError> + Send> =
        match request.op.clone() {
            Operation::Generate => {
                let seed = seeds.next_seed();
                Box::new(move || backend.generate(seed, circuit).map(Computed::Generated))
            }
            Operation::Prove { params, x } => {
                let seed = seeds.next_seed();
                Box::new(move || {
                    backend
                        .prove(seed, circuit, &params, &x)
                        .map(Computed::Proved)
                })
            }
            Operation::Verify { params, proof, h } => Box::new(move || {
                backend
                    .verify(circuit, &params, &proof, &h)
                    .map(Computed::Verified)
            }),
        };

    let started = Instant::now();
    let joined = tokio::task::spawn_blocking(move || work()).await;
    let millis = started.elapsed().as_millis() as u64;

    match joined {
        Ok(Ok(computed)) => ResponseEnvelope::ok(&request, computed.into_result(millis)),
        Ok(Err(err)) => {
            debug!(panel = %request.panel, kind = %request.kind(), %err, "computation rejected");
            ResponseEnvelope::err(&request, err.to_string())
        }
        Err(join_err) => {
            // A panic in the capability lands here; the task must survive it.
            warn!(panel = %request.panel, kind = %request.kind(), %join_err,
                "computation aborted");
            ResponseEnvelope::err(&request, format!("computation failed: {join_err}"))
        }
    }
}
