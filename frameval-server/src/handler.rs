//! Request handler for frameval-server

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use frameval_core::eval::{CancelToken, EvalConfig, InstructionSequence, Interpreter};
use frameval_core::frame::{FrameSnapshot, SnapshotService};
use frameval_core::{Request, Response};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a request is answered
pub enum Dispatch {
    /// Response is ready now
    Immediate(Response),
    /// Evaluation running on a blocking worker thread
    Deferred(JoinHandle<Response>),
    /// Respond, then stop reading requests
    Shutdown(Response),
}

type Session = Arc<Mutex<SnapshotService>>;

pub struct Handler {
    sessions: HashMap<String, Session>,
    running: Arc<Mutex<HashMap<u64, CancelToken>>>,
    config: EvalConfig,
}

impl Handler {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            running: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn handle(&mut self, id: u64, request: Request) -> Dispatch {
        match request {
            Request::LoadFrame { session, frame } => {
                Dispatch::Immediate(self.handle_load_frame(session, frame))
            }
            Request::Evaluate { session, program } => self.handle_evaluate(id, &session, program),
            Request::Cancel { id: target } => Dispatch::Immediate(self.handle_cancel(target)),
            Request::Frame { session } => Dispatch::Immediate(self.handle_frame(&session)),
            Request::Shutdown => {
                info!("Shutdown requested");
                self.cancel_all();
                Dispatch::Shutdown(Response::success())
            }
        }
    }

    fn handle_load_frame(&mut self, session: String, frame: FrameSnapshot) -> Response {
        info!(
            "Loading frame '{}' into session {} ({} locals)",
            frame.function,
            session,
            frame.locals.len()
        );
        self.sessions
            .insert(session, Arc::new(Mutex::new(SnapshotService::new(frame))));
        Response::success()
    }

    fn handle_evaluate(&mut self, id: u64, session: &str, program: InstructionSequence) -> Dispatch {
        debug!("Evaluate request {}: {} instructions", id, program.len());

        let Some(frame) = self.sessions.get(session).cloned() else {
            return Dispatch::Immediate(Response::error(format!("Unknown session: {}", session)));
        };

        let token = CancelToken::new();
        lock(&self.running).insert(id, token.clone());

        let running = Arc::clone(&self.running);
        let config = self.config.clone();

        // one evaluation per frame at a time; the session mutex serialises them
        Dispatch::Deferred(tokio::task::spawn_blocking(move || {
            let outcome = {
                let mut service = lock(&frame);
                Interpreter::with_config(&program, &mut *service, config)
                    .with_cancel_token(token)
                    .run()
            };
            lock(&running).remove(&id);

            match outcome {
                Ok(value) => Response::eval_result(value),
                Err(fault) => {
                    debug!("Evaluation {} faulted: {}", id, fault);
                    Response::fault(fault)
                }
            }
        }))
    }

    fn handle_cancel(&self, target: u64) -> Response {
        match lock(&self.running).get(&target) {
            Some(token) => {
                info!("Cancelling evaluation {}", target);
                token.cancel();
                Response::success()
            }
            None => {
                warn!("Cancel for unknown evaluation {}", target);
                Response::error(format!("No running evaluation with id {}", target))
            }
        }
    }

    /// Never waits on the session: a running evaluation holds it, and the
    /// request loop must stay free to read `cancel`
    fn handle_frame(&self, session: &str) -> Response {
        let Some(frame) = self.sessions.get(session) else {
            return Response::error(format!("Unknown session: {}", session));
        };
        let service = match frame.try_lock() {
            Ok(service) => service,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("Frame request for busy session {}", session);
                return Response::error(format!("Session {} is busy evaluating", session));
            }
        };
        Response::Frame {
            frame: service.frame().clone(),
        }
    }

    fn cancel_all(&self) {
        for token in lock(&self.running).values() {
            token.cancel();
        }
    }
}

/// A panicked evaluation must not wedge the server
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
