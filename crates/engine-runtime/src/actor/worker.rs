use crate::actor::{
    mailbox::Mailbox,
    scheduler::{NextWake, WorkerExit, next_wake},
};
use engine_processing::{
    cb::{CircuitBreaker, CircuitBreakerState},
    controller::WorkerController,
};
use model::core::identifiers::WorkerId;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum WorkerMsg {
    /// Run one batch.
    Wake,
    Stop,
}

/// Drives one worker through its continuations: every wake schedules the
/// next one until the queue drains or the actor is stopped.
pub struct WorkerActor {
    controller: WorkerController,
    mailbox: Mailbox<WorkerMsg>,
    cancel: CancellationToken,
    breaker: CircuitBreaker,
    reschedule_delay: Duration,
    exits: mpsc::Sender<(WorkerId, WorkerExit)>,
}

impl WorkerActor {
    async fn on_wake(&mut self) -> NextWake {
        match self.controller.wake().await {
            Ok(outcome) => {
                self.breaker.record_success();
                next_wake(&outcome, self.reschedule_delay)
            }
            Err(e) => {
                error!(worker = %self.controller.key(), error = %e, "Wake failed");
                match self.breaker.record_failure() {
                    CircuitBreakerState::Open => {
                        error!(
                            worker = %self.controller.key(),
                            failures = self.breaker.consecutive_failures(),
                            "Giving up on worker after repeated wake errors"
                        );
                        NextWake::Exit(WorkerExit::GaveUp {
                            error: e.to_string(),
                        })
                    }
                    CircuitBreakerState::RetryAfter(delay) => {
                        warn!(
                            worker = %self.controller.key(),
                            delay_ms = delay.as_millis(),
                            "Backing off before next wake"
                        );
                        NextWake::After(delay)
                    }
                }
            }
        }
    }

    async fn exit(&self, exit: WorkerExit) {
        let worker_id = self.controller.key().worker_id();
        if self.exits.send((worker_id, exit)).await.is_err() {
            warn!(worker = %self.controller.key(), "Nobody is waiting for worker exits");
        }
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<WorkerMsg>) {
        info!(worker = %self.controller.key(), "Worker actor started");
        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.exit(WorkerExit::Cancelled).await;
                    break;
                }
                msg = inbox.recv() => msg,
            };

            match msg {
                Some(WorkerMsg::Wake) => match self.on_wake().await {
                    NextWake::After(delay) => self.mailbox.send_after(WorkerMsg::Wake, delay),
                    NextWake::Exit(exit) => {
                        info!(worker = %self.controller.key(), exit = ?exit, "Worker finished");
                        self.exit(exit).await;
                        break;
                    }
                },
                Some(WorkerMsg::Stop) | None => {
                    self.exit(WorkerExit::Cancelled).await;
                    break;
                }
            }
        }
        info!(worker = %self.controller.key(), "Worker actor stopped");
    }
}

/// Spawns the actor task. The first wake has to be sent by the caller.
pub fn spawn_worker(
    controller: WorkerController,
    reschedule_delay: Duration,
    cancel: CancellationToken,
    exits: mpsc::Sender<(WorkerId, WorkerExit)>,
) -> (Mailbox<WorkerMsg>, JoinHandle<()>) {
    let (mailbox, inbox) = Mailbox::channel(controller.key().to_string(), 8);
    let actor = WorkerActor {
        controller,
        mailbox: mailbox.clone(),
        cancel,
        breaker: CircuitBreaker::new(5, reschedule_delay, reschedule_delay * 16),
        reschedule_delay,
        exits,
    };
    let handle = tokio::spawn(actor.run(inbox));
    (mailbox, handle)
}
