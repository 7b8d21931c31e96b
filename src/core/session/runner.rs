//! Drives a session state machine from the central controller's event queue

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::central::{CentralController, SessionEvent};
use crate::core::session::SessionStateMachine;
use crate::core::session::observer::SessionObserver;

/// Upper bound on waiting for radio cleanup once the session has ended
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Serial event loop: one batch is handled at a time, never concurrently
pub struct SessionRunner<C: CentralController, O: SessionObserver> {
    machine: SessionStateMachine<C, O>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<C: CentralController, O: SessionObserver> SessionRunner<C, O> {
    pub fn new(machine: SessionStateMachine<C, O>, events: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { machine, events }
    }

    pub fn machine(&self) -> &SessionStateMachine<C, O> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SessionStateMachine<C, O> {
        &mut self.machine
    }

    /// Processes events until cancelled or the event channel closes, then
    /// tears the session down, waits for the radio cleanup it started and
    /// hands the state machine back.
    pub async fn run(mut self, cancel_token: CancellationToken) -> SessionStateMachine<C, O> {
        info!("Session runner started");
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Session runner cancelled");
                    break;
                }
                received = self.events.recv() => {
                    let Some(first) = received else {
                        info!("Event channel closed");
                        break;
                    };
                    let mut batch = vec![first];
                    while let Ok(event) = self.events.try_recv() {
                        batch.push(event);
                    }
                    debug!("Handling batch of {} event(s)", batch.len());
                    self.machine.handle_batch(batch);
                }
            }
        }

        self.machine.teardown();
        for handle in self.machine.take_pending() {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Radio cleanup task failed: {}", e),
                Err(_) => warn!("Radio cleanup did not finish within {:?}", SHUTDOWN_GRACE),
            }
        }
        self.machine
    }
}
