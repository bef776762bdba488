// ── Controller handle ──
//
// The single entry point every front-end calls. Cheaply cloneable; all
// state lives in the gateway worker, reached through a request queue.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::{
    Command, CommandEnvelope, CommandPolicy, CommandReport, DispatchOutcome, FrontEnd,
};
use crate::error::CoreError;
use crate::gateway::Request;
use crate::state::SessionSnapshot;

/// Handle to a running [`Gateway`](crate::Gateway).
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    requests: mpsc::Sender<Request>,
    snapshot: watch::Receiver<SessionSnapshot>,
    http: CommandPolicy,
    mqtt: CommandPolicy,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("running", &!self.inner.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub(crate) fn new(
        requests: mpsc::Sender<Request>,
        snapshot: watch::Receiver<SessionSnapshot>,
        http: CommandPolicy,
        mqtt: CommandPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                requests,
                snapshot,
                http,
                mqtt,
                cancel,
            }),
        }
    }

    /// Resolve `name`, check the front-end's permission, then run it.
    ///
    /// Unknown names and denied commands never reach the worker.
    pub async fn invoke(
        &self,
        front_end: FrontEnd,
        name: &str,
        payload: Option<&str>,
    ) -> DispatchOutcome {
        let Some(command) = Command::lookup(name) else {
            debug!(%front_end, name, "command not defined");
            return DispatchOutcome::Undefined;
        };
        if !self.permits(front_end, command) {
            info!(%front_end, %command, "command denied");
            return DispatchOutcome::Denied(command);
        }
        match self.execute(command, payload).await {
            Ok(report) => DispatchOutcome::Executed(command, report),
            Err(_) => DispatchOutcome::Unavailable(command),
        }
    }

    /// Whether `front_end` may invoke `command`. Keyboard and GPIO imply
    /// physical access and are never gated.
    pub fn permits(&self, front_end: FrontEnd, command: Command) -> bool {
        match front_end {
            FrontEnd::Keyboard | FrontEnd::Gpio => true,
            FrontEnd::Http => self.inner.http.permits(command),
            FrontEnd::Mqtt => self.inner.mqtt.permits(command),
        }
    }

    /// Queue `command` and wait for the worker's report, bypassing
    /// front-end permissions.
    ///
    /// `Quit` is not queued: it cancels the worker at once, abandoning
    /// anything still waiting in the queue.
    pub async fn execute(
        &self,
        command: Command,
        payload: Option<&str>,
    ) -> Result<CommandReport, CoreError> {
        if command == Command::Quit {
            if !self.is_running() {
                return Err(CoreError::GatewayStopped);
            }
            info!("quit requested");
            self.shutdown();
            return Ok(CommandReport::Completed);
        }
        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .requests
            .send(Request::Command(CommandEnvelope {
                command,
                payload: payload.map(str::to_owned),
                response_tx,
            }))
            .await
            .map_err(|_| CoreError::GatewayStopped)?;
        response_rx.await.map_err(|_| CoreError::GatewayStopped)
    }

    /// Latest published session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.clone()
    }

    /// Stop the worker and every task holding [`cancel_token`](Self::cancel_token).
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }
}
