//! Input front-ends. Each one resolves its input to a command name and
//! calls [`Controller::invoke`](talkgate_core::Controller::invoke); none of
//! them touch session state.

pub mod gpio;
pub mod http;
pub mod keyboard;
pub mod mqtt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use talkgate_core::{Command, CommandReport, Controller, DispatchOutcome, FrontEnd};

/// Commands an input loop may have outstanding before new ones are dropped.
const BACKLOG: usize = 32;

/// Log a dispatch outcome at a level matching its importance.
pub(crate) fn log_outcome(front_end: FrontEnd, name: &str, outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Executed(command, CommandReport::Rejected(reason)) => {
            warn!(%front_end, %command, reason, "command rejected");
        }
        DispatchOutcome::Executed(command, CommandReport::Interrupted) => {
            info!(%front_end, %command, "command interrupted by shutdown");
        }
        DispatchOutcome::Executed(command, report) => {
            debug!(%front_end, %command, ?report, "command executed");
        }
        DispatchOutcome::Denied(command) => info!(%front_end, %command, "command denied"),
        DispatchOutcome::Undefined => info!(%front_end, name, "command not defined"),
        DispatchOutcome::Unavailable(command) => {
            warn!(%front_end, %command, "gateway unavailable");
        }
    }
}

/// Ordered hand-off from an input loop to the controller.
///
/// Input loops submit names and go straight back to reading; one task per
/// dispatcher invokes them in arrival order. `Quit` skips the backlog.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    front_end: FrontEnd,
    controller: Controller,
    backlog: mpsc::Sender<String>,
}

impl Dispatcher {
    pub(crate) fn spawn(front_end: FrontEnd, controller: Controller) -> Self {
        let (backlog, mut rx) = mpsc::channel::<String>(BACKLOG);
        let worker = controller.clone();
        tokio::spawn(async move {
            while let Some(name) = rx.recv().await {
                let outcome = worker.invoke(front_end, &name, None).await;
                log_outcome(front_end, &name, &outcome);
            }
        });
        Self {
            front_end,
            controller,
            backlog,
        }
    }

    /// Queue `name` without waiting for the gateway.
    pub(crate) fn submit(&self, name: &str) {
        if Command::lookup(name) == Some(Command::Quit) {
            let (front_end, controller, name) =
                (self.front_end, self.controller.clone(), name.to_owned());
            tokio::spawn(async move {
                let outcome = controller.invoke(front_end, &name, None).await;
                log_outcome(front_end, &name, &outcome);
            });
            return;
        }
        match self.backlog.try_send(name.to_owned()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(name)) => {
                warn!(front_end = %self.front_end, name, "command backlog full, dropped");
            }
            Err(mpsc::error::TrySendError::Closed(name)) => {
                debug!(front_end = %self.front_end, name, "dispatcher stopped");
            }
        }
    }
}

/// Stop the gateway on SIGINT/SIGTERM without waiting for queued
/// commands. Ends early when the gateway stops.
pub async fn watch_signals(controller: Controller) {
    let cancel = controller.cancel_token();
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(e) => {
                warn!(error = %e, "cannot watch SIGTERM");
                None
            }
        };

    let signal = tokio::select! {
        () = cancel.cancelled() => return,
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => "SIGINT",
            Err(e) => {
                warn!(error = %e, "cannot watch SIGINT");
                cancel.cancelled().await;
                return;
            }
        },
        Some(()) = async {
            match terminate.as_mut() {
                Some(signal) => signal.recv().await,
                None => std::future::pending().await,
            }
        } => "SIGTERM",
    };

    info!(signal, "shutting down");
    controller.shutdown();
}
