//! HTTP command API: `GET /?command=<Name>[&payload=<mode>]` and
//! `GET /status`. Replies are plain text with status 200.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use talkgate_core::{Controller, DispatchOutcome, FrontEnd, SessionSnapshot};

pub const MISSING_COMMAND: &str =
    "error: API should be of the format http://a.b.c.d:<port>/?command=StartTransmitting";

#[derive(Debug, Deserialize)]
pub struct CommandQuery {
    command: Option<String>,
    payload: Option<String>,
}

pub fn router(controller: Controller) -> Router {
    Router::new()
        .route("/", get(command))
        .route("/status", get(status))
        .with_state(controller)
}

/// Response body for a dispatch outcome.
pub fn response_text(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Executed(command, _) => {
            format!("API {} Request Processed Successfully", command.description())
        }
        DispatchOutcome::Denied(command) => format!("API {} Request Denied", command.description()),
        DispatchOutcome::Undefined => "API Command Not Defined".to_owned(),
        DispatchOutcome::Unavailable(command) => {
            format!("API {} Request Failed", command.description())
        }
    }
}

async fn command(
    State(controller): State<Controller>,
    Query(query): Query<CommandQuery>,
) -> String {
    let Some(name) = query.command else {
        return MISSING_COMMAND.to_owned();
    };
    let outcome = controller
        .invoke(FrontEnd::Http, &name, query.payload.as_deref())
        .await;
    super::log_outcome(FrontEnd::Http, &name, &outcome);
    response_text(&outcome)
}

async fn status(State(controller): State<Controller>) -> Json<SessionSnapshot> {
    Json(controller.snapshot())
}

/// Serve until the gateway stops. The listener is bound by the caller so
/// bind failures surface before anything starts.
pub async fn serve(listener: TcpListener, controller: Controller) {
    let cancel = controller.cancel_token();
    match listener.local_addr() {
        Ok(address) => info!(%address, "HTTP API listening"),
        Err(e) => error!(error = %e, "HTTP listener has no address"),
    }

    let shutdown = async move { cancel.cancelled().await };
    if let Err(e) = axum::serve(listener, router(controller))
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "HTTP API failed");
    }
}
