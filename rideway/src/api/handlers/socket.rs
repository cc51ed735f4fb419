use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::{AppState, auth::current_user::SocketPrincipal, realtime::session};

/// Open the realtime channel. Authenticates with the same token as the REST API, which browsers
/// pass as `?token=` since they cannot set headers on an upgrade.
#[utoipa::path(
    get,
    path = "/ws",
    tag = "realtime",
    responses(
        (status = 101, description = "Switching to WebSocket"),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all, fields(kind = %principal.kind()))]
pub async fn connect(State(state): State<AppState>, SocketPrincipal(principal): SocketPrincipal, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| session::run(socket, state, principal))
}
