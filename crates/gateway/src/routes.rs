use std::{collections::HashSet, path::Path, sync::Arc};

use {
    axum::{
        Router,
        body::Bytes,
        extract::{RawQuery, Request, State, WebSocketUpgrade},
        http::{StatusCode, header},
        middleware::{self, Next},
        response::{IntoResponse, Json, Response},
        routing::{MethodRouter, delete, get, post},
    },
    tower_http::{
        cors::{Any, CorsLayer},
        services::ServeDir,
    },
    tracing::{debug, warn},
};

use tiller_extension::{Endpoint, Extension, Params, Reply, ReplyBody, Verb};

use crate::{state::GatewayState, ws};

// ── Router assembly ──────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
///
/// Routes are fixed: one handler per (extension, endpoint, verb) triple from
/// the registry snapshot, plus the unauthenticated `/ping`, `/authenticate`
/// and the WebSocket upgrade, which authenticates in-band.
pub fn build_router(state: Arc<GatewayState>, public_dir: Option<&Path>) -> Router {
    let mut protected = Router::new().route("/api/list", get(api_list_handler));

    let mut bound: HashSet<(String, Verb)> = HashSet::new();
    for extension in state.registry.extensions() {
        for endpoint in extension.endpoints() {
            let path = format!("/api/{}/{}", extension.id(), endpoint.name);
            if !bound.insert((path.clone(), endpoint.verb)) {
                warn!(%path, verb = endpoint.verb.as_str(), "duplicate endpoint, skipping");
                continue;
            }
            protected = protected.route(&path, endpoint_route(Arc::clone(extension), endpoint));
        }
    }

    let protected = protected.layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        require_bearer,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/ping", get(ping_handler))
        .route("/authenticate", post(authenticate_handler))
        .route("/api/ws", get(ws_upgrade_handler))
        .merge(protected);

    if let Some(dir) = public_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(cors).with_state(state)
}

// ── Authorization ────────────────────────────────────────────────────────────

/// Reject any request without a valid `Authorization: Bearer <token>`.
async fn require_bearer(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| state.auth.is_authorized(token));

    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(request).await
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn ping_handler() -> &'static str {
    "pong"
}

async fn authenticate_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> Response {
    let password = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("password")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        });

    if let Some(password) = password
        && let Some(token) = state.auth.authenticate(&password)
    {
        let signed = state.auth.sign(&token);
        return Json(serde_json::json!({ "token": signed })).into_response();
    }

    // Exact body kept for wire compatibility, historical spelling included.
    (StatusCode::UNAUTHORIZED, "Wrong authentification code").into_response()
}

async fn api_list_handler(State(state): State<Arc<GatewayState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.api_list().to_string(),
    )
        .into_response()
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| ws::handle_socket(socket, state))
}

/// Bind one (extension, endpoint) pair to its verb's method router.
///
/// Registration is verb-aware: a request with a different method on the
/// same path never reaches this handler, axum answers 405 for it.
fn endpoint_route(
    extension: Arc<dyn Extension>,
    endpoint: Endpoint,
) -> MethodRouter<Arc<GatewayState>> {
    let verb = endpoint.verb;
    let handler = move |RawQuery(query): RawQuery, body: Bytes| {
        let extension = Arc::clone(&extension);
        let endpoint = endpoint.clone();
        async move {
            let params = parse_query(query.as_deref().unwrap_or(""));

            // An unparseable payload is treated as no payload; the
            // extension still runs.
            let body_json = if endpoint.verb == Verb::Post && !body.is_empty() {
                match serde_json::from_slice::<serde_json::Value>(&body) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        debug!(endpoint = %endpoint.name, %err, "unparseable request body");
                        None
                    }
                }
            } else {
                None
            };

            let reply = extension
                .handle_request(&endpoint, &params, body_json.as_ref())
                .await;
            reply_response(reply)
        }
    };

    match verb {
        Verb::Get => get(handler),
        Verb::Post => post(handler),
        Verb::Delete => delete(handler),
    }
}

// ── Reply mapping ────────────────────────────────────────────────────────────

fn parse_query(query: &str) -> Params {
    Params::from_pairs(
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect(),
    )
}

fn reply_response(reply: Reply) -> Response {
    let status = map_status(reply.status);
    match reply.body {
        ReplyBody::Json(value) => (status, Json(value)).into_response(),
        ReplyBody::Empty => status.into_response(),
    }
}

/// Reply status → HTTP status; anything unmapped collapses to 400.
fn map_status(status: u16) -> StatusCode {
    match status {
        200 => StatusCode::OK,
        201 => StatusCode::CREATED,
        202 => StatusCode::ACCEPTED,
        204 => StatusCode::NO_CONTENT,
        401 => StatusCode::UNAUTHORIZED,
        403 => StatusCode::FORBIDDEN,
        404 => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_table() {
        assert_eq!(map_status(200), StatusCode::OK);
        assert_eq!(map_status(201), StatusCode::CREATED);
        assert_eq!(map_status(202), StatusCode::ACCEPTED);
        assert_eq!(map_status(204), StatusCode::NO_CONTENT);
        assert_eq!(map_status(401), StatusCode::UNAUTHORIZED);
        assert_eq!(map_status(403), StatusCode::FORBIDDEN);
        assert_eq!(map_status(404), StatusCode::NOT_FOUND);
        assert_eq!(map_status(500), StatusCode::BAD_REQUEST);
        assert_eq!(map_status(302), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn query_parsing_is_multi_valued() {
        let params = parse_query("a=1&b=2&a=3");
        assert_eq!(params.all("a"), vec!["1", "3"]);
        assert_eq!(params.get("b"), Some("2"));
    }

    #[test]
    fn query_parsing_decodes_percent_escapes() {
        let params = parse_query("name=hello%20world");
        assert_eq!(params.get("name"), Some("hello world"));
    }
}
