//! HTTP/WebSocket Handlers

use axum::{
    body::Bytes,
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::Response,
    Json,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use agent_core::{mailbox, Address, AgentError, ChatMessage, ClientFrame, SessionId};
use yield_advisor::{Conversation, RouterHandle};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub knowledge_available: bool,
    pub reasoner: &'static str,
    pub active_sessions: usize,
    pub queued_queries: usize,
    pub replies_sent: u64,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub message: String,

    /// Keep the session open across requests when supplied
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    pub session_id: String,
}

impl QueryResponse {
    fn failed(error: &AgentError, session: &SessionId) -> Self {
        Self {
            response: error.user_message(),
            success: false,
            error: Some(error.code().to_string()),
            intent: None,
            confidence: None,
            session_id: session.to_string(),
        }
    }
}

/// Inbound WebSocket frame: a protocol message plus an optional session id
#[derive(Debug, Deserialize)]
pub struct SocketMessage {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(flatten)]
    pub message: ChatMessage,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.router.snapshot();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        knowledge_available: state.knowledge_available,
        reasoner: state.reasoner_kind,
        active_sessions: snapshot.active(),
        queued_queries: snapshot.queued,
        replies_sent: snapshot.replies_sent,
    })
}

/// Parse the body ourselves so every malformed request gets the same shape
fn parse_query(body: &[u8]) -> Result<QueryRequest, AgentError> {
    let request: QueryRequest =
        serde_json::from_slice(body).map_err(|e| AgentError::MalformedRequest(e.to_string()))?;
    if request.message.trim().is_empty() {
        return Err(AgentError::MalformedRequest("empty message".into()));
    }
    Ok(request)
}

/// One query through the session protocol
pub async fn query_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QueryResponse>, (StatusCode, Json<QueryResponse>)> {
    let request = match parse_query(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejected query: {}", e);
            return Err((StatusCode::BAD_REQUEST, Json(QueryResponse::failed(&e, &SessionId::new()))));
        }
    };

    let keep_open = request.session_id.is_some();
    let session = request.session_id.map_or_else(SessionId::new, SessionId::from_string);
    let mut conversation = Conversation::open(state.router.clone(), session.clone());

    let reply = conversation
        .ask(&request.message, state.reply_budget())
        .await
        .map_err(|e| {
            tracing::error!(%session, "Router error: {}", e);
            let status = match &e {
                AgentError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(QueryResponse::failed(&e, &session)))
        })?;

    if !keep_open {
        if let Err(e) = conversation.close().await {
            tracing::debug!(%session, "Could not end session: {}", e);
        }
    }

    Ok(Json(QueryResponse {
        confidence: reply.confidence(),
        intent: Some(reply.intent.to_string()),
        response: reply.response,
        success: reply.success,
        error: reply.error,
        session_id: session.to_string(),
    }))
}

/// WebSocket session endpoint
pub async fn session_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.router))
}

async fn handle_socket(socket: WebSocket, router: RouterHandle) {
    let (sender, receiver) = socket.split();
    run_socket(sender, receiver, router).await;
}

/// Socket loop over any frame sink and inbound stream
async fn run_socket<W, R>(mut sender: W, mut receiver: R, router: RouterHandle)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let client = Address::ephemeral();
    let (reply_to, mut frames) = mailbox::<ClientFrame>(client.clone(), 64);
    let default_session = SessionId::new();
    let mut sessions: Vec<SessionId> = Vec::new();

    // Router frames → socket
    let forward = tokio::spawn(async move {
        while let Some(envelope) = frames.recv().await {
            let text = match serde_json::to_string(&envelope.payload) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Dropping unserializable frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        let inbound: SocketMessage = match serde_json::from_str(&msg) {
            Ok(m) => m,
            Err(e) => {
                let error = AgentError::MalformedRequest(e.to_string());
                tracing::warn!("Rejected socket message: {}", error);
                let reply = ChatMessage::text(error.user_message()).with_metadata("error", error.code());
                if let Err(e) = reply_to.post(&default_session, &client, ClientFrame::Message(reply)).await {
                    tracing::debug!("Socket writer gone: {}", e);
                    break;
                }
                continue;
            }
        };

        let session = inbound
            .session_id
            .map_or_else(|| default_session.clone(), SessionId::from_string);
        if !sessions.contains(&session) {
            sessions.push(session.clone());
        }

        if let Err(e) = router.send(&session, &client, inbound.message, reply_to.clone()).await {
            tracing::error!(%session, "Router unavailable: {}", e);
            break;
        }
    }

    // Socket gone: end everything it opened
    for session in &sessions {
        if let Err(e) = router
            .send(session, &client, ChatMessage::end_session(), reply_to.clone())
            .await
        {
            tracing::debug!(%session, "Could not end session: {}", e);
        }
    }
    drop(reply_to);
    forward.abort();
}
