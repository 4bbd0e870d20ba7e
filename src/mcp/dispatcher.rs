//! Message dispatcher.
//!
//! Routes inbound envelopes to the session state machine and to tool
//! handlers. Every response is pushed onto the owning session's outbound
//! queue; nothing here waits for the queue to drain.

use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mcp::codec::Message;
use crate::mcp::handler::ToolRegistry;
use crate::mcp::protocol::*;
use crate::mcp::session::{Session, SessionRegistry, SessionState};
use crate::metrics::{Metrics, Timer};
use crate::VERSION;

/// Protocol versions this server can speak. The first one is preferred.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[MCP_VERSION, "2025-03-26"];

/// Message router shared by every connection.
pub struct Dispatcher {
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionRegistry>,
    metrics: Arc<Metrics>,
    name: String,
    version: String,
}

impl Dispatcher {
    /// Create a new dispatcher.
    pub fn new(
        tools: Arc<ToolRegistry>,
        sessions: Arc<SessionRegistry>,
        metrics: Arc<Metrics>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            sessions,
            metrics,
            name: name.into(),
            version: VERSION.to_string(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Route one inbound message for `session_id`.
    ///
    /// Errors returned here are transport-level: the session does not exist
    /// or can no longer receive responses. Everything else is answered on the
    /// session's outbound queue.
    pub fn dispatch(&self, session_id: &str, message: Message) -> Result<()> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        if session.is_closed() {
            return Err(Error::SessionClosed(session_id.to_string()));
        }

        match message {
            Message::Request(req) => self.handle_request(&session, req),
            Message::Notification(notif) => {
                self.handle_notification(&session, notif);
                Ok(())
            }
            Message::Response(res) => {
                warn!(
                    "Session {}: ignoring unexpected response (id: {})",
                    session_id, res.id
                );
                Ok(())
            }
        }
    }

    /// Handle a JSON-RPC request.
    fn handle_request(&self, session: &Arc<Session>, req: JsonRpcRequest) -> Result<()> {
        debug!(
            "Session {}: handling request {} (id: {})",
            session.id(),
            req.method,
            req.id
        );
        self.metrics.inc_requests();

        let outcome = match (session.state(), req.method.as_str()) {
            (_, "initialize") => self.handle_initialize(session, req.params),
            (SessionState::Init, method) => Err(Error::ProtocolSequencing(format!(
                "'{}' received before initialize",
                method
            ))),
            (_, "ping") => Ok(serde_json::json!({})),
            (_, "tools/list") => self.handle_list_tools(),
            (_, "tools/call") => return self.handle_call_tool(session, req.id, req.params),
            (_, method) => Err(Error::MethodNotFound(method.to_string())),
        };

        respond(&self.metrics, session, req.id, outcome)
    }

    /// Handle a notification.
    fn handle_notification(&self, session: &Session, notif: JsonRpcNotification) {
        debug!("Session {}: notification {}", session.id(), notif.method);

        match notif.method.as_str() {
            "notifications/initialized" => {
                info!("Session {}: client initialized", session.id());
            }
            "notifications/cancelled" => {
                let params = notif
                    .params
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok());
                match params {
                    Some(cancel) => {
                        if session.cancel_request(&cancel.request_id) {
                            info!(
                                "Session {}: cancelled request {} ({})",
                                session.id(),
                                cancel.request_id,
                                cancel.reason.as_deref().unwrap_or("no reason given")
                            );
                        }
                    }
                    None => warn!("Session {}: malformed cancel notification", session.id()),
                }
            }
            _ => {
                debug!("Unknown notification: {}", notif.method);
            }
        }
    }

    /// Handle initialize request.
    fn handle_initialize(&self, session: &Session, params: Option<Value>) -> Result<Value> {
        #[derive(serde::Deserialize, Default)]
        #[serde(rename_all = "camelCase")]
        struct InitParams {
            #[serde(default)]
            protocol_version: Option<String>,
            #[serde(default)]
            client_info: Option<ServerInfo>,
        }

        let init: InitParams = params
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        session.initialize()?;

        if let Some(client) = &init.client_info {
            info!(
                "Session {}: initialized by {} v{}",
                session.id(),
                client.name,
                client.version
            );
        }

        let protocol_version = init
            .protocol_version
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(&v.as_str()))
            .unwrap_or_else(|| MCP_VERSION.to_string());

        let result = InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
            instructions: Some(format!(
                "{} tools available: {}",
                self.tools.tool_count(),
                self.tools
                    .list_tools()
                    .into_iter()
                    .map(|t| t.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request.
    fn handle_list_tools(&self) -> Result<Value> {
        let tools = self.tools.list_tools();
        let result = ListToolsResult { tools };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request.
    ///
    /// The handler runs on its own task; this returns as soon as the call is
    /// scheduled.
    fn handle_call_tool(
        &self,
        session: &Arc<Session>,
        id: RequestId,
        params: Option<Value>,
    ) -> Result<()> {
        let params: CallToolParams = match params
            .ok_or_else(|| Error::InvalidToolArguments("Missing params".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::InvalidToolArguments(e.to_string()))
            }) {
            Ok(params) => params,
            Err(e) => return respond(&self.metrics, session, id, Err(e)),
        };

        let handler = match self.tools.get_tool(&params.name) {
            Some(handler) => handler,
            None => {
                return respond(
                    &self.metrics,
                    session,
                    id,
                    Err(Error::ToolNotFound(params.name)),
                )
            }
        };

        let token = match session.track(id.clone()) {
            Ok(token) => token,
            Err(e @ Error::DuplicateRequest(_)) => return respond(&self.metrics, session, id, Err(e)),
            Err(e) => return Err(e),
        };

        self.metrics.inc_tool_calls();
        let session = session.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let timer = Timer::start();
            let call = AssertUnwindSafe(handler.execute(params.arguments)).catch_unwind();

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(if session.is_closed() {
                    Error::SessionClosed(session.id().to_string())
                } else {
                    Error::Cancelled
                }),
                result = call => match result {
                    Ok(result) => result,
                    Err(_) => Err(Error::ToolExecutionFailed(format!(
                        "tool '{}' panicked",
                        params.name
                    ))),
                },
            };

            if !session.complete(&id) {
                debug!(
                    "Session {}: dropping result of {} for request {} after {} ms: {}",
                    session.id(),
                    params.name,
                    id,
                    timer.elapsed_ms(),
                    outcome.err().map(|e| e.to_string()).unwrap_or_default()
                );
                return;
            }

            debug!(
                "Session {}: {} finished in {} ms",
                session.id(),
                params.name,
                timer.elapsed_ms()
            );

            let value = outcome.and_then(|result| Ok(serde_json::to_value(result)?));
            if let Err(e) = respond(&metrics, &session, id, value) {
                warn!("Session {}: could not deliver response: {}", session.id(), e);
            }
        });

        Ok(())
    }
}

/// Encode the outcome of a request and enqueue it on the session.
fn respond(
    metrics: &Metrics,
    session: &Session,
    id: RequestId,
    outcome: Result<Value>,
) -> Result<()> {
    let response = match outcome {
        Ok(value) => {
            metrics.inc_success();
            JsonRpcResponse::success(id, value)
        }
        Err(e) => {
            metrics.inc_failed();
            if matches!(e, Error::ProtocolSequencing(_)) {
                metrics.inc_protocol_errors();
            }
            debug!("Session {}: request {} failed: {}", session.id(), id, e);
            JsonRpcResponse::failure(id, e.rpc_code(), e.to_string())
        }
    };

    session.enqueue(&Message::Response(response))
}
