//! Line-delimited JSON protocol.
//!
//! Each input line is one request object carrying a `command` and an optional
//! `requestId`. Each output line is one response object. The `requestId` is
//! echoed verbatim on every response, including failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ConversationTurn;
use crate::error::RagError;

/// Answer given when retrieval finds nothing.
pub const NO_MATCH_ANSWER: &str = "I couldn't find relevant information to answer your question.";

/// Commands the daemon understands.
pub const COMMANDS: [&str; 4] = ["store", "query", "delete", "clear_all"];

/// A validated request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Store(StoreRequest),
    Query(QueryRequest),
    Delete(DeleteRequest),
    ClearAll(ClearAllRequest),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Query(_) => "query",
            Self::Delete(_) => "delete",
            Self::ClearAll(_) => "clear_all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreRequest {
    pub file_path: String,
    pub text: String,
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub conversation_history: Option<Vec<ConversationTurn>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteRequest {
    pub document_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClearAllRequest {
    /// Explicit acknowledgement that every entry will be removed
    #[serde(default)]
    pub confirm: bool,
}

/// A parsed input line: the identifying fields plus the command, or the
/// reason it could not be built.
#[derive(Debug)]
pub struct Envelope {
    pub request_id: Option<Value>,
    pub document_id: Option<String>,
    pub command: Result<Command, RagError>,
}

/// Parse one input line.
///
/// `requestId` and `document_id` are read before the command is validated,
/// so failures can still carry them.
pub fn parse_line(line: &str) -> Envelope {
    let value: Value = match serde_json::from_str(line.trim()) {
        Ok(value) => value,
        Err(e) => {
            return Envelope {
                request_id: None,
                document_id: None,
                command: Err(RagError::Parse(e.to_string())),
            };
        }
    };

    let Some(object) = value.as_object() else {
        return Envelope {
            request_id: None,
            document_id: None,
            command: Err(RagError::Parse(
                "request must be a JSON object".to_string(),
            )),
        };
    };

    let request_id = object.get("requestId").filter(|v| !v.is_null()).cloned();
    let document_id = object
        .get("document_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let command = match object.get("command").cloned() {
        None | Some(Value::Null) => Err(RagError::Validation(
            "Missing required field: command".to_string(),
        )),
        Some(Value::String(name)) if !COMMANDS.contains(&name.as_str()) => {
            Err(RagError::Validation(format!("Unknown command: {name}")))
        }
        Some(Value::String(name)) => serde_json::from_value::<Command>(value)
            .map_err(|e| RagError::Validation(format!("Invalid {name} request: {e}"))),
        Some(other) => Err(RagError::Validation(format!("Unknown command: {other}"))),
    };

    Envelope {
        request_id,
        document_id,
        command,
    }
}

/// One output line.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    #[serde(flatten)]
    pub body: ResponseBody,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
}

impl Response {
    pub fn new(body: impl Into<ResponseBody>, request_id: Option<Value>) -> Self {
        Self {
            body: body.into(),
            request_id,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.body, ResponseBody::Error(_))
    }

    /// Serialize to a single line without the trailing newline.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            // Only reachable through a non-string map key, which these types never have
            format!(r#"{{"success":false,"error":"failed to encode response: {e}"}}"#)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Store(StoreResponse),
    Query(QueryResponse),
    Delete(DeleteResponse),
    Clear(ClearResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    pub document_id: String,
    pub chunks_stored: usize,
    pub embeddings_created: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub answer: String,
    /// Retrieved chunk texts, best first
    pub sources: Vec<String>,
    pub metadata: Vec<SourceMetadata>,
}

impl QueryResponse {
    /// Response for a query that retrieved nothing.
    pub fn no_match() -> Self {
        Self {
            success: true,
            answer: NO_MATCH_ANSWER.to_string(),
            sources: Vec::new(),
            metadata: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub document_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            document_id: None,
        }
    }

    pub fn with_document_id(mut self, document_id: Option<String>) -> Self {
        self.document_id = document_id;
        self
    }
}

impl From<StoreResponse> for ResponseBody {
    fn from(value: StoreResponse) -> Self {
        Self::Store(value)
    }
}

impl From<QueryResponse> for ResponseBody {
    fn from(value: QueryResponse) -> Self {
        Self::Query(value)
    }
}

impl From<DeleteResponse> for ResponseBody {
    fn from(value: DeleteResponse) -> Self {
        Self::Delete(value)
    }
}

impl From<ClearResponse> for ResponseBody {
    fn from(value: ClearResponse) -> Self {
        Self::Clear(value)
    }
}

impl From<ErrorResponse> for ResponseBody {
    fn from(value: ErrorResponse) -> Self {
        Self::Error(value)
    }
}

/// First line written on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StartupStatus {
    Ready,
    Error { message: String },
}

impl StartupStatus {
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"error"}"#.to_string())
    }
}
