//! Typed ECS sub-contexts an application can attach to a log record.
//!
//! Each variant serializes to a fixed sub-document of the ECS log document:
//!
//! - [`Tracing`]: `trace.id` and optionally `transaction.id`
//! - [`Service`]: `service.*`
//! - [`User`]: `user.*`
//! - [`ErrorContext`]: `error.*` plus `log.origin.file.*`
//!
//! See <https://www.elastic.co/guide/en/ecs/current/ecs-field-reference.html>.

use crate::formatter::Dialect;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Marker keys a typed context is wrapped in once normalized. The formatter
/// looks for them when extracting typed contexts out of the record context.
pub const TRACING_MARKER: &str = "@ecs.tracing";
pub const SERVICE_MARKER: &str = "@ecs.service";
pub const USER_MARKER: &str = "@ecs.user";
pub const ERROR_MARKER: &str = "@ecs.error";

/// Priority in which typed contexts are merged into the document.
pub const EXTRACTION_ORDER: [&str; 4] = [TRACING_MARKER, SERVICE_MARKER, USER_MARKER, ERROR_MARKER];

/// Identifier that ECS allows to be either a keyword or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Identifier {
    Text(String),
    Number(i64),
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::Text(value)
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Number(value)
    }
}

impl From<i32> for Identifier {
    fn from(value: i32) -> Self {
        Identifier::Number(value.into())
    }
}

impl From<u32> for Identifier {
    fn from(value: u32) -> Self {
        Identifier::Number(value.into())
    }
}

/// Distributed tracing correlation ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracing {
    trace_id: String,
    transaction_id: Option<String>,
}

impl Tracing {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            transaction_id: None,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// `{"trace": {"id": ..}, "transaction": {"id": ..}}`, the transaction
    /// part only when a transaction id was given.
    pub fn to_document(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("trace".to_string(), id_object(&self.trace_id));
        if let Some(transaction_id) = &self.transaction_id {
            doc.insert("transaction".to_string(), id_object(transaction_id));
        }
        doc
    }
}

fn id_object(id: &str) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(object)
}

/// The service the event originates from. Every field is optional and
/// unset fields are left out of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ephemeral_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<ServiceNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ServiceNode {
    name: String,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared by all nodes of the same service.
    pub fn with_id(mut self, id: impl Into<Identifier>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Usually changes across restarts, unlike `id`.
    pub fn with_ephemeral_id(mut self, ephemeral_id: impl Into<String>) -> Self {
        self.ephemeral_id = Some(ephemeral_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Serialized as `service.node.name`.
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node = Some(ServiceNode {
            name: node_name.into(),
        });
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn to_document(&self) -> Map<String, Value> {
        wrap_fields("service", self)
    }
}

/// The user associated with the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

impl User {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<Identifier>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Short name or login.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Anonymized correlation hash for when `id`/`name` are confidential.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn to_document(&self) -> Map<String, Value> {
        wrap_fields("user", self)
    }
}

/// `{key: fields}` or an empty document when no field is set.
fn wrap_fields<T: Serialize>(key: &str, fields: &T) -> Map<String, Value> {
    let mut doc = Map::new();
    if let Ok(Value::Object(fields)) = serde_json::to_value(fields) {
        if !fields.is_empty() {
            doc.insert(key.to_string(), Value::Object(fields));
        }
    }
    doc
}

/// An application error recorded as ECS `error.*` fields.
///
/// The source location is taken from the call site that created the context
/// unless [`ErrorContext::with_origin`] overrides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    kind: String,
    message: String,
    code: i64,
    stack_trace: Vec<String>,
    file: Option<String>,
    line: Option<u32>,
}

impl ErrorContext {
    /// Capture `err` with its concrete type name as `error.type`.
    #[track_caller]
    pub fn new<E: StdError + 'static>(err: &E) -> Self {
        let location = Location::caller();
        Self::from_dyn(
            std::any::type_name::<E>(),
            err,
            Some((location.file(), location.line())),
        )
    }

    /// Build a context from already-extracted parts, without a location.
    pub fn from_parts(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let kind = kind.into();
        let message = message.into();
        Self {
            stack_trace: vec![format!("{}: {}", kind, message)],
            kind,
            message,
            code: 0,
            file: None,
            line: None,
        }
    }

    pub(crate) fn from_dyn(
        kind: &str,
        err: &(dyn StdError + 'static),
        location: Option<(&str, u32)>,
    ) -> Self {
        let message = err.to_string();

        let mut stack_trace = vec![format!("{}: {}", kind, message)];
        if let Some((file, line)) = location {
            stack_trace.push(format!("  at {}:{}", file, line));
        }
        let mut source = err.source();
        while let Some(cause) = source {
            stack_trace.push(format!("Caused by: {}", cause));
            source = cause.source();
        }

        Self {
            kind: kind.to_string(),
            message,
            code: 0,
            stack_trace,
            file: location.map(|(file, _)| file.to_string()),
            line: location.map(|(_, line)| line),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_origin(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_stack_trace<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack_trace = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn stack_trace(&self) -> &[String] {
        &self.stack_trace
    }

    /// `{"error": {type, message, code, stack_trace}, "log": {"origin": ..}}`.
    ///
    /// The stack trace shape follows the dialect; `log` is left out when no
    /// source location is known.
    pub fn to_document(&self, dialect: Dialect) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("error".to_string(), Value::Object(self.to_error_fields(dialect)));

        let mut file = Map::new();
        if let Some(name) = &self.file {
            file.insert("name".to_string(), Value::String(name.clone()));
        }
        if let Some(line) = self.line {
            file.insert("line".to_string(), Value::from(line));
        }
        if !file.is_empty() {
            let mut origin = Map::new();
            origin.insert("file".to_string(), Value::Object(file));
            let mut log = Map::new();
            log.insert("origin".to_string(), Value::Object(origin));
            doc.insert("log".to_string(), Value::Object(log));
        }

        doc
    }

    /// The flat `{type, message, code, stack_trace}` object.
    pub fn to_error_fields(&self, dialect: Dialect) -> Map<String, Value> {
        let stack_trace = if dialect.stack_trace_as_lines() {
            Value::Array(self.stack_trace.iter().cloned().map(Value::String).collect())
        } else {
            Value::String(self.stack_trace.join("\n"))
        };

        let mut error = Map::new();
        error.insert("type".to_string(), Value::String(self.kind.clone()));
        error.insert("message".to_string(), Value::String(self.message.clone()));
        error.insert("code".to_string(), Value::from(self.code));
        error.insert("stack_trace".to_string(), stack_trace);
        error
    }
}

/// A bare application error placed into a record context without wrapping
/// it in an [`ErrorContext`] first. The normalizer converts it to the same
/// shape, so both forms end up identical in the document.
#[derive(Clone)]
pub struct RaisedError {
    kind: &'static str,
    error: Arc<dyn StdError + Send + Sync>,
    location: &'static Location<'static>,
}

impl RaisedError {
    #[track_caller]
    pub fn new<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self {
            kind: std::any::type_name::<E>(),
            error: Arc::new(err),
            location: Location::caller(),
        }
    }

    pub fn to_error_context(&self) -> ErrorContext {
        ErrorContext::from_dyn(
            self.kind,
            &*self.error,
            Some((self.location.file(), self.location.line())),
        )
    }
}

impl fmt::Debug for RaisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaisedError")
            .field("kind", &self.kind)
            .field("error", &self.error.to_string())
            .field("location", &self.location)
            .finish()
    }
}

/// One of the recognized ECS sub-contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedContext {
    Tracing(Tracing),
    Service(Service),
    User(User),
    Error(ErrorContext),
}

impl TypedContext {
    pub fn marker(&self) -> &'static str {
        match self {
            TypedContext::Tracing(_) => TRACING_MARKER,
            TypedContext::Service(_) => SERVICE_MARKER,
            TypedContext::User(_) => USER_MARKER,
            TypedContext::Error(_) => ERROR_MARKER,
        }
    }

    pub fn to_document(&self, dialect: Dialect) -> Map<String, Value> {
        match self {
            TypedContext::Tracing(tracing) => tracing.to_document(),
            TypedContext::Service(service) => service.to_document(),
            TypedContext::User(user) => user.to_document(),
            TypedContext::Error(error) => error.to_document(dialect),
        }
    }

    /// `{marker: document}`, the normalized form the formatter recognizes.
    pub(crate) fn to_marked_value(&self, dialect: Dialect) -> Value {
        let mut marked = Map::new();
        marked.insert(
            self.marker().to_string(),
            Value::Object(self.to_document(dialect)),
        );
        Value::Object(marked)
    }

    /// Form used when the context is nested inside another value: the
    /// sub-document without marker, and only the `error` object for errors.
    pub(crate) fn to_nested_value(&self, dialect: Dialect) -> Value {
        match self {
            TypedContext::Error(error) => Value::Object(error.to_error_fields(dialect)),
            other => Value::Object(other.to_document(dialect)),
        }
    }
}

impl From<Tracing> for TypedContext {
    fn from(value: Tracing) -> Self {
        TypedContext::Tracing(value)
    }
}

impl From<Service> for TypedContext {
    fn from(value: Service) -> Self {
        TypedContext::Service(value)
    }
}

impl From<User> for TypedContext {
    fn from(value: User) -> Self {
        TypedContext::User(value)
    }
}

impl From<ErrorContext> for TypedContext {
    fn from(value: ErrorContext) -> Self {
        TypedContext::Error(value)
    }
}
