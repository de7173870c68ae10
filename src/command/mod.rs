//! Command Module
//!
//! Registry and dispatcher for client commands.
//!
//! The command set is closed: every supported command is a `CommandKind`
//! variant, looked up by its upper-cased name. Live client traffic and log
//! replay both go through [`dispatch`].
//!
//! | Command | Args   | Map    | Mutating |
//! |---------|--------|--------|----------|
//! | PING    | 0 or 1 | -      | no       |
//! | SET     | 2      | flat   | yes      |
//! | GET     | 1      | flat   | no       |
//! | DEL     | 1+     | flat   | yes      |
//! | HSET    | 3      | hash   | yes      |
//! | HGET    | 2      | hash   | no       |
//! | HGETALL | 1      | hash   | no       |

mod handlers;

use crate::protocol::Value;
use crate::store::Store;

/// The supported commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Set,
    Get,
    Del,
    HSet,
    HGet,
    HGetAll,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Ping,
        CommandKind::Set,
        CommandKind::Get,
        CommandKind::Del,
        CommandKind::HSet,
        CommandKind::HGet,
        CommandKind::HGetAll,
    ];

    /// Find a command by name, ignoring ASCII case
    pub fn lookup(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().as_bytes().eq_ignore_ascii_case(name))
    }

    /// Canonical upper-case name
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Ping => "PING",
            CommandKind::Set => "SET",
            CommandKind::Get => "GET",
            CommandKind::Del => "DEL",
            CommandKind::HSet => "HSET",
            CommandKind::HGet => "HGET",
            CommandKind::HGetAll => "HGETALL",
        }
    }

    /// Whether the command changes store contents and so belongs in the log
    pub fn is_mutating(self) -> bool {
        matches!(self, CommandKind::Set | CommandKind::Del | CommandKind::HSet)
    }

    /// Run the handler. Argument errors come back as `Value::Error`.
    pub fn execute(self, store: &Store, args: &[Value]) -> Value {
        match self {
            CommandKind::Ping => handlers::ping(args),
            CommandKind::Set => handlers::set(store, args),
            CommandKind::Get => handlers::get(store, args),
            CommandKind::Del => handlers::del(store, args),
            CommandKind::HSet => handlers::hset(store, args),
            CommandKind::HGet => handlers::hget(store, args),
            CommandKind::HGetAll => handlers::hgetall(store, args),
        }
    }
}

/// Why a decoded value cannot be treated as a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRequest {
    NotAnArray,
    EmptyArray,
}

impl std::fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidRequest::NotAnArray => write!(f, "expected array"),
            InvalidRequest::EmptyArray => write!(f, "expected array with at least one element"),
        }
    }
}

/// A client command: name plus arguments, with the original value kept for
/// the log
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    raw: Value,
    name: String,
}

impl Request {
    pub fn from_value(value: Value) -> Result<Self, InvalidRequest> {
        let name = match &value {
            Value::Array(items) => match items.first() {
                None => return Err(InvalidRequest::EmptyArray),
                Some(first) => command_name(first),
            },
            _ => return Err(InvalidRequest::NotAnArray),
        };

        Ok(Self { raw: value, name })
    }

    /// Upper-cased command name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments after the command name
    pub fn args(&self) -> &[Value] {
        match &self.raw {
            Value::Array(items) => &items[1..],
            _ => &[],
        }
    }

    /// The request exactly as received
    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::lookup(self.name.as_bytes())
    }
}

/// Names that are not strings never match a command; integers keep their
/// decimal form for logging, anything else becomes empty
fn command_name(value: &Value) -> String {
    match value {
        Value::Integer(n) => n.to_string(),
        other => other
            .as_bytes()
            .map(|name| String::from_utf8_lossy(name).to_ascii_uppercase())
            .unwrap_or_default(),
    }
}

/// Outcome of dispatching a request
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reply(Value),
    UnknownCommand(String),
}

/// Route a request to its handler
pub fn dispatch(store: &Store, request: &Request) -> Dispatch {
    match request.kind() {
        Some(kind) => Dispatch::Reply(kind.execute(store, request.args())),
        None => Dispatch::UnknownCommand(request.name().to_string()),
    }
}
