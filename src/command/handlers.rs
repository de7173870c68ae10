//! Command handlers
//!
//! Each handler checks its own arity and answers with a reply value.

use bytes::Bytes;

use crate::protocol::Value;
use crate::store::Store;

fn wrong_arity(command: &str) -> Value {
    Value::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

fn invalid_argument(value: &Value) -> Value {
    Value::error(format!(
        "ERR invalid argument of type {}",
        value.type_name()
    ))
}

/// Argument as raw bytes. Integers are accepted in their decimal form.
fn arg_bytes(value: &Value) -> Result<Bytes, Value> {
    match value {
        Value::Bulk(data) => Ok(data.clone()),
        Value::SimpleString(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
        Value::Integer(n) => Ok(Bytes::from(n.to_string())),
        other => Err(invalid_argument(other)),
    }
}

macro_rules! try_arg {
    ($value:expr) => {
        match arg_bytes($value) {
            Ok(bytes) => bytes,
            Err(reply) => return reply,
        }
    };
}

pub(super) fn ping(args: &[Value]) -> Value {
    match args {
        [] => Value::simple("PONG"),
        [message] => {
            let message = try_arg!(message);
            // A simple string cannot carry CR or LF without breaking framing
            if message.contains(&b'\r') || message.contains(&b'\n') {
                Value::Bulk(message)
            } else {
                Value::simple(String::from_utf8_lossy(&message))
            }
        }
        _ => wrong_arity("ping"),
    }
}

pub(super) fn set(store: &Store, args: &[Value]) -> Value {
    let [key, value] = args else {
        return wrong_arity("set");
    };
    let key = try_arg!(key);
    let value = try_arg!(value);

    store.set(key, value);
    Value::ok()
}

pub(super) fn get(store: &Store, args: &[Value]) -> Value {
    let [key] = args else {
        return wrong_arity("get");
    };
    let key = try_arg!(key);

    store.get(&key).into()
}

pub(super) fn del(store: &Store, args: &[Value]) -> Value {
    if args.is_empty() {
        return wrong_arity("del");
    }

    let mut keys = Vec::with_capacity(args.len());
    for arg in args {
        keys.push(try_arg!(arg));
    }

    let removed = store.del(keys.iter().map(|key| &key[..]));
    Value::Integer(removed as i64)
}

pub(super) fn hset(store: &Store, args: &[Value]) -> Value {
    let [hash, field, value] = args else {
        return wrong_arity("hset");
    };
    let hash = try_arg!(hash);
    let field = try_arg!(field);
    let value = try_arg!(value);

    store.hset(hash, field, value);
    Value::ok()
}

pub(super) fn hget(store: &Store, args: &[Value]) -> Value {
    let [hash, field] = args else {
        return wrong_arity("hget");
    };
    let hash = try_arg!(hash);
    let field = try_arg!(field);

    store.hget(&hash, &field).into()
}

pub(super) fn hgetall(store: &Store, args: &[Value]) -> Value {
    let [hash] = args else {
        return wrong_arity("hgetall");
    };
    let hash = try_arg!(hash);

    let pairs = store.hgetall(&hash);
    let mut flattened = Vec::with_capacity(pairs.len() * 2);
    for (field, value) in pairs {
        flattened.push(Value::Bulk(field));
        flattened.push(Value::Bulk(value));
    }
    Value::Array(flattened)
}
