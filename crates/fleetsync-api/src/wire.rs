//! Message types and the JSON text-frame codec.
//!
//! Every frame is a JSON object tagged with a numeric `type`:
//!
//! | type | direction | shape |
//! |------|-----------|-------|
//! | 0 | client → server | `{"type":0,"request_id":N,"method":"<model>.<method>","params":{..}}` |
//! | 1 | server → client | `{"type":1,"request_id":N,"rtype":0,"result":..}` or `"rtype":1,"error":..` |
//! | 2 | server → client | `{"type":2,"name":"<model>","action":"create","data":..}` |
//! | 3 | client → server | `{"type":3,"request_id":N,"method":"status.ping"}` |
//! | 4 | server → client | `{"type":4,"request_id":N,"result":..}` |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Engine-assigned correlation id. Unique per engine instance.
pub type RequestId = u64;

// ── Frame type codes ─────────────────────────────────────────────────

const TYPE_REQUEST: u8 = 0;
const TYPE_RESPONSE: u8 = 1;
const TYPE_NOTIFY: u8 = 2;
const TYPE_PING: u8 = 3;
const TYPE_PING_REPLY: u8 = 4;

const RTYPE_SUCCESS: u8 = 0;
const RTYPE_ERROR: u8 = 1;

const PING_MODEL: &str = "status";
const PING_METHOD: &str = "ping";

// ── RequestMessage ───────────────────────────────────────────────────

/// An outgoing request: `model.method(params)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub request_id: RequestId,
    pub model: String,
    pub method: String,
    pub params: Option<Value>,
}

impl RequestMessage {
    pub fn new(
        request_id: RequestId,
        model: impl Into<String>,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Self {
        Self {
            request_id,
            model: model.into(),
            method: method.into(),
            params,
        }
    }

    /// A keep-alive request.
    pub fn ping(request_id: RequestId) -> Self {
        Self::new(request_id, PING_MODEL, PING_METHOD, None)
    }

    pub fn is_ping(&self) -> bool {
        self.model == PING_MODEL && self.method == PING_METHOD
    }

    /// `"<model>.<method>"`, as sent on the wire.
    pub fn qualified_method(&self) -> String {
        format!("{}.{}", self.model, self.method)
    }
}

// ── Response ─────────────────────────────────────────────────────────

/// The terminal answer to one request.
///
/// `result` carries either the success payload or the raw error payload
/// exactly as the server sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: RequestId,
    pub result: Result<Value, Value>,
}

impl Response {
    pub fn ok(request_id: RequestId, value: Value) -> Self {
        Self {
            request_id,
            result: Ok(value),
        }
    }

    pub fn err(request_id: RequestId, error: Value) -> Self {
        Self {
            request_id,
            result: Err(error),
        }
    }
}

// ── Notification ─────────────────────────────────────────────────────

/// What happened to the entity carried by a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for NotifyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        })
    }
}

/// Unsolicited change pushed by the server.
///
/// `item` is the full entity for create/update. For delete it may be
/// either the entity or just its primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub model: String,
    pub action: NotifyAction,
    pub item: Value,
}

impl Notification {
    pub fn new(model: impl Into<String>, action: NotifyAction, item: Value) -> Self {
        Self {
            model: model.into(),
            action,
            item,
        }
    }
}

// ── Incoming ─────────────────────────────────────────────────────────

/// Anything the server can send us.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Response(Response),
    Notification(Notification),
}

// ── Codec ────────────────────────────────────────────────────────────

/// Raw frame, shared by both directions. Absent fields are omitted.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rtype: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<NotifyAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Encode an outgoing request as a text frame.
pub fn encode_request(request: &RequestMessage) -> Result<String, Error> {
    let frame = if request.is_ping() {
        Frame {
            kind: TYPE_PING,
            request_id: Some(request.request_id),
            method: Some(request.qualified_method()),
            ..Frame::default()
        }
    } else {
        Frame {
            kind: TYPE_REQUEST,
            request_id: Some(request.request_id),
            method: Some(request.qualified_method()),
            params: request.params.clone(),
            ..Frame::default()
        }
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Decode a text frame received from the server.
pub fn decode_incoming(text: &str) -> Result<Incoming, Error> {
    let frame: Frame = serde_json::from_str(text)?;
    match frame.kind {
        TYPE_RESPONSE => {
            let request_id = require(frame.request_id, "request_id")?;
            match frame.rtype.unwrap_or(RTYPE_SUCCESS) {
                RTYPE_SUCCESS => Ok(Incoming::Response(Response::ok(
                    request_id,
                    frame.result.unwrap_or(Value::Null),
                ))),
                RTYPE_ERROR => Ok(Incoming::Response(Response::err(
                    request_id,
                    frame.error.unwrap_or(Value::Null),
                ))),
                other => Err(Error::Protocol(format!("unknown rtype {other}"))),
            }
        }
        TYPE_PING_REPLY => Ok(Incoming::Response(Response::ok(
            require(frame.request_id, "request_id")?,
            frame.result.unwrap_or(Value::Null),
        ))),
        TYPE_NOTIFY => Ok(Incoming::Notification(Notification {
            model: require(frame.name, "name")?,
            action: require(frame.action, "action")?,
            item: frame.data.unwrap_or(Value::Null),
        })),
        other => Err(Error::Protocol(format!("unexpected frame type {other}"))),
    }
}

/// Decode a client request. The server side of [`encode_request`].
pub fn decode_request(text: &str) -> Result<RequestMessage, Error> {
    let frame: Frame = serde_json::from_str(text)?;
    if frame.kind != TYPE_REQUEST && frame.kind != TYPE_PING {
        return Err(Error::Protocol(format!(
            "expected a request frame, got type {}",
            frame.kind
        )));
    }
    let request_id = require(frame.request_id, "request_id")?;
    let method = require(frame.method, "method")?;
    let Some((model, method)) = method.split_once('.') else {
        return Err(Error::Protocol(format!("unqualified method '{method}'")));
    };
    Ok(RequestMessage::new(request_id, model, method, frame.params))
}

/// Encode a server message. The server side of [`decode_incoming`].
pub fn encode_incoming(incoming: &Incoming) -> Result<String, Error> {
    let frame = match incoming {
        Incoming::Response(Response {
            request_id,
            result: Ok(value),
        }) => Frame {
            kind: TYPE_RESPONSE,
            request_id: Some(*request_id),
            rtype: Some(RTYPE_SUCCESS),
            result: Some(value.clone()),
            ..Frame::default()
        },
        Incoming::Response(Response {
            request_id,
            result: Err(error),
        }) => Frame {
            kind: TYPE_RESPONSE,
            request_id: Some(*request_id),
            rtype: Some(RTYPE_ERROR),
            error: Some(error.clone()),
            ..Frame::default()
        },
        Incoming::Notification(n) => Frame {
            kind: TYPE_NOTIFY,
            name: Some(n.model.clone()),
            action: Some(n.action),
            data: Some(n.item.clone()),
            ..Frame::default()
        },
    };
    Ok(serde_json::to_string(&frame)?)
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::Protocol(format!("missing '{field}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_frame_is_qualified() {
        let req = RequestMessage::new(7, "machine", "list", Some(json!({"page_size": 10})));
        assert_eq!(
            encode_request(&req).unwrap(),
            r#"{"type":0,"request_id":7,"method":"machine.list","params":{"page_size":10}}"#
        );
    }

    #[test]
    fn ping_uses_its_own_frame_type() {
        let encoded = encode_request(&RequestMessage::ping(3)).unwrap();
        assert_eq!(
            encoded,
            r#"{"type":3,"request_id":3,"method":"status.ping"}"#
        );
        let back = decode_request(&encoded).unwrap();
        assert!(back.is_ping());
    }

    #[test]
    fn decodes_success_and_error_responses() {
        let ok = decode_incoming(r#"{"type":1,"request_id":1,"rtype":0,"result":[1,2]}"#).unwrap();
        assert_eq!(ok, Incoming::Response(Response::ok(1, json!([1, 2]))));

        let err =
            decode_incoming(r#"{"type":1,"request_id":2,"rtype":1,"error":"{\"name\": [\"taken\"]}"}"#)
                .unwrap();
        assert_eq!(
            err,
            Incoming::Response(Response::err(2, json!("{\"name\": [\"taken\"]}")))
        );
    }

    #[test]
    fn decodes_ping_reply_as_response() {
        let reply = decode_incoming(r#"{"type":4,"request_id":9,"result":12}"#).unwrap();
        assert_eq!(reply, Incoming::Response(Response::ok(9, json!(12))));
    }

    #[test]
    fn decodes_notification_with_bare_key() {
        let n = decode_incoming(r#"{"type":2,"name":"machine","action":"delete","data":"abc123"}"#)
            .unwrap();
        assert_eq!(
            n,
            Incoming::Notification(Notification::new(
                "machine",
                NotifyAction::Delete,
                json!("abc123")
            ))
        );
    }

    #[test]
    fn rejects_frames_missing_correlation() {
        let err = decode_incoming(r#"{"type":1,"rtype":0,"result":null}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn rejects_unknown_frame_type() {
        assert!(decode_incoming(r#"{"type":9}"#).is_err());
        assert!(decode_incoming("not json").is_err());
    }

    #[test]
    fn server_side_codec_mirrors_client_side() {
        let n = Incoming::Notification(Notification::new(
            "zone",
            NotifyAction::Update,
            json!({"id": 1, "name": "z"}),
        ));
        assert_eq!(decode_incoming(&encode_incoming(&n).unwrap()).unwrap(), n);

        let req = decode_request(r#"{"type":0,"request_id":4,"method":"domain.get","params":{"id":1}}"#)
            .unwrap();
        assert_eq!(req.model, "domain");
        assert_eq!(req.method, "get");
        assert_eq!(req.params, Some(json!({"id": 1})));
    }
}
