use linewire_frame::Frame;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{json, Map, Value};

use crate::message::{ErrorKind, ErrorObject, Request, RequestId, Response};

/// Offending frames are quoted in `ParseError` data up to this many bytes.
pub const DEFAULT_DIAGNOSTIC_LIMIT: usize = 256;

/// Outcome of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Request(Request),
    /// The frame was not a usable request; this response answers it.
    Rejected(Response),
}

/// Decode one frame into a request.
///
/// Never fails: a frame that is not valid JSON yields a `ParseError`
/// response with a null id, and valid JSON that is not a request object
/// yields `InvalidRequest`.
///
/// Numeric ids are taken from the frame text, so the response echoes them
/// exactly as sent.
pub fn decode(frame: &Frame, diagnostic_limit: usize) -> Decoded {
    let value = match serde_json::from_slice::<Value>(frame.as_bytes()) {
        Ok(value) => value,
        Err(err) => {
            let error = ErrorObject::new(ErrorKind::ParseError, err.to_string())
                .with_data(json!({ "frame": quote_frame(frame.as_bytes(), diagnostic_limit) }));
            return Decoded::Rejected(Response::failure(RequestId::Null, error));
        }
    };

    let mut decoded = decode_value(value);
    let id = match &mut decoded {
        Decoded::Request(request) => &mut request.id,
        Decoded::Rejected(response) => &mut response.id,
    };
    if let RequestId::Number(_) = id {
        if let Some(raw) = raw_id(frame.as_bytes()) {
            *id = raw;
        }
    }
    decoded
}

#[derive(Deserialize)]
struct IdText<'a> {
    #[serde(borrow, default)]
    id: Option<&'a RawValue>,
}

/// The `id` member exactly as written in `line`.
fn raw_id(line: &[u8]) -> Option<RequestId> {
    let fields: IdText<'_> = serde_json::from_slice(line).ok()?;
    RequestId::from_raw(fields.id?.get())
}

/// Interpret an already-parsed JSON value as a request.
pub fn decode_value(value: Value) -> Decoded {
    let Value::Object(mut fields) = value else {
        return invalid(RequestId::Null, "request must be a JSON object");
    };

    let id = match take_id(&mut fields) {
        Ok(id) => id,
        Err(message) => return invalid(RequestId::Null, message),
    };

    let method = match fields.remove("method") {
        Some(Value::String(method)) => method,
        Some(_) => return invalid(id, "method must be a string"),
        None => return invalid(id, "missing method"),
    };

    let params = fields.remove("params").unwrap_or(Value::Null);
    Decoded::Request(Request { id, method, params })
}

fn take_id(fields: &mut Map<String, Value>) -> Result<RequestId, &'static str> {
    match fields.remove("id") {
        None | Some(Value::Null) => Ok(RequestId::Null),
        Some(Value::String(id)) => Ok(RequestId::String(id)),
        Some(Value::Number(id)) => Ok(RequestId::Number(id.into())),
        Some(_) => Err("id must be a string, a number or null"),
    }
}

fn invalid(id: RequestId, message: &str) -> Decoded {
    Decoded::Rejected(Response::failure(
        id,
        ErrorObject::new(ErrorKind::InvalidRequest, message),
    ))
}

/// Lossy text of `bytes`, cut to at most `limit` bytes on a char boundary.
fn quote_frame(bytes: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_str(line: &str) -> Decoded {
        decode(&Frame::new(line.as_bytes().to_vec()), DEFAULT_DIAGNOSTIC_LIMIT)
    }

    fn rejected_kind(decoded: &Decoded) -> (RequestId, ErrorKind) {
        match decoded {
            Decoded::Rejected(response) => (
                response.id.clone(),
                response.error_kind().expect("rejection carries an error"),
            ),
            Decoded::Request(request) => panic!("unexpected request: {request:?}"),
        }
    }

    #[test]
    fn decodes_full_request() {
        let decoded = decode_str(r#"{"id":"1","method":"ping","params":{"a":1}}"#);
        assert_eq!(
            decoded,
            Decoded::Request(Request::new("1", "ping", json!({"a": 1})))
        );
    }

    #[test]
    fn missing_params_and_id_default_to_null() {
        let Decoded::Request(request) = decode_str(r#"{"method":"ping"}"#) else {
            panic!("expected request");
        };
        assert_eq!(request.id, RequestId::Null);
        assert_eq!(request.params, Value::Null);
    }

    #[test]
    fn numeric_ids_are_kept_verbatim() {
        let Decoded::Request(request) = decode_str(r#"{"id":-12,"method":"m"}"#) else {
            panic!("expected request");
        };
        assert_eq!(serde_json::to_string(&request.id).unwrap(), "-12");
    }

    #[test]
    fn numeric_ids_keep_their_exact_text() {
        for text in ["1e2", "1.50", "123456789012345678901234567890", "-0.0"] {
            let line = format!(r#"{{"id":{text},"method":"ping"}}"#);
            let Decoded::Request(request) = decode_str(&line) else {
                panic!("expected request for {line}");
            };
            assert_eq!(serde_json::to_string(&request.id).unwrap(), text);
        }
    }

    #[test]
    fn rejected_requests_echo_exact_numeric_id() {
        let (id, kind) = rejected_kind(&decode_str(r#"{"id":2.50,"method":7}"#));
        assert_eq!(kind, ErrorKind::InvalidRequest);
        assert_eq!(id.to_string(), "2.50");
    }

    #[test]
    fn malformed_json_is_parse_error_with_null_id() {
        let decoded = decode_str("not json");
        assert_eq!(rejected_kind(&decoded), (RequestId::Null, ErrorKind::ParseError));

        let Decoded::Rejected(response) = decoded else {
            unreachable!()
        };
        let data = response.error.unwrap().data.unwrap();
        assert_eq!(data["frame"], "not json");
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let frame = Frame::new(vec![b'"', 0xff, 0xfe, b'"']);
        let decoded = decode(&frame, DEFAULT_DIAGNOSTIC_LIMIT);
        assert_eq!(rejected_kind(&decoded).1, ErrorKind::ParseError);
    }

    #[test]
    fn shape_errors_are_invalid_request() {
        assert_eq!(
            rejected_kind(&decode_str("[1,2]")),
            (RequestId::Null, ErrorKind::InvalidRequest)
        );
        assert_eq!(
            rejected_kind(&decode_str(r#"{"id":"k"}"#)),
            (RequestId::from("k"), ErrorKind::InvalidRequest)
        );
        assert_eq!(
            rejected_kind(&decode_str(r#"{"id":4,"method":5}"#)),
            (RequestId::from(4_u64), ErrorKind::InvalidRequest)
        );
        assert_eq!(
            rejected_kind(&decode_str(r#"{"id":{"x":1},"method":"m"}"#)),
            (RequestId::Null, ErrorKind::InvalidRequest)
        );
    }

    #[test]
    fn quoted_frame_is_bounded_and_cut_on_char_boundary() {
        let line = "é".repeat(200);
        let quoted = quote_frame(line.as_bytes(), 7);
        assert_eq!(quoted, "ééé...");

        let short = quote_frame(b"abc", 7);
        assert_eq!(short, "abc");
    }
}
