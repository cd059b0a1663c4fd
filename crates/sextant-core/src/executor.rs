//! Per-request execution of one validated method.

use crate::context::Context;
use crate::descriptor::MethodDescriptor;
use crate::error::DispatchError;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// Decodes the first JSON value of `body` over `Req::default()`.
///
/// The zero value is the starting point, so members missing from the body
/// keep their default and a `null` member leaves its field untouched.
/// Nested objects merge the same way.
///
/// A missing, empty, whitespace-only or `null` body yields `Req::default()`.
/// Anything after the first value is ignored.
///
/// # Example
///
/// ```
/// use sextant_core::decode_request;
///
/// let n: u32 = decode_request(Some(b"42 trailing".as_slice())).unwrap();
/// assert_eq!(n, 42);
///
/// let empty: Vec<u32> = decode_request(Some(b"  \n".as_slice())).unwrap();
/// assert!(empty.is_empty());
/// ```
pub fn decode_request<Req>(body: Option<&[u8]>) -> Result<Req, DispatchError>
where
    Req: DeserializeOwned + Serialize + Default,
{
    let Some(body) = body else {
        return Ok(Req::default());
    };

    let mut values = serde_json::Deserializer::from_slice(body).into_iter::<Value>();
    let value = match values.next() {
        Some(value) => value.map_err(DispatchError::Decode)?,
        None => return Ok(Req::default()),
    };

    match value {
        Value::Null => Ok(Req::default()),
        Value::Object(members) => {
            let mut base = serde_json::to_value(Req::default()).map_err(DispatchError::Decode)?;
            merge(&mut base, members);
            serde_json::from_value(base).map_err(DispatchError::Decode)
        }
        other => serde_json::from_value(other).map_err(DispatchError::Decode),
    }
}

fn merge(base: &mut Value, members: Map<String, Value>) {
    let Value::Object(fields) = base else {
        *base = Value::Object(members);
        return;
    };

    for (key, value) in members {
        match fields.get_mut(&key) {
            Some(_) if value.is_null() => {}
            Some(slot) if slot.is_object() && value.is_object() => {
                if let Value::Object(nested) = value {
                    merge(slot, nested);
                }
            }
            _ => {
                fields.insert(key, value);
            }
        }
    }
}

/// Encodes `response` as JSON followed by a newline.
pub fn encode_response<Res: Serialize>(response: &Res) -> Result<Bytes, DispatchError> {
    let mut encoded = serde_json::to_vec(response).map_err(DispatchError::Encode)?;
    encoded.push(b'\n');
    Ok(Bytes::from(encoded))
}

/// Runs `method` against `receiver` for one request.
///
/// 1. Takes and decodes the request body if the method declares a request.
/// 2. Invokes the method.
/// 3. On success of a two-return method, appends the encoded response to the
///    context's body and sets `content-type: application/json`.
///
/// Nothing is written to the context when any step fails. Status is left to
/// whatever the method set (200 by default).
pub async fn execute<S>(
    method: &MethodDescriptor<S>,
    receiver: Arc<S>,
    ctx: Context,
) -> Result<(), DispatchError>
where
    S: Send + Sync + 'static,
{
    let started = Instant::now();
    let body = if method.consumes_body() {
        ctx.take_body()
    } else {
        None
    };

    let result = method
        .invoker()
        .call(receiver, ctx.clone(), body)
        .await;

    match result {
        Ok(encoded) => {
            if let Some(encoded) = encoded {
                ctx.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                ctx.write(encoded);
            }
            tracing::debug!(
                service = method.service(),
                method = method.name(),
                request_id = %ctx.request_id(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "method executed"
            );
            Ok(())
        }
        Err(err) => {
            tracing::debug!(
                service = method.service(),
                method = method.name(),
                request_id = %ctx.request_id(),
                error = %err,
                "method failed"
            );
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Job {
        id: u64,
        name: String,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Owner {
        name: String,
        team: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Task {
        #[serde(rename = "ID")]
        id: u64,
        #[serde(rename = "Name")]
        name: String,
        owner: Owner,
        retries: u32,
    }

    impl Default for Task {
        fn default() -> Self {
            Self {
                id: 0,
                name: String::new(),
                owner: Owner::default(),
                retries: 3,
            }
        }
    }

    #[test]
    fn test_decode_absent_body_is_default() {
        let job: Job = decode_request(None).unwrap();
        assert_eq!(job, Job::default());
    }

    #[test]
    fn test_decode_whitespace_body_is_default() {
        let job: Job = decode_request(Some(b" \r\n\t ".as_slice())).unwrap();
        assert_eq!(job, Job::default());
    }

    #[test]
    fn test_decode_first_value_only() {
        let body = br#"{"id":1,"name":"a"} {"id":2,"name":"b"}"#;
        let job: Job = decode_request(Some(body.as_slice())).unwrap();
        assert_eq!(job.id, 1);
    }

    #[test]
    fn test_decode_partial_object_keeps_defaults() {
        let task: Task = decode_request(Some(br#"{"Name":"n"}"#.as_slice())).unwrap();
        assert_eq!(task.name, "n");
        assert_eq!(task.id, 0);
        assert_eq!(task.retries, 3);
        assert_eq!(task.owner, Owner::default());
    }

    #[test]
    fn test_decode_null_body_is_default() {
        let task: Task = decode_request(Some(b"null".as_slice())).unwrap();
        assert_eq!(task, Task::default());
    }

    #[test]
    fn test_decode_null_member_keeps_default() {
        let task: Task = decode_request(Some(br#"{"retries":null,"ID":4}"#.as_slice())).unwrap();
        assert_eq!(task.retries, 3);
        assert_eq!(task.id, 4);
    }

    #[test]
    fn test_decode_nested_object_merges() {
        let task: Task =
            decode_request(Some(br#"{"owner":{"team":"infra"}}"#.as_slice())).unwrap();
        assert_eq!(task.owner.team, "infra");
        assert!(task.owner.name.is_empty());
    }

    #[test]
    fn test_decode_non_object_value() {
        let ids: Vec<u64> = decode_request(Some(b"[1,2]".as_slice())).unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_decode_malformed() {
        let result = decode_request::<Job>(Some(br#"{"id": "#.as_slice()));
        assert!(matches!(result, Err(DispatchError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_type() {
        let result = decode_request::<Job>(Some(br#"{"id":"seven"}"#.as_slice()));
        assert!(matches!(result, Err(DispatchError::Decode(_))));
    }

    #[test]
    fn test_encode_appends_newline() {
        let encoded = encode_response(&vec![1, 2]).unwrap();
        assert_eq!(&encoded[..], b"[1,2]\n");
    }

    #[test]
    fn test_encode_failure() {
        use std::collections::HashMap;
        // Non-string map keys cannot be encoded as JSON objects.
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(
            encode_response(&map),
            Err(DispatchError::Encode(_))
        ));
    }
}
