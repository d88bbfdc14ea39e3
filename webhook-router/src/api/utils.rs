use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Response, StatusCode};
use serde::Serialize;
use shared::http::{ResponseBody, make_json_response};
use std::collections::HashMap;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// JSON `{"error": message}` response.
pub fn error_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    make_json_response(status, &ErrorBody { error: message })
}

/// Reads the whole request body, refusing anything larger than `limit` bytes.
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, Response<ResponseBody>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            tracing::warn!(limit, "Request body exceeds limit");
            Err(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
            ))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            Err(error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

/// Decodes a query string. Later duplicates of a key win.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
