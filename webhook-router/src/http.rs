use crate::errors::ForwardError;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use hyper::body::Bytes;
use std::time::Duration;
use tokio::time::timeout;

pub const FORWARDED_BY_HEADER: &str = "x-forwarded-by";
pub const ORIGINAL_PAGE_ID_HEADER: &str = "x-original-page-id";
pub const FORWARDED_BY: &str = "central-router";

/// POST the original batch body to a tenant destination.
///
/// # Timeout Behavior
///
/// `deadline` covers connecting, sending the request and receiving the response
/// headers. The response body is not read. When the deadline passes the request
/// is dropped, which aborts it.
///
/// Any HTTP status counts as delivered; only timeouts and transport errors are
/// returned as `Err`.
pub async fn send_to_destination(
    client: &reqwest::Client,
    destination_url: &str,
    page_id: &str,
    body: Bytes,
    deadline: Duration,
) -> Result<StatusCode, ForwardError> {
    let request = client
        .post(destination_url)
        .header(CONTENT_TYPE, "application/json")
        .header(FORWARDED_BY_HEADER, FORWARDED_BY)
        .header(ORIGINAL_PAGE_ID_HEADER, page_id)
        .body(body);

    let response = timeout(deadline, request.send())
        .await
        // First map_err: deadline elapsed
        .map_err(|_| ForwardError::Timeout)?
        // Second map_err: connection failures, invalid URLs, protocol errors
        .map_err(|e| ForwardError::Transport(error_chain(&e)))?;

    Ok(response.status())
}

// reqwest's top-level message is generic ("error sending request"); keep the causes.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
