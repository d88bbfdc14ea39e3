//! Webhook ingress: the platform-facing endpoint.
//!
//! `GET` answers the subscription handshake. `POST` authenticates the raw body,
//! checks the envelope, acknowledges, and only then hands the batch to the
//! forwarder. Nothing that happens after the acknowledgment can change the
//! response the platform sees.

use crate::api::utils::{error_response, parse_query};
use crate::envelope::EventBatch;
use crate::errors::EnvelopeError;
use crate::forwarder::Forwarder;
use crate::metrics_defs::{WEBHOOK_RECEIVED, WEBHOOK_REJECTED};
use crate::signature::{SIGNATURE_HEADER, SignatureVerifier};
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use serde::Serialize;
use shared::counter;
use shared::http::{ResponseBody, full_body, make_json_response};
use std::sync::Arc;

const MODE_PARAM: &str = "hub.mode";
const TOKEN_PARAM: &str = "hub.verify_token";
const CHALLENGE_PARAM: &str = "hub.challenge";
const SUBSCRIBE_MODE: &str = "subscribe";

#[derive(Serialize)]
struct Ack {
    status: &'static str,
}

#[derive(Clone)]
pub struct WebhookIngress {
    verify_token: Arc<str>,
    verifier: SignatureVerifier,
    forwarder: Forwarder,
}

impl WebhookIngress {
    pub fn new(verify_token: &str, verifier: SignatureVerifier, forwarder: Forwarder) -> Self {
        Self {
            verify_token: Arc::from(verify_token),
            verifier,
            forwarder,
        }
    }

    /// Subscription handshake. Echoes `hub.challenge` as plain text when the
    /// mode and token match.
    pub fn verify(&self, query: Option<&str>) -> Response<ResponseBody> {
        let params = parse_query(query);
        let mode = params.get(MODE_PARAM).map(String::as_str);
        let token = params.get(TOKEN_PARAM).map(String::as_str);

        if mode != Some(SUBSCRIBE_MODE) || token != Some(&*self.verify_token) {
            tracing::warn!(mode = ?mode, "Webhook verification failed");
            return error_response(StatusCode::FORBIDDEN, "Verification failed");
        }

        let Some(challenge) = params.get(CHALLENGE_PARAM) else {
            tracing::warn!("Webhook verification request without challenge");
            return error_response(StatusCode::BAD_REQUEST, "Missing hub.challenge");
        };

        tracing::info!("Webhook verified");
        let mut response = Response::new(full_body(challenge.clone()));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response
    }

    /// Event delivery. `body` must be the exact bytes received.
    pub fn receive(&self, headers: &HeaderMap, body: Bytes) -> Response<ResponseBody> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());

        if let Err(e) = self.verifier.verify(signature, &body) {
            tracing::warn!(error = %e, "Rejected webhook with invalid signature");
            counter!(WEBHOOK_REJECTED, "reason" => "signature").increment(1);
            return error_response(StatusCode::FORBIDDEN, "Invalid signature");
        }

        let batch = match EventBatch::parse(body) {
            Ok(batch) => batch,
            Err(EnvelopeError::Malformed(e)) => {
                // Authenticated but unparseable: acknowledge so the platform
                // keeps the subscription healthy.
                tracing::error!(error = %e, "Failed to parse webhook body");
                counter!(WEBHOOK_REJECTED, "reason" => "malformed").increment(1);
                return make_json_response(StatusCode::OK, &Ack { status: "error" });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected webhook with invalid payload");
                counter!(WEBHOOK_REJECTED, "reason" => "invalid_payload").increment(1);
                return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
            }
        };

        tracing::debug!(entries = batch.page_ids().len(), "Webhook received");
        counter!(WEBHOOK_RECEIVED).increment(1);
        self.forwarder.submit(batch);

        make_json_response(StatusCode::OK, &Ack { status: "received" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dead_letter::DeadLetterRecorder;
    use crate::registry::{NewTenantRoute, RouteStore};
    use crate::resolver::RouteResolver;
    use crate::signature::sign;
    use crate::store::SqliteStore;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "app-secret";
    const BODY: &[u8] = br#"{"object":"page","entry":[{"id":"123"}]}"#;

    async fn ingress(secret: Option<&str>) -> (WebhookIngress, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let resolver = RouteResolver::new(store.clone(), Duration::from_secs(60), 100);
        let dead_letters = DeadLetterRecorder::new(store.clone(), Duration::from_secs(300));
        let forwarder = Forwarder::new(
            resolver,
            dead_letters,
            reqwest::Client::new(),
            Duration::from_secs(5),
        );
        let ingress = WebhookIngress::new("verify-me", SignatureVerifier::new(secret), forwarder);
        (ingress, store)
    }

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign(SECRET.as_bytes(), body)).unwrap(),
        );
        headers
    }

    async fn body_string(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_verify_echoes_challenge() {
        let (ingress, _) = ingress(None).await;
        let response = ingress.verify(Some(
            "hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
        ));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(body_string(response).await, "1158201444");
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_token_or_mode() {
        let (ingress, _) = ingress(None).await;

        for query in [
            Some("hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1"),
            Some("hub.mode=other&hub.verify_token=verify-me&hub.challenge=1"),
            Some("hub.challenge=1"),
            None,
        ] {
            let response = ingress.verify(query);
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{query:?}");
            assert_eq!(
                body_string(response).await,
                r#"{"error":"Verification failed"}"#
            );
        }
    }

    #[tokio::test]
    async fn test_verify_missing_challenge() {
        let (ingress, _) = ingress(None).await;
        let response = ingress.verify(Some("hub.mode=subscribe&hub.verify_token=verify-me"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_receive_acknowledges_signed_batch() {
        let (ingress, _) = ingress(Some(SECRET)).await;
        let response = ingress.receive(&signed_headers(BODY), Bytes::from_static(BODY));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"received"}"#);
    }

    #[tokio::test]
    async fn test_receive_rejects_bad_signature_without_forwarding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (ingress, store) = ingress(Some(SECRET)).await;
        store
            .upsert_route(&NewTenantRoute {
                page_id: "123".into(),
                tenant_name: "acme".into(),
                destination_url: server.uri(),
                secret_key: None,
            })
            .await
            .unwrap();

        let mut headers = signed_headers(b"a different body");
        let response = ingress.receive(&headers, Bytes::from_static(BODY));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_string(response).await, r#"{"error":"Invalid signature"}"#);

        headers.clear();
        let response = ingress.receive(&headers, Bytes::from_static(BODY));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        assert!(ingress.forwarder.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_receive_without_secret_skips_verification() {
        let (ingress, _) = ingress(None).await;
        let response = ingress.receive(&HeaderMap::new(), Bytes::from_static(BODY));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_receive_rejects_invalid_payload() {
        let (ingress, _) = ingress(Some(SECRET)).await;

        for body in [
            &br#"{"object":"user","entry":[{"id":"1"}]}"#[..],
            &br#"{"object":"page","entry":[]}"#[..],
            &br#"{"object":"page"}"#[..],
        ] {
            let response = ingress.receive(&signed_headers(body), Bytes::copy_from_slice(body));
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_string(response).await, r#"{"error":"Invalid payload"}"#);
        }
    }

    #[tokio::test]
    async fn test_receive_acknowledges_malformed_json() {
        let (ingress, _) = ingress(Some(SECRET)).await;
        let body = b"{not json";
        let response = ingress.receive(&signed_headers(body), Bytes::from_static(body));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"error"}"#);
    }
}
