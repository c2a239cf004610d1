//! Web Push transport adapter.
//!
//! Encryption and VAPID signing come from the `web-push` crate; the encrypted
//! request is sent with `reqwest` so the raw push-service status code is
//! available to the dispatcher. Exactly one HTTP attempt per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

use pushcast_core::{DeliveryOutcome, PushError, PushMessage, PushTransport, SubscriptionRecord};
use pushcast_logging::redact_endpoint;

/// VAPID key pair plus the contact identifier sent in the `sub` claim.
#[derive(Clone)]
pub struct VapidCredentials {
    /// URL-safe base64 uncompressed P-256 public key.
    pub public_key: String,
    /// URL-safe base64 raw P-256 private scalar.
    pub private_key: String,
    /// `mailto:` or `https:` contact.
    pub subject: String,
}

impl std::fmt::Debug for VapidCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidCredentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .field("subject", &self.subject)
            .finish()
    }
}

/// Encrypted request ready to be posted to a push service.
struct EncryptedPush {
    url: String,
    ttl: u32,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

pub struct WebPushTransport {
    client: reqwest::Client,
    vapid: VapidCredentials,
    ttl: u32,
    send_timeout: Duration,
}

impl WebPushTransport {
    pub fn new(vapid: VapidCredentials, send_timeout: Duration, ttl: u32) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(send_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PushError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            vapid,
            ttl,
            send_timeout,
        })
    }

    /// Encrypt `message` for the subscription in `record` and sign it.
    fn encrypt(&self, record: &SubscriptionRecord, message: &PushMessage) -> Result<EncryptedPush, String> {
        let info: SubscriptionInfo = serde_json::from_value(record.payload.as_value().clone())
            .map_err(|e| format!("invalid subscription payload: {e}"))?;
        let content = message
            .to_payload_bytes()
            .map_err(|e| format!("failed to encode message: {e}"))?;

        let mut signature = VapidSignatureBuilder::from_base64(&self.vapid.private_key, &info)
            .map_err(|e| format!("invalid VAPID private key: {e}"))?;
        signature.add_claim("sub", self.vapid.subject.as_str());
        let signature = signature
            .build()
            .map_err(|e| format!("VAPID signing failed: {e}"))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_ttl(self.ttl);
        builder.set_payload(ContentEncoding::Aes128Gcm, &content);
        builder.set_vapid_signature(signature);
        let built = builder
            .build()
            .map_err(|e| format!("message encryption failed: {e}"))?;

        let (headers, body) = match built.payload {
            Some(payload) => {
                let mut headers = payload.crypto_headers;
                if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("content-encoding")) {
                    headers.push(("Content-Encoding", "aes128gcm".to_string()));
                }
                headers.push(("Content-Type", "application/octet-stream".to_string()));
                (headers, payload.content)
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(EncryptedPush {
            url: built.endpoint.to_string(),
            ttl: built.ttl,
            headers,
            body,
        })
    }

    async fn post(&self, push: EncryptedPush) -> DeliveryOutcome {
        let mut request = self
            .client
            .post(&push.url)
            .header("TTL", push.ttl.to_string());
        for (name, value) in push.headers {
            request = request.header(name, value);
        }

        match request.body(push.body).send().await {
            Ok(response) => classify_status(response.status()),
            Err(e) if e.is_timeout() => {
                DeliveryOutcome::Failed(format!("timed out after {}s", self.send_timeout.as_secs()))
            }
            Err(e) => DeliveryOutcome::Failed(e.without_url().to_string()),
        }
    }
}

/// Map a push-service response status onto a delivery outcome. Redirects are
/// not followed, so a 3xx lands here as a rejection.
pub fn classify_status(status: StatusCode) -> DeliveryOutcome {
    if status.is_success() {
        DeliveryOutcome::Delivered
    } else {
        DeliveryOutcome::Rejected(status.as_u16())
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    fn name(&self) -> &str {
        "webpush"
    }

    async fn send(&self, record: &SubscriptionRecord, message: &PushMessage) -> DeliveryOutcome {
        let push = match self.encrypt(record, message) {
            Ok(push) => push,
            Err(e) => return DeliveryOutcome::Failed(e),
        };
        debug!(endpoint = %redact_endpoint(&record.endpoint), bytes = push.body.len(), "Posting push message");
        self.post(push).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use pushcast_core::SubscriptionPayload;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const VAPID_PUBLIC: &str =
        "BFp8gdO2rsg6IXrbntL_PtoEf9G49uvS2Cn4SAsA37EVhf_9ofw4Uwq7pxQljvYVkpLAWqvZnF229xlzOFvWCW8";
    const VAPID_PRIVATE: &str = "tx-kTH2HvqT2dz0JM79JBnqCf_RdXcIjsz_ykI7XkNE";
    const CLIENT_P256DH: &str =
        "BCzTOoYTyrJUx4ZFRN_d8W-oSR6HnNu7x9aaA7vGZiS641ruOxZ6FCNuacMNQRdEabvc3IIJwBUgegUFq_yT6TU";
    const CLIENT_AUTH: &str = "mT8ltO2NXOWnBgZ9ZluD5A";

    fn transport_with(private_key: &str, send_timeout: Duration) -> WebPushTransport {
        WebPushTransport::new(
            VapidCredentials {
                public_key: VAPID_PUBLIC.into(),
                private_key: private_key.into(),
                subject: "mailto:ops@example.org".into(),
            },
            send_timeout,
            60,
        )
        .unwrap()
    }

    fn record(payload: serde_json::Value) -> SubscriptionRecord {
        let now = Utc::now();
        SubscriptionRecord {
            endpoint: payload["endpoint"].as_str().unwrap_or_default().to_string(),
            payload: SubscriptionPayload::new(payload),
            created_at: now,
            updated_at: now,
        }
    }

    fn subscriber(addr: SocketAddr) -> SubscriptionRecord {
        record(json!({
            "endpoint": format!("http://{addr}/push/dK9vZ2xS3mQ"),
            "keys": {"p256dh": CLIENT_P256DH, "auth": CLIENT_AUTH}
        }))
    }

    /// Read one request; returns its lowercased head.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return String::from_utf8_lossy(&buf).to_lowercase();
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
        let body_len: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        while buf.len() - head_end < body_len {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        head
    }

    /// Local push service answering every request with `status_line`.
    /// Returns its address, a request counter and the request heads seen.
    async fn push_service(status_line: &'static str) -> (SocketAddr, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let heads = Arc::new(Mutex::new(Vec::new()));

        let (hits_srv, heads_srv) = (hits.clone(), heads.clone());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                hits_srv.fetch_add(1, Ordering::SeqCst);
                let head = read_request(&mut socket).await;
                heads_srv.lock().unwrap().push(head);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nlocation: http://{addr}/moved\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (addr, hits, heads)
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::CREATED), DeliveryOutcome::Delivered);
        assert_eq!(classify_status(StatusCode::OK), DeliveryOutcome::Delivered);
        assert_eq!(classify_status(StatusCode::GONE), DeliveryOutcome::Rejected(410));
        assert_eq!(classify_status(StatusCode::NOT_FOUND), DeliveryOutcome::Rejected(404));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            DeliveryOutcome::Rejected(429)
        );
        assert!(!classify_status(StatusCode::BAD_GATEWAY).is_permanent_failure());
    }

    #[tokio::test]
    async fn test_gone_is_rejected_after_one_request() {
        let (addr, hits, heads) = push_service("410 Gone").await;
        let transport = transport_with(VAPID_PRIVATE, Duration::from_secs(5));

        let outcome = transport.send(&subscriber(addr), &PushMessage::default()).await;

        assert_eq!(outcome, DeliveryOutcome::Rejected(410));
        assert!(outcome.is_permanent_failure());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let head = heads.lock().unwrap()[0].clone();
        assert!(head.starts_with("post /push/dk9vz2xs3mq"));
        assert!(head.contains("content-encoding: aes128gcm"));
        assert!(head.contains("ttl: 60"));
        assert!(head.contains("authorization: vapid t="));
    }

    #[tokio::test]
    async fn test_created_is_delivered() {
        let (addr, hits, _) = push_service("201 Created").await;
        let transport = transport_with(VAPID_PRIVATE, Duration::from_secs(5));

        let outcome = transport.send(&subscriber(addr), &PushMessage::default()).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let (addr, _, _) = push_service("503 Service Unavailable").await;
        let transport = transport_with(VAPID_PRIVATE, Duration::from_secs(5));

        let outcome = transport.send(&subscriber(addr), &PushMessage::default()).await;

        assert_eq!(outcome, DeliveryOutcome::Rejected(503));
        assert!(!outcome.is_permanent_failure());
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let (addr, hits, _) = push_service("307 Temporary Redirect").await;
        let transport = transport_with(VAPID_PRIVATE, Duration::from_secs(5));

        let outcome = transport.send(&subscriber(addr), &PushMessage::default()).await;

        assert_eq!(outcome, DeliveryOutcome::Rejected(307));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_silent_push_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let transport = transport_with(VAPID_PRIVATE, Duration::from_secs(1));
        let outcome = transport.send(&subscriber(addr), &PushMessage::default()).await;
        server.abort();

        match outcome {
            DeliveryOutcome::Failed(msg) => assert!(msg.starts_with("timed out"), "{msg}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_payload_without_keys_fails_without_network() {
        let record = record(json!({"endpoint": "https://push.invalid/abc"}));
        let outcome = transport_with("not-a-real-key", Duration::from_secs(1))
            .send(&record, &PushMessage::default())
            .await;
        match outcome {
            DeliveryOutcome::Failed(msg) => assert!(msg.contains("invalid subscription payload")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_hides_private_key() {
        let creds = VapidCredentials {
            public_key: "BPub".into(),
            private_key: "super-secret".into(),
            subject: "mailto:ops@example.org".into(),
        };
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
