// libs/auth-cell/src/services/notifier.rs
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

/// Fire-and-forget SMS delivery. No delivery guarantee is assumed and
/// failures never propagate into the operation that triggered the send.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone_number: &str, message: &str);
}

pub struct SmsNotifier {
    client: reqwest::Client,
    gateway_url: String,
}

impl SmsNotifier {
    pub fn new(gateway_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url: gateway_url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, phone_number: &str, message: &str) {
        let body = json!({
            "to": phone_number,
            "message": message,
        });

        match self.client.post(&self.gateway_url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("SMS dispatched to {}", phone_number);
            }
            Ok(response) => {
                warn!("SMS gateway returned {} for {}", response.status(), phone_number);
            }
            Err(err) => {
                warn!("SMS dispatch to {} failed: {}", phone_number, err);
            }
        }
    }
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, phone_number: &str, _message: &str) {
        debug!("SMS delivery disabled, dropping message to {}", phone_number);
    }
}
