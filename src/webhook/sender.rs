//! Outbound messages to the vendor REST API

use crate::config::VendorCredentials;
use crate::error::BrokerError;
use async_trait::async_trait;
use tracing::{debug, error};
use url::Url;

/// Delivery seam; tests capture replies instead of calling the vendor.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `body` to the `to` phone number.
    async fn send(&self, to: &str, body: &str) -> Result<(), BrokerError>;
}

/// Sends messages through the vendor's REST API.
///
/// `POST {base}/Accounts/{sid}/Messages.json` with form-encoded
/// `To`/`From`/`Body` and basic auth, the vendor's standard contract.
#[derive(Debug, Clone)]
pub struct VendorSender {
    http: reqwest::Client,
    base_url: Url,
    credentials: VendorCredentials,
}

impl VendorSender {
    pub fn new(base_url: Url, credentials: VendorCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            credentials,
        }
    }

    fn messages_url(&self, account_sid: &str) -> Result<Url, BrokerError> {
        let path = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url.path().trim_end_matches('/'),
            urlencoding::encode(account_sid)
        );
        let mut url = self.base_url.clone();
        url.set_path(&path);
        Ok(url)
    }
}

#[async_trait]
impl MessageSender for VendorSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), BrokerError> {
        let (sid, token) = self.credentials.basic_auth()?;
        let from = self
            .credentials
            .from_number
            .clone()
            .ok_or_else(|| BrokerError::Config("vendor sender number not set".into()))?;
        let url = self.messages_url(&sid)?;

        let form = [("To", to), ("From", from.as_str()), ("Body", body)];
        let response = self
            .http
            .post(url)
            .basic_auth(&sid, Some(&token))
            .form(&form)
            .send()
            .await
            .map_err(|e| BrokerError::Internal(format!("vendor request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "no response body".to_string());
            error!("vendor rejected message to {to}: {status} {text}");
            return Err(BrokerError::Internal(format!(
                "vendor rejected message: {status}"
            )));
        }

        debug!("message delivered to {to}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> VendorCredentials {
        VendorCredentials {
            account_sid: Some("AC_test".into()),
            auth_token: Some("token".into()),
            from_number: Some("whatsapp:+14155550000".into()),
        }
    }

    #[tokio::test]
    async fn test_send_posts_form_encoded_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/Accounts/AC_test/Messages.json")
            .match_header(
                "content-type",
                "application/x-www-form-urlencoded",
            )
            .with_status(201)
            .with_body(r#"{"sid":"SM_out"}"#)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let sender = VendorSender::new(base, credentials());
        sender
            .send("whatsapp:+971501234567", "Order ORD-000001 placed")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_vendor_error_surfaces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Accounts/AC_test/Messages.json")
            .with_status(401)
            .with_body(r#"{"message":"bad credentials"}"#)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let sender = VendorSender::new(base, credentials());
        let result = sender.send("whatsapp:+971501234567", "hello").await;
        assert!(result.is_err());
    }
}
