//! Notification transports
//!
//! `NotificationTransport` is the seam to the outside world; the
//! built-in `HttpTransport` handles structured-log and webhook
//! delivery, with email/SMS logged as placeholders until a provider is
//! wired in.

use futures::future::BoxFuture;

use crate::model::{Alert, Channel, Recipient};

/// Delivery errors. Permanent failures are not retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Retriable: network failure, 5xx, timeout
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// Permanent: rejected by the receiving end
    #[error("Delivery bounced: {0}")]
    Bounced(String),

    /// Permanent: recipient has no address for the channel
    #[error("Recipient {recipient_id} has no {channel:?} address")]
    MissingAddress {
        recipient_id: String,
        channel: Channel,
    },
}

impl DeliveryError {
    /// Whether the retry policy applies
    pub fn is_retriable(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

/// Pluggable delivery backend
pub trait NotificationTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        channel: Channel,
        recipient: &'a Recipient,
        alert: &'a Alert,
    ) -> BoxFuture<'a, Result<(), DeliveryError>>;
}

/// Default transport: log channel plus webhook over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn send_webhook(&self, recipient: &Recipient, alert: &Alert) -> Result<(), DeliveryError> {
        let url = recipient
            .webhook_url
            .as_deref()
            .ok_or_else(|| DeliveryError::MissingAddress {
                recipient_id: recipient.id.clone(),
                channel: Channel::Webhook,
            })?;

        let payload = serde_json::json!({
            "alert_id": alert.id,
            "entity_id": alert.entity_id,
            "severity": alert.severity,
            "title": alert.title,
            "description": alert.description,
            "triggered_by": alert.triggered_by,
            "trigger_value": alert.trigger_value,
            "threshold_value": alert.threshold_value,
            "recommended_actions": alert.recommended_actions,
            "correlation_group": alert.correlation_group,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(format!("webhook send failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(alert_id = %alert.id, url = %url, "Webhook notification sent");
            Ok(())
        } else if status.is_client_error() {
            Err(DeliveryError::Bounced(format!(
                "webhook returned status {}",
                status
            )))
        } else {
            Err(DeliveryError::Transient(format!(
                "webhook returned status {}",
                status
            )))
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationTransport for HttpTransport {
    fn send<'a>(
        &'a self,
        channel: Channel,
        recipient: &'a Recipient,
        alert: &'a Alert,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            match channel {
                Channel::Log => {
                    tracing::warn!(
                        alert_id = %alert.id,
                        entity_id = %alert.entity_id,
                        severity = ?alert.severity,
                        recipient = %recipient.id,
                        "Alert notification: {}",
                        alert.title
                    );
                    Ok(())
                }
                Channel::Webhook => self.send_webhook(recipient, alert).await,
                Channel::Email => {
                    let to = recipient.email.as_deref().ok_or_else(|| {
                        DeliveryError::MissingAddress {
                            recipient_id: recipient.id.clone(),
                            channel: Channel::Email,
                        }
                    })?;
                    // Email provider not wired in, log and treat as sent
                    tracing::info!(
                        alert_id = %alert.id,
                        to = %to,
                        "Email notification (provider not configured): {}",
                        alert.title
                    );
                    Ok(())
                }
                Channel::Sms => {
                    let to = recipient.phone.as_deref().ok_or_else(|| {
                        DeliveryError::MissingAddress {
                            recipient_id: recipient.id.clone(),
                            channel: Channel::Sms,
                        }
                    })?;
                    tracing::info!(
                        alert_id = %alert.id,
                        to = %to,
                        "SMS notification (provider not configured): {}",
                        alert.title
                    );
                    Ok(())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertSeverity, AlertType};

    fn make_alert() -> Alert {
        Alert::new(
            "e1",
            AlertType::Threshold,
            AlertSeverity::Warning,
            "speed_kmh",
            130.0,
            120.0,
            1000,
        )
    }

    #[tokio::test]
    async fn test_log_channel_always_delivers() {
        let transport = HttpTransport::new();
        let recipient = Recipient::new("r1", "Ops");
        let result = transport.send(Channel::Log, &recipient, &make_alert()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_webhook_address_bounces() {
        let transport = HttpTransport::new();
        let recipient = Recipient::new("r1", "Ops");
        let result = transport
            .send(Channel::Webhook, &recipient, &make_alert())
            .await;
        assert!(matches!(
            result,
            Err(DeliveryError::MissingAddress { .. })
        ));
        assert!(!result.unwrap_err().is_retriable());
    }

    #[tokio::test]
    async fn test_missing_email_address_bounces() {
        let transport = HttpTransport::new();
        let recipient = Recipient::new("r1", "Ops");
        let result = transport
            .send(Channel::Email, &recipient, &make_alert())
            .await;
        assert!(result.is_err());

        let with_email = Recipient::new("r2", "Ops").with_email("ops@example.com");
        let result = transport
            .send(Channel::Email, &with_email, &make_alert())
            .await;
        assert!(result.is_ok());
    }
}
