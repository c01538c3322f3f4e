//! Client for the share-notification API

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ShoppingList, UserId, Visibility};
use crate::util::{compact_text, is_http_url};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification API URL must include http:// or https://")]
    InvalidBaseUrl,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Notification API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// A list named in a share notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    pub name: String,
}

/// Body of `POST /v1/notify/share`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareNotification {
    pub target_email: String,
    pub sender_name: String,
    pub public_lists: Vec<ListSummary>,
    /// Whether the recipient already has an account.
    pub user_exists: bool,
}

impl ShareNotification {
    /// Build a notification naming the sender's public lists.
    pub fn from_lists(
        target_email: impl Into<String>,
        sender_name: impl Into<String>,
        owner: &UserId,
        lists: &[ShoppingList],
        user_exists: bool,
    ) -> Self {
        let public_lists = lists
            .iter()
            .filter(|list| list.is_owned_by(owner) && list.visibility == Visibility::Public)
            .map(|list| ListSummary {
                name: list.name.clone(),
            })
            .collect();
        Self {
            target_email: target_email.into(),
            sender_name: sender_name.into(),
            public_lists,
            user_exists,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct NotifyClient {
    base_url: String,
    client: Client,
}

impl NotifyClient {
    pub fn new(base_url: &str) -> Result<Self, NotifyError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !is_http_url(base_url) {
            return Err(NotifyError::InvalidBaseUrl);
        }
        Ok(Self {
            base_url: base_url.to_string(),
            client: Client::builder().build()?,
        })
    }

    /// Ask the API to e-mail `notification.target_email`, authenticated as
    /// the holder of `access_token`.
    pub async fn send_share_notification(
        &self,
        access_token: &str,
        notification: &ShareNotification,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/v1/notify/share", self.base_url))
            .bearer_auth(access_token)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(to = %notification.target_email, "Share notification sent");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Api {
            status: status.as_u16(),
            message: api_error_message(status, &body),
        })
    }
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| {
            let body = compact_text(body);
            if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            }
        },
        |payload| payload.error,
    )
}
