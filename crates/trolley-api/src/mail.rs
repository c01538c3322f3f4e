//! Share notification e-mails: request validation, rendering, delivery.

use std::sync::Arc;

use askama::Template;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{AppConfig, MailRelayConfig};
use crate::error::AppError;

const MAX_PUBLIC_LISTS: usize = 100;
const MAX_TEXT_LEN: usize = 200;

pub const EXISTING_USER_SUBJECT: &str = "Your Public Shopping Lists";
pub const INVITATION_SUBJECT: &str = "You've Been Invited to Join Our Shopping App";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    pub name: String,
}

/// Body of `POST /v1/notify/share`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareEmailRequest {
    pub target_email: String,
    pub sender_name: String,
    #[serde(default)]
    pub public_lists: Vec<ListSummary>,
    #[serde(default)]
    pub user_exists: bool,
}

impl ShareEmailRequest {
    /// Trim fields and reject requests that cannot produce a sensible e-mail.
    pub fn validated(self) -> Result<Self, AppError> {
        let target_email = self.target_email.trim().to_ascii_lowercase();
        if !looks_like_email(&target_email) {
            return Err(AppError::bad_request("target_email must be an e-mail address"));
        }
        let sender_name = self.sender_name.trim().to_string();
        if sender_name.is_empty() {
            return Err(AppError::bad_request("sender_name must not be empty"));
        }
        if sender_name.chars().count() > MAX_TEXT_LEN {
            return Err(AppError::bad_request("sender_name is too long"));
        }
        if self.public_lists.len() > MAX_PUBLIC_LISTS {
            return Err(AppError::bad_request(format!(
                "At most {MAX_PUBLIC_LISTS} public lists can be named"
            )));
        }
        let public_lists = self
            .public_lists
            .into_iter()
            .filter_map(|list| {
                let name: String = list.name.trim().chars().take(MAX_TEXT_LEN).collect();
                (!name.is_empty()).then_some(ListSummary { name })
            })
            .collect();

        Ok(Self {
            target_email,
            sender_name,
            public_lists,
            user_exists: self.user_exists,
        })
    }
}

fn looks_like_email(value: &str) -> bool {
    value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !value.chars().any(char::is_whitespace)
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<h1>{{ subject }}</h1>
<p>Hi there,</p>
<p>{{ sender_name }} has shared their public shopping lists with you.</p>
{% if !public_lists.is_empty() %}<h2>Public Lists:</h2><ul>{% for list in public_lists %}<li>{{ list.name }}</li>{% endfor %}</ul>
{% endif %}<p>Thank you for using our app!</p>
"#
)]
struct ShareEmailHtml<'a> {
    subject: &'a str,
    sender_name: &'a str,
    public_lists: &'a [ListSummary],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

pub fn render_share_email(request: &ShareEmailRequest, from: &str) -> Result<OutgoingEmail, AppError> {
    let subject = if request.user_exists {
        EXISTING_USER_SUBJECT
    } else {
        INVITATION_SUBJECT
    };
    let html = ShareEmailHtml {
        subject,
        sender_name: &request.sender_name,
        public_lists: &request.public_lists,
    }
    .render()
    .map_err(|error| AppError::internal(format!("Failed to render e-mail: {error}")))?;

    Ok(OutgoingEmail {
        from: from.to_string(),
        to: request.target_email.clone(),
        subject: subject.to_string(),
        html,
    })
}

/// Where rendered e-mails go.
#[derive(Clone)]
pub enum MailTransport {
    /// POST to an HTTP mail relay.
    Relay {
        client: reqwest::Client,
        relay: MailRelayConfig,
    },
    /// Keep messages in memory and log them; used when no relay is configured.
    Outbox(Arc<Mutex<Vec<OutgoingEmail>>>),
}

impl MailTransport {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        match config.mail_relay.clone() {
            Some(relay) => {
                let client = reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(10))
                    .build()
                    .map_err(|error| AppError::Config(format!("HTTP client: {error}")))?;
                Ok(Self::Relay { client, relay })
            }
            None => {
                tracing::warn!("MAIL_RELAY_URL not set; e-mails are only logged");
                Ok(Self::outbox())
            }
        }
    }

    pub fn outbox() -> Self {
        Self::Outbox(Arc::new(Mutex::new(Vec::new())))
    }

    pub async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        match self {
            Self::Relay { client, relay } => {
                let response = client
                    .post(&relay.url)
                    .bearer_auth(&relay.api_key)
                    .json(&email)
                    .send()
                    .await
                    .map_err(|error| {
                        tracing::error!(%error, "Mail relay request failed");
                        send_failed()
                    })?;
                if !response.status().is_success() {
                    tracing::error!(
                        status = response.status().as_u16(),
                        "Mail relay rejected the message"
                    );
                    return Err(send_failed());
                }
            }
            Self::Outbox(outbox) => {
                tracing::info!(to = %email.to, subject = %email.subject, "Queued e-mail in outbox");
                outbox.lock().await.push(email);
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        match self {
            Self::Relay { .. } => Vec::new(),
            Self::Outbox(outbox) => outbox.lock().await.clone(),
        }
    }
}

fn send_failed() -> AppError {
    AppError::internal("Failed to send email")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn request(user_exists: bool, lists: &[&str]) -> ShareEmailRequest {
        ShareEmailRequest {
            target_email: " Bob@Example.com ".to_string(),
            sender_name: " Alice ".to_string(),
            public_lists: lists
                .iter()
                .map(|name| ListSummary {
                    name: (*name).to_string(),
                })
                .collect(),
            user_exists,
        }
    }

    #[test]
    fn existing_users_get_the_public_lists_subject() {
        let email =
            render_share_email(&request(true, &["Groceries"]).validated().unwrap(), "from@x.io")
                .unwrap();

        assert_eq!(email.subject, EXISTING_USER_SUBJECT);
        assert_eq!(email.to, "bob@example.com");
        assert!(email.html.contains("<h1>Your Public Shopping Lists</h1>"));
        assert!(email
            .html
            .contains("<p>Alice has shared their public shopping lists with you.</p>"));
        assert!(email.html.contains("<ul><li>Groceries</li></ul>"));
        assert!(email.html.contains("<p>Thank you for using our app!</p>"));
    }

    #[test]
    fn unknown_users_get_an_invitation_without_a_list_section() {
        let email = render_share_email(&request(false, &[]).validated().unwrap(), "from@x.io")
            .unwrap();

        assert_eq!(email.subject, INVITATION_SUBJECT);
        assert!(!email.html.contains("Public Lists:"));
        assert!(!email.html.contains("<ul>"));
    }

    #[test]
    fn user_supplied_text_is_escaped() {
        let mut unsafe_request = request(true, &["<script>alert(1)</script>"]);
        unsafe_request.sender_name = "Tom & <b>Jerry</b>".to_string();
        let email = render_share_email(&unsafe_request.validated().unwrap(), "from@x.io").unwrap();

        assert!(!email.html.contains("<script>"));
        assert!(!email.html.contains("<b>"));
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(email.html.contains("Tom &amp; "));
    }

    #[test]
    fn validation_rejects_bad_addresses_and_blank_senders() {
        let mut bad_email = request(true, &[]);
        bad_email.target_email = "not-an-email".to_string();
        assert!(matches!(bad_email.validated(), Err(AppError::BadRequest(_))));

        let mut blank_sender = request(true, &[]);
        blank_sender.sender_name = "   ".to_string();
        assert!(matches!(blank_sender.validated(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn validation_drops_blank_list_names() {
        let validated = request(true, &["Groceries", "  "]).validated().unwrap();
        assert_eq!(
            validated.public_lists,
            vec![ListSummary {
                name: "Groceries".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn outbox_keeps_sent_messages() {
        let transport = MailTransport::outbox();
        let email = render_share_email(&request(false, &[]).validated().unwrap(), "from@x.io")
            .unwrap();

        transport.send(email.clone()).await.unwrap();
        assert_eq!(transport.sent().await, vec![email]);
    }
}
