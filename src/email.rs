//! Transactional email dispatch.
//!
//! Fire-and-forget sends through the provider's REST API. Outcomes are
//! logged, never retried, and never block the pipeline write that triggered
//! them.

use serde::Serialize;

use crate::config::EmailConfig;
use crate::db::DbLead;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Build the invitation email for a lead moving into the `invited` stage.
/// Plain string interpolation; there is no template engine here.
pub fn build_invitation_email(lead: &DbLead, recipient: &str) -> EmailMessage {
    let greeting = match lead.kind.as_str() {
        "couple" => "Congratulations on your engagement",
        _ => "Thank you for your application",
    };

    let html = format!(
        "<div style=\"font-family: Georgia, serif; max-width: 560px;\">\
         <h2>You're invited to Gardenia</h2>\
         <p>Dear {name},</p>\
         <p>{greeting} — we would be delighted to welcome you to the Gardenia \
         directory. Your concierge has reviewed your details and opened your \
         private onboarding.</p>\
         <p><a href=\"https://gardenia.example/onboarding\">Complete your profile</a></p>\
         <p>Warmly,<br/>The Gardenia Concierge Team</p>\
         </div>",
        name = lead.name,
        greeting = greeting,
    );

    EmailMessage {
        to: recipient.to_string(),
        subject: format!("Your invitation to Gardenia, {}", lead.name),
        html,
    }
}

/// Send one email through the provider. One POST, no retry.
pub async fn send(
    client: &reqwest::Client,
    config: &EmailConfig,
    message: &EmailMessage,
) -> Result<(), AppError> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            AppError::NotConfigured(
                "Email API key missing (set GARDENIA_EMAIL_API_KEY)".to_string(),
            )
        })?;

    let url = format!("{}/emails", config.api_base.trim_end_matches('/'));
    let body = serde_json::json!({
        "from": config.sender,
        "to": [message.to],
        "subject": message.subject,
        "html": message.html,
    });

    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::Upstream {
            status: status.as_u16(),
            message: body,
        });
    }

    log::info!("Sent email '{}' to {}", message.subject, message.to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(kind: &str) -> DbLead {
        DbLead {
            id: "l1".to_string(),
            name: "Amelia & Tom".to_string(),
            kind: kind.to_string(),
            email: Some("amelia@example.com".to_string()),
            source: "chat".to_string(),
            notes: None,
            stage: "invited".to_string(),
            priority: "WARM".to_string(),
            score: Some(55),
            deal_probability: 0.65,
            deal_value: None,
            priority_overridden: false,
            assigned_to: None,
            assigned_at: None,
            invited_at: None,
            stage_entered_at: "2026-01-01T00:00:00Z".to_string(),
            summary: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_invitation_email_interpolates_lead() {
        let message = build_invitation_email(&lead("couple"), "amelia@example.com");
        assert_eq!(message.to, "amelia@example.com");
        assert!(message.subject.contains("Amelia & Tom"));
        assert!(message.html.contains("Amelia & Tom"));
        assert!(message.html.contains("Congratulations on your engagement"));
    }

    #[test]
    fn test_vendor_greeting_differs() {
        let message = build_invitation_email(&lead("vendor"), "v@example.com");
        assert!(message.html.contains("Thank you for your application"));
    }
}
