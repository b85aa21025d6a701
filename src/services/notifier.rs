use std::sync::Arc;
use tracing::{error, info, warn};

use crate::crm::CrmApi;
use crate::error::SyncError;
use crate::models::crm::{EmailContent, MailParams, MessageTemplate, TemplateLookup};
use crate::models::zoom::ZoomRegistrant;
use crate::services::registrants::string_of_registrants;
use crate::services::settings::SettingsService;

/// Title of the template used for registrant notifications
pub const REGISTRANTS_TEMPLATE_TITLE: &str = "Zoom Registrants Notification";

/// Fill the `{event_title}` and `{registrants}` tokens of a template
pub fn render_registrants_email(
    template: &MessageTemplate,
    registrants: &[ZoomRegistrant],
    event_title: &str,
) -> EmailContent {
    let registrant_lines = string_of_registrants(registrants, "<br>");
    EmailContent {
        subject: template.msg_subject.replace("{event_title}", event_title),
        html: template
            .msg_html
            .replace("{registrants}", &registrant_lines)
            .replace("{event_title}", event_title),
        text: String::new(),
    }
}

/// Sends registrant notifications through CRM mail
pub struct EmailNotifier {
    crm: Arc<dyn CrmApi>,
    settings: Arc<SettingsService>,
}

impl EmailNotifier {
    pub fn new(crm: Arc<dyn CrmApi>, settings: Arc<SettingsService>) -> Self {
        Self { crm, settings }
    }

    /// Template by title, or by id when no title is given
    pub async fn message_template(
        &self,
        title: Option<&str>,
        id: Option<i64>,
    ) -> Result<Option<MessageTemplate>, SyncError> {
        let lookup = match (title.filter(|t| !t.is_empty()), id) {
            (Some(title), _) => TemplateLookup::Title(title.to_string()),
            (None, Some(id)) => TemplateLookup::Id(id),
            (None, None) => return Ok(None),
        };
        Ok(self.crm.message_template(lookup).await?)
    }

    /// Email the registrant list to each comma-separated recipient.
    ///
    /// Returns one status line per recipient.
    pub async fn send_registrants_email(
        &self,
        to_emails: &str,
        registrants: &[ZoomRegistrant],
        event_title: &str,
    ) -> Result<Vec<String>, SyncError> {
        if to_emails.trim().is_empty() || registrants.is_empty() {
            return Err(SyncError::MissingParams(
                "recipients and registrants are required".to_string(),
            ));
        }

        let template = self
            .message_template(None, self.settings.email_template_id())
            .await?
            .ok_or_else(|| SyncError::NotConfigured("Email Template Not found.".to_string()))?;
        let template_id = template
            .id
            .ok_or_else(|| SyncError::NotConfigured("Email Template has no id.".to_string()))?;

        let content = render_registrants_email(&template, registrants, event_title);

        let mut messages = Vec::new();
        for email in to_emails.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if self.send_email(email, &content, template_id).await {
                messages.push(format!("Email has been Sent to {}", email));
            } else {
                messages.push(format!("Email couldn't be Sent to {}", email));
            }
        }

        info!(
            "Sent registrants of '{}' to {} recipients",
            event_title,
            messages.len()
        );
        Ok(messages)
    }

    /// Dispatch one email; delivery failures are logged and reported as
    /// `false`
    pub async fn send_email(
        &self,
        email: &str,
        content: &EmailContent,
        template_id: i64,
    ) -> bool {
        if email.is_empty() || (content.html.is_empty() && content.text.is_empty()) {
            return false;
        }

        let from = match self.crm.default_from_address().await {
            Ok(from) => from,
            Err(err) => {
                warn!("Could not read default from address: {}", err);
                None
            }
        };

        let mail = MailParams {
            template_id,
            to_name: email.to_string(),
            to_email: email.to_string(),
            from,
            subject: content.subject.clone(),
            html: content.html.clone(),
            text: content.text.clone(),
        };

        match self.crm.send_email(mail).await {
            Ok(()) => true,
            Err(err) => {
                error!("Sending email to {} failed: {}", email, err);
                false
            }
        }
    }
}
