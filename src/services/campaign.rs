//! Email campaign service
//!
//! A campaign's subject and body are templates rendered per recipient with
//! that guest's variables. Delivery status is tracked per recipient; a failed
//! recipient is marked failed with the provider error and never retried.

use crate::db::repositories::{GuestRepository, MessageRepository, TemplateRepository};
use crate::models::{
    Guest, Message, MessageRecipient, MessageStatus, RecipientStatus, RsvpStatus,
    UpdateMessageInput,
};
use crate::render::{render, Variables};
use crate::services::Mailer;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Template name looked up for the post-submission confirmation email
const CONFIRMATION_TEMPLATE: &str = "rsvp_confirmation";

const SCHEDULER_TICK: Duration = Duration::from_secs(60);

pub struct CampaignService {
    messages: Arc<dyn MessageRepository>,
    guests: Arc<dyn GuestRepository>,
    templates: Arc<dyn TemplateRepository>,
    mailer: Arc<Mailer>,
}

impl CampaignService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        guests: Arc<dyn GuestRepository>,
        templates: Arc<dyn TemplateRepository>,
        mailer: Arc<Mailer>,
    ) -> Self {
        Self {
            messages,
            guests,
            templates,
            mailer,
        }
    }

    pub async fn create(&self, subject: String, body: String) -> Result<Message> {
        self.messages.create(&Message::new(subject, body)).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Message>> {
        self.messages.get_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<Message>> {
        self.messages.list().await
    }

    pub async fn update(&self, id: i64, input: UpdateMessageInput) -> Result<Message> {
        let mut message = self
            .messages
            .get_by_id(id)
            .await?
            .context("Message not found")?;
        if message.status == MessageStatus::Sent {
            anyhow::bail!("Cannot edit a sent campaign");
        }
        if let Some(subject) = input.subject {
            message.subject = subject;
        }
        if let Some(body) = input.body {
            message.body = body;
        }
        if let Some(at) = input.scheduled_at {
            message.scheduled_at = Some(at);
        }
        self.messages.update(&message).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.messages.delete(id).await
    }

    pub async fn recipients(&self, id: i64) -> Result<Vec<MessageRecipient>> {
        self.messages.list_recipients(id).await
    }

    /// Mark a campaign scheduled for a point in time; the background task
    /// picks it up once the time arrives.
    pub async fn schedule(&self, id: i64, at: DateTime<Utc>) -> Result<Message> {
        let mut message = self
            .messages
            .get_by_id(id)
            .await?
            .context("Message not found")?;
        if message.status != MessageStatus::Draft && message.status != MessageStatus::Scheduled {
            anyhow::bail!("Only draft campaigns can be scheduled");
        }
        message.status = MessageStatus::Scheduled;
        message.scheduled_at = Some(at);
        self.messages.update(&message).await
    }

    /// Send a campaign to every guest with an email address, now.
    ///
    /// A persistence error mid-send puts the message back into its previous
    /// status so it stays reachable through send/schedule.
    pub async fn send(&self, id: i64) -> Result<Message> {
        let mut message = self
            .messages
            .get_by_id(id)
            .await?
            .context("Message not found")?;
        if message.status == MessageStatus::Sent || message.status == MessageStatus::Sending {
            anyhow::bail!("Campaign already sent");
        }

        let previous = message.status;
        message.status = MessageStatus::Sending;
        message = self.messages.update(&message).await?;

        if let Err(err) = self.deliver(&message).await {
            message.status = previous;
            self.messages.update(&message).await?;
            return Err(err);
        }

        message.status = MessageStatus::Sent;
        message.sent_at = Some(Utc::now());
        self.messages.update(&message).await
    }

    async fn deliver(&self, message: &Message) -> Result<()> {
        let recipients = self.guests.list_recipients().await?;
        tracing::info!(
            message_id = message.id,
            count = recipients.len(),
            "Sending campaign"
        );

        for guest in recipients {
            let Some(email) = guest.email.clone() else {
                continue;
            };
            let recipient_id = self.messages.add_recipient(message.id, guest.id, &email).await?;

            let vars = self.guest_variables(&guest).await?;
            let subject = render(&message.subject, &vars);
            let body = render(&message.body, &vars);

            match self.mailer.send(&email, &subject, &body).await {
                Ok(()) => {
                    self.messages
                        .mark_recipient(recipient_id, RecipientStatus::Sent, None)
                        .await?;
                }
                Err(err) => {
                    tracing::warn!(message_id = message.id, email, error = %err, "Recipient failed");
                    self.messages
                        .mark_recipient(recipient_id, RecipientStatus::Failed, Some(&err.to_string()))
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Render the campaign with sample variables and send it to one address.
    pub async fn send_test(&self, id: i64, to: &str) -> Result<()> {
        let message = self
            .messages
            .get_by_id(id)
            .await?
            .context("Message not found")?;
        let vars = sample_variables();
        let subject = render(&message.subject, &vars);
        let body = render(&message.body, &vars);
        self.mailer.send(to, &subject, &body).await
    }

    /// Scheduler entry point: send everything whose time has come.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.messages.list_due(now).await?;
        let count = due.len();
        for message in due {
            if let Err(err) = self.send(message.id).await {
                tracing::error!(message_id = message.id, error = %err, "Scheduled send failed");
            }
        }
        Ok(count)
    }

    /// Post-submission confirmation. Callers spawn this; a missing template
    /// or provider failure only logs.
    pub async fn send_confirmation(&self, guest: &Guest) {
        let Some(email) = guest.email.clone() else {
            return;
        };
        let template = match self.templates.get_by_name(CONFIRMATION_TEMPLATE, "en").await {
            Ok(Some(t)) => t,
            Ok(None) => {
                tracing::debug!("No confirmation template configured, skipping");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load confirmation template");
                return;
            }
        };

        let vars = match self.guest_variables(guest).await {
            Ok(vars) => vars,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to build confirmation variables");
                return;
            }
        };
        let subject = render(&template.subject, &vars);
        let body = render(&template.body, &vars);
        if let Err(err) = self.mailer.send(&email, &subject, &body).await {
            tracing::warn!(guest_id = guest.id, error = %err, "Confirmation email failed");
        }
    }

    async fn guest_variables(&self, guest: &Guest) -> Result<Variables> {
        let plus_one = self.guests.get_dependent(guest.id).await?;
        Ok(build_variables(guest, plus_one.as_ref()))
    }
}

/// Variables available to campaign and confirmation templates
pub fn build_variables(guest: &Guest, plus_one: Option<&Guest>) -> Variables {
    let mut vars = Variables::new();
    vars.insert("name".into(), json!(guest.name));
    vars.insert("code".into(), json!(guest.code));
    vars.insert(
        "attending".into(),
        json!(guest.status == RsvpStatus::Attending),
    );
    vars.insert("status".into(), json!(guest.status.to_string()));
    vars.insert("plus_one_allowed".into(), json!(guest.plus_one_allowed));
    vars.insert(
        "plus_one_name".into(),
        json!(plus_one.map(|p| p.name.clone()).unwrap_or_default()),
    );
    vars.insert(
        "dietary".into(),
        json!(guest.dietary.clone().unwrap_or_default()),
    );
    vars
}

/// Placeholder guest used for template previews and test sends
pub fn sample_variables() -> Variables {
    let mut guest = Guest::new_primary("TEST42".into(), "Test Guest".into(), None);
    guest.plus_one_allowed = true;
    guest.status = RsvpStatus::Attending;
    build_variables(&guest, None)
}

/// Background task polling for due scheduled campaigns.
pub fn spawn_scheduler(service: Arc<CampaignService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SCHEDULER_TICK);
        loop {
            interval.tick().await;
            match service.run_due(Utc::now()).await {
                Ok(0) => {}
                Ok(sent) => tracing::info!(sent, "Scheduler dispatched campaigns"),
                Err(err) => tracing::error!(error = %err, "Scheduler tick failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::db::repositories::{
        SqlxGuestRepository, SqlxMessageRepository, SqlxTemplateRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::Template;
    use chrono::Duration as ChronoDuration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service_with(server: &MockServer) -> (CampaignService, Arc<dyn GuestRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let guests = SqlxGuestRepository::boxed(pool.clone());
        let mailer = Arc::new(
            Mailer::new(EmailConfig {
                enabled: true,
                api_url: format!("{}/v1/send", server.uri()),
                api_key: "k".into(),
                from_email: "couple@example.com".into(),
                from_name: "Us".into(),
            })
            .unwrap(),
        );
        let service = CampaignService::new(
            SqlxMessageRepository::boxed(pool.clone()),
            guests.clone(),
            SqlxTemplateRepository::boxed(pool),
            mailer,
        );
        (service, guests)
    }

    async fn seed_guest(guests: &Arc<dyn GuestRepository>, name: &str, email: Option<&str>) -> Guest {
        let guest = Guest::new_primary(
            format!("{}42CD", &name[..2].to_uppercase()),
            name.into(),
            email.map(String::from),
        );
        guests.create(&guest).await.unwrap()
    }

    #[tokio::test]
    async fn test_send_renders_per_recipient_and_tracks_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/send"))
            .and(body_partial_json(serde_json::json!({"subject": "Hi Ada"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/send"))
            .and(body_partial_json(serde_json::json!({"subject": "Hi Bob"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (svc, guests) = service_with(&server).await;
        seed_guest(&guests, "Ada", Some("ada@example.com")).await;
        seed_guest(&guests, "Bob", Some("bob@example.com")).await;
        seed_guest(&guests, "NoMail", None).await;

        let msg = svc.create("Hi {{name}}".into(), "Code: {{code}}".into()).await.unwrap();
        let sent = svc.send(msg.id).await.unwrap();

        assert_eq!(sent.status, MessageStatus::Sent);
        assert!(sent.sent_at.is_some());
        let recipients = svc.recipients(msg.id).await.unwrap();
        assert_eq!(recipients.len(), 2);
        assert!(recipients
            .iter()
            .all(|r| r.status == RecipientStatus::Sent));
    }

    #[tokio::test]
    async fn test_failed_recipient_marked_with_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/send"))
            .respond_with(ResponseTemplate::new(500).set_body_string("provider down"))
            .mount(&server)
            .await;

        let (svc, guests) = service_with(&server).await;
        seed_guest(&guests, "Ada", Some("ada@example.com")).await;

        let msg = svc.create("S".into(), "B".into()).await.unwrap();
        let sent = svc.send(msg.id).await.unwrap();

        // Campaign completes even when every recipient fails.
        assert_eq!(sent.status, MessageStatus::Sent);
        let recipients = svc.recipients(msg.id).await.unwrap();
        assert_eq!(recipients[0].status, RecipientStatus::Failed);
        assert!(recipients[0].error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_double_send_rejected() {
        let server = MockServer::start().await;
        let (svc, _) = service_with(&server).await;
        let msg = svc.create("S".into(), "B".into()).await.unwrap();
        svc.send(msg.id).await.unwrap();
        assert!(svc.send(msg.id).await.is_err());
    }

    #[tokio::test]
    async fn test_midsend_error_releases_campaign() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let guests = SqlxGuestRepository::boxed(pool.clone());
        let mailer = Arc::new(
            Mailer::new(EmailConfig {
                enabled: true,
                api_url: format!("{}/v1/send", server.uri()),
                api_key: "k".into(),
                from_email: "couple@example.com".into(),
                from_name: "Us".into(),
            })
            .unwrap(),
        );
        let svc = CampaignService::new(
            SqlxMessageRepository::boxed(pool.clone()),
            guests.clone(),
            SqlxTemplateRepository::boxed(pool.clone()),
            mailer,
        );
        seed_guest(&guests, "Ada", Some("ada@example.com")).await;

        let msg = svc.create("S".into(), "B".into()).await.unwrap();
        svc.schedule(msg.id, Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap();

        // Recipient bookkeeping fails once the table is gone.
        pool.execute("DROP TABLE message_recipients").await.unwrap();
        assert!(svc.send(msg.id).await.is_err());

        // The campaign falls back to scheduled instead of sticking in sending.
        let reloaded = svc.get(msg.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, MessageStatus::Scheduled);

        // A draft campaign returns to draft after the same failure.
        let draft = svc.create("S2".into(), "B".into()).await.unwrap();
        assert!(svc.send(draft.id).await.is_err());
        assert_eq!(
            svc.get(draft.id).await.unwrap().unwrap().status,
            MessageStatus::Draft
        );
    }

    #[tokio::test]
    async fn test_run_due_sends_scheduled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (svc, guests) = service_with(&server).await;
        seed_guest(&guests, "Ada", Some("ada@example.com")).await;

        let msg = svc.create("S".into(), "B".into()).await.unwrap();
        svc.schedule(msg.id, Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap();

        let dispatched = svc.run_due(Utc::now()).await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(
            svc.get(msg.id).await.unwrap().unwrap().status,
            MessageStatus::Sent
        );

        // Nothing left on the next tick.
        assert_eq!(svc.run_due(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_confirmation_skips_without_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (svc, guests) = service_with(&server).await;
        let guest = seed_guest(&guests, "Ada", Some("ada@example.com")).await;
        svc.send_confirmation(&guest).await;
    }

    #[tokio::test]
    async fn test_confirmation_uses_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"subject": "Thanks Ada"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let templates = SqlxTemplateRepository::boxed(pool.clone());
        templates
            .create(&Template::new(
                "rsvp_confirmation".into(),
                "en".into(),
                "Thanks {{name}}".into(),
                "{{#if attending}}See you there!{{else}}Sorry you can't make it.{{/if}}".into(),
            ))
            .await
            .unwrap();
        let guests = SqlxGuestRepository::boxed(pool.clone());
        let mailer = Arc::new(
            Mailer::new(EmailConfig {
                enabled: true,
                api_url: format!("{}/v1/send", server.uri()),
                api_key: "k".into(),
                from_email: "couple@example.com".into(),
                from_name: "Us".into(),
            })
            .unwrap(),
        );
        let svc = CampaignService::new(
            SqlxMessageRepository::boxed(pool),
            guests.clone(),
            templates,
            mailer,
        );

        let guest = guests
            .create(&Guest::new_primary(
                "AD42CD".into(),
                "Ada".into(),
                Some("ada@example.com".into()),
            ))
            .await
            .unwrap();
        svc.send_confirmation(&guest).await;
    }
}
