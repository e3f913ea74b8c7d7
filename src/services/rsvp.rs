//! RSVP service
//!
//! Applies a public submission to a guest group: status transition on the
//! primary guest, cascade to the plus-one, and plus-one insert/update/delete
//! driven by the submitted name.

use crate::db::repositories::GuestRepository;
use crate::models::{Guest, RsvpStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Public submission body, already validated for types by the API layer
#[derive(Debug, Clone, Default)]
pub struct RsvpSubmission {
    pub attending: Option<bool>,
    pub plus_one_name: Option<String>,
    pub dietary: Option<String>,
    pub notes: Option<String>,
    pub plus_one_dietary: Option<String>,
}

/// Primary guest plus the optional linked plus-one
#[derive(Debug, Clone, serde::Serialize)]
pub struct RsvpView {
    pub guest: Guest,
    pub plus_one: Option<Guest>,
}

#[derive(Debug, thiserror::Error)]
pub enum RsvpError {
    #[error("Unknown RSVP code")]
    UnknownCode,
    #[error("The RSVP deadline has passed")]
    DeadlinePassed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct RsvpService {
    guests: Arc<dyn GuestRepository>,
}

impl RsvpService {
    pub fn new(guests: Arc<dyn GuestRepository>) -> Self {
        Self { guests }
    }

    /// Guest group for the public RSVP page
    pub async fn lookup(&self, code: &str) -> Result<RsvpView, RsvpError> {
        let guest = self
            .guests
            .get_primary_by_code(code)
            .await?
            .ok_or(RsvpError::UnknownCode)?;
        let plus_one = self.guests.get_dependent(guest.id).await?;
        Ok(RsvpView { guest, plus_one })
    }

    /// Apply a submission. Nothing is written when the code is unknown or
    /// the deadline has passed.
    pub async fn submit(
        &self,
        code: &str,
        submission: &RsvpSubmission,
        now: DateTime<Utc>,
    ) -> Result<RsvpView, RsvpError> {
        let mut guest = self
            .guests
            .get_primary_by_code(code)
            .await?
            .ok_or(RsvpError::UnknownCode)?;

        if guest.deadline_passed(now) {
            return Err(RsvpError::DeadlinePassed);
        }

        if let Some(attending) = submission.attending {
            guest.status = if attending {
                RsvpStatus::Attending
            } else {
                RsvpStatus::NotAttending
            };
        }
        if let Some(dietary) = &submission.dietary {
            guest.dietary = Some(dietary.clone());
        }
        if let Some(notes) = &submission.notes {
            guest.notes = Some(notes.clone());
        }
        guest.responded_at = Some(now);
        let guest = self.guests.update(&guest).await?;

        let plus_one = self.apply_plus_one(&guest, submission).await?;

        Ok(RsvpView { guest, plus_one })
    }

    async fn apply_plus_one(
        &self,
        guest: &Guest,
        submission: &RsvpSubmission,
    ) -> Result<Option<Guest>> {
        let existing = self.guests.get_dependent(guest.id).await?;

        // Plus-one fields are ignored when the group has no allowance.
        if !guest.plus_one_allowed {
            return Ok(existing);
        }

        let existing = match submission.plus_one_name.as_deref().map(str::trim) {
            Some("") => {
                if let Some(dep) = existing {
                    self.guests.delete(dep.id).await?;
                }
                None
            }
            Some(name) => match existing {
                Some(mut dep) => {
                    dep.name = name.to_string();
                    if let Some(dietary) = &submission.plus_one_dietary {
                        dep.dietary = Some(dietary.clone());
                    }
                    Some(self.guests.update(&dep).await?)
                }
                None => {
                    let mut dep = Guest::new_dependent(guest, name.to_string());
                    if let Some(dietary) = &submission.plus_one_dietary {
                        dep.dietary = Some(dietary.clone());
                    }
                    Some(self.guests.create(&dep).await?)
                }
            },
            None => existing,
        };

        // An attending primary takes the plus-one along.
        if guest.status == RsvpStatus::Attending {
            if let Some(mut dep) = existing {
                if dep.status != RsvpStatus::Attending {
                    dep.status = RsvpStatus::Attending;
                    return Ok(Some(self.guests.update(&dep).await?));
                }
                return Ok(Some(dep));
            }
        }
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxGuestRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn service() -> (RsvpService, Arc<dyn GuestRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxGuestRepository::boxed(pool);
        (RsvpService::new(repo.clone()), repo)
    }

    async fn seed_primary(repo: &Arc<dyn GuestRepository>, plus_one_allowed: bool) -> Guest {
        let mut guest = Guest::new_primary("AB12CD".into(), "Jane".into(), None);
        guest.plus_one_allowed = plus_one_allowed;
        repo.create(&guest).await.unwrap()
    }

    #[tokio::test]
    async fn test_attend_with_new_plus_one_inserts_attending_dependent() {
        let (svc, repo) = service().await;
        seed_primary(&repo, true).await;

        let submission = RsvpSubmission {
            attending: Some(true),
            plus_one_name: Some("John".into()),
            ..Default::default()
        };
        let view = svc.submit("AB12CD", &submission, Utc::now()).await.unwrap();

        assert_eq!(view.guest.status, RsvpStatus::Attending);
        assert!(view.guest.responded_at.is_some());
        let dep = view.plus_one.unwrap();
        assert_eq!(dep.name, "John");
        assert_eq!(dep.status, RsvpStatus::Attending);
        assert_eq!(dep.code, "AB12CD");
    }

    #[tokio::test]
    async fn test_decline_sets_not_attending() {
        let (svc, repo) = service().await;
        seed_primary(&repo, false).await;

        let submission = RsvpSubmission {
            attending: Some(false),
            dietary: Some("vegan".into()),
            ..Default::default()
        };
        let view = svc.submit("AB12CD", &submission, Utc::now()).await.unwrap();
        assert_eq!(view.guest.status, RsvpStatus::NotAttending);
        assert_eq!(view.guest.dietary.as_deref(), Some("vegan"));
    }

    #[tokio::test]
    async fn test_absent_attending_leaves_status_unchanged() {
        let (svc, repo) = service().await;
        seed_primary(&repo, false).await;

        let submission = RsvpSubmission {
            notes: Some("late arrival".into()),
            ..Default::default()
        };
        let view = svc.submit("AB12CD", &submission, Utc::now()).await.unwrap();
        assert_eq!(view.guest.status, RsvpStatus::Pending);
        assert_eq!(view.guest.notes.as_deref(), Some("late arrival"));
    }

    #[tokio::test]
    async fn test_empty_plus_one_name_deletes_dependent() {
        let (svc, repo) = service().await;
        let primary = seed_primary(&repo, true).await;
        repo.create(&Guest::new_dependent(&primary, "John".into()))
            .await
            .unwrap();

        let submission = RsvpSubmission {
            plus_one_name: Some("".into()),
            ..Default::default()
        };
        let view = svc.submit("AB12CD", &submission, Utc::now()).await.unwrap();
        assert!(view.plus_one.is_none());
        assert!(repo.get_dependent(primary.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plus_one_ignored_without_allowance() {
        let (svc, repo) = service().await;
        let primary = seed_primary(&repo, false).await;

        let submission = RsvpSubmission {
            attending: Some(true),
            plus_one_name: Some("John".into()),
            ..Default::default()
        };
        let view = svc.submit("AB12CD", &submission, Utc::now()).await.unwrap();
        assert!(view.plus_one.is_none());
        assert!(repo.get_dependent(primary.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deadline_passed_rejects_without_mutation() {
        let (svc, repo) = service().await;
        let mut primary = seed_primary(&repo, false).await;
        primary.rsvp_deadline = Some(Utc::now() - Duration::days(1));
        repo.update(&primary).await.unwrap();

        let submission = RsvpSubmission {
            attending: Some(true),
            ..Default::default()
        };
        let err = svc
            .submit("AB12CD", &submission, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RsvpError::DeadlinePassed));

        let unchanged = repo.get_primary_by_code("AB12CD").await.unwrap().unwrap();
        assert_eq!(unchanged.status, RsvpStatus::Pending);
        assert!(unchanged.responded_at.is_none());
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let (svc, _) = service().await;
        let err = svc.lookup("NOPE42").await.unwrap_err();
        assert!(matches!(err, RsvpError::UnknownCode));
    }

    #[tokio::test]
    async fn test_plus_one_rename_keeps_single_dependent() {
        let (svc, repo) = service().await;
        let primary = seed_primary(&repo, true).await;
        repo.create(&Guest::new_dependent(&primary, "Old Name".into()))
            .await
            .unwrap();

        let submission = RsvpSubmission {
            plus_one_name: Some("New Name".into()),
            ..Default::default()
        };
        let view = svc.submit("AB12CD", &submission, Utc::now()).await.unwrap();
        assert_eq!(view.plus_one.unwrap().name, "New Name");

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
