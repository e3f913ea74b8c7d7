//! Guest model
//!
//! A guest group shares one RSVP code: a single primary guest plus zero or
//! more dependents (plus-one, kids) pointing at it via `parent_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RSVP status of a single guest row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    #[default]
    Pending,
    Attending,
    NotAttending,
}

impl std::fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Attending => write!(f, "attending"),
            Self::NotAttending => write!(f, "not_attending"),
        }
    }
}

impl std::str::FromStr for RsvpStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "attending" => Ok(Self::Attending),
            "not_attending" => Ok(Self::NotAttending),
            _ => Err(anyhow::anyhow!("Invalid RSVP status: {}", s)),
        }
    }
}

/// Guest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub id: i64,
    /// Opaque random token identifying the guest group for public lookup
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    pub is_primary: bool,
    /// Primary guest this row depends on, when not primary
    pub parent_id: Option<i64>,
    pub plus_one_allowed: bool,
    pub status: RsvpStatus,
    pub dietary: Option<String>,
    pub notes: Option<String>,
    pub rsvp_deadline: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Guest {
    /// New primary guest with a freshly generated code
    pub fn new_primary(code: String, name: String, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            code,
            name,
            email,
            is_primary: true,
            parent_id: None,
            plus_one_allowed: false,
            status: RsvpStatus::Pending,
            dietary: None,
            notes: None,
            rsvp_deadline: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// New dependent guest (plus-one) linked to a primary guest
    pub fn new_dependent(parent: &Guest, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            code: parent.code.clone(),
            name,
            email: None,
            is_primary: false,
            parent_id: Some(parent.id),
            plus_one_allowed: false,
            status: RsvpStatus::Pending,
            dietary: None,
            notes: None,
            rsvp_deadline: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the RSVP window has closed for this guest
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.rsvp_deadline, Some(deadline) if deadline < now)
    }
}

/// Input for creating a guest (admin)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGuestInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub plus_one_allowed: bool,
    #[serde(default)]
    pub dietary: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rsvp_deadline: Option<DateTime<Utc>>,
}

/// Input for updating a guest (admin)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGuestInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub plus_one_allowed: Option<bool>,
    pub status: Option<String>,
    pub dietary: Option<String>,
    pub notes: Option<String>,
    pub rsvp_deadline: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            RsvpStatus::Pending,
            RsvpStatus::Attending,
            RsvpStatus::NotAttending,
        ] {
            let parsed: RsvpStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("maybe".parse::<RsvpStatus>().is_err());
    }

    #[test]
    fn test_deadline_passed() {
        let now = Utc::now();
        let mut guest = Guest::new_primary("ABC123".into(), "Jane".into(), None);

        assert!(!guest.deadline_passed(now));

        guest.rsvp_deadline = Some(now + Duration::days(1));
        assert!(!guest.deadline_passed(now));

        guest.rsvp_deadline = Some(now - Duration::days(1));
        assert!(guest.deadline_passed(now));
    }

    #[test]
    fn test_dependent_inherits_code() {
        let mut primary = Guest::new_primary("XY12AB".into(), "Jane".into(), None);
        primary.id = 7;
        let dep = Guest::new_dependent(&primary, "Plus One".into());
        assert_eq!(dep.code, "XY12AB");
        assert_eq!(dep.parent_id, Some(7));
        assert!(!dep.is_primary);
        assert_eq!(dep.status, RsvpStatus::Pending);
    }
}
