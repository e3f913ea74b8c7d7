//! Guest administration service

use crate::db::repositories::GuestRepository;
use crate::models::{CreateGuestInput, Guest, UpdateGuestInput};
use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

/// Charset for RSVP codes. No lowercase so codes survive being read out loud
/// or typed from a paper invitation.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const MAX_CODE_ATTEMPTS: usize = 32;

pub struct GuestService {
    guests: Arc<dyn GuestRepository>,
    code_length: usize,
}

impl GuestService {
    pub fn new(guests: Arc<dyn GuestRepository>, code_length: usize) -> Self {
        Self {
            guests,
            code_length,
        }
    }

    /// Random code from [`CODE_CHARSET`]
    pub fn generate_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.code_length)
            .map(|_| {
                let idx = rng.gen_range(0..CODE_CHARSET.len());
                CODE_CHARSET[idx] as char
            })
            .collect()
    }

    /// Generate a code not currently assigned to any primary guest.
    async fn unique_code(&self) -> Result<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.generate_code();
            if !self.guests.code_exists(&code).await? {
                return Ok(code);
            }
        }
        anyhow::bail!(
            "Could not generate a unique code after {} attempts",
            MAX_CODE_ATTEMPTS
        )
    }

    pub async fn create(&self, input: CreateGuestInput) -> Result<Guest> {
        let code = self.unique_code().await?;
        let mut guest = Guest::new_primary(code, input.name, input.email);
        guest.plus_one_allowed = input.plus_one_allowed;
        guest.dietary = input.dietary;
        guest.notes = input.notes;
        guest.rsvp_deadline = input.rsvp_deadline;
        self.guests.create(&guest).await
    }

    /// Bulk create. Fails on the first guest that cannot be inserted;
    /// earlier rows stay.
    pub async fn import(&self, inputs: Vec<CreateGuestInput>) -> Result<Vec<Guest>> {
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(self.create(input).await?);
        }
        Ok(created)
    }

    /// Guest list as CSV for spreadsheet export
    pub async fn export_csv(&self) -> Result<String> {
        let guests = self.guests.list().await?;
        let mut out =
            String::from("code,name,email,is_primary,plus_one_allowed,status,dietary,notes\n");
        for g in guests {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                g.code,
                csv_field(&g.name),
                csv_field(g.email.as_deref().unwrap_or("")),
                g.is_primary,
                g.plus_one_allowed,
                g.status,
                csv_field(g.dietary.as_deref().unwrap_or("")),
                csv_field(g.notes.as_deref().unwrap_or("")),
            ));
        }
        Ok(out)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Guest>> {
        self.guests.get_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<Guest>> {
        self.guests.list().await
    }

    pub async fn update(&self, id: i64, input: UpdateGuestInput) -> Result<Guest> {
        let mut guest = self
            .guests
            .get_by_id(id)
            .await?
            .context("Guest not found")?;

        if let Some(name) = input.name {
            guest.name = name;
        }
        if let Some(email) = input.email {
            guest.email = Some(email);
        }
        if let Some(allowed) = input.plus_one_allowed {
            guest.plus_one_allowed = allowed;
        }
        if let Some(status) = input.status {
            guest.status = status
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid status: {}", status))?;
        }
        if let Some(dietary) = input.dietary {
            guest.dietary = Some(dietary);
        }
        if let Some(notes) = input.notes {
            guest.notes = Some(notes);
        }
        if let Some(deadline) = input.rsvp_deadline {
            guest.rsvp_deadline = Some(deadline);
        }
        guest.updated_at = Utc::now();
        self.guests.update(&guest).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.guests.delete(id).await
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxGuestRepository;
    use crate::db::{create_test_pool, migrations};

    async fn service() -> GuestService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        GuestService::new(SqlxGuestRepository::boxed(pool), 6)
    }

    fn input(name: &str) -> CreateGuestInput {
        CreateGuestInput {
            name: name.into(),
            email: None,
            plus_one_allowed: false,
            dietary: None,
            notes: None,
            rsvp_deadline: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_codes() {
        let svc = service().await;
        let a = svc.create(input("A")).await.unwrap();
        let b = svc.create(input("B")).await.unwrap();

        assert_eq!(a.code.len(), 6);
        assert_ne!(a.code, b.code);
        assert!(a.code.chars().all(|c| CODE_CHARSET.contains(&(c as u8))));
    }

    #[tokio::test]
    async fn test_import_creates_all() {
        let svc = service().await;
        let created = svc
            .import(vec![input("A"), input("B"), input("C")])
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(svc.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_status_validation() {
        let svc = service().await;
        let guest = svc.create(input("A")).await.unwrap();

        let result = svc
            .update(
                guest.id,
                UpdateGuestInput {
                    name: None,
                    email: None,
                    plus_one_allowed: None,
                    status: Some("maybe".into()),
                    dietary: None,
                    notes: None,
                    rsvp_deadline: None,
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_export_csv_quotes_commas() {
        let svc = service().await;
        let mut i = input("Doe, Jane");
        i.notes = Some("says \"hi\"".into());
        svc.create(i).await.unwrap();

        let csv = svc.export_csv().await.unwrap();
        assert!(csv.starts_with("code,name,email"));
        assert!(csv.contains("\"Doe, Jane\""));
        assert!(csv.contains("\"says \"\"hi\"\"\""));
    }
}
