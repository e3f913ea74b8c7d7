//! Template service

use crate::db::repositories::TemplateRepository;
use crate::models::{CreateTemplateInput, Template, UpdateTemplateInput};
use crate::render::{render, Variables};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct TemplateService {
    templates: Arc<dyn TemplateRepository>,
}

impl TemplateService {
    pub fn new(templates: Arc<dyn TemplateRepository>) -> Self {
        Self { templates }
    }

    pub async fn create(&self, input: CreateTemplateInput) -> Result<Template> {
        if self.templates.exists(&input.name, &input.locale).await? {
            anyhow::bail!(
                "Template '{}' already exists for locale '{}'",
                input.name,
                input.locale
            );
        }
        self.templates
            .create(&Template::new(
                input.name,
                input.locale,
                input.subject,
                input.body,
            ))
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Template>> {
        self.templates.get_by_id(id).await
    }

    pub async fn list(&self) -> Result<Vec<Template>> {
        self.templates.list().await
    }

    pub async fn update(&self, id: i64, input: UpdateTemplateInput) -> Result<Template> {
        let mut template = self
            .templates
            .get_by_id(id)
            .await?
            .context("Template not found")?;
        if let Some(subject) = input.subject {
            template.subject = subject;
        }
        if let Some(body) = input.body {
            template.body = body;
        }
        self.templates.update(&template).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.templates.delete(id).await
    }

    /// Render arbitrary subject/body with caller-supplied variables, for the
    /// admin preview pane.
    pub fn preview(&self, subject: &str, body: &str, vars: &Variables) -> (String, String) {
        (render(subject, vars), render(body, vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxTemplateRepository;
    use crate::db::{create_test_pool, migrations};
    use serde_json::json;

    async fn service() -> TemplateService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        TemplateService::new(SqlxTemplateRepository::boxed(pool))
    }

    fn input(name: &str, locale: &str) -> CreateTemplateInput {
        CreateTemplateInput {
            name: name.into(),
            locale: locale.into(),
            subject: "S".into(),
            body: "B".into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_locale_rejected() {
        let svc = service().await;
        svc.create(input("invite", "en")).await.unwrap();
        assert!(svc.create(input("invite", "en")).await.is_err());
        // Same name, other locale is fine.
        svc.create(input("invite", "de")).await.unwrap();
    }

    #[tokio::test]
    async fn test_preview_renders_conditionals() {
        let svc = service().await;
        let mut vars = Variables::new();
        vars.insert("name".into(), json!("Ada"));
        vars.insert("plus_one_allowed".into(), json!(true));

        let (subject, body) = svc.preview(
            "Hi {{name}}",
            "{{#if plus_one_allowed}}Bring a guest!{{else}}Just you.{{/if}}",
            &vars,
        );
        assert_eq!(subject, "Hi Ada");
        assert_eq!(body, "Bring a guest!");
    }
}
