//! CMS page service

use crate::db::repositories::PageRepository;
use crate::models::{Page, PageTranslation, UpsertPageInput, UpsertTranslationInput};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct PageService {
    pages: Arc<dyn PageRepository>,
}

impl PageService {
    pub fn new(pages: Arc<dyn PageRepository>) -> Self {
        Self { pages }
    }

    /// Create a page, or update sort order when the slug already exists.
    pub async fn upsert(&self, input: UpsertPageInput) -> Result<Page> {
        match self.pages.get_by_slug(&input.slug).await? {
            Some(mut page) => {
                page.sort_order = input.sort_order;
                self.pages.update(&page).await
            }
            None => {
                self.pages
                    .create(&Page::new(input.slug, input.sort_order))
                    .await
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<Page>> {
        self.pages.list().await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        self.pages.get_by_slug(slug).await
    }

    /// Page restricted to one locale, for the public API's `?locale=` filter.
    /// Falls back to the full translation set when the locale is missing.
    pub async fn get_localized(&self, slug: &str, locale: Option<&str>) -> Result<Option<Page>> {
        let Some(mut page) = self.pages.get_by_slug(slug).await? else {
            return Ok(None);
        };
        if let Some(locale) = locale {
            let filtered: Vec<_> = page
                .translations
                .iter()
                .filter(|t| t.locale == locale)
                .cloned()
                .collect();
            if !filtered.is_empty() {
                page.translations = filtered;
            }
        }
        Ok(Some(page))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.pages.delete(id).await
    }

    pub async fn upsert_translation(
        &self,
        page_id: i64,
        input: UpsertTranslationInput,
    ) -> Result<PageTranslation> {
        self.pages
            .get_by_id(page_id)
            .await?
            .context("Page not found")?;
        self.pages
            .upsert_translation(page_id, &input.locale, &input.title, &input.content)
            .await
    }

    pub async fn delete_translation(&self, page_id: i64, locale: &str) -> Result<()> {
        self.pages.delete_translation(page_id, locale).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxPageRepository;
    use crate::db::{create_test_pool, migrations};

    async fn service() -> PageService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        PageService::new(SqlxPageRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_slug() {
        let svc = service().await;
        let first = svc
            .upsert(UpsertPageInput {
                slug: "venue".into(),
                sort_order: 1,
            })
            .await
            .unwrap();
        let second = svc
            .upsert(UpsertPageInput {
                slug: "venue".into(),
                sort_order: 5,
            })
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.sort_order, 5);
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_localized_filter_with_fallback() {
        let svc = service().await;
        let page = svc
            .upsert(UpsertPageInput {
                slug: "faq".into(),
                sort_order: 0,
            })
            .await
            .unwrap();
        svc.upsert_translation(
            page.id,
            UpsertTranslationInput {
                locale: "en".into(),
                title: "FAQ".into(),
                content: "...".into(),
            },
        )
        .await
        .unwrap();
        svc.upsert_translation(
            page.id,
            UpsertTranslationInput {
                locale: "de".into(),
                title: "Fragen".into(),
                content: "...".into(),
            },
        )
        .await
        .unwrap();

        let de = svc.get_localized("faq", Some("de")).await.unwrap().unwrap();
        assert_eq!(de.translations.len(), 1);
        assert_eq!(de.translations[0].title, "Fragen");

        // Unknown locale keeps everything rather than returning an empty page.
        let fr = svc.get_localized("faq", Some("fr")).await.unwrap().unwrap();
        assert_eq!(fr.translations.len(), 2);
    }

    #[tokio::test]
    async fn test_translation_requires_page() {
        let svc = service().await;
        let result = svc
            .upsert_translation(
                999,
                UpsertTranslationInput {
                    locale: "en".into(),
                    title: "T".into(),
                    content: "C".into(),
                },
            )
            .await;
        assert!(result.is_err());
    }
}
