//! Survey service

use crate::db::repositories::SurveyRepository;
use crate::models::{
    CreateSurveyBlockInput, SurveyBlock, SurveyBlockKind, SurveyResponse, UpdateSurveyBlockInput,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;

/// One answer in a public submission
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyAnswer {
    pub block_id: i64,
    pub answer: String,
}

pub struct SurveyService {
    surveys: Arc<dyn SurveyRepository>,
}

impl SurveyService {
    pub fn new(surveys: Arc<dyn SurveyRepository>) -> Self {
        Self { surveys }
    }

    pub async fn create_block(&self, input: CreateSurveyBlockInput) -> Result<SurveyBlock> {
        if input.kind == SurveyBlockKind::Choice {
            validate_options(input.options.as_ref())?;
        }
        let mut block = SurveyBlock::new(input.question, input.kind);
        block.options = input.options;
        block.sort_order = input.sort_order;
        self.surveys.create_block(&block).await
    }

    pub async fn update_block(&self, id: i64, input: UpdateSurveyBlockInput) -> Result<SurveyBlock> {
        let mut block = self
            .surveys
            .get_block(id)
            .await?
            .context("Survey block not found")?;
        if let Some(question) = input.question {
            block.question = question;
        }
        if let Some(kind) = input.kind {
            block.kind = kind;
        }
        if let Some(options) = input.options {
            block.options = Some(options);
        }
        if let Some(sort_order) = input.sort_order {
            block.sort_order = sort_order;
        }
        if let Some(active) = input.active {
            block.active = active;
        }
        if block.kind == SurveyBlockKind::Choice {
            validate_options(block.options.as_ref())?;
        }
        self.surveys.update_block(&block).await
    }

    pub async fn delete_block(&self, id: i64) -> Result<()> {
        self.surveys.delete_block(id).await
    }

    pub async fn list_blocks(&self) -> Result<Vec<SurveyBlock>> {
        self.surveys.list_blocks(false).await
    }

    /// What the public RSVP page shows
    pub async fn active_blocks(&self) -> Result<Vec<SurveyBlock>> {
        self.surveys.list_blocks(true).await
    }

    /// Store a batch of answers. Inactive or unknown blocks are rejected;
    /// choice answers must match one of the block's options.
    pub async fn submit(&self, guest_id: Option<i64>, answers: Vec<SurveyAnswer>) -> Result<Vec<SurveyResponse>> {
        let mut stored = Vec::with_capacity(answers.len());
        for answer in answers {
            let block = self
                .surveys
                .get_block(answer.block_id)
                .await?
                .with_context(|| format!("Unknown survey block {}", answer.block_id))?;
            if !block.active {
                anyhow::bail!("Survey block {} is not active", block.id);
            }
            if block.kind == SurveyBlockKind::Choice && !is_valid_choice(&block, &answer.answer) {
                anyhow::bail!("'{}' is not an option for block {}", answer.answer, block.id);
            }
            stored.push(
                self.surveys
                    .add_response(block.id, guest_id, &answer.answer)
                    .await?,
            );
        }
        Ok(stored)
    }

    /// Every block with its responses, for the admin results view
    pub async fn results(&self) -> Result<Vec<(SurveyBlock, Vec<SurveyResponse>)>> {
        let blocks = self.surveys.list_blocks(false).await?;
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            let responses = self.surveys.list_responses(block.id).await?;
            out.push((block, responses));
        }
        Ok(out)
    }
}

fn validate_options(options: Option<&serde_json::Value>) -> Result<()> {
    match options.and_then(|v| v.as_array()) {
        Some(items) if !items.is_empty() && items.iter().all(|i| i.is_string()) => Ok(()),
        _ => anyhow::bail!("Choice blocks need a non-empty array of string options"),
    }
}

fn is_valid_choice(block: &SurveyBlock, answer: &str) -> bool {
    block
        .options
        .as_ref()
        .and_then(|v| v.as_array())
        .map(|items| items.iter().any(|i| i.as_str() == Some(answer)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxSurveyRepository;
    use crate::db::{create_test_pool, migrations};
    use serde_json::json;

    async fn service() -> SurveyService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SurveyService::new(SqlxSurveyRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_choice_block_requires_options() {
        let svc = service().await;
        let result = svc
            .create_block(CreateSurveyBlockInput {
                question: "Pick one".into(),
                kind: SurveyBlockKind::Choice,
                options: None,
                sort_order: 0,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_choice_answer_validated_against_options() {
        let svc = service().await;
        let block = svc
            .create_block(CreateSurveyBlockInput {
                question: "Song?".into(),
                kind: SurveyBlockKind::Choice,
                options: Some(json!(["Rock", "Pop"])),
                sort_order: 0,
            })
            .await
            .unwrap();

        let bad = svc
            .submit(
                None,
                vec![SurveyAnswer {
                    block_id: block.id,
                    answer: "Jazz".into(),
                }],
            )
            .await;
        assert!(bad.is_err());

        let ok = svc
            .submit(
                None,
                vec![SurveyAnswer {
                    block_id: block.id,
                    answer: "Rock".into(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_block_rejects_answers() {
        let svc = service().await;
        let block = svc
            .create_block(CreateSurveyBlockInput {
                question: "Q".into(),
                kind: SurveyBlockKind::Text,
                options: None,
                sort_order: 0,
            })
            .await
            .unwrap();
        svc.update_block(
            block.id,
            UpdateSurveyBlockInput {
                question: None,
                kind: None,
                options: None,
                sort_order: None,
                active: Some(false),
            },
        )
        .await
        .unwrap();

        let result = svc
            .submit(
                None,
                vec![SurveyAnswer {
                    block_id: block.id,
                    answer: "A".into(),
                }],
            )
            .await;
        assert!(result.is_err());
        assert!(svc.active_blocks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_results_groups_by_block() {
        let svc = service().await;
        let block = svc
            .create_block(CreateSurveyBlockInput {
                question: "Comments?".into(),
                kind: SurveyBlockKind::Text,
                options: None,
                sort_order: 0,
            })
            .await
            .unwrap();
        svc.submit(
            None,
            vec![SurveyAnswer {
                block_id: block.id,
                answer: "Lovely".into(),
            }],
        )
        .await
        .unwrap();

        let results = svc.results().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.len(), 1);
    }
}
