//! HTTP integration tests against the full router with an in-memory database.

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use rsvply::api::{build_router, AppState};
use rsvply::config::Config;
use rsvply::db::repositories::{
    GuestRepository, SqlxGuestRepository, SqlxMessageRepository, SqlxPageRepository,
    SqlxSurveyRepository, SqlxTemplateRepository,
};
use rsvply::db::{create_test_pool, migrations};
use rsvply::models::Guest;
use rsvply::services::{
    CampaignService, GuestService, Mailer, PageService, RsvpService, SurveyService,
    TemplateService,
};

const ADMIN_TOKEN: &str = "test-admin-token";

async fn test_server() -> (TestServer, Arc<dyn GuestRepository>) {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let mut config = Config::default();
    config.admin.token = ADMIN_TOKEN.to_string();
    let config = Arc::new(config);

    let guest_repo = SqlxGuestRepository::boxed(pool.clone());
    let template_repo = SqlxTemplateRepository::boxed(pool.clone());
    let mailer = Arc::new(Mailer::new(config.email.clone()).unwrap());
    let campaign_service = Arc::new(CampaignService::new(
        SqlxMessageRepository::boxed(pool.clone()),
        guest_repo.clone(),
        template_repo.clone(),
        mailer,
    ));

    let state = AppState {
        config: config.clone(),
        pool: pool.clone(),
        rsvp_service: Arc::new(RsvpService::new(guest_repo.clone())),
        guest_service: Arc::new(GuestService::new(guest_repo.clone(), config.admin.code_length)),
        template_service: Arc::new(TemplateService::new(template_repo)),
        campaign_service,
        page_service: Arc::new(PageService::new(SqlxPageRepository::boxed(pool.clone()))),
        survey_service: Arc::new(SurveyService::new(SqlxSurveyRepository::boxed(pool))),
    };

    (TestServer::new(build_router(state)).unwrap(), guest_repo)
}

async fn seed_guest(repo: &Arc<dyn GuestRepository>, code: &str, plus_one_allowed: bool) -> Guest {
    let mut guest = Guest::new_primary(code.into(), "Jane".into(), None);
    guest.plus_one_allowed = plus_one_allowed;
    repo.create(&guest).await.unwrap()
}

#[tokio::test]
async fn rsvp_attend_with_plus_one() {
    let (server, repo) = test_server().await;
    seed_guest(&repo, "AB12CD", true).await;

    let response = server
        .post("/api/rsvp")
        .json(&json!({
            "code": "AB12CD",
            "attending": true,
            "plus_one_name": "John",
        }))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "success": true }));

    let view = server.get("/api/rsvp/AB12CD").await;
    view.assert_status_ok();
    let body: Value = view.json();
    assert_eq!(body["guest"]["status"], "attending");
    assert_eq!(body["plus_one"]["name"], "John");
    assert_eq!(body["plus_one"]["status"], "attending");
}

#[tokio::test]
async fn rsvp_deadline_passed_is_403_without_mutation() {
    let (server, repo) = test_server().await;
    let mut guest = seed_guest(&repo, "AB12CD", false).await;
    guest.rsvp_deadline = Some(Utc::now() - Duration::days(1));
    repo.update(&guest).await.unwrap();

    let response = server
        .post("/api/rsvp")
        .json(&json!({ "code": "AB12CD", "attending": true }))
        .await;
    response.assert_status_forbidden();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "DEADLINE_PASSED");

    let unchanged = repo.get_primary_by_code("AB12CD").await.unwrap().unwrap();
    assert_eq!(unchanged.status.to_string(), "pending");
}

#[tokio::test]
async fn rsvp_non_boolean_attending_is_400() {
    let (server, repo) = test_server().await;
    seed_guest(&repo, "AB12CD", false).await;

    let response = server
        .post("/api/rsvp")
        .json(&json!({ "code": "AB12CD", "attending": "yes" }))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn rsvp_unknown_code_is_404() {
    let (server, _) = test_server().await;

    server.get("/api/rsvp/NOPE42").await.assert_status_not_found();
    server
        .post("/api/rsvp")
        .json(&json!({ "code": "NOPE42", "attending": true }))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn admin_requires_bearer_token() {
    let (server, _) = test_server().await;

    server
        .get("/api/admin/guests")
        .await
        .assert_status_unauthorized();
    server
        .get("/api/admin/guests")
        .authorization_bearer("wrong-token")
        .await
        .assert_status_unauthorized();
    server
        .get("/api/admin/guests")
        .authorization_bearer(ADMIN_TOKEN)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn admin_creates_guest_with_generated_code() {
    let (server, _) = test_server().await;

    let response = server
        .post("/api/admin/guests")
        .authorization_bearer(ADMIN_TOKEN)
        .json(&json!({ "name": "Ada", "email": "ada@example.com" }))
        .await;
    response.assert_status_ok();
    let guest: Value = response.json();
    assert_eq!(guest["code"].as_str().unwrap().len(), 6);
    assert_eq!(guest["status"], "pending");
}

#[tokio::test]
async fn pages_locale_filter() {
    let (server, _) = test_server().await;

    let page = server
        .post("/api/admin/pages")
        .authorization_bearer(ADMIN_TOKEN)
        .json(&json!({ "slug": "venue", "sort_order": 1 }))
        .await;
    page.assert_status_ok();
    let page_id = page.json::<Value>()["id"].as_i64().unwrap();

    for (locale, title) in [("en", "The Venue"), ("de", "Der Ort")] {
        server
            .put(&format!("/api/admin/pages/{}/translations", page_id))
            .authorization_bearer(ADMIN_TOKEN)
            .json(&json!({ "locale": locale, "title": title, "content": "..." }))
            .await
            .assert_status_ok();
    }

    let response = server.get("/api/pages/venue?locale=de").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let translations = body["translations"].as_array().unwrap();
    assert_eq!(translations.len(), 1);
    assert_eq!(translations[0]["title"], "Der Ort");
}

#[tokio::test]
async fn survey_public_flow() {
    let (server, repo) = test_server().await;
    seed_guest(&repo, "AB12CD", false).await;

    let block = server
        .post("/api/admin/survey/blocks")
        .authorization_bearer(ADMIN_TOKEN)
        .json(&json!({
            "question": "Song request?",
            "kind": "choice",
            "options": ["Rock", "Pop"],
        }))
        .await;
    block.assert_status_ok();
    let block_id = block.json::<Value>()["id"].as_i64().unwrap();

    let listed = server.get("/api/survey").await;
    listed.assert_status_ok();
    assert_eq!(listed.json::<Value>().as_array().unwrap().len(), 1);

    server
        .post("/api/survey/responses")
        .json(&json!({
            "code": "AB12CD",
            "answers": [{ "block_id": block_id, "answer": "Rock" }],
        }))
        .await
        .assert_status_ok();

    // Answer outside the options is rejected.
    server
        .post("/api/survey/responses")
        .json(&json!({
            "answers": [{ "block_id": block_id, "answer": "Jazz" }],
        }))
        .await
        .assert_status_bad_request();

    let results = server
        .get("/api/admin/survey/responses")
        .authorization_bearer(ADMIN_TOKEN)
        .await;
    results.assert_status_ok();
    let body: Value = results.json();
    assert_eq!(body[0]["responses"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn template_preview_renders_conditionals() {
    let (server, _) = test_server().await;

    let response = server
        .post("/api/admin/templates/preview")
        .authorization_bearer(ADMIN_TOKEN)
        .json(&json!({
            "subject": "Hi {{name}}",
            "body": "{{#if attending}}See you!{{else}}Sorry.{{/if}}",
            "variables": { "name": "Ada", "attending": true },
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["subject"], "Hi Ada");
    assert_eq!(body["body"], "See you!");
}
