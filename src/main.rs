//! rsvply - self-hosted wedding RSVP and guest management

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rsvply::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxGuestRepository, SqlxMessageRepository, SqlxPageRepository, SqlxSurveyRepository,
            SqlxTemplateRepository,
        },
    },
    services::{
        spawn_scheduler, CampaignService, GuestService, Mailer, PageService, RsvpService,
        SurveyService, TemplateService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rsvply=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting rsvply...");

    // Load configuration
    let config = Arc::new(Config::load_with_env(Path::new("config.yml"))?);
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Repositories
    let guest_repo = SqlxGuestRepository::boxed(pool.clone());
    let template_repo = SqlxTemplateRepository::boxed(pool.clone());
    let message_repo = SqlxMessageRepository::boxed(pool.clone());
    let page_repo = SqlxPageRepository::boxed(pool.clone());
    let survey_repo = SqlxSurveyRepository::boxed(pool.clone());

    // Services
    let mailer = Arc::new(Mailer::new(config.email.clone())?);
    if !mailer.is_enabled() {
        tracing::warn!("Email sending is disabled; outbound mail will be logged and dropped");
    }
    let campaign_service = Arc::new(CampaignService::new(
        message_repo,
        guest_repo.clone(),
        template_repo.clone(),
        mailer,
    ));
    let state = AppState {
        config: config.clone(),
        pool,
        rsvp_service: Arc::new(RsvpService::new(guest_repo.clone())),
        guest_service: Arc::new(GuestService::new(guest_repo, config.admin.code_length)),
        template_service: Arc::new(TemplateService::new(template_repo)),
        campaign_service: campaign_service.clone(),
        page_service: Arc::new(PageService::new(page_repo)),
        survey_service: Arc::new(SurveyService::new(survey_repo)),
    };

    if state.config.admin.token.is_empty() {
        tracing::warn!("No admin token configured; the admin API is disabled");
    }

    // Background scheduler for scheduled campaigns
    spawn_scheduler(campaign_service);

    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
