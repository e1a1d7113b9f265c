use std::{sync::Arc, time::Duration};

use axum::http::{HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agenda_backend::{
    api,
    auth::AuthConfig,
    collaborators::{
        Collaborators, LogMeetingLinks, LogNotifier, MeetingLinkProvisioner,
        NotificationDispatcher, PgProfiles, ProfileProvider, WebhookMeetingLinks,
        WebhookNotifier,
    },
    config,
    scheduling::SchedulingService,
    store::PgBookingStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (dev convenience)
    let _ = dotenvy::dotenv();

    // Tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let cfg = config::Config::from_env()?;

    // Database pool
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&cfg.database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database connected and migrations applied");

    let profiles: Arc<dyn ProfileProvider> = Arc::new(PgProfiles::new(pool.clone()));
    let store = Arc::new(PgBookingStore::new(pool, Arc::clone(&profiles)));

    let mut collaborators = Collaborators::local();
    collaborators.notifier = match &cfg.notify_webhook_url {
        Some(url) => {
            tracing::info!("Notifications delivered to {}", url);
            Arc::new(WebhookNotifier::new(url)?) as Arc<dyn NotificationDispatcher>
        }
        None => Arc::new(LogNotifier),
    };
    collaborators.meetings = match &cfg.meeting_link_webhook_url {
        Some(url) => {
            tracing::info!("Meeting links provisioned via {}", url);
            Arc::new(WebhookMeetingLinks::new(url)?) as Arc<dyn MeetingLinkProvisioner>
        }
        None => Arc::new(LogMeetingLinks),
    };

    let state = AppState {
        scheduling: SchedulingService::new(store, collaborators, cfg.default_timezone.clone()),
        auth: AuthConfig {
            jwt_secret: cfg.jwt_secret.clone(),
            profiles,
            default_timezone: cfg.default_timezone.clone(),
        },
    };

    // CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(
            cfg.cors_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        );

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(cors),
    );

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("Listening on {}", cfg.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
