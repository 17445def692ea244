// F1 Calendar v0.1
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use f1_calendar::config::AppConfig;
use f1_calendar::routes;
use f1_calendar::routes::sensors::AppState;
use f1_calendar::services;
use f1_calendar::services::jolpica::ScheduleClient;
use f1_calendar::services::poller::{PollerContext, ScheduleState, SharedScheduleState};
use f1_calendar::services::publisher::StatePublisher;

/// F1 Calendar API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "F1 Calendar API",
        version = "0.1.0",
        description = "Formula 1 season calendar. Polls the Jolpica (Ergast) current-season \
            schedule, selects the previous, current and next race, converts session times \
            into the display timezone and publishes the three races as Home Assistant sensors.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Sensors", description = "Previous / current / next race sensors"),
        (name = "Poller", description = "Background schedule poller status"),
    ),
    paths(
        routes::health::health_check,
        routes::sensors::list_sensors,
        routes::sensors::get_sensor,
        routes::poller::get_poller_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::sensors::SensorView,
            services::poller::PollerStatus,
            services::poller::SensorPublishStatus,
            services::selector::SkippedRaceInfo,
            services::timing::RaceStatus,
            f1_calendar::errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

/// Default log filter when neither `RUST_LOG` nor `LOG_LEVEL` is set.
const DEFAULT_LOG_FILTER: &str = "f1_calendar=info,tower_http=info";

fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match std::env::var("LOG_LEVEL") {
            Ok(level) => format!("f1_calendar={},tower_http={}", level, level)
                .parse()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
            Err(_) => DEFAULT_LOG_FILTER.into(),
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Interrupt received, shutting down");
}

#[tokio::main]
async fn main() {
    // Initialize tracing (LOG_FORMAT=json for structured output)
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(log_filter())
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting F1 Calendar");
    tracing::info!(
        "Update interval: {} seconds, display timezone: {}",
        config.update_interval_secs,
        config
            .display_tz
            .map(|tz| tz.name().to_string())
            .unwrap_or_else(|| "UTC".to_string())
    );

    let client = ScheduleClient::new(&config.schedule_url).expect("Failed to build schedule client");

    let publisher = match &config.ha_token {
        Some(token) => Some(
            StatePublisher::new(&config.ha_url, &config.ha_fallback_url, token)
                .expect("Failed to build Home Assistant client"),
        ),
        None => {
            tracing::warn!(
                "No SUPERVISOR_TOKEN or HA_TOKEN set, Home Assistant publishing disabled"
            );
            None
        }
    };

    // Create shared schedule state and spawn background poller
    let schedule_state: SharedScheduleState =
        Arc::new(RwLock::new(ScheduleState::new(config.update_interval_secs)));
    tokio::spawn(services::poller::run_poller(
        PollerContext {
            client,
            publisher,
            display_tz: config.display_tz,
            update_interval_secs: config.update_interval_secs,
        },
        schedule_state.clone(),
    ));

    // Read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let sensor_routes = Router::new()
        .route("/api/v1/sensors", get(routes::sensors::list_sensors))
        .route("/api/v1/sensors/:kind", get(routes::sensors::get_sensor))
        .with_state(AppState {
            schedule: schedule_state.clone(),
            display_tz: config.display_tz,
        });

    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(schedule_state.clone());

    let poller_routes = Router::new()
        .route(
            "/api/v1/poller/status",
            get(routes::poller::get_poller_status),
        )
        .with_state(schedule_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(sensor_routes)
        .merge(poller_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server terminated unexpectedly");
}
