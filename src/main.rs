use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use prevent_core::{core_config_from_env_values, FileSnapshotStore};
use prevent_providers::{http_client, ClinCalcClient, MdCalcClient};

/// Main entry point for the PREVENT gateway
///
/// Resolves configuration once, builds both upstream clients and serves the
/// REST API (with OpenAPI/Swagger UI).
///
/// # Environment Variables
/// - `PREVENT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `MDCALC_URL`: MdCalc calculate endpoint
/// - `CLINCALC_URL`: ClinCalc PREVENT form page
/// - `ASSESSMENT_DATA_DIR`: Directory for assessment snapshots (default: "assessment_data")
/// - `API_KEY`: when set, required as `x-api-key` on every `/api/v1` route
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - an upstream URL or the data directory is invalid,
/// - the HTTP client cannot be built, or
/// - the server address cannot be bound or the server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prevent_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("prevent_core=info".parse()?)
                .add_directive("prevent_providers=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("PREVENT_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = core_config_from_env_values(
        std::env::var("MDCALC_URL").ok(),
        std::env::var("CLINCALC_URL").ok(),
        std::env::var("ASSESSMENT_DATA_DIR").ok(),
    )?;
    let api_key = std::env::var("API_KEY").ok();
    if api_key.is_none() {
        tracing::warn!("API_KEY is not set; /api/v1 routes are open");
    }

    tracing::info!(
        mdcalc = cfg.mdcalc_url(),
        clincalc = cfg.clincalc_url(),
        data_dir = %cfg.assessment_data_dir().display(),
        "++ Resolved configuration"
    );

    let http = http_client()?;
    let state = AppState::new(
        MdCalcClient::new(http.clone(), cfg.mdcalc_url()),
        ClinCalcClient::new(http, cfg.clincalc_url()),
        Arc::new(FileSnapshotStore::new(cfg.assessment_data_dir())),
    )
    .with_api_key(api_key);

    api_rest::serve(&rest_addr, state).await
}
