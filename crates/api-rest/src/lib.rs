//! # API REST
//!
//! REST API for the PREVENT risk-assessment gateway.
//!
//! Handles:
//! - HTTP endpoints with axum (provider pass-through routes, profile and intake
//!   records, the composite risk assessment)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON envelopes, status mapping, CORS, API key)
//!
//! Uses `api-shared` for wire types, `prevent-core` for the domain and
//! `prevent-providers` for the upstream clients.

#![warn(rust_2018_idioms)]

pub mod error;

use std::sync::Arc;

use api_shared::auth::{validate_api_key, API_KEY_HEADER, PATIENT_ID_HEADER};
use api_shared::{
    ClinCalcContribution, ClinCalcGender, ClinCalcPreventEnvelope, ClinCalcPreventRequest,
    ClinCalcPreventResponse, ErrorBody, FieldIssue, HealthRes, HealthService, MdCalcAssessment,
    MdCalcOutput, MdCalcPreventEnvelope, MdCalcPreventRequest, MdCalcPreventResponse,
    RequestEnvelope,
};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{Local, NaiveDate};
use prevent_core::validation::validate_patient_id;
use prevent_core::{
    validate_clincalc_request, validate_mdcalc_request, Aggregator, AssessmentSession,
    AssessmentView, InMemoryStore, Intake, IntakeStore, PatientProfile, ProfileStore, Sex,
    SnapshotRecord, SnapshotStore,
};
use prevent_providers::{ClinCalcClient, MdCalcClient};
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Shared state for every request handler.
#[derive(Clone)]
pub struct AppState {
    mdcalc: Arc<MdCalcClient>,
    clincalc: Arc<ClinCalcClient>,
    profiles: Arc<dyn ProfileStore>,
    intakes: Arc<dyn IntakeStore>,
    snapshots: Arc<dyn SnapshotStore>,
    api_key: Option<String>,
}

impl AppState {
    /// Profiles and intakes default to one process-local store.
    pub fn new(
        mdcalc: MdCalcClient,
        clincalc: ClinCalcClient,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let records = Arc::new(InMemoryStore::new());
        Self {
            mdcalc: Arc::new(mdcalc),
            clincalc: Arc::new(clincalc),
            profiles: records.clone(),
            intakes: records,
            snapshots,
            api_key: None,
        }
    }

    pub fn with_records(
        mut self,
        profiles: Arc<dyn ProfileStore>,
        intakes: Arc<dyn IntakeStore>,
    ) -> Self {
        self.profiles = profiles;
        self.intakes = intakes;
        self
    }

    /// When set, every `/api/v1` route requires a matching `x-api-key` header.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_mdcalc_assessment,
        create_clincalc_assessment,
        put_profile,
        put_intake,
        create_risk_assessment,
        list_risk_assessments,
    ),
    components(schemas(
        HealthRes,
        ErrorBody,
        FieldIssue,
        MdCalcPreventEnvelope,
        MdCalcPreventRequest,
        MdCalcPreventResponse,
        MdCalcAssessment,
        MdCalcOutput,
        ClinCalcPreventEnvelope,
        ClinCalcPreventRequest,
        ClinCalcPreventResponse,
        ClinCalcContribution,
        ClinCalcGender,
        PatientProfile,
        Intake,
        Sex,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/mdcalc/prevent-assessments", post(create_mdcalc_assessment))
        .route("/clincalc/prevent-assessments", post(create_clincalc_assessment))
        .route("/profile", put(put_profile))
        .route("/intake", put(put_intake))
        .route(
            "/risk-assessments",
            post(create_risk_assessment).get(list_risk_assessments),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", v1)
        .merge(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the router until the process exits.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    tracing::info!("-- Starting PREVENT REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = validate_api_key(provided, expected) {
            return ApiError::from(e).into_response();
        }
    }
    next.run(req).await
}

/// Reads the caller identity from `x-patient-id`.
fn patient_id(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(PATIENT_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing x-patient-id header".into()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid x-patient-id header".into()))?
        .trim();
    if value.is_empty() {
        return Err(ApiError::Unauthorized("Missing x-patient-id header".into()));
    }
    validate_patient_id(value)?;
    Ok(value.to_string())
}

/// Parses JSON in two steps so syntax errors and shape errors stay distinct.
fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| ApiError::InvalidJson)?;
    serde_json::from_value(value).map_err(|e| {
        ApiError::InvalidBody(vec![FieldIssue {
            field: "body".into(),
            message: e.to_string(),
        }])
    })
}

fn parse_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let envelope: RequestEnvelope<T> = parse_json(bytes)?;
    Ok(envelope.into_inner())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/api/v1/mdcalc/prevent-assessments",
    request_body = MdCalcPreventEnvelope,
    responses(
        (status = 201, description = "MdCalc assessment", body = MdCalcPreventResponse),
        (status = 400, description = "Invalid JSON or request body", body = ErrorBody),
        (status = 401, description = "Missing or invalid API key", body = ErrorBody),
        (status = 502, description = "MdCalc failed or answered unexpectedly", body = ErrorBody)
    )
)]
/// Forwards one payload to MdCalc and returns its outputs.
#[axum::debug_handler]
async fn create_mdcalc_assessment(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MdCalcPreventResponse>), ApiError> {
    let request: MdCalcPreventRequest = parse_envelope(&body)?;
    validate_mdcalc_request(&request)?;

    let assessment = state.mdcalc.assess(&request).await?;
    Ok((StatusCode::CREATED, Json(MdCalcPreventResponse { assessment })))
}

#[utoipa::path(
    post,
    path = "/api/v1/clincalc/prevent-assessments",
    request_body = ClinCalcPreventEnvelope,
    responses(
        (status = 201, description = "ClinCalc risk-factor contributions", body = ClinCalcPreventResponse),
        (status = 400, description = "Invalid JSON or request body", body = ErrorBody),
        (status = 401, description = "Missing or invalid API key", body = ErrorBody),
        (status = 502, description = "ClinCalc failed or its page could not be scraped", body = ErrorBody)
    )
)]
/// Submits one payload to the ClinCalc form and returns the scraped contributions.
#[axum::debug_handler]
async fn create_clincalc_assessment(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ClinCalcPreventResponse>), ApiError> {
    let request: ClinCalcPreventRequest = parse_envelope(&body)?;
    validate_clincalc_request(&request)?;

    let contributions = state.clincalc.assess(&request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ClinCalcPreventResponse { contributions }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/profile",
    request_body = PatientProfile,
    params(("x-patient-id" = String, Header, description = "Authenticated patient identity")),
    responses(
        (status = 204, description = "Profile stored"),
        (status = 400, description = "Invalid profile", body = ErrorBody),
        (status = 401, description = "Missing identity or API key", body = ErrorBody)
    )
)]
/// Creates or replaces the caller's demographic profile.
#[axum::debug_handler]
async fn put_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let patient_id = patient_id(&headers)?;
    let profile: PatientProfile = parse_json(&body)?;

    state.profiles.upsert_profile(&patient_id, profile, today())?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/intake",
    request_body = Intake,
    params(("x-patient-id" = String, Header, description = "Authenticated patient identity")),
    responses(
        (status = 204, description = "Intake stored"),
        (status = 400, description = "Out-of-range measurements", body = ErrorBody),
        (status = 401, description = "Missing identity or API key", body = ErrorBody),
        (status = 404, description = "No profile stored yet", body = ErrorBody)
    )
)]
/// Creates or replaces the caller's intake measurements.
#[axum::debug_handler]
async fn put_intake(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let patient_id = patient_id(&headers)?;
    let intake: Intake = parse_json(&body)?;

    state.intakes.upsert_intake(&patient_id, intake)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/risk-assessments",
    params(("x-patient-id" = String, Header, description = "Authenticated patient identity")),
    responses(
        (status = 201, description = "Assessment view for the stored profile and intake"),
        (status = 401, description = "Missing identity or API key", body = ErrorBody)
    )
)]
/// Runs one assessment session against both providers.
///
/// Provider failures do not fail the request; they are reported in the view's
/// `errors` and `status`. The resolved attempt is recorded as a snapshot.
#[axum::debug_handler]
async fn create_risk_assessment(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<AssessmentView>), ApiError> {
    let patient_id = patient_id(&headers)?;

    let aggregator = Aggregator::from_shared(state.mdcalc.clone(), state.clincalc.clone());
    let mut session = AssessmentSession::new(patient_id, aggregator, state.snapshots.clone());
    let view = session
        .assess_from_stores(state.profiles.as_ref(), state.intakes.as_ref(), today())
        .await?;

    tracing::info!(
        patient_id = %session.patient_id(),
        status = ?view.status,
        errors = view.errors.len(),
        "risk assessment completed"
    );
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/api/v1/risk-assessments",
    params(("x-patient-id" = String, Header, description = "Authenticated patient identity")),
    responses(
        (status = 200, description = "Recorded snapshots, oldest first"),
        (status = 401, description = "Missing identity or API key", body = ErrorBody)
    )
)]
/// Lists the caller's recorded assessment snapshots.
#[axum::debug_handler]
async fn list_risk_assessments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SnapshotRecord>>, ApiError> {
    let patient_id = patient_id(&headers)?;
    Ok(Json(state.snapshots.list(&patient_id)?))
}
