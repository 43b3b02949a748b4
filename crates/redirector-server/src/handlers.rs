//! Route handlers.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{debug, info};

use redirector_core::{
    Domain, NewRedirectRule, RedirectOutcome, RedirectRule, Resolver, RuleRecord, RuleStore,
};

use crate::error::{ApiError, Result};
use crate::models::{CreateDomainRequest, ReadinessResponse, ValidateRuleResponse};
use crate::state::AppState;

/// Bytes escaped in a `Location` value; non-ASCII is always escaped.
const LOCATION_ESCAPES: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

// =============================================================================
// Probes
// =============================================================================

/// GET /__healthz - Liveness probe.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// GET /__readiness - Readiness probe with build metadata.
pub async fn readiness(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        status: "ok",
        package_version: state.build.package_version.to_string(),
        commit_hash: state.build.commit_hash.clone(),
        build_time: state
            .build
            .build_time
            .format("%Y-%m-%dT%H:%M:%S.000Z")
            .to_string(),
    })
}

// =============================================================================
// Redirects
// =============================================================================

/// Host the client asked for: the `Host` header, else the URI authority.
fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
}

/// Fallback - Resolve the request against the rules of its host.
pub async fn redirect(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::MethodNotAllowed);
    }

    let host = request_host(&headers, &uri)
        .ok_or_else(|| ApiError::BadRequest("missing Host header".to_string()))?;
    // Rule paths are stored decoded.
    let path = percent_decode_str(uri.path())
        .decode_utf8()
        .map_err(|_| ApiError::BadRequest(format!("path is not valid UTF-8: {}", uri.path())))?;

    let outcome = Resolver::new(state.db.as_ref()).resolve(host, &path, uri.query())?;

    match outcome {
        RedirectOutcome::Found(redirect) => {
            debug!(host, path = %path, location = %redirect.location, status = redirect.status, "Redirecting");

            let status = StatusCode::from_u16(redirect.status)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            let location = utf8_percent_encode(&redirect.location, LOCATION_ESCAPES).to_string();
            let location = HeaderValue::from_str(&location)
                .map_err(|e| ApiError::Internal(format!("invalid Location header: {}", e)))?;

            Ok((status, [(header::LOCATION, location)]).into_response())
        }
        RedirectOutcome::DomainNotFound => {
            Err(ApiError::NotFound(format!("no domain for host {}", host)))
        }
        RedirectOutcome::RuleNotFound => {
            Err(ApiError::NotFound(format!("no redirect rule for {}", path)))
        }
    }
}

/// Fallback when redirects are disabled, and inside the admin prefix.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

// =============================================================================
// Admin: Domains
// =============================================================================

/// GET /api/domains - List all domains.
pub async fn list_domains(State(state): State<AppState>) -> Result<Json<Vec<Domain>>> {
    Ok(Json(state.db.list_domains()?))
}

/// POST /api/domains - Create a domain.
pub async fn create_domain(
    State(state): State<AppState>,
    Json(req): Json<CreateDomainRequest>,
) -> Result<(StatusCode, Json<Domain>)> {
    let new_domain = req
        .into_new_domain()
        .ok_or_else(|| ApiError::BadRequest("at least one domain name is required".to_string()))?;

    let domain = state.db.create_domain(new_domain)?;
    info!(id = domain.id, display_name = %domain.display_name, "Domain created via API");

    Ok((StatusCode::CREATED, Json(domain)))
}

/// GET /api/domains/{id} - Get a domain.
pub async fn get_domain(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Domain>> {
    state
        .db
        .get_domain(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("domain {}", id)))
}

/// DELETE /api/domains/{id} - Delete a domain with its names and rules.
pub async fn delete_domain(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.db.delete_domain(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Admin: Rules
// =============================================================================

/// GET /api/domains/{id}/rules - List the rules of a domain.
pub async fn list_rules(
    State(state): State<AppState>,
    Path(domain_id): Path<i64>,
) -> Result<Json<Vec<RedirectRule>>> {
    Ok(Json(state.db.list_rules(domain_id)?))
}

/// POST /api/domains/{id}/rules - Create a rule.
pub async fn create_rule(
    State(state): State<AppState>,
    Path(domain_id): Path<i64>,
    Json(rule): Json<NewRedirectRule>,
) -> Result<(StatusCode, Json<RedirectRule>)> {
    let rule = state.db.create_rule(domain_id, rule)?;
    info!(id = rule.id, domain_id, path = %rule.path, "Rule created via API");

    Ok((StatusCode::CREATED, Json(rule)))
}

/// POST /api/domains/{id}/rules/validate - Check a rule without saving it.
pub async fn validate_rule(
    State(state): State<AppState>,
    Path(domain_id): Path<i64>,
    Json(record): Json<RuleRecord>,
) -> Result<Json<ValidateRuleResponse>> {
    state.db.validate_new_rule(domain_id, &record)?;
    Ok(Json(ValidateRuleResponse { valid: true }))
}

/// GET /api/rules/{id} - Get a rule.
pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RedirectRule>> {
    state
        .db
        .get_rule(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("rule {}", id)))
}

/// PUT /api/rules/{id} - Replace a rule's fields.
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(rule): Json<NewRedirectRule>,
) -> Result<Json<RedirectRule>> {
    let rule = state.db.update_rule(id, rule)?;
    info!(id, path = %rule.path, "Rule updated via API");

    Ok(Json(rule))
}

/// DELETE /api/rules/{id} - Delete a rule.
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.db.delete_rule(id)?;
    Ok(StatusCode::NO_CONTENT)
}
