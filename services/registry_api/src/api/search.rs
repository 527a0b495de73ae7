use std::collections::BTreeSet;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::geo;
use crate::model::{PropertyRecord, PropertyStatus, PropertyType, PropertyView};
use crate::query::{self, Page, PropertyQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/properties", get(search_properties))
        .route("/nearby", get(nearby))
        .route("/suggestions", get(suggestions))
        .route("/filters/options", get(filter_options))
        .route("/statistics", get(statistics))
        .route("/export", get(export))
}

const MAX_EXPORT_ROWS: usize = 10_000;

async fn search_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> Result<Json<Page>, ApiError> {
    Ok(Json(query.run(state.store.list_properties()?)?))
}

#[derive(Debug, Deserialize)]
struct NearbyQuery {
    latitude: f64,
    longitude: f64,
    #[serde(default = "default_radius")]
    radius_km: f64,
    property_type: Option<PropertyType>,
    #[serde(default = "default_nearby_limit")]
    limit: usize,
}

fn default_radius() -> f64 {
    5.0
}

fn default_nearby_limit() -> usize {
    20
}

#[derive(Serialize)]
struct NearbyHit {
    #[serde(flatten)]
    property: PropertyView,
    distance_km: f64,
}

async fn nearby(
    State(state): State<AppState>,
    Query(q): Query<NearbyQuery>,
) -> Result<Json<Value>, ApiError> {
    geo::check_point(q.latitude, q.longitude).map_err(ApiError::Validation)?;
    if !(0.1..=50.0).contains(&q.radius_km) {
        return Err(ApiError::Validation("radius_km must be within 0.1..=50".into()));
    }
    if !(1..=100).contains(&q.limit) {
        return Err(ApiError::Validation("limit must be within 1..=100".into()));
    }

    let center = (q.latitude, q.longitude);
    let mut hits: Vec<(f64, _)> = state
        .store
        .list_properties()?
        .into_iter()
        .filter(|p| q.property_type.map_or(true, |t| t == p.property_type))
        .filter_map(|p| query::distance_km(&p, center).map(|d| (d, p)))
        .filter(|(d, _)| *d <= q.radius_km)
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.truncate(q.limit);

    let properties: Vec<NearbyHit> = hits
        .into_iter()
        .map(|(d, p)| NearbyHit {
            property: p.into_view(),
            distance_km: (d * 100.0).round() / 100.0,
        })
        .collect();
    Ok(Json(json!({
        "center": { "latitude": q.latitude, "longitude": q.longitude },
        "radius_km": q.radius_km,
        "count": properties.len(),
        "properties": properties,
    })))
}

#[derive(Debug, Deserialize)]
struct SuggestionQuery {
    q: String,
    #[serde(default = "default_suggestion_limit")]
    limit: usize,
}

fn default_suggestion_limit() -> usize {
    10
}

async fn suggestions(
    State(state): State<AppState>,
    Query(sq): Query<SuggestionQuery>,
) -> Result<Json<Value>, ApiError> {
    let needle = sq.q.trim().to_lowercase();
    if needle.chars().count() < 2 {
        return Err(ApiError::Validation("q needs at least 2 characters".into()));
    }
    if !(1..=50).contains(&sq.limit) {
        return Err(ApiError::Validation("limit must be within 1..=50".into()));
    }
    let locations: BTreeSet<String> = state
        .store
        .list_properties()?
        .into_iter()
        .map(|p| p.location)
        .filter(|l| l.to_lowercase().contains(&needle))
        .collect();
    let suggestions: Vec<String> = locations.into_iter().take(sq.limit).collect();
    Ok(Json(json!({ "query": sq.q, "suggestions": suggestions })))
}

async fn filter_options(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let all = state.store.list_properties()?;
    let area = all.iter().map(|p| p.area);
    let value = all.iter().map(|p| p.value);

    let types: Vec<Value> = PropertyType::ALL
        .iter()
        .map(|t| json!({ "value": t.as_str(), "label": t.display() }))
        .collect();
    let statuses: Vec<Value> = PropertyStatus::ALL
        .iter()
        .map(|s| json!({ "value": s.as_str(), "label": s.display() }))
        .collect();

    Ok(Json(json!({
        "property_types": types,
        "statuses": statuses,
        "area_range": {
            "min": area.clone().reduce(f64::min),
            "max": area.reduce(f64::max),
        },
        "value_range": {
            "min": value.clone().min(),
            "max": value.max(),
        },
    })))
}

async fn statistics(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let o = query::overview(&state.store.list_properties()?);
    Ok(Json(json!({
        "total_properties": o.total_properties,
        "verified_properties": o.verified_properties,
        "by_type": o.by_type,
        "by_status": o.by_status,
        "average_area": o.average_area,
        "average_value": o.average_value,
    })))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportParams {
    format: ExportFormat,
}

/// Same filters as `/properties`, without paging, as a download.
async fn export(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let mut rows = query.select(state.store.list_properties()?)?;
    rows.truncate(MAX_EXPORT_ROWS);

    let (body, mime, ext) = match params.format {
        ExportFormat::Csv => (to_csv(&rows)?, "text/csv", "csv"),
        ExportFormat::Json => {
            let views: Vec<PropertyView> = rows.into_iter().map(PropertyRecord::into_view).collect();
            let body = serde_json::to_vec(&views)
                .map_err(|e| ApiError::Internal(format!("json export failed: {e}")))?;
            (body, "application/json", "json")
        }
    };
    Response::builder()
        .header(header::CONTENT_TYPE, mime)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"properties_export.{ext}\""),
        )
        .body(Body::from(body))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

fn to_csv(rows: &[PropertyRecord]) -> Result<Vec<u8>, ApiError> {
    let csv_err = |e: csv::Error| ApiError::Internal(format!("csv export failed: {e}"));
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "token_id",
        "location",
        "property_type",
        "status",
        "area",
        "value",
        "owner_address",
        "is_verified",
        "latitude",
        "longitude",
        "registration_date",
    ])
    .map_err(csv_err)?;
    for p in rows {
        let anchor = p.coordinates.as_ref().and_then(|g| g.anchor());
        w.write_record([
            p.token_id.to_string(),
            p.location.clone(),
            p.property_type.as_str().to_string(),
            p.status.as_str().to_string(),
            p.area.to_string(),
            p.value.to_string(),
            p.owner_address.clone(),
            p.is_verified.to_string(),
            anchor.map(|a| a.0.to_string()).unwrap_or_default(),
            anchor.map(|a| a.1.to_string()).unwrap_or_default(),
            p.registration_date.to_rfc3339(),
        ])
        .map_err(csv_err)?;
    }
    w.into_inner()
        .map_err(|e| ApiError::Internal(format!("csv export failed: {}", e.error())))
}
