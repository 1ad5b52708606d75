use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Dashboard;
use crate::db::{DashboardRepository, SourceRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboards", get(list_dashboards))
        .route("/create-dashboard", post(create_dashboard))
        .route("/delete-dashboard", post(delete_dashboard))
        .route("/dashboard", get(get_dashboard))
        .route("/save-dashboard", post(save_dashboard))
        .route("/clone-dashboard", post(clone_dashboard))
        .route("/check-password-needed", post(check_password_needed))
        .route("/check-password", post(check_password))
        .route("/share-dashboard", post(share_dashboard))
        .route("/change-password", post(change_password))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardEntry {
    pub id: String,
    pub name: String,
    pub views: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateDashboardRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDashboardRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct GetDashboardQuery {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDashboardRequest {
    pub id: String,
    pub layout: serde_json::Value,
    pub items: serde_json::Value,
    pub next_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneDashboardRequest {
    pub dashboard_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CallerIdentity {
    #[serde(alias = "_id")]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPasswordNeededRequest {
    pub user: Option<CallerIdentity>,
    pub dashboard_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPasswordRequest {
    pub dashboard_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDashboardRequest {
    pub dashboard_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub dashboard_id: String,
    pub password: Option<String>,
}

/// The subset of a dashboard exposed through the public viewing routes.
fn viewing_payload(dashboard: &Dashboard) -> serde_json::Value {
    serde_json::json!({
        "name": dashboard.name,
        "layout": dashboard.layout,
        "items": dashboard.items,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's dashboards, projected to id/name/views.
async fn list_dashboards(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let found = DashboardRepository::list_by_owner(&state.db, &claims.id).await?;

    let dashboards: Vec<DashboardEntry> = found
        .into_iter()
        .map(|d| DashboardEntry {
            id: d.id,
            name: d.name,
            views: d.views,
        })
        .collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "dashboards": dashboards,
    })))
}

/// Create an empty dashboard: no widgets, nextId starts at 1.
async fn create_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateDashboardRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let existing =
        DashboardRepository::find_by_owner_and_name(&state.db, &claims.id, &request.name).await?;
    if existing.is_some() {
        return Err(AppError::conflict(
            "A dashboard with that name already exists.",
        ));
    }

    DashboardRepository::create(
        &state.db,
        &claims.id,
        &request.name,
        &serde_json::json!([]),
        &serde_json::json!({}),
        1,
    )
    .await?;

    Ok(Json(serde_json::json!({"success": true})))
}

async fn delete_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<DeleteDashboardRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted =
        DashboardRepository::delete_by_id_and_owner(&state.db, &request.id, &claims.id).await?;
    if !deleted {
        return Err(AppError::conflict(
            "The selected dashboard has not been found.",
        ));
    }

    Ok(Json(serde_json::json!({"success": true})))
}

/// Full dashboard for the editor, plus the owner's source names for the
/// widget source pickers.
async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<GetDashboardQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let found = DashboardRepository::find_by_id_and_owner(&state.db, &query.id, &claims.id)
        .await?
        .ok_or_else(|| AppError::conflict("The selected dashboard has not been found."))?;

    let sources: Vec<String> = SourceRepository::list_by_owner(&state.db, &claims.id)
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "dashboard": {
            "id": found.id,
            "name": found.name,
            "layout": found.layout,
            "items": found.items,
            "nextId": found.next_id,
        },
        "sources": sources,
    })))
}

/// Wholesale replacement of layout/items/nextId. No merge semantics.
async fn save_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<SaveDashboardRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let saved = DashboardRepository::save_contents(
        &state.db,
        &request.id,
        &claims.id,
        &request.layout,
        &request.items,
        request.next_id,
    )
    .await?;
    if !saved {
        return Err(AppError::conflict(
            "The selected dashboard has not been found.",
        ));
    }

    Ok(Json(serde_json::json!({"success": true})))
}

async fn clone_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<CloneDashboardRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let existing =
        DashboardRepository::find_by_owner_and_name(&state.db, &claims.id, &request.name).await?;
    if existing.is_some() {
        return Err(AppError::conflict(
            "A dashboard with that name already exists.",
        ));
    }

    let old = DashboardRepository::find_by_id_and_owner(&state.db, &request.dashboard_id, &claims.id)
        .await?
        .ok_or_else(|| AppError::conflict("The selected dashboard has not been found."))?;

    DashboardRepository::create(
        &state.db,
        &claims.id,
        &request.name,
        &old.layout,
        &old.items,
        old.next_id,
    )
    .await?;

    Ok(Json(serde_json::json!({"success": true})))
}

/// Dashboard visibility decision table.
///
/// One match over (owner, shared, password) decides the response; the
/// not-shared row deliberately wins over the password state, so an unshared
/// dashboard with a password set still reports plainly "not shared". Views
/// are counted only on the branches that return a dashboard payload.
async fn check_password_needed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckPasswordNeededRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let found = DashboardRepository::find_by_id(&state.db, &request.dashboard_id, true)
        .await?
        .ok_or_else(|| AppError::conflict("The specified dashboard has not been found."))?;

    let caller_id = request.user.and_then(|u| u.id);
    let is_owner = caller_id.as_deref() == Some(found.owner.as_str());
    let has_password = found.password.is_some();

    let response = match (is_owner, found.shared, has_password) {
        (true, shared, _) => {
            DashboardRepository::increment_views(&state.db, &found.id).await?;
            serde_json::json!({
                "success": true,
                "owner": "self",
                "shared": shared,
                "hasPassword": has_password,
                "dashboard": viewing_payload(&found),
            })
        }
        (false, false, _) => serde_json::json!({
            "success": true,
            "owner": "",
            "shared": false,
        }),
        (false, true, false) => {
            DashboardRepository::increment_views(&state.db, &found.id).await?;
            serde_json::json!({
                "success": true,
                "owner": found.owner,
                "shared": true,
                "passwordNeeded": false,
                "dashboard": viewing_payload(&found),
            })
        }
        (false, true, true) => serde_json::json!({
            "success": true,
            "owner": "",
            "shared": true,
            "passwordNeeded": true,
        }),
    };

    Ok(Json(response))
}

/// Verify the password of a shared dashboard. A wrong password is not an
/// error: same 200 family, `correctPassword: false`, and no view increment.
async fn check_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let found = DashboardRepository::find_by_id(&state.db, &request.dashboard_id, true)
        .await?
        .ok_or_else(|| AppError::conflict("The specified dashboard has not been found."))?;

    let correct = found.password.as_deref() == Some(request.password.as_str());
    if !correct {
        return Ok(Json(serde_json::json!({
            "success": true,
            "correctPassword": false,
        })));
    }

    DashboardRepository::increment_views(&state.db, &found.id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "correctPassword": true,
        "owner": found.owner,
        "dashboard": viewing_payload(&found),
    })))
}

/// Flip the shared flag in one find-and-update.
async fn share_dashboard(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<ShareDashboardRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let shared =
        DashboardRepository::toggle_shared(&state.db, &request.dashboard_id, &claims.id)
            .await?
            .ok_or_else(|| AppError::conflict("The specified dashboard has not been found."))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "shared": shared,
    })))
}

/// Set or clear the dashboard password. The value is stored exactly as
/// supplied; empty or absent clears the gate.
async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let password = request.password.as_deref().filter(|p| !p.is_empty());

    let updated =
        DashboardRepository::set_password(&state.db, &request.dashboard_id, &claims.id, password)
            .await?;
    if !updated {
        return Err(AppError::conflict(
            "The specified dashboard has not been found.",
        ));
    }

    Ok(Json(serde_json::json!({"success": true})))
}

// ============================================================================
// Tests
// ============================================================================
