use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::SourceRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sources", get(list_sources))
        .route("/create-source", post(create_source))
        .route("/change-source", post(change_source))
        .route("/delete-source", post(delete_source))
        .route("/source", post(get_source))
        .route("/check-sources", post(check_sources))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SourceEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,
    /// Placeholder filled by the surrounding system at runtime, never here.
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateSourceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeSourceRequest {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteSourceRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CallerIdentity {
    #[serde(alias = "_id")]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetSourceRequest {
    pub name: String,
    /// Either the literal "self" (resolved via `user`) or an owner id.
    pub owner: String,
    pub user: Option<CallerIdentity>,
}

#[derive(Debug, Serialize)]
pub struct SourceDetails {
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    pub login: String,
    pub passcode: String,
    pub vhost: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckSourcesRequest {
    pub sources: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all sources of the authenticated caller.
async fn list_sources(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let found = SourceRepository::list_by_owner(&state.db, &claims.id).await?;

    let sources: Vec<SourceEntry> = found
        .into_iter()
        .map(|s| SourceEntry {
            id: s.id,
            name: s.name,
            source_type: s.source_type,
            url: s.url,
            login: s.login,
            passcode: s.passcode,
            vhost: s.vhost,
            active: false,
        })
        .collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "sources": sources,
    })))
}

async fn create_source(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateSourceRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let existing =
        SourceRepository::find_by_owner_and_name(&state.db, &claims.id, &request.name).await?;
    if existing.is_some() {
        return Err(AppError::conflict("A source with that name already exists."));
    }

    SourceRepository::create(
        &state.db,
        &claims.id,
        &request.name,
        &request.source_type,
        &request.url,
        &request.login,
        &request.passcode,
        &request.vhost,
    )
    .await?;

    Ok(Json(serde_json::json!({"success": true})))
}

async fn change_source(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<ChangeSourceRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let found =
        SourceRepository::find_by_id_and_owner(&state.db, &request.id, &claims.id).await?;
    if found.is_none() {
        return Err(AppError::conflict("The selected source has not been found."));
    }

    let same_name =
        SourceRepository::find_other_with_name(&state.db, &request.id, &claims.id, &request.name)
            .await?;
    if same_name.is_some() {
        return Err(AppError::conflict(
            "A source with the same name has been found.",
        ));
    }

    SourceRepository::update(
        &state.db,
        &request.id,
        &claims.id,
        &request.name,
        &request.source_type,
        &request.url,
        &request.login,
        &request.passcode,
        &request.vhost,
    )
    .await?;

    Ok(Json(serde_json::json!({"success": true})))
}

async fn delete_source(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<DeleteSourceRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted =
        SourceRepository::delete_by_id_and_owner(&state.db, &request.id, &claims.id).await?;
    if !deleted {
        return Err(AppError::conflict("The selected source has not been found."));
    }

    Ok(Json(serde_json::json!({"success": true})))
}

/// Resolve a source by name for viewing. Unauthenticated; the owner is
/// passed explicitly, either as a user id or as "self" plus a caller object.
async fn get_source(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GetSourceRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let owner_id = if request.owner == "self" {
        request
            .user
            .and_then(|u| u.id)
            .ok_or_else(|| AppError::conflict("The selected source has not been found."))?
    } else {
        request.owner
    };

    let found = SourceRepository::find_by_owner_and_name(&state.db, &owner_id, &request.name)
        .await?
        .ok_or_else(|| AppError::conflict("The selected source has not been found."))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "source": SourceDetails {
            source_type: found.source_type,
            url: found.url,
            login: found.login,
            passcode: found.passcode,
            vhost: found.vhost,
        },
    })))
}

/// Bulk-ensure sources by name. Candidates already owned by the caller are
/// skipped; the response lists exactly the names that were created, in input
/// order.
async fn check_sources(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(request): Json<CheckSourcesRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut new_sources = Vec::new();

    for name in &request.sources {
        if SourceRepository::insert_if_absent(&state.db, &claims.id, name).await? {
            new_sources.push(name.clone());
        }
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "newSources": new_sources,
    })))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::testing::{get, post_json, seed_user, test_app, test_state};

    fn source_body(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "type": "stomp",
            "url": "broker.example.com",
            "login": "guest",
            "passcode": "guest",
            "vhost": "/",
        })
    }

    #[tokio::test]
    async fn list_sources_projects_fields_with_inactive_flag() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, token) = seed_user(&state, "alice", "alice@example.com").await;

        let (status, body) =
            post_json(&app, &format!("/create-source?token={token}"), source_body("queue")).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);

        let (status, body) = get(&app, &format!("/sources?token={token}")).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        let sources = body["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["name"], "queue");
        assert_eq!(sources[0]["type"], "stomp");
        assert_eq!(sources[0]["active"], false);
        assert!(sources[0]["id"].is_string());
    }

    #[tokio::test]
    async fn duplicate_source_name_is_rejected_without_touching_original() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, token) = seed_user(&state, "alice", "alice@example.com").await;

        let (_, body) =
            post_json(&app, &format!("/create-source?token={token}"), source_body("queue")).await;
        assert_eq!(body["success"], true);

        let mut second = source_body("queue");
        second["url"] = serde_json::json!("other.example.com");
        let (status, body) =
            post_json(&app, &format!("/create-source?token={token}"), second).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], 409);
        assert_eq!(body["message"], "A source with that name already exists.");

        // Original record must be unchanged.
        let (_, body) = get(&app, &format!("/sources?token={token}")).await;
        let sources = body["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["url"], "broker.example.com");
    }

    #[tokio::test]
    async fn same_name_under_different_owners_is_allowed() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, alice) = seed_user(&state, "alice", "alice@example.com").await;
        let (_, bob) = seed_user(&state, "bob", "bob@example.com").await;

        let (_, body) =
            post_json(&app, &format!("/create-source?token={alice}"), source_body("queue")).await;
        assert_eq!(body["success"], true);
        let (_, body) =
            post_json(&app, &format!("/create-source?token={bob}"), source_body("queue")).await;
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn change_source_rejects_missing_and_name_collision() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, token) = seed_user(&state, "alice", "alice@example.com").await;

        post_json(&app, &format!("/create-source?token={token}"), source_body("first")).await;
        post_json(&app, &format!("/create-source?token={token}"), source_body("second")).await;

        let (_, body) = get(&app, &format!("/sources?token={token}")).await;
        let first_id = body["sources"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["name"] == "first")
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        // Unknown id
        let mut change = source_body("renamed");
        change["id"] = serde_json::json!("no-such-id");
        let (_, body) = post_json(&app, &format!("/change-source?token={token}"), change).await;
        assert_eq!(body["status"], 409);
        assert_eq!(body["message"], "The selected source has not been found.");

        // Rename onto the other source's name
        let mut change = source_body("second");
        change["id"] = serde_json::json!(first_id.clone());
        let (_, body) = post_json(&app, &format!("/change-source?token={token}"), change).await;
        assert_eq!(body["status"], 409);
        assert_eq!(body["message"], "A source with the same name has been found.");

        // Valid rename overwrites every mutable field
        let change = serde_json::json!({
            "id": first_id,
            "name": "renamed",
            "type": "amqp",
            "url": "amqp.example.com",
            "login": "user",
            "passcode": "secret",
            "vhost": "prod",
        });
        let (_, body) = post_json(&app, &format!("/change-source?token={token}"), change).await;
        assert_eq!(body["success"], true);

        let (_, body) = get(&app, &format!("/sources?token={token}")).await;
        let renamed = body["sources"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["name"] == "renamed")
            .expect("renamed source present");
        assert_eq!(renamed["type"], "amqp");
        assert_eq!(renamed["vhost"], "prod");
    }

    #[tokio::test]
    async fn delete_source_is_not_idempotent() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, token) = seed_user(&state, "alice", "alice@example.com").await;

        post_json(&app, &format!("/create-source?token={token}"), source_body("queue")).await;
        let (_, body) = get(&app, &format!("/sources?token={token}")).await;
        let id = body["sources"][0]["id"].as_str().unwrap().to_string();

        let (_, body) = post_json(
            &app,
            &format!("/delete-source?token={token}"),
            serde_json::json!({"id": id}),
        )
        .await;
        assert_eq!(body["success"], true);

        let (status, body) = post_json(
            &app,
            &format!("/delete-source?token={token}"),
            serde_json::json!({"id": id}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], 409);
        assert_eq!(body["message"], "The selected source has not been found.");
    }

    #[tokio::test]
    async fn source_lookup_resolves_self_and_explicit_owner() {
        let state = test_state().await;
        let app = test_app(&state);
        let (alice, token) = seed_user(&state, "alice", "alice@example.com").await;

        post_json(&app, &format!("/create-source?token={token}"), source_body("queue")).await;

        // owner: "self" resolved through the caller identity object
        let (_, body) = post_json(
            &app,
            "/source",
            serde_json::json!({"name": "queue", "owner": "self", "user": {"id": alice.id.clone()}}),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["source"]["type"], "stomp");
        assert_eq!(body["source"]["vhost"], "/");
        // name and owner are not echoed
        assert!(body["source"].get("name").is_none());
        assert!(body["source"].get("owner").is_none());

        // owner passed explicitly as an id
        let (_, body) = post_json(
            &app,
            "/source",
            serde_json::json!({"name": "queue", "owner": alice.id.clone(), "user": null}),
        )
        .await;
        assert_eq!(body["success"], true);

        // miss
        let (_, body) = post_json(
            &app,
            "/source",
            serde_json::json!({"name": "nope", "owner": alice.id, "user": null}),
        )
        .await;
        assert_eq!(body["status"], 409);
        assert_eq!(body["message"], "The selected source has not been found.");
    }

    #[tokio::test]
    async fn check_sources_creates_only_missing_names_in_input_order() {
        let state = test_state().await;
        let app = test_app(&state);
        let (_, token) = seed_user(&state, "alice", "alice@example.com").await;

        post_json(&app, &format!("/create-source?token={token}"), source_body("b")).await;

        let (status, body) = post_json(
            &app,
            &format!("/check-sources?token={token}"),
            serde_json::json!({"sources": ["a", "b", "c"]}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["newSources"], serde_json::json!(["a", "c"]));

        // The created sources carry the default connector kind and empty
        // connection fields.
        let (_, body) = get(&app, &format!("/sources?token={token}")).await;
        let sources = body["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 3);
        let a = sources.iter().find(|s| s["name"] == "a").unwrap();
        assert_eq!(a["type"], "stomp");
        assert_eq!(a["url"], "");
    }
}
