use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use super::auth::{AuthUser, IdentityProvider};
use super::db::DbHandle;
use super::models::{MoveTaskRequest, NameRequest};
use super::service;
use crate::errors::{AuthError, BoardError};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub identity: Arc<dyn IdentityProvider>,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

/// HTTP-facing error. Messages are generic; details stay in the logs.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::Validation(msg) => ApiError::BadRequest(msg),
            BoardError::NotFoundOrForbidden => {
                ApiError::NotFound("Resource not found or permission denied.".into())
            }
            BoardError::Auth(AuthError::MissingToken) => {
                ApiError::Unauthorized("Missing bearer token.".into())
            }
            BoardError::Auth(AuthError::InvalidToken) => {
                ApiError::Forbidden("Invalid or expired token.".into())
            }
            BoardError::IdentityProvider(msg) => {
                tracing::error!(error = %msg, "identity provider failure");
                ApiError::Internal("An unexpected error occurred during authentication.".into())
            }
            BoardError::Persistence(e) => {
                tracing::error!(error = ?e, "storage failure");
                ApiError::Internal("An unexpected error occurred.".into())
            }
            BoardError::Network(msg) => {
                tracing::error!(error = %msg, "upstream failure");
                ApiError::Internal("An unexpected error occurred.".into())
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/{id}/lists", post(create_list))
        .route("/api/projects/{id}/lists/{list_id}/tasks", post(create_task))
        .route("/api/tasks/{id}", put(move_task).delete(delete_task))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_projects(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let projects = state
        .db
        .call(move |db| service::list_projects(db, &user.user_id))
        .await?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<SharedState>,
    user: AuthUser,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state
        .db
        .call(move |db| service::create_project(db, &user.user_id, req.name.as_deref()))
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let board = state
        .db
        .call(move |db| service::get_board(db, &user.user_id, id))
        .await?;
    Ok(Json(board))
}

async fn update_project(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state
        .db
        .call(move |db| service::rename_project(db, &user.user_id, id, req.name.as_deref()))
        .await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| service::delete_project(db, &user.user_id, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_list(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state
        .db
        .call(move |db| service::create_list(db, &user.user_id, project_id, req.name.as_deref()))
        .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

async fn create_task(
    State(state): State<SharedState>,
    user: AuthUser,
    Path((project_id, list_id)): Path<(i64, i64)>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .db
        .call(move |db| {
            service::create_task(db, &user.user_id, project_id, list_id, req.name.as_deref())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn move_task(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<MoveTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let list_id = req.list_id.ok_or_else(|| BoardError::missing("list_id"))?;
    let position = req.position.ok_or_else(|| BoardError::missing("position"))?;
    let task = state
        .db
        .call(move |db| service::move_task(db, &user.user_id, id, list_id, position))
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| service::delete_task(db, &user.user_id, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::auth::StaticTokens;
    use crate::board::db::BoardDb;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const OWNER: &str = "token-a";
    const STRANGER: &str = "token-b";

    fn test_app() -> Router {
        let db = BoardDb::new_in_memory().unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            identity: Arc::new(StaticTokens::new([
                ("token-a", "user-a"),
                ("token-b", "user-b"),
            ])),
        });
        api_router().with_state(state)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    async fn create(app: &Router, uri: &str, name: &str) -> serde_json::Value {
        let (status, json) = send(
            app,
            request("POST", uri, Some(OWNER), Some(serde_json::json!({"name": name}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "POST {} failed: {}", uri, json);
        json
    }

    /// Project 1 with lists A (id 1) and B (id 2); tasks T1..T3 in A.
    async fn seeded_app() -> Router {
        let app = test_app();
        create(&app, "/api/projects", "Launch").await;
        create(&app, "/api/projects/1/lists", "A").await;
        create(&app, "/api/projects/1/lists", "B").await;
        for name in ["T1", "T2", "T3"] {
            create(&app, "/api/projects/1/lists/1/tasks", name).await;
        }
        app
    }

    // 1. Health check needs no token
    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = app
            .oneshot(request("GET", "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    // 2. Auth boundary
    #[tokio::test]
    async fn test_missing_token_is_401() {
        let app = test_app();
        let (status, json) = send(&app, request("GET", "/api/projects", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_token_is_403() {
        let app = test_app();
        let (status, _) = send(&app, request("GET", "/api/projects", Some("forged"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    // 3. Projects
    #[tokio::test]
    async fn test_create_and_list_projects_scoped_to_owner() {
        let app = test_app();
        let project = create(&app, "/api/projects", "Launch").await;
        assert_eq!(project["name"], "Launch");
        assert_eq!(project["user_id"], "user-a");

        let (status, mine) = send(&app, request("GET", "/api/projects", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine.as_array().unwrap().len(), 1);

        let (_, theirs) = send(&app, request("GET", "/api/projects", Some(STRANGER), None)).await;
        assert!(theirs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_project_without_name_is_400() {
        let app = test_app();
        let (status, json) = send(
            &app,
            request("POST", "/api/projects", Some(OWNER), Some(serde_json::json!({}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "name is required");
    }

    #[tokio::test]
    async fn test_get_project_nested_board() {
        let app = seeded_app().await;
        let (status, board) = send(&app, request("GET", "/api/projects/1", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board["name"], "Launch");
        let lists = board["lists"].as_array().unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0]["tasks"].as_array().unwrap().len(), 3);
        assert!(lists[1]["tasks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_project_not_found_and_foreign_look_alike() {
        let app = seeded_app().await;
        let (missing_status, missing) =
            send(&app, request("GET", "/api/projects/999", Some(OWNER), None)).await;
        let (foreign_status, foreign) =
            send(&app, request("GET", "/api/projects/1", Some(STRANGER), None)).await;
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
        assert_eq!(foreign_status, StatusCode::NOT_FOUND);
        assert_eq!(missing, foreign);
    }

    #[tokio::test]
    async fn test_update_and_delete_project() {
        let app = seeded_app().await;
        let (status, project) = send(
            &app,
            request("PUT", "/api/projects/1", Some(OWNER), Some(serde_json::json!({"name": "Relaunch"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(project["name"], "Relaunch");

        let (status, _) = send(&app, request("DELETE", "/api/projects/1", Some(STRANGER), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, request("DELETE", "/api/projects/1", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, request("GET", "/api/projects/1", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // 4. Creation positions
    #[tokio::test]
    async fn test_created_positions_append() {
        let app = test_app();
        create(&app, "/api/projects", "Launch").await;
        let a = create(&app, "/api/projects/1/lists", "A").await;
        let b = create(&app, "/api/projects/1/lists", "B").await;
        assert_eq!(a["position"], 0);
        assert_eq!(b["position"], 1);

        let t1 = create(&app, "/api/projects/1/lists/1/tasks", "T1").await;
        let t2 = create(&app, "/api/projects/1/lists/1/tasks", "T2").await;
        assert_eq!(t1["position"], 0);
        assert_eq!(t2["position"], 1);
        assert_eq!(t2["list_id"], 1);
    }

    #[tokio::test]
    async fn test_create_task_errors() {
        let app = seeded_app().await;
        let (status, _) = send(
            &app,
            request("POST", "/api/projects/1/lists/1/tasks", Some(OWNER), Some(serde_json::json!({"name": ""}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            request("POST", "/api/projects/1/lists/1/tasks", Some(STRANGER), Some(serde_json::json!({"name": "x"}))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            request("POST", "/api/projects/1/lists/99/tasks", Some(OWNER), Some(serde_json::json!({"name": "x"}))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // 5. Move
    #[tokio::test]
    async fn test_move_task_across_lists() {
        let app = seeded_app().await;
        let (status, task) = send(
            &app,
            request("PUT", "/api/tasks/2", Some(OWNER), Some(serde_json::json!({"list_id": 2, "position": 0}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["id"], 2);
        assert_eq!(task["list_id"], 2);
        assert_eq!(task["position"], 0);

        let (_, board) = send(&app, request("GET", "/api/projects/1", Some(OWNER), None)).await;
        let a: Vec<&str> = board["lists"][0]["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        let b: Vec<&str> = board["lists"][1]["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(a, vec!["T1", "T3"]);
        assert_eq!(b, vec!["T2"]);
    }

    #[tokio::test]
    async fn test_move_task_missing_fields_is_400() {
        let app = seeded_app().await;
        let (status, json) = send(
            &app,
            request("PUT", "/api/tasks/1", Some(OWNER), Some(serde_json::json!({"position": 0}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "list_id is required");
    }

    #[tokio::test]
    async fn test_move_task_by_stranger_is_404_without_write() {
        let app = seeded_app().await;
        let (status, _) = send(
            &app,
            request("PUT", "/api/tasks/1", Some(STRANGER), Some(serde_json::json!({"list_id": 2, "position": 0}))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, board) = send(&app, request("GET", "/api/projects/1", Some(OWNER), None)).await;
        assert_eq!(board["lists"][0]["tasks"][0]["id"], 1);
        assert_eq!(board["lists"][0]["tasks"][0]["list_id"], 1);
    }

    #[tokio::test]
    async fn test_move_task_requires_token() {
        let app = seeded_app().await;
        let (status, _) = send(
            &app,
            request("PUT", "/api/tasks/1", None, Some(serde_json::json!({"list_id": 2, "position": 0}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_after_max_position_is_400_and_server_stays_up() {
        let app = seeded_app().await;
        let (status, _) = send(
            &app,
            request("PUT", "/api/tasks/1", Some(OWNER), Some(serde_json::json!({"list_id": 2, "position": i32::MAX}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(
            &app,
            request("POST", "/api/projects/1/lists/2/tasks", Some(OWNER), Some(serde_json::json!({"name": "next"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, _) = send(&app, request("GET", "/api/projects", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    // 6. Delete
    #[tokio::test]
    async fn test_delete_task() {
        let app = seeded_app().await;
        let (status, _) = send(&app, request("DELETE", "/api/tasks/1", Some(STRANGER), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, request("DELETE", "/api/tasks/1", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, request("DELETE", "/api/tasks/1", Some(OWNER), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, board) = send(&app, request("GET", "/api/projects/1", Some(OWNER), None)).await;
        let positions: Vec<i64> = board["lists"][0]["tasks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["position"].as_i64().unwrap())
            .collect();
        // Siblings keep their stored positions; the gap at 0 stays.
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_board_error_status_mapping() {
        fn status_of(err: BoardError) -> StatusCode {
            ApiError::from(err).into_response().status()
        }
        assert_eq!(status_of(BoardError::missing("name")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BoardError::NotFoundOrForbidden), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AuthError::MissingToken.into()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::InvalidToken.into()), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(BoardError::Persistence(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BoardError::IdentityProvider("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
