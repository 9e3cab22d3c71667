use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::board::models::{List, MoveTaskRequest, NameRequest, Project, ProjectBoard, Task};
use crate::config::ClientConfig;
use crate::errors::{AuthError, BoardError};

/// Remote operations the board manager depends on.
#[async_trait]
pub trait BoardApi: Send + Sync + 'static {
    async fn list_projects(&self) -> Result<Vec<Project>, BoardError>;
    async fn create_project(&self, name: &str) -> Result<Project, BoardError>;
    async fn get_project(&self, project_id: i64) -> Result<ProjectBoard, BoardError>;
    async fn delete_project(&self, project_id: i64) -> Result<(), BoardError>;
    async fn create_list(&self, project_id: i64, name: &str) -> Result<List, BoardError>;
    async fn create_task(&self, project_id: i64, list_id: i64, name: &str)
    -> Result<Task, BoardError>;
    async fn update_task_position(
        &self,
        task_id: i64,
        list_id: i64,
        position: i32,
    ) -> Result<Task, BoardError>;
    async fn delete_task(&self, task_id: i64) -> Result<(), BoardError>;
}

/// [`BoardApi`] over HTTP with a bearer token.
pub struct HttpBoardApi {
    client: reqwest::Client,
    config: ClientConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Map a non-success status to the error taxonomy.
fn status_error(status: StatusCode, message: Option<String>) -> BoardError {
    match status {
        StatusCode::BAD_REQUEST => {
            BoardError::Validation(message.unwrap_or_else(|| "invalid request".to_string()))
        }
        StatusCode::UNAUTHORIZED => AuthError::MissingToken.into(),
        StatusCode::FORBIDDEN => AuthError::InvalidToken.into(),
        StatusCode::NOT_FOUND => BoardError::NotFoundOrForbidden,
        other => BoardError::Network(match message {
            Some(msg) => format!("server returned {}: {}", other, msg),
            None => format!("server returned {}", other),
        }),
    }
}

impl HttpBoardApi {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.config.base_url, path));
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, BoardError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| BoardError::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.json::<ErrorBody>().await.ok().map(|b| b.error);
        Err(status_error(status, message))
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, BoardError> {
        Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| BoardError::Network(format!("bad response body: {}", e)))
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn list_projects(&self) -> Result<Vec<Project>, BoardError> {
        Self::send_json(self.request(Method::GET, "/api/projects")).await
    }

    async fn create_project(&self, name: &str) -> Result<Project, BoardError> {
        Self::send_json(
            self.request(Method::POST, "/api/projects")
                .json(&NameRequest::new(name)),
        )
        .await
    }

    async fn get_project(&self, project_id: i64) -> Result<ProjectBoard, BoardError> {
        Self::send_json(self.request(Method::GET, &format!("/api/projects/{}", project_id))).await
    }

    async fn delete_project(&self, project_id: i64) -> Result<(), BoardError> {
        Self::send(self.request(Method::DELETE, &format!("/api/projects/{}", project_id))).await?;
        Ok(())
    }

    async fn create_list(&self, project_id: i64, name: &str) -> Result<List, BoardError> {
        Self::send_json(
            self.request(Method::POST, &format!("/api/projects/{}/lists", project_id))
                .json(&NameRequest::new(name)),
        )
        .await
    }

    async fn create_task(
        &self,
        project_id: i64,
        list_id: i64,
        name: &str,
    ) -> Result<Task, BoardError> {
        Self::send_json(
            self.request(
                Method::POST,
                &format!("/api/projects/{}/lists/{}/tasks", project_id, list_id),
            )
            .json(&NameRequest::new(name)),
        )
        .await
    }

    async fn update_task_position(
        &self,
        task_id: i64,
        list_id: i64,
        position: i32,
    ) -> Result<Task, BoardError> {
        let body = MoveTaskRequest {
            list_id: Some(list_id),
            position: Some(position),
        };
        Self::send_json(
            self.request(Method::PUT, &format!("/api/tasks/{}", task_id))
                .json(&body),
        )
        .await
    }

    async fn delete_task(&self, task_id: i64) -> Result<(), BoardError> {
        Self::send(self.request(Method::DELETE, &format!("/api/tasks/{}", task_id))).await?;
        Ok(())
    }
}
