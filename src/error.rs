use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

use crate::workflow::WorkflowError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "user is not authenticated")
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "insufficient permissions to perform this action",
        )
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            reason: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    reason: String,
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            _ => {
                error!(error = %value, "database error");
                AppError::internal("internal server error")
            }
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::InvalidInput(message) => AppError::bad_request(message),
            WorkflowError::Unauthenticated => AppError::unauthorized(),
            WorkflowError::Forbidden => AppError::forbidden(),
            WorkflowError::NotFound(what) => {
                AppError::new(StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            WorkflowError::Conflict(message) => AppError::conflict(message),
            WorkflowError::Database(err) => AppError::from(err),
            WorkflowError::Internal(message) => {
                error!(%message, "workflow failure");
                AppError::internal("internal server error")
            }
        }
    }
}

/// Undecodable bodies are invalid input, not 422s.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        let cases = [
            (WorkflowError::invalid("bad"), StatusCode::BAD_REQUEST),
            (WorkflowError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (WorkflowError::Forbidden, StatusCode::FORBIDDEN),
            (WorkflowError::NotFound("tender"), StatusCode::NOT_FOUND),
            (WorkflowError::conflict("stale"), StatusCode::CONFLICT),
            (
                WorkflowError::Internal("corrupt".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }

    #[test]
    fn diesel_not_found_is_a_404() {
        let error = AppError::from(WorkflowError::Database(diesel::result::Error::NotFound));
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    mod rejections {
        use axum::{body::Body, extract::Path, http::Request, routing::post, Json, Router};
        use axum_extra::extract::WithRejection;
        use http_body_util::BodyExt;
        use serde::Deserialize;
        use tower::ServiceExt;
        use uuid::Uuid;

        use super::*;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            #[allow(dead_code)]
            tender_id: Uuid,
        }

        async fn accept(
            WithRejection(Path(_id), _): WithRejection<Path<Uuid>, AppError>,
            WithRejection(Json(_payload), _): WithRejection<Json<Payload>, AppError>,
        ) -> StatusCode {
            StatusCode::OK
        }

        async fn send(uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
            let router = Router::new().route("/items/:id", post(accept));
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let response = router.oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        #[tokio::test]
        async fn malformed_json_field_is_a_json_400() {
            let uri = format!("/items/{}", Uuid::new_v4());
            let (status, body) = send(&uri, r#"{"tenderId":"not-a-uuid"}"#).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["reason"].is_string());
        }

        #[tokio::test]
        async fn missing_json_field_is_a_json_400() {
            let uri = format!("/items/{}", Uuid::new_v4());
            let (status, body) = send(&uri, "{}").await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["reason"].as_str().unwrap().contains("tenderId"));
        }

        #[tokio::test]
        async fn malformed_path_id_is_a_json_400() {
            let body = format!(r#"{{"tenderId":"{}"}}"#, Uuid::new_v4());
            let (status, body) = send("/items/not-a-uuid", &body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["reason"].is_string());
        }
    }

    #[test]
    fn not_found_names_the_missing_entity() {
        let error = AppError::from(WorkflowError::NotFound("bid"));
        assert_eq!(error.message, "bid not found");
    }
}
