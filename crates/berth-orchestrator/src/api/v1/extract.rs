//! Request extractors that reject with the operation envelope.
//!
//! axum's own `Json`, `Path` and `Query` answer a malformed body, id or
//! query string with plain text. These wrappers turn the rejection into a
//! `validation_error` envelope so every tenant endpoint speaks one format.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::OrchestratorError;
use crate::service::OperationResult;

/// A request that could not be decoded into handler arguments.
#[derive(Debug)]
pub struct RequestRejection(OrchestratorError);

impl RequestRejection {
    fn new(field: &str, reason: String) -> Self {
        RequestRejection(OrchestratorError::Validation {
            field: field.to_string(),
            reason,
        })
    }
}

impl IntoResponse for RequestRejection {
    fn into_response(self) -> Response {
        let result: OperationResult<()> = OperationResult::err(&self.0);
        (StatusCode::BAD_REQUEST, Json(result)).into_response()
    }
}

/// `Json` that rejects with a `body` validation error.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RequestRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> RequestRejection {
    RequestRejection::new("body", rejection.body_text())
}

/// `Path` that rejects with a `tenant_id` validation error.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = RequestRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(path_rejection(rejection)),
        }
    }
}

fn path_rejection(rejection: PathRejection) -> RequestRejection {
    RequestRejection::new("tenant_id", rejection.body_text())
}

/// `Query` that rejects with a validation error naming the query string.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RequestRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> RequestRejection {
    RequestRejection::new("query", rejection.body_text())
}
