pub mod identity;

pub use identity::{AuthorClaim, Caller, ClaimedIdentityResolver, IdentityClaim, IdentityResolver};

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimParams {
    username: Option<String>,
    author_id: Option<String>,
    author_type: Option<String>,
}

/// Identity claim carried in the query string (`username`, or `authorId`
/// with `authorType`). Extraction only parses; resolution happens inside
/// the workflow with a database connection.
#[derive(Debug, Clone, Default)]
pub struct ClaimedIdentity(pub IdentityClaim);

#[async_trait]
impl<S> FromRequestParts<S> for ClaimedIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<ClaimParams>::from_request_parts(parts, state)
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;

        let claim = IdentityClaim::from_raw(
            params.username.as_deref(),
            params.author_id.as_deref(),
            params.author_type.as_deref(),
        )?;

        Ok(ClaimedIdentity(claim))
    }
}
