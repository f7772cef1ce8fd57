use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::{error::AppError, state::pvp_match::UserId};

/// Header carrying the caller's identity, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Deserialize)]
struct IdentityQuery {
    user_id: Option<String>,
}

/// Caller identity as asserted upstream. Taken from `X-User-Id`, or from the `user_id`
/// query parameter for clients that cannot set headers.
#[derive(Debug, Clone)]
pub struct Identity(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let user_id = from_header.or_else(|| {
            Query::<IdentityQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.user_id)
                .filter(|value| !value.trim().is_empty())
        });

        user_id
            .map(Identity)
            .ok_or_else(|| AppError::Unauthorized("missing user identity".into()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<Identity, AppError> {
        let (mut parts, _) = request.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn header_takes_precedence_over_query() {
        let request = Request::builder()
            .uri("/pvp/ws?user_id=bob")
            .header("X-User-Id", "alice")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap().0, "alice");
    }

    #[tokio::test]
    async fn query_parameter_is_accepted() {
        let request = Request::builder()
            .uri("/pvp/ws?user_id=bob")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap().0, "bob");
    }

    #[tokio::test]
    async fn missing_identity_is_rejected() {
        let request = Request::builder().uri("/pvp/history").body(()).unwrap();
        assert!(matches!(
            extract(request).await,
            Err(AppError::Unauthorized(_))
        ));
        let blank = Request::builder()
            .uri("/pvp/history")
            .header("X-User-Id", "  ")
            .body(())
            .unwrap();
        assert!(extract(blank).await.is_err());
    }
}
