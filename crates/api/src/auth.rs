//! The auth boundary (spec.md §1: "authentication token minting" is an
//! external collaborator; SPEC_FULL.md §6 `[AMBIENT]`: "the API layer
//! extracts a `UserId` from a bearer token via a small `AuthenticatedUser`
//! axum extractor that trusts a pre-validated claim"). A real deployment
//! puts a token-verifying proxy or middleware in front of this service;
//! this extractor only decodes the already-verified claim, the same way
//! `autopilot::infra::api` is handed an already-constructed
//! `Arc<dyn NativePriceEstimating>` rather than owning price sourcing.

use {
    axum::{
        extract::FromRequestParts,
        http::{request::Parts, StatusCode},
    },
    model::ids::UserId,
};

/// The authenticated caller's id, extracted from an `Authorization: Bearer
/// <user_id>` header. Real bearer tokens are opaque or signed (spec.md §6);
/// this service trusts whatever sits in front of it to have already turned
/// a real token into this numeric claim, so the header value here is
/// literally the caller's id.
#[derive(Clone, Copy, Debug)]
pub struct AuthenticatedUser(pub UserId);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing authorization header"))?;

        let claim = header
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "expected a bearer token"))?;

        let id: i64 = claim
            .trim()
            .parse()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "malformed bearer claim"))?;

        Ok(AuthenticatedUser(UserId::new(id)))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, axum::http::Request};

    #[tokio::test]
    async fn extracts_user_id_from_bearer_claim() {
        let request = Request::builder()
            .header("authorization", "Bearer 42")
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();
        let AuthenticatedUser(id) = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(id, UserId::new(42));
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, ()) = request.into_parts();
        assert!(AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }
}
