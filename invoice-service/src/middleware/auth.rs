use crate::services::JwtVerifier;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

/// Identity of the authenticated caller (the token's `sub`).
///
/// Inserted by [`auth_middleware`]; every invoice and profile is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing Authorization header")))?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::Unauthorized(anyhow::anyhow!(
            "Authorization header must be a Bearer token"
        ))),
    }
}

/// Verify the bearer token and attach the caller's [`Owner`] to the request.
pub async fn auth_middleware(
    State(verifier): State<JwtVerifier>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = verifier.verify(bearer_token(&request)?).map_err(|e| {
        tracing::warn!(error = %e, "Rejected bearer token");
        e
    })?;

    tracing::Span::current().record("user_id", claims.sub.as_str());
    request.extensions_mut().insert(Owner(claims.sub));

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Owner>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not authenticated")))
    }
}
