use crate::auth::models::JwtClaims;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use vidsub_core::VideoError;

#[derive(Clone)]
pub struct AuthState {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthState {
    pub fn new(jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, VideoError> {
        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        VideoError::Auth("Token has expired".to_string())
                    }
                    _ => VideoError::Auth("Invalid or expired token".to_string()),
                }
            })?;
        Ok(token_data.claims)
    }
}

/// Resolve the bearer token into a [`Principal`](vidsub_core::models::Principal)
/// and store it in the request extensions.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
        Some(_) => {
            return HttpAppError(VideoError::Auth(
                "Invalid authorization header format".to_string(),
            ))
            .into_response();
        }
        None => {
            return HttpAppError(VideoError::Auth(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    let principal = match auth_state.verify(&token).and_then(JwtClaims::into_principal) {
        Ok(principal) => principal,
        Err(e) => return HttpAppError(e).into_response(),
    };

    tracing::debug!(
        user_id = principal.user_id,
        role = ?principal.role,
        "Request authenticated"
    );

    request.extensions_mut().insert(principal);
    next.run(request).await
}
