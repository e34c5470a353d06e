use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use vidsub_core::models::{Principal, Role};
use vidsub_core::VideoError;

/// JWT claims issued by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: i64, // user_id
    pub role: String, // "student", "teacher" or "admin"
    /// Assignments the user may grade.
    #[serde(default)]
    pub grader_of: Vec<i64>,
    /// Submissions the user owns.
    #[serde(default)]
    pub submissions: Vec<i64>,
    #[serde(default)]
    pub rate_limit_bypass: bool,
    pub exp: i64,
    pub iat: i64,
}

impl JwtClaims {
    pub fn into_principal(self) -> Result<Principal, VideoError> {
        let role = parse_role(&self.role)?;
        let mut principal = Principal::new(self.sub, role)
            .with_grading(self.grader_of)
            .with_submissions(self.submissions);
        principal.rate_limit_bypass = self.rate_limit_bypass;
        Ok(principal)
    }
}

/// Parse user role from string
pub fn parse_role(role: &str) -> Result<Role, VideoError> {
    match role {
        "student" => Ok(Role::Student),
        "teacher" => Ok(Role::Teacher),
        "admin" => Ok(Role::Admin),
        _ => Err(VideoError::Auth("Invalid user role".to_string())),
    }
}

/// The authenticated principal, placed in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| HttpAppError(VideoError::Auth("Missing principal".to_string())))
    }
}
