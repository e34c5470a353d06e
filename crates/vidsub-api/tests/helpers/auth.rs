use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use vidsub_api::auth::JwtClaims;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

pub const STUDENT_ID: i64 = 100;
pub const OTHER_STUDENT_ID: i64 = 200;
pub const TEACHER_ID: i64 = 5;
pub const ADMIN_ID: i64 = 1;

/// Submission owned by [`STUDENT_ID`].
pub const STUDENT_SUBMISSION: i64 = 42;
/// Submission owned by [`OTHER_STUDENT_ID`].
pub const OTHER_STUDENT_SUBMISSION: i64 = 43;

fn mint(sub: i64, role: &str, grader_of: Vec<i64>, submissions: Vec<i64>) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub,
        role: role.to_string(),
        grader_of,
        submissions,
        rate_limit_bypass: false,
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

pub fn student_token() -> String {
    mint(STUDENT_ID, "student", Vec::new(), vec![STUDENT_SUBMISSION])
}

pub fn other_student_token() -> String {
    mint(OTHER_STUDENT_ID, "student", Vec::new(), vec![OTHER_STUDENT_SUBMISSION])
}

/// Teacher grading the given assignments.
pub fn teacher_token(assignments: &[i64]) -> String {
    mint(TEACHER_ID, "teacher", assignments.to_vec(), Vec::new())
}

pub fn admin_token() -> String {
    mint(ADMIN_ID, "admin", Vec::new(), Vec::new())
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
