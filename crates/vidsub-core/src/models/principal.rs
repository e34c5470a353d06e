use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

/// The authenticated caller and the capabilities the host granted them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
    /// Assignments the caller may grade.
    pub grader_of: Vec<i64>,
    /// Submissions the host records as belonging to the caller.
    pub submissions: Vec<i64>,
    /// Set by the host for service accounts and bulk graders.
    pub rate_limit_bypass: bool,
}

impl Principal {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            grader_of: Vec::new(),
            submissions: Vec::new(),
            rate_limit_bypass: false,
        }
    }

    pub fn with_grading(mut self, assignment_ids: impl IntoIterator<Item = i64>) -> Self {
        self.grader_of.extend(assignment_ids);
        self
    }

    pub fn with_submissions(mut self, submission_ids: impl IntoIterator<Item = i64>) -> Self {
        self.submissions.extend(submission_ids);
        self
    }

    pub fn owns_submission(&self, submission_id: i64) -> bool {
        self.submissions.contains(&submission_id)
    }

    pub fn is_site_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_grade(&self, assignment_id: i64) -> bool {
        self.is_site_admin() || self.grader_of.contains(&assignment_id)
    }

    pub fn bypasses_rate_limit(&self) -> bool {
        self.is_site_admin() || self.rate_limit_bypass
    }
}
