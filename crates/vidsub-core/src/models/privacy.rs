use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyEraseRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyEraseResponse {
    pub records_deleted: u64,
    pub remote_objects_deleted: u64,
    pub remote_delete_failures: u64,
    pub audit_entries_deleted: u64,
}
