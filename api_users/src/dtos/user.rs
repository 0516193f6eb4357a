use common::misc::Role;
use db::{
    dtos::user::{SortColumn, SortOrder},
    models::user::User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input of `saveOrUpdate`. Creates a user when `id` is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub id: Option<Uuid>,
    pub role: Option<Role>,
    pub name: Option<String>,
    pub surname: Option<String>,
    /// Epoch milliseconds.
    pub birth_date: Option<i64>,
    pub email: Option<String>,
    pub salted_password: Option<String>,
    /// Epoch milliseconds.
    pub last_purchase_date: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddressRequest {
    pub email_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsData {
    pub user_id: Uuid,
    pub points: i64,
    pub customer_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsResponse {
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPurchaseRequest {
    /// Epoch milliseconds.
    pub date: i64,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateUpdated {
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearsRequest {
    pub year: i64,
}

/// Notification handed to the mailer for one demoted customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDto {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailList {
    pub email_templates: Vec<EmailDto>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortColumn>,
    pub order: Option<SortOrder>,
    pub role: Option<Role>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedUsers {
    pub elements_number: i64,
    pub users: Vec<User>,
}
