use chrono::{DateTime, Utc};
use common::misc::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields of a user about to be inserted. The store assigns id and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub role: Role,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub birth_date: Option<i64>,
    pub customer_code: Option<String>,
    pub residual_points: Option<i64>,
    pub points_used: Option<i64>,
    pub email: String,
    pub salted_password: String,
    pub last_purchase_date: Option<DateTime<Utc>>,
}

impl NewUser {
    pub fn customer(email: impl Into<String>, salted_password: impl Into<String>) -> Self {
        NewUser {
            role: Role::Customer,
            name: None,
            surname: None,
            birth_date: None,
            customer_code: None,
            residual_points: None,
            points_used: None,
            email: email.into(),
            salted_password: salted_password.into(),
            last_purchase_date: None,
        }
    }
}

/// Partial update applied without reading the record first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub role: Option<Role>,
    pub residual_points: Option<i64>,
    pub last_purchase_date: Option<DateTime<Utc>>,
    /// Sets name, surname and birth date to NULL.
    pub clear_personal_data: bool,
    /// The patch only applies while the stored record still matches.
    pub only_if: PatchGuard,
}

/// Conditions a record must meet at write time for a [`UserPatch`] to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchGuard {
    pub role: Option<Role>,
    /// Strictly before; a record without a purchase does not match.
    pub last_purchase_before: Option<DateTime<Utc>>,
}

impl PatchGuard {
    pub fn matches(&self, role: Role, last_purchase_date: Option<DateTime<Utc>>) -> bool {
        self.role.is_none_or(|expected| role == expected)
            && self
                .last_purchase_before
                .is_none_or(|before| last_purchase_date.is_some_and(|d| d < before))
    }
}

/// Predicate for sequential scans, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Strictly before; users without a purchase never match.
    pub last_purchase_before: Option<DateTime<Utc>>,
    /// Keyset cursor: only ids greater than this one.
    pub after_id: Option<Uuid>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    #[default]
    Id,
    CreatedAt,
    UpdatedAt,
    Name,
    Surname,
    Email,
    LastPurchaseDate,
}

impl SortColumn {
    pub fn column(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
            SortColumn::Name => "name",
            SortColumn::Surname => "surname",
            SortColumn::Email => "email",
            SortColumn::LastPurchaseDate => "last_purchase_date",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based.
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortColumn,
    pub order: SortOrder,
    pub role: Option<Role>,
    /// Case-insensitive substring of name, surname or email.
    pub search: Option<String>,
}

impl PageQuery {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        PageQuery {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
            sort_by: SortColumn::default(),
            order: SortOrder::default(),
            role: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
