use chrono::{DateTime, Utc};
use common::{error::AppError, misc::Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub name: Option<String>,
    pub surname: Option<String>,
    /// Epoch milliseconds.
    pub birth_date: Option<i64>,
    pub customer_code: Option<String>,
    pub residual_points: Option<i64>,
    pub points_used: Option<i64>,
    pub email: String,
    pub salted_password: String,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

/// Raw `users` row; `role` is kept as text and checked on conversion.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub role: String,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub birth_date: Option<i64>,
    pub customer_code: Option<String>,
    pub residual_points: Option<i64>,
    pub points_used: Option<i64>,
    pub email: String,
    pub salted_password: String,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| AppError::Internal(format!("Corrupt user {}: {}", row.id, e)))?;

        Ok(User {
            id: row.id,
            role,
            name: row.name,
            surname: row.surname,
            birth_date: row.birth_date,
            customer_code: row.customer_code,
            residual_points: row.residual_points,
            points_used: row.points_used,
            email: row.email,
            salted_password: row.salted_password,
            last_purchase_date: row.last_purchase_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            role: role.to_string(),
            name: None,
            surname: None,
            birth_date: None,
            customer_code: None,
            residual_points: None,
            points_used: None,
            email: "a@x.com".to_string(),
            salted_password: "s".to_string(),
            last_purchase_date: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn row_converts_known_roles() {
        let user = User::try_from(row("LOYALTY_CUSTOMER")).unwrap();
        assert_eq!(user.role, Role::LoyaltyCustomer);
        assert_eq!(user.customer_code, None);
    }

    #[test]
    fn row_with_unknown_role_is_rejected() {
        assert!(matches!(
            User::try_from(row("ADMIN")),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn user_serializes_camel_case() {
        let user = User::try_from(row("CUSTOMER")).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "CUSTOMER");
        assert_eq!(json["saltedPassword"], "s");
        assert!(json["customerCode"].is_null());
    }
}
