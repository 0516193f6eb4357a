//! Request validation, run before any store access.

use chrono::{DateTime, Utc};
use common::{
    error::{AppError, Res, ValidationErrors},
    misc::Role,
};
use db::dtos::user::PageQuery;

use crate::dtos::user::{FindRequest, PointsData, UserDraft};

/// Longest accepted inactivity window for the expiry sweep.
pub const MAX_SWEEP_YEARS: i64 = 200;

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Loose address check: `local@domain.tld`, no whitespace.
pub fn is_email_address(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn timestamp_from_millis(field: &'static str, millis: i64) -> Res<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.add(field, "is not a representable timestamp");
        AppError::Validation(errors)
    })
}

pub fn validate_user_draft(draft: &UserDraft) -> Res<()> {
    let mut errors = ValidationErrors::new();

    if draft.id.is_none() {
        if is_blank(draft.email.as_deref()) {
            errors.add("email", "is required to create a user");
        }
        if is_blank(draft.salted_password.as_deref()) {
            errors.add("saltedPassword", "is required to create a user");
        }
    }
    if let Some(email) = draft.email.as_deref().filter(|e| !e.trim().is_empty()) {
        if !is_email_address(email) {
            errors.add("email", "is not a valid email address");
        }
    }
    if draft.id.is_some() && draft.salted_password.as_deref() == Some("") {
        errors.add("saltedPassword", "must not be empty");
    }

    if draft.role == Some(Role::LoyaltyCustomer) {
        if is_blank(draft.name.as_deref()) {
            errors.add("name", "is required for a loyalty customer");
        }
        if is_blank(draft.surname.as_deref()) {
            errors.add("surname", "is required for a loyalty customer");
        }
        if draft.birth_date.is_none() {
            errors.add("birthDate", "is required for a loyalty customer");
        }
    }

    if let Some(millis) = draft.last_purchase_date {
        if DateTime::<Utc>::from_timestamp_millis(millis).is_none() {
            errors.add("lastPurchaseDate", "is not a representable timestamp");
        }
    }

    errors.into_result()
}

pub fn validate_email_address(email: &str) -> Res<()> {
    let mut errors = ValidationErrors::new();
    if !is_email_address(email) {
        errors.add("emailAddress", "is not a valid email address");
    }
    errors.into_result()
}

/// `reject_negative` refuses negative amounts. A negative spend credits
/// points, which a ledger with a balance floor does not allow.
pub fn validate_points_data(data: &PointsData, reject_negative: bool) -> Res<()> {
    let mut errors = ValidationErrors::new();
    if data.customer_code.trim().is_empty() {
        errors.add("customerCode", "is required");
    }
    if reject_negative && data.points < 0 {
        errors.add("points", "must not be negative");
    }
    errors.into_result()
}

pub fn validate_years(years: i64) -> Res<u32> {
    let mut errors = ValidationErrors::new();
    if !(1..=MAX_SWEEP_YEARS).contains(&years) {
        errors.add(
            "year",
            format!("must be between 1 and {}", MAX_SWEEP_YEARS),
        );
    }
    errors.into_result()?;
    u32::try_from(years).map_err(|e| AppError::Internal(e.to_string()))
}

pub fn page_query(request: &FindRequest) -> Res<PageQuery> {
    let mut errors = ValidationErrors::new();
    let page = request.page.unwrap_or(1);
    if page == 0 {
        errors.add("page", "starts at 1");
    }
    let limit = request.limit.unwrap_or(PageQuery::DEFAULT_LIMIT);
    if limit == 0 || limit > PageQuery::MAX_LIMIT {
        errors.add(
            "limit",
            format!("must be between 1 and {}", PageQuery::MAX_LIMIT),
        );
    }
    errors.into_result()?;

    Ok(PageQuery {
        page,
        limit,
        sort_by: request.sort_by.unwrap_or_default(),
        order: request.order.unwrap_or_default(),
        role: request.role,
        search: request
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn violations(result: Res<()>) -> Vec<&'static str> {
        match result {
            Err(AppError::Validation(errors)) => {
                errors.violations().iter().map(|v| v.field).collect()
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_addresses() {
        assert!(is_email_address("a@x.com"));
        assert!(is_email_address("3f2a@deleted.com"));
        assert!(!is_email_address("a@x"));
        assert!(!is_email_address("@x.com"));
        assert!(!is_email_address("a@@x.com"));
        assert!(!is_email_address("a b@x.com"));
        assert!(!is_email_address("a@x."));
    }

    #[test]
    fn creation_requires_email_and_password() {
        let draft = UserDraft::default();
        assert_eq!(
            violations(validate_user_draft(&draft)),
            vec!["email", "saltedPassword"]
        );

        let draft = UserDraft {
            email: Some("a@x.com".into()),
            salted_password: Some("s".into()),
            ..UserDraft::default()
        };
        assert!(validate_user_draft(&draft).is_ok());
    }

    #[test]
    fn loyalty_role_requires_personal_data() {
        let draft = UserDraft {
            id: Some(Uuid::new_v4()),
            role: Some(Role::LoyaltyCustomer),
            name: Some("  ".into()),
            ..UserDraft::default()
        };
        assert_eq!(
            violations(validate_user_draft(&draft)),
            vec!["name", "surname", "birthDate"]
        );
    }

    #[test]
    fn update_may_omit_credentials_but_not_blank_them() {
        let draft = UserDraft {
            id: Some(Uuid::new_v4()),
            ..UserDraft::default()
        };
        assert!(validate_user_draft(&draft).is_ok());

        let draft = UserDraft {
            id: Some(Uuid::new_v4()),
            salted_password: Some(String::new()),
            email: Some("not-an-email".into()),
            ..UserDraft::default()
        };
        assert_eq!(
            violations(validate_user_draft(&draft)),
            vec!["email", "saltedPassword"]
        );
    }

    #[test]
    fn out_of_range_timestamps_are_rejected() {
        let draft = UserDraft {
            id: Some(Uuid::new_v4()),
            last_purchase_date: Some(i64::MAX),
            ..UserDraft::default()
        };
        assert_eq!(
            violations(validate_user_draft(&draft)),
            vec!["lastPurchaseDate"]
        );
        assert!(timestamp_from_millis("date", 0).is_ok());
    }

    #[test]
    fn negative_points_rejected_only_on_request() {
        let data = PointsData {
            user_id: Uuid::new_v4(),
            points: -5,
            customer_code: "code".into(),
        };
        assert!(validate_points_data(&data, false).is_ok());
        assert_eq!(violations(validate_points_data(&data, true)), vec!["points"]);
    }

    #[test]
    fn years_must_be_positive() {
        assert_eq!(validate_years(2).unwrap(), 2);
        assert!(validate_years(0).is_err());
        assert!(validate_years(-1).is_err());
        assert!(validate_years(MAX_SWEEP_YEARS + 1).is_err());
    }

    #[test]
    fn page_query_defaults_and_bounds() {
        let query = page_query(&FindRequest::default()).unwrap();
        assert_eq!(query, PageQuery::default());

        let request = FindRequest {
            limit: Some(PageQuery::MAX_LIMIT + 1),
            page: Some(0),
            ..FindRequest::default()
        };
        assert!(matches!(page_query(&request), Err(AppError::Validation(_))));

        let request = FindRequest {
            search: Some("   ".into()),
            ..FindRequest::default()
        };
        assert_eq!(page_query(&request).unwrap().search, None);
    }
}
