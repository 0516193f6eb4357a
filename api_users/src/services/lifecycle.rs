//! Loyalty role transitions on an in-memory `User`.
//!
//! Nothing here touches the store; callers load, transition and save inside
//! one transaction.

use common::{misc::Role, secret};
use db::models::user::User;
use uuid::Uuid;

/// Personal data a loyalty customer must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalData {
    pub name: String,
    pub surname: String,
    pub birth_date: i64,
}

/// Role change requested by an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Promote(PersonalData),
    Downgrade,
}

impl Transition {
    /// `None` when the loyalty role is requested without complete personal data.
    /// Any other request, including one without a role, is a downgrade.
    pub fn requested(
        role: Option<Role>,
        name: Option<&str>,
        surname: Option<&str>,
        birth_date: Option<i64>,
    ) -> Option<Transition> {
        match role {
            None | Some(Role::Customer) => Some(Transition::Downgrade),
            Some(Role::LoyaltyCustomer) => match (name, surname, birth_date) {
                (Some(name), Some(surname), Some(birth_date))
                    if !name.trim().is_empty() && !surname.trim().is_empty() =>
                {
                    Some(Transition::Promote(PersonalData {
                        name: name.to_string(),
                        surname: surname.to_string(),
                        birth_date,
                    }))
                }
                _ => None,
            },
        }
    }
}

/// Applies `transition`. Returns `true` when a customer code was issued.
pub fn apply(user: &mut User, transition: Transition) -> bool {
    match transition {
        Transition::Promote(personal) => promote(user, personal),
        Transition::Downgrade => {
            downgrade(user);
            false
        }
    }
}

/// Enrolls the user. The customer code and counters are created only on the
/// first enrollment and reused afterwards.
pub fn promote(user: &mut User, personal: PersonalData) -> bool {
    user.role = Role::LoyaltyCustomer;
    user.name = Some(personal.name);
    user.surname = Some(personal.surname);
    user.birth_date = Some(personal.birth_date);

    if user.customer_code.is_some() {
        return false;
    }
    user.customer_code = Some(secret::generate_customer_code());
    user.residual_points = Some(0);
    user.points_used = Some(0);
    true
}

/// Back to a plain customer. Loyalty history is kept.
pub fn downgrade(user: &mut User) {
    user.role = Role::Customer;
    user.name = None;
    user.surname = None;
    user.birth_date = None;
}

/// Address a cleared user is moved to.
pub fn anonymized_email(id: Uuid) -> String {
    format!("{}@deleted.com", id)
}

/// Erases personal data and credentials. Loyalty history is kept.
pub fn clear_data(user: &mut User, unusable_password: String) {
    user.role = Role::Customer;
    user.name = Some(String::new());
    user.surname = Some(String::new());
    user.birth_date = None;
    user.email = anonymized_email(user.id);
    user.salted_password = unusable_password;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn customer() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            role: Role::Customer,
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

    fn jo() -> PersonalData {
        PersonalData {
            name: "Jo".into(),
            surname: "Doe".into(),
            birth_date: 123,
        }
    }

    #[test]
    fn loyalty_request_needs_all_personal_fields() {
        let role = Some(Role::LoyaltyCustomer);
        assert_eq!(
            Transition::requested(role, Some("Jo"), Some("Doe"), None),
            None
        );
        assert_eq!(
            Transition::requested(role, Some(""), Some("Doe"), Some(1)),
            None
        );
        assert_eq!(
            Transition::requested(role, Some("Jo"), Some("Doe"), Some(123)),
            Some(Transition::Promote(jo()))
        );
        assert_eq!(
            Transition::requested(Some(Role::Customer), None, None, None),
            Some(Transition::Downgrade)
        );
        assert_eq!(
            Transition::requested(None, Some("Jo"), Some("Doe"), Some(123)),
            Some(Transition::Downgrade)
        );
    }

    #[test]
    fn first_promotion_issues_code_and_zeroes_counters() {
        let mut user = customer();
        assert!(promote(&mut user, jo()));

        assert_eq!(user.role, Role::LoyaltyCustomer);
        assert!(!user.customer_code.as_deref().unwrap_or_default().is_empty());
        assert_eq!(user.residual_points, Some(0));
        assert_eq!(user.points_used, Some(0));
        assert_eq!(user.name.as_deref(), Some("Jo"));
    }

    #[test]
    fn repromotion_keeps_code_and_balance() {
        let mut user = customer();
        promote(&mut user, jo());
        let code = user.customer_code.clone();
        user.residual_points = Some(60);
        user.points_used = Some(40);

        downgrade(&mut user);
        assert_eq!(user.role, Role::Customer);
        assert_eq!(user.name, None);
        assert_eq!(user.customer_code, code);

        assert!(!promote(&mut user, jo()));
        assert_eq!(user.customer_code, code);
        assert_eq!(user.residual_points, Some(60));
        assert_eq!(user.points_used, Some(40));
    }

    #[test]
    fn clear_data_anonymizes_but_keeps_loyalty_history() {
        let mut user = customer();
        promote(&mut user, jo());
        let code = user.customer_code.clone();

        clear_data(&mut user, "fresh".into());

        assert_eq!(user.role, Role::Customer);
        assert_eq!(user.name.as_deref(), Some(""));
        assert_eq!(user.surname.as_deref(), Some(""));
        assert_eq!(user.birth_date, None);
        assert_eq!(user.email, format!("{}@deleted.com", user.id));
        assert_eq!(user.salted_password, "fresh");
        assert_eq!(user.customer_code, code);
        assert_eq!(user.residual_points, Some(0));
    }

    #[test]
    fn request_without_role_clears_personal_data() {
        let mut user = customer();
        promote(&mut user, jo());
        let code = user.customer_code.clone();

        let transition = Transition::requested(None, None, None, None).unwrap();
        assert!(!apply(&mut user, transition));

        assert_eq!(user.role, Role::Customer);
        assert_eq!(user.name, None);
        assert_eq!(user.surname, None);
        assert_eq!(user.birth_date, None);
        assert_eq!(user.customer_code, code);
    }
}
