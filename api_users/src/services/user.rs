use std::sync::Arc;

use common::{
    clock::Clock,
    env_config::LoyaltyConfig,
    error::{AppError, Res},
    secret,
};
use db::{
    dtos::user::{NewUser, Page, UserPatch},
    models::user::User,
    store::UserStore,
};
use uuid::Uuid;

use super::lifecycle::{self, Transition};
use crate::{
    dtos::user::{FindRequest, UserDraft},
    validation,
};

/// Rules the ledger and the sweep apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyPolicy {
    pub allow_negative_balance: bool,
    pub sweep_batch_size: u32,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        LoyaltyPolicy::from(&LoyaltyConfig::default())
    }
}

impl From<&LoyaltyConfig> for LoyaltyPolicy {
    fn from(config: &LoyaltyConfig) -> Self {
        LoyaltyPolicy {
            allow_negative_balance: config.allow_negative_balance,
            sweep_batch_size: config.sweep_batch_size,
        }
    }
}

/// User management, points ledger and loyalty sweep.
///
/// Every operation runs in its own store transaction.
#[derive(Clone)]
pub struct UserService {
    pub(crate) store: Arc<dyn UserStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) policy: LoyaltyPolicy,
}

/// Logs a failed operation at a level matching its cause.
pub(crate) fn log_outcome<T>(operation: &str, result: &Res<T>) {
    match result {
        Ok(_) => log::debug!("{} succeeded", operation),
        Err(err @ (AppError::Database(_) | AppError::Internal(_))) => {
            log::error!("{} failed: {}", operation, err)
        }
        Err(err) => log::warn!("{} rejected: {}", operation, err),
    }
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, clock: Arc<dyn Clock>, policy: LoyaltyPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Creates the user when `draft.id` is absent, updates it otherwise.
    ///
    /// Requesting the loyalty role needs name, surname and birth date; the
    /// first promotion issues the customer code and zeroed counters. Any other
    /// request, including one without a role, downgrades to a plain customer
    /// and clears the personal data. Email, password and last purchase date
    /// are overwritten when present.
    pub async fn save_or_update(&self, draft: UserDraft) -> Res<User> {
        let result = self.save_or_update_inner(draft).await;
        log_outcome("saveOrUpdate", &result);
        result
    }

    async fn save_or_update_inner(&self, draft: UserDraft) -> Res<User> {
        validation::validate_user_draft(&draft)?;
        let transition = Transition::requested(
            draft.role,
            draft.name.as_deref(),
            draft.surname.as_deref(),
            draft.birth_date,
        )
        .ok_or_else(|| {
            AppError::BadRequest("Loyalty customers need name, surname and birth date".into())
        })?;
        let last_purchase_date = draft
            .last_purchase_date
            .map(|millis| validation::timestamp_from_millis("lastPurchaseDate", millis))
            .transpose()?;

        let mut tx = self.store.begin().await?;
        let saved = match draft.id {
            Some(id) => {
                let mut user = tx
                    .find_by_id_for_update(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

                if lifecycle::apply(&mut user, transition) {
                    log::info!("User {} enrolled in the loyalty program", id);
                }
                if let Some(email) = draft.email.filter(|e| !e.is_empty()) {
                    user.email = email;
                }
                if let Some(password) = draft.salted_password.filter(|p| !p.is_empty()) {
                    user.salted_password = password;
                }
                if let Some(date) = last_purchase_date {
                    user.last_purchase_date = Some(date);
                }
                tx.save(&user).await?
            }
            None => {
                let (Some(email), Some(password)) = (draft.email, draft.salted_password) else {
                    return Err(AppError::BadRequest(
                        "Email and salted password are required".into(),
                    ));
                };
                let mut new_user = NewUser::customer(email, password);
                new_user.last_purchase_date = last_purchase_date;
                let created = tx.insert(new_user).await?;

                // direct enrollment goes through the same transition as an update
                if matches!(transition, Transition::Promote(_)) {
                    let mut user = created;
                    lifecycle::apply(&mut user, transition);
                    log::info!("User {} created as a loyalty customer", user.id);
                    tx.save(&user).await?
                } else {
                    created
                }
            }
        };
        tx.commit().await?;
        Ok(saved)
    }

    pub async fn find(&self, request: FindRequest) -> Res<Page<User>> {
        let result = async {
            let query = validation::page_query(&request)?;
            let mut tx = self.store.begin().await?;
            let page = tx.find_paginated(&query).await?;
            tx.commit().await?;
            Ok(page)
        }
        .await;
        log_outcome("find", &result);
        result
    }

    pub async fn find_one(&self, id: Uuid) -> Res<User> {
        let result = async {
            let mut tx = self.store.begin().await?;
            let user = tx.find_by_id(id).await?;
            tx.commit().await?;
            user.ok_or_else(|| AppError::NotFound(format!("User {}", id)))
        }
        .await;
        log_outcome("findOne", &result);
        result
    }

    pub async fn find_one_by_email(&self, email: &str) -> Res<User> {
        let result = async {
            validation::validate_email_address(email)?;
            let mut tx = self.store.begin().await?;
            let user = tx.find_by_email(email).await?;
            tx.commit().await?;
            user.ok_or_else(|| AppError::NotFound(format!("User with email {}", email)))
        }
        .await;
        log_outcome("findOneByEmail", &result);
        result
    }

    /// Anonymizes the user and drops it back to a plain customer.
    ///
    /// The customer code and point counters survive.
    pub async fn clear_data(&self, id: Uuid) -> Res<User> {
        let result = async {
            let unusable_password = secret::generate_unusable_password()?;
            let mut tx = self.store.begin().await?;
            let mut user = tx
                .find_by_id_for_update(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

            lifecycle::clear_data(&mut user, unusable_password);
            let saved = tx.save(&user).await?;
            tx.commit().await?;
            log::info!("Cleared personal data of user {}", id);
            Ok(saved)
        }
        .await;
        log_outcome("clearData", &result);
        result
    }

    /// Returns `false` when no user has this id.
    pub async fn set_last_purchase_date(&self, date_millis: i64, user_id: Uuid) -> Res<bool> {
        let result = async {
            let date = validation::timestamp_from_millis("date", date_millis)?;
            let mut tx = self.store.begin().await?;
            if tx.find_by_id_for_update(user_id).await?.is_none() {
                return Ok(false);
            }
            let patch = UserPatch {
                last_purchase_date: Some(date),
                ..UserPatch::default()
            };
            let updated = tx.update_fields(user_id, &patch).await?;
            tx.commit().await?;
            Ok(updated)
        }
        .await;
        log_outcome("setLastPurchaseDate", &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use common::{clock::FixedClock, misc::Role};
    use db::memory::MemoryUserStore;

    use super::*;

    fn service() -> (UserService, MemoryUserStore) {
        let store = MemoryUserStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let service = UserService::new(
            Arc::new(store.clone()),
            Arc::new(clock),
            LoyaltyPolicy::default(),
        );
        (service, store)
    }

    fn new_customer(email: &str) -> UserDraft {
        UserDraft {
            email: Some(email.into()),
            salted_password: Some("s".into()),
            role: Some(Role::Customer),
            ..UserDraft::default()
        }
    }

    fn promotion(id: Uuid) -> UserDraft {
        UserDraft {
            id: Some(id),
            role: Some(Role::LoyaltyCustomer),
            name: Some("Jo".into()),
            surname: Some("Doe".into()),
            birth_date: Some(123),
            ..UserDraft::default()
        }
    }

    #[tokio::test]
    async fn creates_plain_customer() {
        let (service, store) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();

        assert_eq!(user.role, Role::Customer);
        assert_eq!(user.customer_code, None);
        assert_eq!(user.residual_points, None);
        assert_eq!(store.get(user.id).await, Some(user));
    }

    #[tokio::test]
    async fn creation_without_credentials_persists_nothing() {
        let (service, store) = service();
        for draft in [
            UserDraft {
                email: Some("a@x.com".into()),
                ..UserDraft::default()
            },
            UserDraft {
                salted_password: Some("s".into()),
                ..UserDraft::default()
            },
        ] {
            let err = service.save_or_update(draft).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn promotion_requires_personal_data() {
        let (service, store) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();

        let mut draft = promotion(user.id);
        draft.birth_date = None;
        let err = service.save_or_update(draft).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.get(user.id).await.unwrap().customer_code, None);

        let promoted = service.save_or_update(promotion(user.id)).await.unwrap();
        assert_eq!(promoted.role, Role::LoyaltyCustomer);
        assert!(promoted.customer_code.is_some());
        assert_eq!(promoted.residual_points, Some(0));
        assert_eq!(promoted.points_used, Some(0));
    }

    #[tokio::test]
    async fn repeated_promotion_keeps_customer_code() {
        let (service, _) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();

        let first = service.save_or_update(promotion(user.id)).await.unwrap();
        let second = service.save_or_update(promotion(user.id)).await.unwrap();
        assert_eq!(first.customer_code, second.customer_code);
        assert_eq!(second.version, first.version + 1);
    }

    #[tokio::test]
    async fn downgrade_clears_personal_data_only() {
        let (service, _) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();
        let promoted = service.save_or_update(promotion(user.id)).await.unwrap();

        let downgraded = service
            .save_or_update(UserDraft {
                id: Some(user.id),
                role: Some(Role::Customer),
                ..UserDraft::default()
            })
            .await
            .unwrap();

        assert_eq!(downgraded.role, Role::Customer);
        assert_eq!(downgraded.name, None);
        assert_eq!(downgraded.birth_date, None);
        assert_eq!(downgraded.email, "a@x.com");
        assert_eq!(downgraded.customer_code, promoted.customer_code);
    }

    #[tokio::test]
    async fn update_without_role_downgrades_and_applies_given_fields() {
        let (service, _) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();
        let promoted = service.save_or_update(promotion(user.id)).await.unwrap();

        let updated = service
            .save_or_update(UserDraft {
                id: Some(user.id),
                email: Some("b@x.com".into()),
                last_purchase_date: Some(1_700_000_000_000),
                ..UserDraft::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.role, Role::Customer);
        assert_eq!(updated.name, None);
        assert_eq!(updated.surname, None);
        assert_eq!(updated.birth_date, None);
        assert_eq!(updated.customer_code, promoted.customer_code);
        assert_eq!(updated.email, "b@x.com");
        assert_eq!(
            updated.last_purchase_date,
            Utc.timestamp_millis_opt(1_700_000_000_000).single()
        );
    }

    #[tokio::test]
    async fn direct_loyalty_creation_enrolls() {
        let (service, _) = service();
        let user = service
            .save_or_update(UserDraft {
                role: Some(Role::LoyaltyCustomer),
                name: Some("Jo".into()),
                surname: Some("Doe".into()),
                birth_date: Some(123),
                ..new_customer("a@x.com")
            })
            .await
            .unwrap();

        assert_eq!(user.role, Role::LoyaltyCustomer);
        assert!(user.customer_code.is_some());
        assert_eq!(user.residual_points, Some(0));
    }

    #[tokio::test]
    async fn unknown_id_and_duplicate_email_fail() {
        let (service, _) = service();
        let err = service
            .save_or_update(promotion(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();
        let err = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn clear_data_is_idempotent() {
        let (service, _) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();
        let promoted = service.save_or_update(promotion(user.id)).await.unwrap();

        let once = service.clear_data(user.id).await.unwrap();
        let twice = service.clear_data(user.id).await.unwrap();

        for cleared in [&once, &twice] {
            assert_eq!(cleared.role, Role::Customer);
            assert_eq!(cleared.email, format!("{}@deleted.com", user.id));
            assert_eq!(cleared.name.as_deref(), Some(""));
            assert_eq!(cleared.surname.as_deref(), Some(""));
            assert_eq!(cleared.customer_code, promoted.customer_code);
        }
        assert_ne!(once.salted_password, "s");
        assert!(matches!(
            service.clear_data(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn lookups() {
        let (service, _) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();

        assert_eq!(service.find_one(user.id).await.unwrap().id, user.id);
        assert_eq!(
            service.find_one_by_email("a@x.com").await.unwrap().id,
            user.id
        );
        assert!(matches!(
            service.find_one_by_email("b@x.com").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.find_one_by_email("nope").await,
            Err(AppError::Validation(_))
        ));

        let page = service.find(FindRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, user.id);
    }

    #[tokio::test]
    async fn last_purchase_date_is_set() {
        let (service, store) = service();
        let user = service
            .save_or_update(new_customer("a@x.com"))
            .await
            .unwrap();

        assert!(
            service
                .set_last_purchase_date(1_700_000_000_000, user.id)
                .await
                .unwrap()
        );
        assert!(
            !service
                .set_last_purchase_date(1_700_000_000_000, Uuid::new_v4())
                .await
                .unwrap()
        );
        assert_eq!(
            store.get(user.id).await.unwrap().last_purchase_date,
            Utc.timestamp_millis_opt(1_700_000_000_000).single()
        );
    }
}
