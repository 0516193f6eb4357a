use chrono::{DateTime, Duration, Utc};
use common::{error::Res, misc::Role};
use db::{
    dtos::user::{PatchGuard, UserFilter, UserPatch},
    models::user::User,
};

use super::user::{UserService, log_outcome};
use crate::{dtos::user::EmailDto, misc::email_template, validation};

const DAYS_PER_YEAR: i64 = 365;

/// Start of the inactivity window: `years` fixed 365-day years before `now`.
pub fn expiry_cutoff(now: DateTime<Utc>, years: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(years) * DAYS_PER_YEAR)
}

fn expiry_notice(user: &User) -> EmailDto {
    EmailDto {
        to: user.email.clone(),
        subject: email_template::SUBJECT.to_string(),
        text: email_template::TEXT.to_string(),
        html: email_template::HTML.to_string(),
    }
}

impl UserService {
    /// Demotes loyalty customers without a purchase in the last `years` years
    /// and returns one notification per demoted customer.
    ///
    /// A failed demotion is logged; the customer is still notified. A customer
    /// who stopped matching between the scan and the write (a fresh purchase,
    /// a role change) is left alone and not notified.
    pub async fn check_loyalty(&self, years: i64) -> Res<Vec<EmailDto>> {
        let result = self.check_loyalty_inner(years).await;
        log_outcome("checkLoyalty", &result);
        result
    }

    async fn check_loyalty_inner(&self, years: i64) -> Res<Vec<EmailDto>> {
        let years = validation::validate_years(years)?;
        let cutoff = expiry_cutoff(self.clock.now(), years);
        log::info!("Running loyalty sweep for purchases before {}", cutoff);

        let demotion = UserPatch {
            role: Some(Role::Customer),
            residual_points: Some(0),
            clear_personal_data: true,
            only_if: PatchGuard {
                role: Some(Role::LoyaltyCustomer),
                last_purchase_before: Some(cutoff),
            },
            ..UserPatch::default()
        };
        let mut filter = UserFilter {
            role: Some(Role::LoyaltyCustomer),
            last_purchase_before: Some(cutoff),
            after_id: None,
            limit: Some(self.policy.sweep_batch_size.max(1)),
        };

        let mut notices = Vec::new();
        let mut demoted = 0usize;
        let mut skipped = 0usize;
        let mut failures = 0usize;
        loop {
            // the scan transaction must end before the per-user ones start
            let batch = {
                let mut tx = self.store.begin().await?;
                let batch = tx.scan(&filter).await?;
                tx.commit().await?;
                batch
            };
            let Some(last) = batch.last() else {
                break;
            };
            filter.after_id = Some(last.id);

            for user in &batch {
                match self.demote(user, &demotion).await {
                    Ok(true) => demoted += 1,
                    Ok(false) => {
                        skipped += 1;
                        log::info!("User {} no longer expired, left unchanged", user.id);
                        continue;
                    }
                    Err(err) => {
                        failures += 1;
                        log::error!("Failed to demote user {}: {}", user.id, err);
                    }
                }
                notices.push(expiry_notice(user));
            }
        }

        log::info!(
            "Loyalty sweep demoted {} users ({} failed, {} skipped)",
            demoted,
            failures,
            skipped
        );
        Ok(notices)
    }

    /// `false` when the user no longer matches the sweep selection.
    async fn demote(&self, user: &User, demotion: &UserPatch) -> Res<bool> {
        let mut tx = self.store.begin().await?;
        let demoted = tx.update_fields(user.id, demotion).await?;
        tx.commit().await?;
        Ok(demoted)
    }
}
