use common::{
    error::{AppError, Res, ValidationErrors},
    secret,
};
use db::{models::user::User, store::UserTx};

use super::user::{UserService, log_outcome};
use crate::{dtos::user::PointsData, validation};

/// Loads the user under a row lock and checks it may move points.
async fn authorized_user(tx: &mut dyn UserTx, data: &PointsData) -> Res<User> {
    let user = tx
        .find_by_id_for_update(data.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", data.user_id)))?;

    if !user.role.is_loyalty() {
        return Err(AppError::Unauthorized(
            "User is not a loyalty customer".into(),
        ));
    }
    let code_matches = user
        .customer_code
        .as_deref()
        .is_some_and(|code| secret::secrets_match(code, &data.customer_code));
    if !code_matches {
        return Err(AppError::Unauthorized("Invalid customer code".into()));
    }
    Ok(user)
}

fn overflow() -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add("points", "would overflow the balance");
    AppError::Validation(errors)
}

impl UserService {
    fn check_balance(&self, balance: i64) -> Res<()> {
        if balance < 0 && !self.policy.allow_negative_balance {
            return Err(AppError::InsufficientPoints(format!(
                "Balance would drop to {}",
                balance
            )));
        }
        Ok(())
    }

    /// Credits `data.points` (which may be negative) and returns the new balance.
    pub async fn add_points(&self, data: PointsData) -> Res<i64> {
        let result = async {
            validation::validate_points_data(&data, false)?;
            let mut tx = self.store.begin().await?;
            let mut user = authorized_user(tx.as_mut(), &data).await?;

            let residual = user.residual_points.ok_or_else(|| {
                AppError::Unauthorized("User has no points balance".into())
            })?;
            let balance = residual.checked_add(data.points).ok_or_else(overflow)?;
            self.check_balance(balance)?;

            user.residual_points = Some(balance);
            tx.save(&user).await?;
            tx.commit().await?;
            log::info!("User {} balance {} -> {}", user.id, residual, balance);
            Ok(balance)
        }
        .await;
        log_outcome("addPoints", &result);
        result
    }

    /// Spends `data.points` and returns the remaining balance.
    ///
    /// With the balance floor off this mirrors `add_points`: any amount is
    /// accepted and the balance may go negative.
    pub async fn use_points(&self, data: PointsData) -> Res<i64> {
        let result = async {
            validation::validate_points_data(&data, !self.policy.allow_negative_balance)?;
            let mut tx = self.store.begin().await?;
            let mut user = authorized_user(tx.as_mut(), &data).await?;

            let (Some(residual), Some(used)) = (user.residual_points, user.points_used) else {
                return Err(AppError::Unauthorized("User has no points balance".into()));
            };
            let balance = residual.checked_sub(data.points).ok_or_else(overflow)?;
            let used = used.checked_add(data.points).ok_or_else(overflow)?;
            self.check_balance(balance)?;

            user.residual_points = Some(balance);
            user.points_used = Some(used);
            tx.save(&user).await?;
            tx.commit().await?;
            log::info!("User {} spent {} points, {} left", user.id, data.points, balance);
            Ok(balance)
        }
        .await;
        log_outcome("usePoints", &result);
        result
    }
}
