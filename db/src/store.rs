use std::sync::Arc;

use async_trait::async_trait;
use common::error::{AppError, Res};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    dtos::user::{NewUser, Page, PageQuery, UserFilter, UserPatch},
    models::user::User,
};

/// Persistence capability for users.
///
/// Every unit of work runs inside a [`UserTx`]. A transaction that is dropped
/// without [`UserTx::commit`] is rolled back.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn begin(&self) -> Res<Box<dyn UserTx>>;
}

#[async_trait]
pub trait UserTx: Send {
    async fn find_by_id(&mut self, id: Uuid) -> Res<Option<User>>;

    /// Looks the user up and holds a write lock on it until the transaction ends.
    async fn find_by_id_for_update(&mut self, id: Uuid) -> Res<Option<User>>;

    async fn find_by_email(&mut self, email: &str) -> Res<Option<User>>;

    async fn find_paginated(&mut self, query: &PageQuery) -> Res<Page<User>>;

    async fn insert(&mut self, user: NewUser) -> Res<User>;

    /// Writes `user` back if its version is still current.
    ///
    /// Fails with `Conflict` on a stale version or a unique violation.
    async fn save(&mut self, user: &User) -> Res<User>;

    /// Returns `false` when no user has this id.
    async fn update_fields(&mut self, id: Uuid, patch: &UserPatch) -> Res<bool>;

    async fn scan(&mut self, filter: &UserFilter) -> Res<Vec<User>>;

    async fn commit(&mut self) -> Res<()>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: Arc<PgPool>,
}

impl PgUserStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn begin(&self) -> Res<Box<dyn UserTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUserTx { tx: Some(tx) }))
    }
}

pub struct PgUserTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUserTx {
    fn conn(&mut self) -> Res<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }
}

#[async_trait]
impl UserTx for PgUserTx {
    async fn find_by_id(&mut self, id: Uuid) -> Res<Option<User>> {
        crate::user::get_user_by_id(self.conn()?, id).await
    }

    async fn find_by_id_for_update(&mut self, id: Uuid) -> Res<Option<User>> {
        crate::user::get_user_by_id_for_update(self.conn()?, id).await
    }

    async fn find_by_email(&mut self, email: &str) -> Res<Option<User>> {
        crate::user::get_user_by_email(self.conn()?, email).await
    }

    async fn find_paginated(&mut self, query: &PageQuery) -> Res<Page<User>> {
        crate::user::find_users_page(self.conn()?, query).await
    }

    async fn insert(&mut self, user: NewUser) -> Res<User> {
        crate::user::insert_user(self.conn()?, user).await
    }

    async fn save(&mut self, user: &User) -> Res<User> {
        crate::user::update_user(self.conn()?, user)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("User {} was modified concurrently", user.id)))
    }

    async fn update_fields(&mut self, id: Uuid, patch: &UserPatch) -> Res<bool> {
        crate::user::update_user_fields(self.conn()?, id, patch).await
    }

    async fn scan(&mut self, filter: &UserFilter) -> Res<Vec<User>> {
        crate::user::scan_users(self.conn()?, filter).await
    }

    async fn commit(&mut self) -> Res<()> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(AppError::from),
            None => Err(AppError::Internal(
                "Transaction already committed".to_string(),
            )),
        }
    }
}
