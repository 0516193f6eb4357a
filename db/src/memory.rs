//! In-process user store, used by tests and local runs without Postgres.
//!
//! Transactions take a store-wide lock and work on a private copy of the
//! records, published on commit. This gives the same isolation as row locks,
//! at the cost of serialising every transaction.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use common::error::{AppError, Res};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    dtos::user::{NewUser, Page, PageQuery, SortColumn, SortOrder, UserFilter, UserPatch},
    models::user::User,
    store::{UserStore, UserTx},
};

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<Uuid, User>,
    failing_writes: HashSet<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed state of one user.
    pub async fn get(&self, id: Uuid) -> Option<User> {
        self.inner.lock().await.users.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Overwrites a committed record as-is, bypassing every check.
    pub async fn put(&self, user: User) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    /// Makes every later write touching `id` fail.
    pub async fn fail_writes_for(&self, id: Uuid) {
        self.inner.lock().await.failing_writes.insert(id);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn begin(&self) -> Res<Box<dyn UserTx>> {
        let guard = self.inner.clone().lock_owned().await;
        let staged = guard.users.clone();
        Ok(Box::new(MemoryUserTx {
            guard,
            staged,
            committed: false,
        }))
    }
}

pub struct MemoryUserTx {
    guard: OwnedMutexGuard<Inner>,
    staged: BTreeMap<Uuid, User>,
    committed: bool,
}

impl MemoryUserTx {
    fn ensure_open(&self) -> Res<()> {
        if self.committed {
            return Err(AppError::Internal(
                "Transaction already committed".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_writable(&self, id: Uuid) -> Res<()> {
        self.ensure_open()?;
        if self.guard.failing_writes.contains(&id) {
            return Err(AppError::Internal(format!("Write to user {} failed", id)));
        }
        Ok(())
    }

    fn ensure_unique(&self, id: Option<Uuid>, email: &str, customer_code: Option<&str>) -> Res<()> {
        for other in self.staged.values().filter(|u| Some(u.id) != id) {
            if other.email == email {
                return Err(AppError::Conflict("users_email_key already in use".to_string()));
            }
            if customer_code.is_some() && other.customer_code.as_deref() == customer_code {
                return Err(AppError::Conflict(
                    "users_customer_code_key already in use".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn matches_page_filters(user: &User, query: &PageQuery) -> bool {
    if query.role.is_some_and(|role| user.role != role) {
        return false;
    }
    match query.search.as_deref().filter(|s| !s.is_empty()) {
        None => true,
        Some(search) => {
            let needle = search.to_lowercase();
            let contains = |value: Option<&str>| {
                value.is_some_and(|v| v.to_lowercase().contains(&needle))
            };
            contains(user.name.as_deref())
                || contains(user.surname.as_deref())
                || contains(Some(&user.email))
        }
    }
}

/// Orders like Postgres: NULLs sort last ascending and first descending.
fn compare_nullable<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_by(column: SortColumn, a: &User, b: &User) -> Ordering {
    match column {
        SortColumn::Id => a.id.cmp(&b.id),
        SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
        SortColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortColumn::Name => compare_nullable(a.name.as_ref(), b.name.as_ref()),
        SortColumn::Surname => compare_nullable(a.surname.as_ref(), b.surname.as_ref()),
        SortColumn::Email => a.email.cmp(&b.email),
        SortColumn::LastPurchaseDate => {
            compare_nullable(a.last_purchase_date, b.last_purchase_date)
        }
    }
}

#[async_trait]
impl UserTx for MemoryUserTx {
    async fn find_by_id(&mut self, id: Uuid) -> Res<Option<User>> {
        self.ensure_open()?;
        Ok(self.staged.get(&id).cloned())
    }

    async fn find_by_id_for_update(&mut self, id: Uuid) -> Res<Option<User>> {
        self.find_by_id(id).await
    }

    async fn find_by_email(&mut self, email: &str) -> Res<Option<User>> {
        self.ensure_open()?;
        Ok(self.staged.values().find(|u| u.email == email).cloned())
    }

    async fn find_paginated(&mut self, query: &PageQuery) -> Res<Page<User>> {
        self.ensure_open()?;
        let mut matching: Vec<&User> = self
            .staged
            .values()
            .filter(|u| matches_page_filters(u, query))
            .collect();
        matching.sort_by(|a, b| {
            let ordering = compare_by(query.sort_by, a, b);
            let ordering = match query.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn insert(&mut self, user: NewUser) -> Res<User> {
        self.ensure_open()?;
        self.ensure_unique(None, &user.email, user.customer_code.as_deref())?;

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            role: user.role,
            name: user.name,
            surname: user.surname,
            birth_date: user.birth_date,
            customer_code: user.customer_code,
            residual_points: user.residual_points,
            points_used: user.points_used,
            email: user.email,
            salted_password: user.salted_password,
            last_purchase_date: user.last_purchase_date,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        self.staged.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&mut self, user: &User) -> Res<User> {
        self.ensure_writable(user.id)?;
        let current = self
            .staged
            .get(&user.id)
            .ok_or_else(|| AppError::Conflict(format!("User {} was modified concurrently", user.id)))?;
        if current.version != user.version {
            return Err(AppError::Conflict(format!(
                "User {} was modified concurrently",
                user.id
            )));
        }
        self.ensure_unique(Some(user.id), &user.email, user.customer_code.as_deref())?;

        let saved = User {
            created_at: current.created_at,
            updated_at: Utc::now(),
            version: current.version + 1,
            ..user.clone()
        };
        self.staged.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn update_fields(&mut self, id: Uuid, patch: &UserPatch) -> Res<bool> {
        self.ensure_writable(id)?;
        let Some(user) = self
            .staged
            .get_mut(&id)
            .filter(|u| patch.only_if.matches(u.role, u.last_purchase_date))
        else {
            return Ok(false);
        };
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(points) = patch.residual_points {
            user.residual_points = Some(points);
        }
        if let Some(date) = patch.last_purchase_date {
            user.last_purchase_date = Some(date);
        }
        if patch.clear_personal_data {
            user.name = None;
            user.surname = None;
            user.birth_date = None;
        }
        user.updated_at = Utc::now();
        user.version += 1;
        Ok(true)
    }

    async fn scan(&mut self, filter: &UserFilter) -> Res<Vec<User>> {
        self.ensure_open()?;
        let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
        let users = self
            .staged
            .values()
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| {
                filter
                    .last_purchase_before
                    .is_none_or(|before| u.last_purchase_date.is_some_and(|d| d < before))
            })
            .filter(|u| filter.after_id.is_none_or(|after| u.id > after))
            .take(limit)
            .cloned()
            .collect();
        Ok(users)
    }

    async fn commit(&mut self) -> Res<()> {
        self.ensure_open()?;
        self.guard.users = std::mem::take(&mut self.staged);
        self.committed = true;
        Ok(())
    }
}
