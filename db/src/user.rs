use common::error::{AppError, Res};
use sqlx::{Executor, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    dtos::user::{NewUser, Page, PageQuery, UserFilter, UserPatch},
    models::user::{User, UserRow},
};

/// Maps unique violations to `Conflict`, everything else to `Database`.
pub fn map_db_error(error: sqlx::Error) -> AppError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.is_unique_violation() {
            let constraint = db_error.constraint().unwrap_or("unique constraint");
            return AppError::Conflict(format!("{} already in use", constraint));
        }
    }
    AppError::from(error)
}

fn into_user(row: Option<UserRow>) -> Res<Option<User>> {
    row.map(User::try_from).transpose()
}

fn into_users(rows: Vec<UserRow>) -> Res<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

pub async fn get_user_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)?;
    into_user(row)
}

/// Same as [`get_user_by_id`] but locks the row until the transaction ends.
pub async fn get_user_by_id_for_update<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)?;
    into_user(row)
}

pub async fn get_user_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)?;
    into_user(row)
}

pub async fn insert_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: NewUser,
) -> Res<User> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (role, name, surname, birth_date, customer_code, residual_points,
                           points_used, email, salted_password, last_purchase_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(data.role.as_str())
    .bind(data.name)
    .bind(data.surname)
    .bind(data.birth_date)
    .bind(data.customer_code)
    .bind(data.residual_points)
    .bind(data.points_used)
    .bind(data.email)
    .bind(data.salted_password)
    .bind(data.last_purchase_date)
    .fetch_one(executor)
    .await
    .map_err(map_db_error)?;
    User::try_from(row)
}

/// Writes every business field of `user`, guarded by its version.
///
/// Returns `None` when the stored version no longer matches.
pub async fn update_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user: &User,
) -> Res<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET role = $2, name = $3, surname = $4, birth_date = $5, customer_code = $6,
            residual_points = $7, points_used = $8, email = $9, salted_password = $10,
            last_purchase_date = $11, updated_at = NOW(), version = version + 1
        WHERE id = $1 AND version = $12
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(user.role.as_str())
    .bind(&user.name)
    .bind(&user.surname)
    .bind(user.birth_date)
    .bind(&user.customer_code)
    .bind(user.residual_points)
    .bind(user.points_used)
    .bind(&user.email)
    .bind(&user.salted_password)
    .bind(user.last_purchase_date)
    .bind(user.version)
    .fetch_optional(executor)
    .await
    .map_err(map_db_error)?;
    into_user(row)
}

/// Returns `false` when no row has this id or the row fails `patch.only_if`.
pub async fn update_user_fields<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    patch: &UserPatch,
) -> Res<bool> {
    let mut qb = update_fields_query(user_id, patch);
    let result = qb.build().execute(executor).await.map_err(map_db_error)?;
    Ok(result.rows_affected() > 0)
}

fn update_fields_query(user_id: Uuid, patch: &UserPatch) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "UPDATE users SET updated_at = NOW(), version = version + 1",
    );
    if let Some(role) = patch.role {
        qb.push(", role = ").push_bind(role.as_str());
    }
    if let Some(points) = patch.residual_points {
        qb.push(", residual_points = ").push_bind(points);
    }
    if let Some(date) = patch.last_purchase_date {
        qb.push(", last_purchase_date = ").push_bind(date);
    }
    if patch.clear_personal_data {
        qb.push(", name = NULL, surname = NULL, birth_date = NULL");
    }
    qb.push(" WHERE id = ").push_bind(user_id);
    if let Some(role) = patch.only_if.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(before) = patch.only_if.last_purchase_before {
        qb.push(" AND last_purchase_date < ").push_bind(before);
    }
    qb
}

pub async fn scan_users<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    filter: &UserFilter,
) -> Res<Vec<User>> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE TRUE");
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(before) = filter.last_purchase_before {
        qb.push(" AND last_purchase_date < ").push_bind(before);
    }
    if let Some(after_id) = filter.after_id {
        qb.push(" AND id > ").push_bind(after_id);
    }
    qb.push(" ORDER BY id ASC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(i64::from(limit));
    }

    let rows = qb
        .build_query_as::<UserRow>()
        .fetch_all(executor)
        .await
        .map_err(AppError::from)?;
    into_users(rows)
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_page_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &PageQuery) {
    if let Some(role) = query.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR surname ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn find_users_page(conn: &mut PgConnection, query: &PageQuery) -> Res<Page<User>> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
    push_page_filters(&mut count, query);
    let total = count
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await
        .map_err(AppError::from)?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE TRUE");
    push_page_filters(&mut select, query);
    select
        .push(" ORDER BY ")
        .push(query.sort_by.column())
        .push(" ")
        .push(query.order.as_sql())
        .push(", id ASC LIMIT ")
        .push_bind(i64::from(query.limit))
        .push(" OFFSET ")
        .push_bind(query.offset());

    let rows = select
        .build_query_as::<UserRow>()
        .fetch_all(&mut *conn)
        .await
        .map_err(AppError::from)?;

    Ok(Page {
        items: into_users(rows)?,
        total,
    })
}
