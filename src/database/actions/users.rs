use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
        permissions::ActionType,
    },
    constants::USER_COUNT_PER_PAGE,
    error::{ApiError, QueryError},
    pagination::PageContext,
    schema::{Id, NewUser, User, UserListRow, UserProfile},
};

use super::follows::is_subscribed;

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user; the stored password is the argon2 hash. Duplicate email
/// or username fails with a conflict.
pub async fn register_user(new: &NewUser, pool: &Pool<Postgres>) -> Result<User, ApiError> {
    new.validate()?;

    let password = hash_password(&new.password)
        .map_err(|e| ApiError::Database(format!("Failed to hash password: {e}")))?;

    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&new.email)
    .bind(&new.username)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    user.ok_or_else(|| {
        ApiError::Conflict("A user with this email or username already exists".to_string())
    })
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let user = get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid credentials".to_string()))?;

    let authenticated = verify_password(password, &user.password)
        .map_err(|_e| ApiError::Validation("Invalid credentials".to_string()))?;
    if !authenticated {
        return Err(ApiError::Validation("Invalid credentials".to_string()));
    }

    Ok(generate_jwt_session(&user, secret))
}

pub async fn set_password(
    session: &SessionData,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let user = get_user_by_id(pool, session.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?;

    let authenticated = verify_password(current_password, &user.password)
        .map_err(|_e| ApiError::Validation("Invalid credentials".to_string()))?;
    if !authenticated {
        return Err(ApiError::Validation("Wrong current password".to_string()));
    }
    if new_password.is_empty() {
        return Err(ApiError::Validation("Password cannot be empty".to_string()));
    }

    let password = hash_password(new_password)
        .map_err(|e| ApiError::Database(format!("Failed to hash password: {e}")))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(session.user_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

pub async fn get_profile(
    viewer: Option<&SessionData>,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, ApiError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?;

    let subscribed = is_subscribed(viewer, user_id, pool).await?;
    Ok(UserProfile::from_user(&user, subscribed))
}

pub async fn fetch_users(
    viewer: Option<&SessionData>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfile>, ApiError> {
    let rows: Vec<UserListRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, COUNT(*) OVER () AS count
        FROM users u
        ORDER BY u.id
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let followed = match viewer {
        Some(session) => followed_ids(session.user_id, pool).await?,
        None => HashSet::new(),
    };

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let profiles = rows
        .into_iter()
        .map(|row| UserProfile {
            is_subscribed: followed.contains(&row.id),
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
        })
        .collect();

    Ok(PageContext::from_rows(
        profiles,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}

async fn followed_ids(user_id: Id, pool: &Pool<Postgres>) -> Result<HashSet<Id>, ApiError> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT following_id FROM follows WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Deletes a user and everything hanging off them: follow edges in both
/// directions, favorite/cart rows, authored recipes and their join rows.
pub async fn delete_user(
    session: &SessionData,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    if session.user_id != user_id {
        session.authenticate(ActionType::ManageUsers)?;
    }
    if get_user_by_id(pool, user_id).await?.is_none() {
        return Err(ApiError::NotFound("No user exists with specified id".to_string()));
    }

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM follows WHERE user_id = $1 OR following_id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM favorites WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM shopping_carts WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    // join rows of recipes authored by the user, then the recipes themselves
    sqlx::query(
        "DELETE FROM recipe_ingredients WHERE recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    sqlx::query(
        "DELETE FROM recipe_tags WHERE recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    sqlx::query(
        "DELETE FROM favorites WHERE recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    sqlx::query(
        "DELETE FROM shopping_carts WHERE recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipes WHERE author_id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}
