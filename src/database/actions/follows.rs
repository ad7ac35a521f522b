use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::SUBSCRIPTION_COUNT_PER_PAGE,
    error::{ApiError, QueryError},
    pagination::PageContext,
    schema::{FollowProfile, Id, User, UserListRow},
};

use super::{
    recipes::{count_author_recipes, list_author_recipes},
    users::get_user_by_id,
};

/// True iff an authenticated viewer follows the user. Anonymous viewers
/// are never subscribed.
pub async fn is_subscribed(
    viewer: Option<&SessionData>,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let Some(session) = viewer else {
        return Ok(false);
    };

    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND following_id = $2)",
    )
    .bind(session.user_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

async fn follow_profile(
    user: &User,
    subscribed: bool,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<FollowProfile, ApiError> {
    let recipes_count = count_author_recipes(user.id, pool).await?;
    let recipes = list_author_recipes(user.id, recipes_limit, pool).await?;

    Ok(FollowProfile {
        email: user.email.to_owned(),
        id: user.id,
        username: user.username.to_owned(),
        first_name: user.first_name.to_owned(),
        last_name: user.last_name.to_owned(),
        is_subscribed: subscribed,
        recipes_count,
        recipes,
    })
}

pub async fn subscribe(
    session: &SessionData,
    following_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<FollowProfile, ApiError> {
    session.authenticate(ActionType::ManageOwnFollows)?;

    if session.user_id == following_id {
        return Err(ApiError::Validation(
            "You cannot follow yourself".to_string(),
        ));
    }

    let following = get_user_by_id(pool, following_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?;

    let result = sqlx::query(
        "INSERT INTO follows (user_id, following_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(following_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Already subscribed to this author".to_string(),
        ));
    }

    follow_profile(&following, true, recipes_limit, pool).await
}

pub async fn unsubscribe(
    session: &SessionData,
    following_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageOwnFollows)?;

    if get_user_by_id(pool, following_id).await?.is_none() {
        return Err(ApiError::NotFound(
            "No user exists with specified id".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND following_id = $2")
        .bind(session.user_id)
        .bind(following_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "Not subscribed to this author".to_string(),
        ));
    }

    Ok(())
}

/// Everyone the actor follows, newest edge first, each annotated with
/// their recipe count and a capped recipe preview.
pub async fn fetch_subscriptions(
    session: &SessionData,
    recipes_limit: Option<i64>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<FollowProfile>, ApiError> {
    session.authenticate(ActionType::ManageOwnFollows)?;

    let rows: Vec<UserListRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, COUNT(*) OVER () AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.following_id
        WHERE f.user_id = $1
        ORDER BY f.id DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(SUBSCRIPTION_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut profiles = Vec::with_capacity(rows.len());
    for row in rows {
        let recipes_count = count_author_recipes(row.id, pool).await?;
        let recipes = list_author_recipes(row.id, recipes_limit, pool).await?;

        profiles.push(FollowProfile {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
            recipes_count,
            recipes,
        });
    }

    Ok(PageContext::from_rows(
        profiles,
        total_count,
        SUBSCRIPTION_COUNT_PER_PAGE,
        offset,
    ))
}
