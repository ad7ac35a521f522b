use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{ApiError, QueryError},
    schema::{Id, RecipeShort},
};

use super::recipes::get_recipe;

pub async fn add_favorite(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, ApiError> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No recipe exists with specified id".to_string()))?;

    let result = sqlx::query(
        "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Recipe is already in favorites".to_string(),
        ));
    }

    Ok(RecipeShort {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_favorite(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    if get_recipe(recipe_id, pool).await?.is_none() {
        return Err(ApiError::NotFound(
            "No recipe exists with specified id".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Recipe is not in favorites".to_string()));
    }

    Ok(())
}

pub async fn is_favorited(user_id: Id, recipe_id: Id, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND recipe_id = $2)",
    )
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}
