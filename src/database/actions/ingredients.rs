use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{ApiError, QueryError},
    schema::{Id, Ingredient, NewIngredient},
};

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Name-prefix search, unpaginated like the reference list it backs.
pub async fn fetch_ingredients(
    search: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
            .bind(format!("{search}%"))
            .fetch_all(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn create_ingredient(
    session: &SessionData,
    new: &NewIngredient,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ApiError> {
    session.authenticate(ActionType::ManageIngredients)?;
    new.validate()?;

    let row: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(&new.name)
    .bind(&new.measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn update_ingredient(
    session: &SessionData,
    id: Id,
    new: &NewIngredient,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ApiError> {
    session.authenticate(ActionType::ManageIngredients)?;
    new.validate()?;

    let row: Option<Ingredient> = sqlx::query_as(
        "UPDATE ingredients SET name = $1, measurement_unit = $2 WHERE id = $3 RETURNING *",
    )
    .bind(&new.name)
    .bind(&new.measurement_unit)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| ApiError::NotFound("No ingredient exists with specified id".to_string()))
}

/// Removes an ingredient and every recipe line that references it.
pub async fn delete_ingredient(
    session: &SessionData,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageIngredients)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE ingredient_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "No ingredient exists with specified id".to_string(),
        ));
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}
