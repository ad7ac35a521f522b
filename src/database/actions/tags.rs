use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{ApiError, QueryError},
    schema::{Id, NewTag, Tag},
};

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, ApiError> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn find_tag_by_slug(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Tag>, ApiError> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn fetch_tags(search: &str, pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE name ILIKE $1 ORDER BY id")
        .bind(format!("{search}%"))
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn create_tag(
    session: &SessionData,
    new: &NewTag,
    pool: &Pool<Postgres>,
) -> Result<Tag, ApiError> {
    session.authenticate(ActionType::ManageTags)?;
    new.validate()?;

    let row: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(&new.name)
    .bind(&new.color)
    .bind(&new.slug)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| {
        ApiError::Conflict("A tag with this name, color or slug already exists".to_string())
    })
}

pub async fn update_tag(
    session: &SessionData,
    id: Id,
    new: &NewTag,
    pool: &Pool<Postgres>,
) -> Result<Tag, ApiError> {
    session.authenticate(ActionType::ManageTags)?;
    new.validate()?;

    if get_tag(id, pool).await?.is_none() {
        return Err(ApiError::NotFound("No tag exists with specified id".to_string()));
    }

    let taken: (bool,) = sqlx::query_as(
        "
        SELECT EXISTS (
            SELECT 1 FROM tags
            WHERE (name = $1 OR color = $2 OR slug = $3) AND id != $4
        )
    ",
    )
    .bind(&new.name)
    .bind(&new.color)
    .bind(&new.slug)
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if taken.0 {
        return Err(ApiError::Conflict(
            "A tag with this name, color or slug already exists".to_string(),
        ));
    }

    let row: Tag = sqlx::query_as(
        "UPDATE tags SET name = $1, color = $2, slug = $3 WHERE id = $4 RETURNING *",
    )
    .bind(&new.name)
    .bind(&new.color)
    .bind(&new.slug)
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Removes a tag and detaches it from every recipe.
pub async fn delete_tag(session: &SessionData, id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageTags)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE tag_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("No tag exists with specified id".to_string()));
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}
