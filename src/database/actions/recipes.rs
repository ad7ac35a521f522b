use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::RECIPE_COUNT_PER_PAGE,
    error::{ApiError, QueryError},
    pagination::PageContext,
    schema::{
        Id, IngredientAmount, NewRecipe, Recipe, RecipeDetail, RecipeListRow, RecipeShort, Tag,
        UserProfile,
    },
};

use super::{
    carts::is_in_shopping_cart, favorites::is_favorited, follows::is_subscribed,
    ingredients::get_ingredient, tags::get_tag, users::get_user_by_id,
};

/// Recipe list filtering. Both boolean filters are no-ops for anonymous
/// viewers and when false.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Fetches a recipe for mutation. Only the author may mutate, unless the
/// session holds the manage-all permission.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(ApiError::Forbidden(
                        "Only the author can modify this recipe".to_string(),
                    ))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(ApiError::NotFound(
            "No recipe exists with specified id".to_string(),
        )),
    }
}

pub async fn create_recipe(
    session: &SessionData,
    new: &NewRecipe,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    session.authenticate(ActionType::CreateRecipes)?;
    new.validate()?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let recipe: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time, pub_date)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&new.name)
    .bind(&new.text)
    .bind(&new.image)
    .bind(new.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let recipe_id = recipe.0;

    for tag_id in &new.tags {
        if get_tag(*tag_id, pool).await?.is_none() {
            return Err(ApiError::NotFound("No tag exists with specified id".to_string()));
        }

        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(tag_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    }

    for ingredient in &new.ingredients {
        if get_ingredient(ingredient.id, pool).await?.is_none() {
            return Err(ApiError::NotFound(
                "No ingredient exists with specified id".to_string(),
            ));
        }

        let result = sqlx::query(
            "
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(recipe_id)
        .bind(ingredient.id)
        .bind(ingredient.amount)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Conflict(
                "Duplicate ingredient in recipe".to_string(),
            ));
        }
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    get_recipe_detail(Some(session), recipe_id, pool).await
}

pub async fn update_recipe(
    session: &SessionData,
    id: Id,
    new: &NewRecipe,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    get_recipe_mut(id, session, pool).await?;
    new.validate()?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&new.name)
    .bind(&new.text)
    .bind(&new.image)
    .bind(new.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    for tag_id in &new.tags {
        if get_tag(*tag_id, pool).await?.is_none() {
            return Err(ApiError::NotFound("No tag exists with specified id".to_string()));
        }

        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(tag_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    }

    for ingredient in &new.ingredients {
        if get_ingredient(ingredient.id, pool).await?.is_none() {
            return Err(ApiError::NotFound(
                "No ingredient exists with specified id".to_string(),
            ));
        }

        let result = sqlx::query(
            "
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(id)
        .bind(ingredient.id)
        .bind(ingredient.amount)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Conflict(
                "Duplicate ingredient in recipe".to_string(),
            ));
        }
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    get_recipe_detail(Some(session), id, pool).await
}

/// Deletes a recipe together with its join rows. Favorite and cart entries
/// pointing at the recipe go with it.
pub async fn delete_recipe(
    session: &SessionData,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    get_recipe_mut(id, session, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM favorites WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM shopping_carts WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeListRow>, ApiError> {
    let mut query = QueryBuilder::new(
        "SELECT r.*, COUNT(*) OVER () AS count FROM recipes r WHERE true",
    );

    if !filter.tags.is_empty() {
        query.push(
            " AND r.id IN (SELECT rt.recipe_id FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE t.slug IN (",
        );
        let mut slugs = query.separated(", ");
        for slug in &filter.tags {
            slugs.push_bind(slug.to_owned());
        }
        query.push("))");
    }

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }

    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query.push(" AND r.id IN (SELECT recipe_id FROM favorites WHERE user_id = ");
            query.push_bind(viewer.user_id);
            query.push(")");
        }
        if filter.is_in_shopping_cart {
            query.push(" AND r.id IN (SELECT recipe_id FROM shopping_carts WHERE user_id = ");
            query.push_bind(viewer.user_id);
            query.push(")");
        }
    }

    query.push(" ORDER BY r.pub_date DESC LIMIT ");
    query.push_bind(RECIPE_COUNT_PER_PAGE);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows: Vec<RecipeListRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

pub async fn list_recipe_ingredients(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<IngredientAmount>, ApiError> {
    let rows: Vec<IngredientAmount> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn list_recipe_tags(recipe_id: Id, pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn get_recipe_detail(
    viewer: Option<&SessionData>,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No recipe exists with specified id".to_string()))?;

    let author = get_user_by_id(pool, recipe.author_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?;

    let tags = list_recipe_tags(id, pool).await?;
    let ingredients = list_recipe_ingredients(id, pool).await?;
    let subscribed = is_subscribed(viewer, author.id, pool).await?;

    let (favorited, in_cart) = match viewer {
        Some(session) => (
            is_favorited(session.user_id, id, pool).await?,
            is_in_shopping_cart(session.user_id, id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        id: recipe.id,
        tags,
        author: UserProfile::from_user(&author, subscribed),
        ingredients,
        is_favorited: favorited,
        is_in_shopping_cart: in_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        pub_date: recipe.pub_date,
    })
}

pub async fn list_author_recipes(
    author_id: Id,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeShort>, ApiError> {
    let rows: Vec<RecipeShort> = match limit {
        Some(limit) => sqlx::query_as(
            "
            SELECT id, name, image, cooking_time FROM recipes
            WHERE author_id = $1 ORDER BY pub_date DESC LIMIT $2
        ",
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?,
        None => sqlx::query_as(
            "
            SELECT id, name, image, cooking_time FROM recipes
            WHERE author_id = $1 ORDER BY pub_date DESC
        ",
        )
        .bind(author_id)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?,
    };

    Ok(rows)
}

pub async fn count_author_recipes(author_id: Id, pool: &Pool<Postgres>) -> Result<i64, ApiError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}
