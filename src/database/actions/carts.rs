use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::SHOPPING_LIST_FILENAME,
    error::{ApiError, QueryError},
    schema::{Id, RecipeShort, ShoppingListItem},
};

use super::recipes::get_recipe;

pub async fn add_to_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, ApiError> {
    session.authenticate(ActionType::ManageOwnCart)?;

    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No recipe exists with specified id".to_string()))?;

    let result = sqlx::query(
        "INSERT INTO shopping_carts (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Recipe is already in the shopping cart".to_string(),
        ));
    }

    Ok(RecipeShort {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_from_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageOwnCart)?;

    if get_recipe(recipe_id, pool).await?.is_none() {
        return Err(ApiError::NotFound(
            "No recipe exists with specified id".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM shopping_carts WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "Recipe is not in the shopping cart".to_string(),
        ));
    }

    Ok(())
}

pub async fn is_in_shopping_cart(
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM shopping_carts WHERE user_id = $1 AND recipe_id = $2)",
    )
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

/// Flattens the user's cart into one aggregated row per distinct
/// (ingredient name, measurement unit) pair. An empty cart yields an empty
/// list.
pub async fn shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, ApiError> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount) AS amount
        FROM shopping_carts sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} - {} {}", item.name, item.amount, item.measurement_unit))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Returns the export filename and the rendered `text/plain` body; the
/// consumer serves it as an attachment.
pub async fn download_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(&'static str, String), ApiError> {
    let items = shopping_list(session.user_id, pool).await?;

    Ok((SHOPPING_LIST_FILENAME, render_shopping_list(&items)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, amount: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn lines_follow_the_export_format() {
        let rendered = render_shopping_list(&[item("flour", "g", 150), item("milk", "ml", 500)]);
        assert_eq!(rendered, "flour - 150 g\nmilk - 500 ml");
    }

    #[test]
    fn empty_cart_renders_zero_lines() {
        assert_eq!(render_shopping_list(&[]), "");
    }

    #[test]
    fn same_name_with_different_units_stays_separate() {
        let rendered = render_shopping_list(&[item("sugar", "g", 30), item("sugar", "tbsp", 2)]);
        assert_eq!(rendered, "sugar - 30 g\nsugar - 2 tbsp");
    }
}
