use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    constants::{
        EMAIL_MAX_LENGTH, INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH,
        MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT, NAME_MAX_LENGTH, RECIPE_NAME_MAX_LENGTH,
        TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH, USERNAME_MAX_LENGTH,
    },
    error::ApiError,
};

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl TryFrom<Value> for UserRole {
    type Error = ApiError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.as_str() {
            Some("user") => Ok(Self::User),
            Some("admin") => Ok(Self::Admin),
            Some(other) => Err(ApiError::Validation(format!("Invalid role: {other}"))),
            None => Err(ApiError::Validation(
                "Failed to parse value as string".to_string(),
            )),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

// Paginated rows carry the COUNT(*) OVER () window column.

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeListRow {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserListRow {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,

    pub count: i64,
}

// Transfer representations, assembled at response time and never stored.

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeShort {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn from_user(user: &User, is_subscribed: bool) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowProfile {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes_count: i64,
    pub recipes: Vec<RecipeShort>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct IngredientAmount {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<IngredientAmount>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// One aggregated line of a user's shopping list.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

// Write payloads. Validation runs on the write path, before any statement.

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.email.is_empty() || !self.email.contains('@') {
            return Err(ApiError::Validation("Invalid email address".to_string()));
        }
        check_length("email", &self.email, EMAIL_MAX_LENGTH)?;
        if self.username.is_empty() {
            return Err(ApiError::Validation("Username cannot be empty".to_string()));
        }
        check_length("username", &self.username, USERNAME_MAX_LENGTH)?;
        check_length("first_name", &self.first_name, NAME_MAX_LENGTH)?;
        check_length("last_name", &self.last_name, NAME_MAX_LENGTH)?;
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl NewTag {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation("Tag name cannot be empty".to_string()));
        }
        check_length("name", &self.name, TAG_NAME_MAX_LENGTH)?;
        check_length("slug", &self.slug, TAG_SLUG_MAX_LENGTH)?;
        validate_hex_color(&self.color)?;
        validate_slug(&self.slug)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

impl NewIngredient {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation(
                "Ingredient name cannot be empty".to_string(),
            ));
        }
        check_length("name", &self.name, INGREDIENT_NAME_MAX_LENGTH)?;
        check_length(
            "measurement_unit",
            &self.measurement_unit,
            MEASUREMENT_UNIT_MAX_LENGTH,
        )?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeIngredientInput {
    pub id: Id,
    pub amount: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<RecipeIngredientInput>,
}

impl NewRecipe {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation(
                "Recipe name cannot be empty".to_string(),
            ));
        }
        check_length("name", &self.name, RECIPE_NAME_MAX_LENGTH)?;
        if self.cooking_time < MIN_COOKING_TIME {
            return Err(ApiError::Validation(
                "Cooking time cannot be less than one minute".to_string(),
            ));
        }
        for ingredient in &self.ingredients {
            if ingredient.amount < MIN_INGREDIENT_AMOUNT {
                return Err(ApiError::Validation(
                    "Ingredient amount must be greater than zero".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "Field {field} exceeds {max} characters"
        )));
    }

    Ok(())
}

fn hex_color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("valid pattern")
    })
}

pub fn validate_hex_color(color: &str) -> Result<(), ApiError> {
    if !hex_color_pattern().is_match(color) {
        return Err(ApiError::Validation(format!(
            "Value {color} is not a HEX color"
        )));
    }

    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::Validation(format!("Invalid slug: {slug}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(color: &str) -> NewTag {
        NewTag {
            name: "breakfast".to_string(),
            color: color.to_string(),
            slug: "breakfast".to_string(),
        }
    }

    #[test]
    fn accepts_full_and_short_hex_colors() {
        assert!(tag("#ABCDEF").validate().is_ok());
        assert!(tag("#abc").validate().is_ok());
    }

    #[test]
    fn rejects_color_without_leading_hash() {
        assert!(matches!(
            tag("123456").validate(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_colors() {
        for color in ["#12345", "#GGGGGG", "#abcd", "", "#"] {
            assert!(tag(color).validate().is_err(), "accepted {color}");
        }
    }

    #[test]
    fn rejects_bad_slugs() {
        let mut t = tag("#abc");
        t.slug = "has space".to_string();
        assert!(t.validate().is_err());
        t.slug = String::new();
        assert!(t.validate().is_err());
        t.slug = "ok-slug_1".to_string();
        assert!(t.validate().is_ok());
    }

    fn recipe(cooking_time: i32) -> NewRecipe {
        NewRecipe {
            name: "Pancakes".to_string(),
            text: "Mix and fry".to_string(),
            image: "recipes/pancakes.png".to_string(),
            cooking_time,
            tags: vec![1],
            ingredients: vec![RecipeIngredientInput { id: 1, amount: 100 }],
        }
    }

    #[test]
    fn cooking_time_below_one_minute_is_rejected() {
        assert!(recipe(0).validate().is_err());
        assert!(recipe(1).validate().is_ok());
    }

    #[test]
    fn zero_ingredient_amount_is_rejected() {
        let mut r = recipe(10);
        r.ingredients[0].amount = 0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn user_email_must_contain_at_sign() {
        let user = NewUser {
            email: "not-an-email".to_string(),
            username: "cook".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: "secret".to_string(),
        };
        assert!(user.validate().is_err());
    }
}
