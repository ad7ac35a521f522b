use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use crate::{
    error::ApiError,
    schema::{NewRecipe, RecipeIngredientInput},
};

pub type FormData = HashMap<String, Value>;

/// Loosely-typed write payload, decoded field by field. Consumers hand the
/// raw JSON object over and pull typed values out.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, ApiError>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| ApiError::Validation(format!("Invalid value for field {key}"))),
            None => Err(ApiError::Validation(format!("Missing field {key}"))),
        }
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, ApiError>
    where
        T: FromStr,
    {
        let value = self
            .inner
            .get(key)
            .ok_or_else(|| ApiError::Validation(format!("Missing field {key}")))?;

        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.to_owned(),
            _ => return Err(ApiError::Validation(format!("Invalid value for field {key}"))),
        };

        text.parse()
            .map_err(|_e| ApiError::Validation(format!("Invalid value for field {key}")))
    }

    pub fn get_str(&self, key: &str) -> Result<String, ApiError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(ApiError::Validation(format!("Invalid value for field {key}"))),
            },
            None => Err(ApiError::Validation(format!("Missing field {key}"))),
        }
    }

    pub fn get_array(&self, key: &str) -> Result<Vec<Value>, ApiError> {
        match self.inner.get(key) {
            Some(Value::Array(items)) => Ok(items.to_owned()),
            Some(_) => Err(ApiError::Validation(format!("Field {key} is not a list"))),
            None => Err(ApiError::Validation(format!("Missing field {key}"))),
        }
    }
}

impl TryFrom<&Form> for NewRecipe {
    type Error = ApiError;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let tags = form
            .get_array("tags")?
            .into_iter()
            .map(|v| {
                v.as_i64()
                    .map(|id| id as i32)
                    .ok_or_else(|| ApiError::Validation("Invalid tag id".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ingredients = form
            .get_array("ingredients")?
            .into_iter()
            .map(|v| {
                let id = v
                    .get("id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| ApiError::Validation("Invalid ingredient id".to_string()))?;
                let amount = v
                    .get("amount")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| ApiError::Validation("Invalid ingredient amount".to_string()))?;

                Ok(RecipeIngredientInput {
                    id: id as i32,
                    amount: amount as i32,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(NewRecipe {
            name: form.get_str("name")?,
            text: form.get_str("text")?,
            image: form.get_str("image")?,
            cooking_time: form.get_number("cooking_time")?,
            tags,
            ingredients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe_form() -> Form {
        let data = json!({
            "name": "Borscht",
            "text": "Simmer for an hour",
            "image": "recipes/borscht.png",
            "cooking_time": 60,
            "tags": [1, 2],
            "ingredients": [{ "id": 3, "amount": 200 }]
        });
        let Value::Object(map) = data else {
            unreachable!()
        };
        Form::from_data(map.into_iter().collect())
    }

    #[test]
    fn decodes_a_recipe_payload() {
        let recipe = NewRecipe::try_from(&recipe_form()).unwrap();
        assert_eq!(recipe.name, "Borscht");
        assert_eq!(recipe.cooking_time, 60);
        assert_eq!(recipe.tags, vec![1, 2]);
        assert_eq!(recipe.ingredients[0].amount, 200);
    }

    #[test]
    fn missing_field_is_a_validation_error() {
        let form = Form::from_data(FormData::new());
        assert!(matches!(
            NewRecipe::try_from(&form),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn numbers_parse_from_strings_too() {
        let mut data = FormData::new();
        data.insert("n".to_string(), json!("42"));
        let form = Form::from_data(data);
        assert_eq!(form.get_number::<i32>("n").unwrap(), 42);
    }
}
