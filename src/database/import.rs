use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{ApiError, QueryError},
    schema::{NewIngredient, NewTag},
};

/*
Bulk import of reference data from line-oriented CSV, loaded at setup time.

    ingredients: name,measurement_unit
    tags:        name,color,slug

A header line is skipped when present; fields with embedded commas must be
double-quoted.
*/

impl TryFrom<&str> for NewIngredient {
    type Error = ApiError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let fields = split_csv_line(line);
        match fields.as_slice() {
            [name, measurement_unit] => {
                let ingredient = Self {
                    name: name.to_owned(),
                    measurement_unit: measurement_unit.to_owned(),
                };
                ingredient.validate()?;
                Ok(ingredient)
            }
            _ => Err(ApiError::Validation(format!(
                "Expected 2 fields, got {}",
                fields.len()
            ))),
        }
    }
}

impl TryFrom<&str> for NewTag {
    type Error = ApiError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let fields = split_csv_line(line);
        match fields.as_slice() {
            [name, color, slug] => {
                let tag = Self {
                    name: name.to_owned(),
                    color: color.to_owned(),
                    slug: slug.to_owned(),
                };
                tag.validate()?;
                Ok(tag)
            }
            _ => Err(ApiError::Validation(format!(
                "Expected 3 fields, got {}",
                fields.len()
            ))),
        }
    }
}

pub fn parse_ingredients(content: &str) -> Result<Vec<NewIngredient>, ApiError> {
    parse_records(content, "name,measurement_unit")
}

pub fn parse_tags(content: &str) -> Result<Vec<NewTag>, ApiError> {
    parse_records(content, "name,color,slug")
}

fn parse_records<'a, T>(content: &'a str, header: &str) -> Result<Vec<T>, ApiError>
where
    T: TryFrom<&'a str, Error = ApiError>,
{
    let mut records = vec![];

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if index == 0 && line.trim() == header {
            log::trace!("Skipping header line");
            continue;
        }

        let record = T::try_from(line).map_err(|e| match e {
            ApiError::Validation(info) => {
                ApiError::Validation(format!("Line {}: {info}", index + 1))
            }
            other => other,
        })?;
        records.push(record);
    }

    Ok(records)
}

pub async fn import_ingredients(content: &str, pool: &Pool<Postgres>) -> Result<u64, ApiError> {
    let records = parse_ingredients(content)?;
    if records.is_empty() {
        return Ok(0);
    }

    let mut query =
        QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
    query.push_values(records.iter(), |mut row, record| {
        row.push_bind(&record.name).push_bind(&record.measurement_unit);
    });

    let result = query
        .build()
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    log::info!("Imported {} ingredients", result.rows_affected());
    Ok(result.rows_affected())
}

pub async fn import_tags(content: &str, pool: &Pool<Postgres>) -> Result<u64, ApiError> {
    let records = parse_tags(content)?;
    if records.is_empty() {
        return Ok(0);
    }

    let mut query = QueryBuilder::new("INSERT INTO tags (name, color, slug) ");
    query.push_values(records.iter(), |mut row, record| {
        row.push_bind(&record.name)
            .push_bind(&record.color)
            .push_bind(&record.slug);
    });
    query.push(" ON CONFLICT DO NOTHING");

    let result = query
        .build()
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    log::info!("Imported {} tags", result.rows_affected());
    Ok(result.rows_affected())
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = vec![];
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_ingredient_lines() {
        let records = parse_ingredients("flour,g\nmilk,ml\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "flour");
        assert_eq!(records[1].measurement_unit, "ml");
    }

    #[test]
    fn skips_header_and_blank_lines() {
        let records = parse_ingredients("name,measurement_unit\n\nflour,g\n").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn quoted_fields_keep_embedded_commas() {
        let records = parse_ingredients("\"salt, coarse\",g").unwrap();
        assert_eq!(records[0].name, "salt, coarse");
    }

    #[test]
    fn wrong_field_count_reports_the_line_number() {
        let err = parse_ingredients("flour,g\nbroken\n").unwrap_err();
        match err {
            ApiError::Validation(info) => assert!(info.starts_with("Line 2:"), "{info}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tag_rows_are_validated_like_any_tag_write() {
        assert!(parse_tags("breakfast,#E26C2D,breakfast").is_ok());
        assert!(parse_tags("breakfast,E26C2D,breakfast").is_err());
    }
}
