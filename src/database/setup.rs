use sqlx::{Pool, Postgres};

use crate::error::{ApiError, QueryError};

/*
Schema creation, run once at setup time. Uniqueness lives in the table
definitions so that ON CONFLICT DO NOTHING can report duplicates; cascade
deletion is performed explicitly in the write path, not by the store.
*/

const CREATE_STATEMENTS: &[&str] = &[
    "
    DO $$ BEGIN
        CREATE TYPE user_role AS ENUM ('user', 'admin');
    EXCEPTION
        WHEN duplicate_object THEN NULL;
    END $$;
    ",
    "
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        email VARCHAR(254) NOT NULL UNIQUE,
        username VARCHAR(150) NOT NULL UNIQUE,
        first_name VARCHAR(150) NOT NULL,
        last_name VARCHAR(150) NOT NULL,
        password TEXT NOT NULL,
        role user_role NOT NULL DEFAULT 'user'
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS tags (
        id SERIAL PRIMARY KEY,
        name VARCHAR(16) NOT NULL UNIQUE,
        color VARCHAR(7) NOT NULL UNIQUE,
        slug VARCHAR(16) NOT NULL UNIQUE
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS ingredients (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        measurement_unit VARCHAR(15) NOT NULL
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS recipes (
        id SERIAL PRIMARY KEY,
        author_id INTEGER NOT NULL REFERENCES users (id),
        name VARCHAR(200) NOT NULL,
        text TEXT NOT NULL,
        image TEXT NOT NULL,
        cooking_time INTEGER NOT NULL CHECK (cooking_time >= 1),
        pub_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS recipe_tags (
        recipe_id INTEGER NOT NULL REFERENCES recipes (id),
        tag_id INTEGER NOT NULL REFERENCES tags (id),
        PRIMARY KEY (recipe_id, tag_id)
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS recipe_ingredients (
        recipe_id INTEGER NOT NULL REFERENCES recipes (id),
        ingredient_id INTEGER NOT NULL REFERENCES ingredients (id),
        amount INTEGER NOT NULL CHECK (amount >= 1),
        PRIMARY KEY (recipe_id, ingredient_id)
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS favorites (
        user_id INTEGER NOT NULL REFERENCES users (id),
        recipe_id INTEGER NOT NULL REFERENCES recipes (id),
        PRIMARY KEY (user_id, recipe_id)
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS shopping_carts (
        user_id INTEGER NOT NULL REFERENCES users (id),
        recipe_id INTEGER NOT NULL REFERENCES recipes (id),
        PRIMARY KEY (user_id, recipe_id)
    );
    ",
    "
    CREATE TABLE IF NOT EXISTS follows (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users (id),
        following_id INTEGER NOT NULL REFERENCES users (id),
        UNIQUE (user_id, following_id),
        CHECK (user_id <> following_id)
    );
    ",
];

pub async fn create_tables(pool: &Pool<Postgres>) -> Result<(), ApiError> {
    for statement in CREATE_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    log::info!("Schema is up to date");
    Ok(())
}
