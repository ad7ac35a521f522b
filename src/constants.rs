pub const USER_COUNT_PER_PAGE: i64 = 10;
pub const RECIPE_COUNT_PER_PAGE: i64 = 10;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 10;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 150;

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 100;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 15;

pub const TAG_NAME_MAX_LENGTH: usize = 16;
pub const TAG_SLUG_MAX_LENGTH: usize = 16;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;
