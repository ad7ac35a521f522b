use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnFollows,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnFollows,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
            ActionType::ManageAllRecipes,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnCart,
    ManageOwnFollows,

    ManageTags,
    ManageIngredients,
    ManageAllRecipes,
    ManageUsers,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let role = &session.role;

        ACTION_TABLE
            .iter()
            .find_map(|(r, actions)| {
                if role != r {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: "someone".to_string(),
            is_admin: role == UserRole::Admin,
            role,
        }
    }

    #[test]
    fn any_user_can_create_and_manage_own_resources() {
        let s = session(UserRole::User);
        assert!(ActionType::CreateRecipes.authenticate(&s));
        assert!(ActionType::ManageOwnRecipes.authenticate(&s));
        assert!(ActionType::ManageOwnFavorites.authenticate(&s));
        assert!(ActionType::ManageOwnCart.authenticate(&s));
        assert!(ActionType::ManageOwnFollows.authenticate(&s));
    }

    #[test]
    fn tag_and_ingredient_writes_are_admin_only() {
        let s = session(UserRole::User);
        assert!(!ActionType::ManageTags.authenticate(&s));
        assert!(!ActionType::ManageIngredients.authenticate(&s));
        assert!(!ActionType::ManageAllRecipes.authenticate(&s));

        let admin = session(UserRole::Admin);
        assert!(ActionType::ManageTags.authenticate(&admin));
        assert!(ActionType::ManageIngredients.authenticate(&admin));
        assert!(ActionType::ManageAllRecipes.authenticate(&admin));
    }

    #[test]
    fn forbidden_actions_surface_as_forbidden_errors() {
        let err = session(UserRole::User)
            .authenticate(ActionType::ManageTags)
            .unwrap_err();
        assert_eq!(err.status(), warp::http::StatusCode::FORBIDDEN);
    }
}
