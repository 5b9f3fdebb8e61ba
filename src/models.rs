// todo_service/src/models.rs
use crate::schema::{todos, users};
use crate::services::error::ServiceError;
use diesel::prelude::*;
use rocket::FromForm;
use serde::{Deserialize, Serialize};

pub const MIN_USERNAME_CHARS: usize = 5;
pub const MIN_PASSWORD_CHARS: usize = 6;
pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

// Anything other than "admin" is treated as an ordinary user.
impl From<&str> for Role {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, PartialEq, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub hashed_password: String,
    pub role: String,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from(self.role.as_str())
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub hashed_password: &'a str,
    pub role: &'a str,
}

// For returning user info without password hash
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        let role = user.role();
        UserInfo {
            id: user.id,
            username: user.username,
            role,
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Associations, Serialize, Deserialize, Debug, PartialEq, Clone)]
#[diesel(belongs_to(User, foreign_key = owner_id))]
#[diesel(table_name = todos)]
pub struct Todo {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub priority: i32,
    pub is_completed: bool,
    pub owner_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = todos)]
pub struct NewTodo<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub priority: i32,
    pub is_completed: bool,
    pub owner_id: i32,
}

/// Full replacement of the editable todo fields.
#[derive(AsChangeset)]
#[diesel(table_name = todos)]
pub struct TodoChanges<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub priority: i32,
    pub is_completed: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UserRequest {
    pub username: String,
    pub password: String,
}

impl UserRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.username.chars().count() < MIN_USERNAME_CHARS {
            return Err(ServiceError::BadRequest(format!(
                "username must be at least {MIN_USERNAME_CHARS} characters"
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ServiceError::BadRequest(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        Ok(())
    }
}

// Used for creating and replacing a todo item (owner comes from the token)
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TodoRequest {
    pub title: String,
    pub description: String,
    pub priority: i32,
    pub is_completed: bool,
}

impl TodoRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.title.chars().count() < MIN_TITLE_CHARS {
            return Err(ServiceError::BadRequest(format!(
                "title must be at least {MIN_TITLE_CHARS} characters"
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ServiceError::BadRequest(format!(
                "description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
        if !PRIORITY_RANGE.contains(&self.priority) {
            return Err(ServiceError::BadRequest(format!(
                "priority must be between {} and {}",
                PRIORITY_RANGE.start(),
                PRIORITY_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// OAuth2 password-flow form body for `/auth/token`.
#[derive(FromForm, Debug)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(title: &str, description: &str, priority: i32) -> TodoRequest {
        TodoRequest {
            title: title.to_string(),
            description: description.to_string(),
            priority,
            is_completed: false,
        }
    }

    #[test]
    fn todo_request_bounds() {
        assert!(todo("abc", "", 1).validate().is_ok());
        assert!(todo("abc", "", 5).validate().is_ok());
        assert!(todo("ab", "", 3).validate().is_err());
        assert!(todo("abc", "", 0).validate().is_err());
        assert!(todo("abc", "", 6).validate().is_err());
        assert!(todo("abc", &"x".repeat(1000), 3).validate().is_ok());
        assert!(todo("abc", &"x".repeat(1001), 3).validate().is_err());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        // Three characters, six bytes.
        assert!(todo("äöü", "", 2).validate().is_ok());
        assert!(todo("abc", &"é".repeat(1000), 2).validate().is_ok());
    }

    #[test]
    fn user_request_bounds() {
        let ok = UserRequest { username: "alice".into(), password: "secret".into() };
        assert!(ok.validate().is_ok());
        let short_name = UserRequest { username: "bob".into(), password: "secret".into() };
        assert!(short_name.validate().is_err());
        let short_pass = UserRequest { username: "alice".into(), password: "12345".into() };
        assert!(short_pass.validate().is_err());
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("ADMIN"), Role::Admin);
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("something"), Role::User);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
