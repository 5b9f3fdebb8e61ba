use bcrypt::{hash, verify};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;

use super::error::ServiceError;
use super::token::create_access_token;
use crate::config::AppConfig;
use crate::models::{NewUser, Role, TokenResponse, User, UserInfo, UserRequest};

const BAD_CREDENTIALS: &str = "Incorrect username or password";

pub fn find_user_by_username(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<User>, ServiceError> {
    use crate::schema::users::dsl::*;

    let user = users
        .filter(username.eq(name))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?;
    Ok(user)
}

/// Insert a user with an already validated username and password.
pub fn create_user(
    conn: &mut SqliteConnection,
    name: &str,
    password: &str,
    user_role: Role,
    bcrypt_cost: u32,
) -> Result<User, ServiceError> {
    use crate::schema::users::dsl::*;

    if find_user_by_username(conn, name)?.is_some() {
        return Err(ServiceError::BadRequest("Username already exists".to_string()));
    }

    let hashed = hash(password, bcrypt_cost)?;
    let new_user = NewUser {
        username: name,
        hashed_password: &hashed,
        role: user_role.as_str(),
    };

    diesel::insert_into(users)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result::<User>(conn)
        .map_err(|e| match e {
            // Lost a race with a concurrent registration.
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ServiceError::BadRequest("Username already exists".to_string())
            }
            other => other.into(),
        })
}

pub fn register_user(
    conn: &mut SqliteConnection,
    request: &UserRequest,
    bcrypt_cost: u32,
) -> Result<UserInfo, ServiceError> {
    request.validate()?;
    let user = create_user(conn, &request.username, &request.password, Role::User, bcrypt_cost)?;
    tracing::info!(user_id = user.id, username = %user.username, "registered user");
    Ok(user.into())
}

pub fn authenticate_user(
    conn: &mut SqliteConnection,
    name: &str,
    password: &str,
) -> Result<User, ServiceError> {
    let Some(user) = find_user_by_username(conn, name)? else {
        tracing::info!(username = %name, "login failed: unknown user");
        return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };
    if !verify(password, &user.hashed_password)? {
        tracing::info!(username = %name, "login failed: wrong password");
        return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }
    Ok(user)
}

pub fn login_for_access_token(
    conn: &mut SqliteConnection,
    name: &str,
    password: &str,
    config: &AppConfig,
) -> Result<TokenResponse, ServiceError> {
    let user = authenticate_user(conn, name, password)?;
    let token = create_access_token(
        &user.username,
        user.id,
        user.role(),
        config.token_ttl,
        &config.jwt_secret,
    )?;
    tracing::debug!(user_id = user.id, "issued access token");
    Ok(TokenResponse::bearer(token))
}
