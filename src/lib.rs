extern crate rocket;

pub mod config;
pub mod db;
pub mod models;
pub mod schema;
pub mod services;

use std::path::{Path, PathBuf};

use rocket::form::Form;
use rocket::fs::{relative, FileServer, NamedFile};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::{status, Redirect};
use rocket::serde::json::Json;
use rocket::{catch, catchers, delete, get, post, put, routes, Build, Responder, Rocket, State};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::db::{DbConn, DbPool};
use crate::models::{Role, Todo, TodoRequest, TokenForm, TokenResponse, UserInfo, UserRequest};
use crate::services::ai::{ChatCompletionEnricher, DescriptionEnricher, DisabledEnricher};
use crate::services::error::ServiceError;
use crate::services::token::{decode_access_token, TokenError};
use crate::services::{auth, todos};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
const LOGIN_PAGE: &str = "/auth/login_page";

/// The enricher used for `use_ai=true` requests.
pub struct AiEnricher(pub Box<dyn DescriptionEnricher>);

/// Caller identity taken from a verified access token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    NoAppState,
}

// A usable bearer header wins; otherwise the cookie. An optional "Bearer "
// prefix is accepted in both.
fn extract_token(req: &Request<'_>) -> Option<String> {
    let from_header = req.headers().get_one("Authorization").and_then(bearer_value);
    if let Some(token) = from_header {
        return Some(token.to_string());
    }
    let cookie = req.cookies().get(ACCESS_TOKEN_COOKIE)?;
    bearer_value(cookie.value()).map(str::to_string)
}

fn bearer_value(raw: &str) -> Option<&str> {
    let token = match raw.trim().split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None => raw.trim(),
    };
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn reject(req: &Request<'_>, error: AuthError) -> Outcome<AuthenticatedUser, AuthError> {
    req.local_cache(|| Some(error));
    let status = match error {
        AuthError::NoAppState => Status::InternalServerError,
        _ => Status::Unauthorized,
    };
    Outcome::Error((status, error))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<AppConfig>() else {
            return reject(req, AuthError::NoAppState);
        };
        let Some(token) = extract_token(req) else {
            return reject(req, AuthError::MissingToken);
        };

        match decode_access_token(&token, &config.jwt_secret) {
            Ok(claims) => Outcome::Success(AuthenticatedUser {
                user_id: claims.user_id,
                username: claims.sub,
                role: claims.role,
            }),
            Err(TokenError::Expired) => reject(req, AuthError::ExpiredToken),
            Err(TokenError::Invalid) => reject(req, AuthError::InvalidToken),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Responder)]
pub enum ApiError {
    #[response(status = 400, content_type = "json")]
    BadRequest(Json<ErrorDetail>),
    #[response(status = 401, content_type = "json")]
    Unauthorized(Json<ErrorDetail>),
    #[response(status = 404, content_type = "json")]
    NotFound(Json<ErrorDetail>),
    #[response(status = 500, content_type = "json")]
    InternalError(Json<ErrorDetail>),
}

fn connection(pool: &DbPool) -> Result<DbConn, ServiceError> {
    Ok(pool.get()?)
}

fn page_path(name: &str) -> PathBuf {
    Path::new(relative!("static")).join(name)
}

// --- Auth routes ---

#[get("/login_page")]
pub async fn login_page() -> Option<NamedFile> {
    NamedFile::open(page_path("login.html")).await.ok()
}

#[get("/register_page")]
pub async fn register_page() -> Option<NamedFile> {
    NamedFile::open(page_path("register.html")).await.ok()
}

#[post("/create_user", data = "<user_request>")]
pub fn create_user(
    user_request: Json<UserRequest>,
    pool: &State<DbPool>,
    config: &State<AppConfig>,
) -> Result<status::Custom<Json<UserInfo>>, ApiError> {
    let mut conn = connection(pool)?;
    let user = auth::register_user(&mut conn, &user_request, config.bcrypt_cost)?;
    Ok(status::Custom(Status::Created, Json(user)))
}

#[post("/token", data = "<form>")]
pub fn login_for_access_token(
    form: Form<TokenForm>,
    cookies: &CookieJar<'_>,
    pool: &State<DbPool>,
    config: &State<AppConfig>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut conn = connection(pool)?;
    let token = auth::login_for_access_token(&mut conn, &form.username, &form.password, config)?;

    cookies.add(
        Cookie::build((ACCESS_TOKEN_COOKIE, token.access_token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    );
    Ok(Json(token))
}

#[post("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    // Tokens are stateless; dropping the cookie is all there is to do.
    cookies.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"));
    Status::NoContent
}

fn auth_routes() -> Vec<rocket::Route> {
    routes![login_page, register_page, create_user, login_for_access_token, logout]
}

// --- Todo routes ---

#[get("/todo_page")]
pub async fn todo_page(user: Option<AuthenticatedUser>) -> Result<Option<NamedFile>, Redirect> {
    if user.is_none() {
        return Err(Redirect::to(LOGIN_PAGE));
    }
    Ok(NamedFile::open(page_path("todo.html")).await.ok())
}

#[get("/get_all_todos")]
pub fn get_all_todos(user: AuthenticatedUser, pool: &State<DbPool>) -> Result<Json<Vec<Todo>>, ApiError> {
    let mut conn = connection(pool)?;
    Ok(Json(todos::list_todos(&mut conn, &user)?))
}

#[get("/get_one_todo_by_id?<id>")]
pub fn get_one_todo_by_id(
    id: i32,
    user: AuthenticatedUser,
    pool: &State<DbPool>,
) -> Result<Json<Todo>, ApiError> {
    let mut conn = connection(pool)?;
    Ok(Json(todos::get_todo(&mut conn, &user, id)?))
}

#[post("/create?<use_ai>", data = "<todo_request>")]
pub async fn create_todo(
    user: AuthenticatedUser,
    use_ai: Option<bool>,
    todo_request: Json<TodoRequest>,
    pool: &State<DbPool>,
    enricher: &State<AiEnricher>,
) -> Result<status::Created<Json<Todo>>, ApiError> {
    let enricher = use_ai.unwrap_or(false).then(|| &*enricher.0);
    let description = todos::resolve_description(&todo_request, enricher).await?;

    let mut conn = connection(pool)?;
    let item = todos::create_todo(&mut conn, &user, &todo_request, &description)?;
    let location = format!("/todo/get_one_todo_by_id/?id={}", item.id);
    Ok(status::Created::new(location).body(Json(item)))
}

#[put("/update?<id>&<use_ai>", data = "<todo_request>")]
pub async fn update_todo(
    user: AuthenticatedUser,
    id: i32,
    use_ai: Option<bool>,
    todo_request: Json<TodoRequest>,
    pool: &State<DbPool>,
    enricher: &State<AiEnricher>,
) -> Result<Status, ApiError> {
    // Resolve visibility before spending a call on the AI service.
    {
        let mut conn = connection(pool)?;
        todos::get_todo(&mut conn, &user, id)?;
    }

    let enricher = use_ai.unwrap_or(false).then(|| &*enricher.0);
    let description = todos::resolve_description(&todo_request, enricher).await?;

    let mut conn = connection(pool)?;
    todos::update_todo(&mut conn, &user, id, &todo_request, &description)?;
    Ok(Status::NoContent)
}

#[delete("/delete?<id>")]
pub fn delete_todo(id: i32, user: AuthenticatedUser, pool: &State<DbPool>) -> Result<Status, ApiError> {
    let mut conn = connection(pool)?;
    todos::delete_todo(&mut conn, &user, id)?;
    Ok(Status::Ok)
}

fn todo_routes() -> Vec<rocket::Route> {
    routes![
        todo_page,
        get_all_todos,
        get_one_todo_by_id,
        create_todo,
        update_todo,
        delete_todo
    ]
}

#[get("/")]
pub fn index() -> Redirect {
    Redirect::found("/todo/todo_page")
}

// Serializable error response struct
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    fn new(error: &str, message: &str) -> Json<Self> {
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        })
    }
}

#[catch(401)] // Catches Unauthorized
fn unauthorized_catcher(req: &Request<'_>) -> Json<ErrorResponse> {
    match req.local_cache(|| None as Option<AuthError>) {
        Some(AuthError::MissingToken) => ErrorResponse::new("missing_token", "Authentication token is missing."),
        Some(AuthError::InvalidToken) => ErrorResponse::new("invalid_token", "Token is invalid."),
        Some(AuthError::ExpiredToken) => ErrorResponse::new("expired_token", "Token has expired."),
        _ => ErrorResponse::new("unauthorized", "Access denied. Valid authentication token required."),
    }
}

#[catch(404)]
fn not_found_catcher(req: &Request<'_>) -> Json<ErrorResponse> {
    ErrorResponse::new("not_found", &format!("No resource at {}", req.uri().path()))
}

#[catch(422)]
fn unprocessable_catcher() -> Json<ErrorResponse> {
    ErrorResponse::new("unprocessable_entity", "Request body or query parameters are malformed.")
}

#[catch(400)]
fn bad_request_catcher() -> Json<ErrorResponse> {
    ErrorResponse::new("bad_request", "The request could not be understood.")
}

#[catch(500)] // Catches Internal Server Error
fn internal_server_error_catcher(req: &Request<'_>) -> Json<ErrorResponse> {
    match req.local_cache(|| None as Option<AuthError>) {
        Some(AuthError::NoAppState) => ErrorResponse::new("no_app_state", "Application configuration is not available."),
        _ => ErrorResponse::new("internal_server_error", "An unexpected error occurred on the server."),
    }
}

/// Build the application with an explicit enricher.
pub fn build_rocket(config: AppConfig, enricher: Box<dyn DescriptionEnricher>) -> Rocket<Build> {
    rocket::build()
        .manage(config)
        .manage(AiEnricher(enricher))
        .attach(db::stage())
        .mount("/", routes![index])
        .mount("/static", FileServer::from(relative!("static")))
        .mount("/auth", auth_routes())
        .mount("/todo", todo_routes())
        .register(
            "/",
            catchers![
                bad_request_catcher,
                unauthorized_catcher,
                not_found_catcher,
                unprocessable_catcher,
                internal_server_error_catcher
            ],
        )
}

// This function can be used by main.rs to launch the server
// and by tests to get a Rocket instance.
pub fn rocket_instance(config: AppConfig) -> Rocket<Build> {
    let enricher: Box<dyn DescriptionEnricher> = match config.ai.clone().map(ChatCompletionEnricher::new) {
        Some(Ok(client)) => Box::new(client),
        Some(Err(e)) => {
            tracing::error!(error = %e, "could not build AI client, enrichment disabled");
            Box::new(DisabledEnricher)
        }
        None => Box::new(DisabledEnricher),
    };
    build_rocket(config, enricher)
}
