use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::ai::DescriptionEnricher;
use super::error::ServiceError;
use crate::models::{NewTodo, Todo, TodoChanges, TodoRequest};
use crate::schema::todos;
use crate::AuthenticatedUser;

fn not_found() -> ServiceError {
    ServiceError::NotFound("Todo not found.".to_string())
}

pub fn check_todo_id(todo_id: i32) -> Result<(), ServiceError> {
    if todo_id > 0 {
        Ok(())
    } else {
        Err(ServiceError::BadRequest("id must be greater than 0".to_string()))
    }
}

/// Admins see every todo, everybody else only their own.
pub fn list_todos(
    conn: &mut SqliteConnection,
    caller: &AuthenticatedUser,
) -> Result<Vec<Todo>, ServiceError> {
    use crate::schema::todos::dsl::*;

    let mut query = todos.into_boxed();
    if !caller.role.is_admin() {
        query = query.filter(owner_id.eq(caller.user_id));
    }

    let items = query
        .order(id.asc())
        .select(Todo::as_select())
        .load::<Todo>(conn)?;
    Ok(items)
}

/// Missing and not-owned todos are indistinguishable to the caller.
pub fn find_visible_todo(
    conn: &mut SqliteConnection,
    caller: &AuthenticatedUser,
    todo_id: i32,
) -> Result<Option<Todo>, ServiceError> {
    use crate::schema::todos::dsl::*;

    let mut query = todos.filter(id.eq(todo_id)).into_boxed();
    if !caller.role.is_admin() {
        query = query.filter(owner_id.eq(caller.user_id));
    }

    let item = query
        .select(Todo::as_select())
        .first::<Todo>(conn)
        .optional()?;
    Ok(item)
}

pub fn get_todo(
    conn: &mut SqliteConnection,
    caller: &AuthenticatedUser,
    todo_id: i32,
) -> Result<Todo, ServiceError> {
    check_todo_id(todo_id)?;
    find_visible_todo(conn, caller, todo_id)?.ok_or_else(not_found)
}

/// Returns the description to store, asking the enricher when requested.
/// The request is validated first so an invalid todo never reaches the AI service.
pub async fn resolve_description(
    request: &TodoRequest,
    enricher: Option<&dyn DescriptionEnricher>,
) -> Result<String, ServiceError> {
    request.validate()?;
    match enricher {
        Some(enricher) => {
            let enriched = enricher
                .enrich(&request.title, &request.description)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "description enrichment failed");
                    ServiceError::from(e)
                })?;
            Ok(enriched)
        }
        None => Ok(request.description.clone()),
    }
}

pub fn create_todo(
    conn: &mut SqliteConnection,
    caller: &AuthenticatedUser,
    request: &TodoRequest,
    description: &str,
) -> Result<Todo, ServiceError> {
    request.validate()?;

    let new_item = NewTodo {
        title: &request.title,
        description,
        priority: request.priority,
        is_completed: request.is_completed,
        owner_id: caller.user_id,
    };

    let item = diesel::insert_into(todos::table)
        .values(&new_item)
        .returning(Todo::as_returning())
        .get_result::<Todo>(conn)
        .map_err(|e| ServiceError::BadRequest(format!("Failed to create todo: {e}")))?;

    tracing::info!(todo_id = item.id, owner_id = item.owner_id, "created todo");
    Ok(item)
}

pub fn update_todo(
    conn: &mut SqliteConnection,
    caller: &AuthenticatedUser,
    todo_id: i32,
    request: &TodoRequest,
    description: &str,
) -> Result<Todo, ServiceError> {
    check_todo_id(todo_id)?;
    request.validate()?;

    let existing = find_visible_todo(conn, caller, todo_id)?.ok_or_else(not_found)?;

    let changes = TodoChanges {
        title: &request.title,
        description,
        priority: request.priority,
        is_completed: request.is_completed,
    };

    let item = diesel::update(&existing)
        .set(&changes)
        .returning(Todo::as_returning())
        .get_result::<Todo>(conn)?;

    tracing::info!(todo_id = item.id, user_id = caller.user_id, "updated todo");
    Ok(item)
}

pub fn delete_todo(
    conn: &mut SqliteConnection,
    caller: &AuthenticatedUser,
    todo_id: i32,
) -> Result<(), ServiceError> {
    check_todo_id(todo_id)?;

    let existing = find_visible_todo(conn, caller, todo_id)?.ok_or_else(not_found)?;
    diesel::delete(&existing).execute(conn)?;

    tracing::info!(todo_id, user_id = caller.user_id, "deleted todo");
    Ok(())
}
