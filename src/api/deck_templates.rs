use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use log::error;
use rusqlite::{params, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};

use crate::api::{AppState, ErrorResponse};
use crate::error::MatchbookError;

const DECK_TYPES: [&str; 2] = ["main", "sub"];
const DEFAULT_THEME: &str = "Midrange";

/// Deck template rows back the archetype pickers in the frontend
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckTemplate {
    pub id: i64,
    pub name: String,
    pub theme: String,
    pub deck_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DeckTemplateListResponse {
    pub templates: Vec<DeckTemplate>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    #[serde(rename = "type")]
    pub deck_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeckTemplateRequest {
    pub name: String,
    pub theme: Option<String>,
    pub deck_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeckTemplateRequest {
    pub name: Option<String>,
    pub theme: Option<String>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn internal_error(context: &str, err: MatchbookError) -> HandlerError {
    error!("{}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(context)),
    )
}

/// GET /deck-templates[?type=main|sub]
pub async fn list_deck_templates(
    State(state): State<AppState>,
    Query(query): Query<ListTemplatesQuery>,
) -> Result<Json<DeckTemplateListResponse>, HandlerError> {
    let templates = fetch_templates(&state, query.deck_type.as_deref())
        .map_err(|e| internal_error("Failed to list deck templates", e))?;

    Ok(Json(DeckTemplateListResponse {
        total: templates.len(),
        templates,
    }))
}

fn fetch_templates(
    state: &AppState,
    deck_type: Option<&str>,
) -> Result<Vec<DeckTemplate>, MatchbookError> {
    let conn = state.db.conn()?;

    let (sql, params): (&str, Vec<&dyn ToSql>) = match deck_type {
        Some(ref t) => (
            "SELECT template_id, name, theme, deck_type, created_at
             FROM deck_templates
             WHERE deck_type = ?1
             ORDER BY name ASC",
            vec![t as &dyn ToSql],
        ),
        None => (
            "SELECT template_id, name, theme, deck_type, created_at
             FROM deck_templates
             ORDER BY deck_type ASC, name ASC",
            vec![],
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(&params[..], |row| {
        Ok(DeckTemplate {
            id: row.get(0)?,
            name: row.get(1)?,
            theme: row.get(2)?,
            deck_type: row.get(3)?,
            created_at: DateTime::from_timestamp(row.get(4)?, 0).unwrap_or_default(),
        })
    })?;

    let mut templates = Vec::new();
    for t in rows {
        templates.push(t?);
    }
    Ok(templates)
}

/// POST /deck-templates
pub async fn create_deck_template(
    State(state): State<AppState>,
    Json(req): Json<CreateDeckTemplateRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), HandlerError> {
    if req.name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Name is required")),
        ));
    }
    let deck_type = req.deck_type.as_deref().unwrap_or("main");
    if !DECK_TYPES.contains(&deck_type) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("deckType must be 'main' or 'sub'")),
        ));
    }
    let theme = req.theme.as_deref().unwrap_or(DEFAULT_THEME);

    let inserted = insert_template(&state, &req.name, theme, deck_type)
        .map_err(|e| internal_error("Failed to create deck template", e))?;

    match inserted {
        None => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Deck template already exists")),
        )),
        Some(id) => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": id,
                "message": "Deck template created successfully",
            })),
        )),
    }
}

/// Returns None when a template with the same (name, type) already exists.
fn insert_template(
    state: &AppState,
    name: &str,
    theme: &str,
    deck_type: &str,
) -> Result<Option<i64>, MatchbookError> {
    let conn = state.db.conn()?;

    // Templates belong to the install's first game; create the slot lazily
    // so templates can be managed before any match is recorded.
    let game_id: i64 = match conn
        .query_row(
            "SELECT game_id FROM games ORDER BY game_id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?
    {
        Some(id) => id,
        None => {
            conn.execute(
                "INSERT INTO games (game_key, game_name) VALUES ('default', 'Default')",
                [],
            )?;
            conn.last_insert_rowid()
        }
    };

    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM deck_templates
            WHERE game_id = ?1 AND name = ?2 AND deck_type = ?3
        )",
        params![game_id, name, deck_type],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(None);
    }

    conn.execute(
        "INSERT INTO deck_templates (game_id, name, theme, deck_type)
         VALUES (?1, ?2, ?3, ?4)",
        params![game_id, name, theme, deck_type],
    )?;
    Ok(Some(conn.last_insert_rowid()))
}

/// PATCH /deck-templates/{id}
pub async fn update_deck_template(
    State(state): State<AppState>,
    Path(template_id): Path<i64>,
    Json(req): Json<UpdateDeckTemplateRequest>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let mut updates: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref name) = req.name {
        if !name.is_empty() {
            updates.push("name = ?");
            values.push(Box::new(name.clone()));
        }
    }
    if let Some(ref theme) = req.theme {
        if !theme.is_empty() {
            updates.push("theme = ?");
            values.push(Box::new(theme.clone()));
        }
    }

    if updates.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No fields to update")),
        ));
    }

    values.push(Box::new(template_id));
    let sql = format!(
        "UPDATE deck_templates SET {} WHERE template_id = ?",
        updates.join(", ")
    );

    let conn = state
        .db
        .conn()
        .map_err(|e| internal_error("Failed to update deck template", e))?;
    let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let changed = conn
        .execute(&sql, &param_refs[..])
        .map_err(|e| internal_error("Failed to update deck template", e.into()))?;

    if changed == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Deck template not found")),
        ));
    }

    Ok(Json(
        serde_json::json!({ "message": "Deck template updated successfully" }),
    ))
}

/// DELETE /deck-templates/{id}
pub async fn delete_deck_template(
    State(state): State<AppState>,
    Path(template_id): Path<i64>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let conn = state
        .db
        .conn()
        .map_err(|e| internal_error("Failed to delete deck template", e))?;

    let deleted = conn
        .execute(
            "DELETE FROM deck_templates WHERE template_id = ?1",
            [template_id],
        )
        .map_err(|e| internal_error("Failed to delete deck template", e.into()))?;

    if deleted == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Deck template not found")),
        ));
    }

    Ok(Json(
        serde_json::json!({ "message": "Deck template deleted successfully" }),
    ))
}
