use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use log::error;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};

use crate::api::{AppState, ErrorResponse};
use crate::error::MatchbookError;

const MODES: [&str; 3] = ["Ranked", "Rating", "Event"];
const RESULTS: [&str; 2] = ["W", "L"];
const PLAY_ORDERS: [&str; 2] = ["first", "second"];

/// Owner row used when no user exists yet (single-user installs).
const LOCAL_USER_EMAIL: &str = "local@matchbook.local";

/// Deck archetype subset embedded in match responses
#[derive(Debug, Serialize)]
pub struct DeckInfo {
    pub id: i64,
    pub main: String,
    pub sub: Option<String>,
}

/// One match with joined deck and season details
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub id: i64,
    pub date: String,
    pub mode: String,
    pub rank: String,
    pub my_deck: DeckInfo,
    pub opp_deck: DeckInfo,
    pub play_order: String,
    pub result: String,
    pub note: Option<String>,
    pub season_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MatchListResponse {
    pub matches: Vec<MatchResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListMatchesQuery {
    pub mode: Option<String>,
}

/// Deck archetype form used when creating or updating a match
#[derive(Debug, Deserialize)]
pub struct DeckForm {
    pub main: String,
    pub sub: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub game_key: String,
    pub season_code: String,
    pub date: String,
    pub mode: Option<String>,
    pub rank: String,
    pub my_deck: DeckForm,
    pub opp_deck: DeckForm,
    pub play_order: String,
    pub result: String,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateMatchResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMatchRequest {
    pub date: Option<String>,
    pub mode: Option<String>,
    pub rank: Option<String>,
    pub my_deck: Option<DeckForm>,
    pub opp_deck: Option<DeckForm>,
    pub play_order: Option<String>,
    pub result: Option<String>,
    pub note: Option<String>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn internal_error(context: &str, err: MatchbookError) -> HandlerError {
    error!("{}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(context)),
    )
}

fn bad_request(message: &str) -> HandlerError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

fn not_found(message: &str) -> HandlerError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

fn epoch_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// GET /matches
///
/// Lists matches with joined deck and season details, newest first.
/// Accepts an optional `?mode=` filter.
pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListMatchesQuery>,
) -> Result<Json<MatchListResponse>, HandlerError> {
    let matches = fetch_matches(&state, query.mode.as_deref())
        .map_err(|e| internal_error("Failed to list matches", e))?;

    Ok(Json(MatchListResponse {
        total: matches.len(),
        matches,
    }))
}

fn fetch_matches(
    state: &AppState,
    mode: Option<&str>,
) -> Result<Vec<MatchResponse>, MatchbookError> {
    let conn = state.db.conn()?;

    let base_sql = "
        SELECT m.match_id, m.played_on, m.mode, m.rank,
               md.deck_id, md.main, md.sub,
               od.deck_id, od.main, od.sub,
               m.play_order, m.result, m.note, s.code,
               m.created_at, m.updated_at
        FROM matches m
        JOIN decks md ON md.deck_id = m.my_deck_id
        JOIN decks od ON od.deck_id = m.opp_deck_id
        JOIN seasons s ON s.season_id = m.season_id";

    let (sql, params): (String, Vec<&dyn ToSql>) = match mode {
        Some(ref m) => (
            format!(
                "{} WHERE m.mode = ?1 ORDER BY m.played_on DESC, m.match_id DESC",
                base_sql
            ),
            vec![m as &dyn ToSql],
        ),
        None => (
            format!("{} ORDER BY m.played_on DESC, m.match_id DESC", base_sql),
            vec![],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(&params[..], |row| {
        Ok(MatchResponse {
            id: row.get(0)?,
            date: row.get(1)?,
            mode: row.get(2)?,
            rank: row.get(3)?,
            my_deck: DeckInfo {
                id: row.get(4)?,
                main: row.get(5)?,
                sub: row.get(6)?,
            },
            opp_deck: DeckInfo {
                id: row.get(7)?,
                main: row.get(8)?,
                sub: row.get(9)?,
            },
            play_order: row.get(10)?,
            result: row.get(11)?,
            note: row.get(12)?,
            season_code: row.get(13)?,
            created_at: epoch_to_datetime(row.get(14)?),
            updated_at: epoch_to_datetime(row.get(15)?),
        })
    })?;

    let mut matches = Vec::new();
    for m in rows {
        matches.push(m?);
    }
    Ok(matches)
}

/// POST /matches
pub async fn create_match(
    State(state): State<AppState>,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<CreateMatchResponse>), HandlerError> {
    if req.date.is_empty() {
        return Err(bad_request("date is required"));
    }
    if req.my_deck.main.is_empty() || req.opp_deck.main.is_empty() {
        return Err(bad_request("deck main archetype is required"));
    }
    if !RESULTS.contains(&req.result.as_str()) {
        return Err(bad_request("result must be 'W' or 'L'"));
    }
    if !PLAY_ORDERS.contains(&req.play_order.as_str()) {
        return Err(bad_request("playOrder must be 'first' or 'second'"));
    }
    let mode = req.mode.as_deref().unwrap_or("Ranked");
    if !MODES.contains(&mode) {
        return Err(bad_request("mode must be one of Ranked, Rating, Event"));
    }

    let match_id = insert_match(&state, &req, mode)
        .map_err(|e| internal_error("Failed to create match", e))?;

    log::info!("Created match {}", match_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateMatchResponse {
            id: match_id,
            message: "Match created successfully".to_string(),
        }),
    ))
}

fn insert_match(
    state: &AppState,
    req: &CreateMatchRequest,
    mode: &str,
) -> Result<i64, MatchbookError> {
    let mut conn = state.db.conn()?;
    let tx = conn.transaction()?;

    let user_id = get_or_create_local_user(&tx)?;
    let game_id = get_or_create_game(&tx, &req.game_key)?;
    let season_id = get_or_create_season(&tx, game_id, &req.season_code)?;
    let my_deck_id = get_or_create_deck(&tx, game_id, &req.my_deck)?;
    let opp_deck_id = get_or_create_deck(&tx, game_id, &req.opp_deck)?;

    tx.execute(
        "INSERT INTO matches
            (user_id, game_id, season_id, played_on, mode, rank,
             my_deck_id, opp_deck_id, play_order, result, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user_id,
            game_id,
            season_id,
            req.date,
            mode,
            req.rank,
            my_deck_id,
            opp_deck_id,
            req.play_order,
            req.result,
            req.note,
        ],
    )?;
    let match_id = tx.last_insert_rowid();

    tx.commit()?;
    Ok(match_id)
}

fn get_or_create_local_user(conn: &Connection) -> Result<i64, MatchbookError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM users ORDER BY user_id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(user_id) = existing {
        return Ok(user_id);
    }

    conn.execute(
        "INSERT INTO users (email, password_hash) VALUES (?1, '')",
        [LOCAL_USER_EMAIL],
    )?;
    Ok(conn.last_insert_rowid())
}

fn get_or_create_game(conn: &Connection, game_key: &str) -> Result<i64, MatchbookError> {
    conn.execute(
        "INSERT OR IGNORE INTO games (game_key, game_name) VALUES (?1, ?1)",
        [game_key],
    )?;
    let game_id = conn.query_row(
        "SELECT game_id FROM games WHERE game_key = ?1",
        [game_key],
        |row| row.get(0),
    )?;
    Ok(game_id)
}

fn get_or_create_season(
    conn: &Connection,
    game_id: i64,
    code: &str,
) -> Result<i64, MatchbookError> {
    conn.execute(
        "INSERT OR IGNORE INTO seasons (game_id, code) VALUES (?1, ?2)",
        params![game_id, code],
    )?;
    let season_id = conn.query_row(
        "SELECT season_id FROM seasons WHERE game_id = ?1 AND code = ?2",
        params![game_id, code],
        |row| row.get(0),
    )?;
    Ok(season_id)
}

/// Looks up a deck by (game, main, sub) or creates it.
///
/// `sub IS ?3` rather than `=` because NULL subs must compare equal here;
/// the UNIQUE constraint treats NULLs as distinct and cannot dedupe them.
fn get_or_create_deck(
    conn: &Connection,
    game_id: i64,
    deck: &DeckForm,
) -> Result<i64, MatchbookError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT deck_id FROM decks WHERE game_id = ?1 AND main = ?2 AND sub IS ?3",
            params![game_id, deck.main, deck.sub],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(deck_id) = existing {
        return Ok(deck_id);
    }

    conn.execute(
        "INSERT INTO decks (game_id, main, sub) VALUES (?1, ?2, ?3)",
        params![game_id, deck.main, deck.sub],
    )?;
    Ok(conn.last_insert_rowid())
}

/// PATCH /matches/{id}
///
/// Partial update. The SET clause is assembled from the provided fields
/// only; every value travels as a bind parameter.
pub async fn update_match(
    State(state): State<AppState>,
    Path(match_id): Path<i64>,
    Json(req): Json<UpdateMatchRequest>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    if let Some(ref mode) = req.mode {
        if !MODES.contains(&mode.as_str()) {
            return Err(bad_request("mode must be one of Ranked, Rating, Event"));
        }
    }
    if let Some(ref result) = req.result {
        if !RESULTS.contains(&result.as_str()) {
            return Err(bad_request("result must be 'W' or 'L'"));
        }
    }
    if let Some(ref play_order) = req.play_order {
        if !PLAY_ORDERS.contains(&play_order.as_str()) {
            return Err(bad_request("playOrder must be 'first' or 'second'"));
        }
    }

    let mut conn = state
        .db
        .conn()
        .map_err(|e| internal_error("Failed to update match", e))?;
    let updated = apply_match_update(&mut conn, match_id, &req)
        .map_err(|e| internal_error("Failed to update match", e))?;

    match updated {
        None => Err(not_found("Match not found")),
        Some(0) => Err(bad_request("No fields to update")),
        Some(_) => Ok(Json(
            serde_json::json!({ "message": "Match updated successfully" }),
        )),
    }
}

/// Returns None when the match does not exist, Some(field_count) otherwise.
fn apply_match_update(
    conn: &mut Connection,
    match_id: i64,
    req: &UpdateMatchRequest,
) -> Result<Option<usize>, MatchbookError> {
    let tx = conn.transaction()?;

    let game_id: Option<i64> = tx
        .query_row(
            "SELECT game_id FROM matches WHERE match_id = ?1",
            [match_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(game_id) = game_id else {
        return Ok(None);
    };

    let mut updates: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref date) = req.date {
        updates.push("played_on = ?");
        values.push(Box::new(date.clone()));
    }
    if let Some(ref mode) = req.mode {
        updates.push("mode = ?");
        values.push(Box::new(mode.clone()));
    }
    if let Some(ref rank) = req.rank {
        updates.push("rank = ?");
        values.push(Box::new(rank.clone()));
    }
    if let Some(ref play_order) = req.play_order {
        updates.push("play_order = ?");
        values.push(Box::new(play_order.clone()));
    }
    if let Some(ref result) = req.result {
        updates.push("result = ?");
        values.push(Box::new(result.clone()));
    }
    if let Some(ref note) = req.note {
        updates.push("note = ?");
        values.push(Box::new(note.clone()));
    }
    if let Some(ref my_deck) = req.my_deck {
        let deck_id = get_or_create_deck(&tx, game_id, my_deck)?;
        updates.push("my_deck_id = ?");
        values.push(Box::new(deck_id));
    }
    if let Some(ref opp_deck) = req.opp_deck {
        let deck_id = get_or_create_deck(&tx, game_id, opp_deck)?;
        updates.push("opp_deck_id = ?");
        values.push(Box::new(deck_id));
    }

    if updates.is_empty() {
        return Ok(Some(0));
    }

    let field_count = updates.len();
    updates.push("updated_at = strftime('%s', 'now')");
    values.push(Box::new(match_id));

    let sql = format!(
        "UPDATE matches SET {} WHERE match_id = ?",
        updates.join(", ")
    );
    let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    tx.execute(&sql, &param_refs[..])?;

    tx.commit()?;
    Ok(Some(field_count))
}

/// DELETE /matches/{id}
pub async fn delete_match(
    State(state): State<AppState>,
    Path(match_id): Path<i64>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let conn = state
        .db
        .conn()
        .map_err(|e| internal_error("Failed to delete match", e))?;

    let deleted = conn
        .execute("DELETE FROM matches WHERE match_id = ?1", [match_id])
        .map_err(|e| internal_error("Failed to delete match", e.into()))?;

    if deleted == 0 {
        return Err(not_found("Match not found"));
    }

    Ok(Json(
        serde_json::json!({ "message": "Match deleted successfully" }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE decks (
                deck_id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id INTEGER NOT NULL,
                main TEXT NOT NULL,
                sub TEXT DEFAULT NULL,
                UNIQUE (game_id, main, sub)
            );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_get_or_create_deck_does_not_duplicate() {
        let conn = deck_test_conn();
        let form = DeckForm {
            main: "Labrynth".to_string(),
            sub: None,
        };

        let first = get_or_create_deck(&conn, 1, &form).unwrap();
        let second = get_or_create_deck(&conn, 1, &form).unwrap();
        assert_eq!(first, second);

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM decks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 1);
    }

    fn match_test_conn() -> Connection {
        let conn = deck_test_conn();
        conn.execute_batch(
            "CREATE TABLE matches (
                match_id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id INTEGER NOT NULL,
                played_on TEXT NOT NULL,
                mode TEXT NOT NULL,
                rank TEXT NOT NULL,
                my_deck_id INTEGER NOT NULL,
                opp_deck_id INTEGER NOT NULL,
                play_order TEXT NOT NULL,
                result TEXT NOT NULL,
                note TEXT DEFAULT NULL,
                created_at INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL DEFAULT 0
            );
            INSERT INTO decks (game_id, main, sub) VALUES (1, 'Snake-Eye', NULL);
            INSERT INTO decks (game_id, main, sub) VALUES (1, 'Labrynth', NULL);
            INSERT INTO matches
                (game_id, played_on, mode, rank, my_deck_id, opp_deck_id,
                 play_order, result, note)
             VALUES (1, '2025-07-03', 'Ranked', 'Gold I', 1, 2, 'first', 'W', 'keep me');",
        )
        .unwrap();
        conn
    }

    fn empty_update() -> UpdateMatchRequest {
        UpdateMatchRequest {
            date: None,
            mode: None,
            rank: None,
            my_deck: None,
            opp_deck: None,
            play_order: None,
            result: None,
            note: None,
        }
    }

    #[test]
    fn test_update_touches_only_provided_fields() {
        let mut conn = match_test_conn();

        let req = UpdateMatchRequest {
            rank: Some("Platinum IV".to_string()),
            result: Some("L".to_string()),
            ..empty_update()
        };
        let updated = apply_match_update(&mut conn, 1, &req).unwrap();
        assert_eq!(updated, Some(2));

        let row = conn
            .query_row(
                "SELECT played_on, mode, rank, result, note, my_deck_id, updated_at
                 FROM matches WHERE match_id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .unwrap();

        // Provided fields changed
        assert_eq!(row.2, "Platinum IV");
        assert_eq!(row.3, "L");

        // Everything else kept its value
        assert_eq!(row.0, "2025-07-03");
        assert_eq!(row.1, "Ranked");
        assert_eq!(row.4, Some("keep me".to_string()));
        assert_eq!(row.5, 1);

        // updated_at was bumped from the seeded 0
        assert!(row.6 > 0);
    }

    #[test]
    fn test_update_resolves_deck_forms() {
        let mut conn = match_test_conn();

        let req = UpdateMatchRequest {
            my_deck: Some(DeckForm {
                main: "Tenpai Dragon".to_string(),
                sub: None,
            }),
            ..empty_update()
        };
        assert_eq!(apply_match_update(&mut conn, 1, &req).unwrap(), Some(1));

        let (my_deck_id, opp_deck_id): (i64, i64) = conn
            .query_row(
                "SELECT my_deck_id, opp_deck_id FROM matches WHERE match_id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        // A new deck row was created and wired in; the opponent deck was
        // left alone
        let main: String = conn
            .query_row(
                "SELECT main FROM decks WHERE deck_id = ?1",
                [my_deck_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(main, "Tenpai Dragon");
        assert_eq!(opp_deck_id, 2);
    }

    #[test]
    fn test_update_missing_match_reports_none() {
        let mut conn = match_test_conn();
        let req = UpdateMatchRequest {
            rank: Some("Gold II".to_string()),
            ..empty_update()
        };
        assert_eq!(apply_match_update(&mut conn, 99, &req).unwrap(), None);
    }

    #[test]
    fn test_update_with_no_fields_reports_zero() {
        let mut conn = match_test_conn();
        assert_eq!(
            apply_match_update(&mut conn, 1, &empty_update()).unwrap(),
            Some(0)
        );

        // Nothing was written, not even updated_at
        let updated_at: i64 = conn
            .query_row(
                "SELECT updated_at FROM matches WHERE match_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(updated_at, 0);
    }

    #[test]
    fn test_get_or_create_deck_distinguishes_sub() {
        let conn = deck_test_conn();
        let plain = DeckForm {
            main: "Yubel".to_string(),
            sub: None,
        };
        let paired = DeckForm {
            main: "Yubel".to_string(),
            sub: Some("Fiendsmith".to_string()),
        };

        let a = get_or_create_deck(&conn, 1, &plain).unwrap();
        let b = get_or_create_deck(&conn, 1, &paired).unwrap();
        assert_ne!(a, b);
    }
}
