//! REST API for docdb.
//!
//! Provides a stateless HTTP server with JSON endpoints for the document
//! store. Each request includes a `db` field naming the store directory.
//! The server opens the store per request; persistence is write-through,
//! so mutations are on disk before the response is sent.
//!
//! ## Endpoints
//!
//! - `POST /create_table` - Create a table
//! - `POST /insert` - Insert document rows
//! - `POST /nearest` - Rank stored documents against query texts
//! - `POST /rows` - Dump a table's rows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use actix_web::{App, HttpServer};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     HttpServer::new(|| App::new().configure(docdb::server::config))
//!         .bind("0.0.0.0:7878")?
//!         .run()
//!         .await
//! }
//! ```

use actix_web::{web, HttpResponse, Responder};
use serde::{Serialize, Deserialize};
use serde_json::Value as JsonValue;
use crate::error::DbError;
use crate::table::{Row, Value};
use crate::{Database, Engine};

// --- Request structs ---

#[derive(Deserialize)]
struct CreateTableRequest {
    db: String,
    name: String,
    columns: Vec<String>,
    primary_key: Option<String>,
}

#[derive(Deserialize)]
struct InsertRequest {
    db: String,
    table: String,
    rows: Vec<serde_json::Map<String, JsonValue>>,
}

#[derive(Deserialize)]
struct NearestQuery {
    text: String,
    top_k: usize,
}

#[derive(Deserialize)]
struct NearestRequest {
    db: String,
    queries: Vec<NearestQuery>,
}

#[derive(Deserialize)]
struct RowsRequest {
    db: String,
    table: String,
}

// --- Response structs ---

#[derive(Serialize)]
struct CreateTableResponse {
    table: String,
    columns: Vec<String>,
}

#[derive(Serialize)]
struct InsertResponse {
    inserted: usize,
    results: Vec<InsertResult>,
}

#[derive(Serialize)]
struct InsertResult {
    status: String,
    message: String,
}

#[derive(Serialize)]
struct NearestResponse {
    results: Vec<MatchGroup>,
}

#[derive(Serialize)]
struct MatchGroup {
    matches: Vec<MatchResult>,
    message: String,
}

#[derive(Serialize)]
struct MatchResult {
    table: String,
    score: f64,
    text: String,
    row: serde_json::Map<String, JsonValue>,
}

#[derive(Serialize)]
struct RowsResponse {
    table: String,
    rows: Vec<serde_json::Map<String, JsonValue>>,
}

// --- JSON <-> cell conversions ---

fn json_to_value(value: &JsonValue) -> Result<Value, String> {
    match value {
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        JsonValue::Number(n) => n.as_i64()
            .map(Value::Int)
            .ok_or_else(|| format!("unsupported number '{}', only integers are stored", n)),
        other => Err(format!("unsupported value '{}'", other)),
    }
}

fn json_to_row(record: &serde_json::Map<String, JsonValue>) -> Result<Row, String> {
    let mut row = Row::new();
    for (column, value) in record {
        row.insert(column.clone(), json_to_value(value)?);
    }
    Ok(row)
}

fn row_to_json(row: &Row) -> serde_json::Map<String, JsonValue> {
    row.iter()
        .map(|(column, value)| {
            let json = match value {
                Value::Int(n) => JsonValue::from(*n),
                Value::Text(s) => JsonValue::from(s.clone()),
                Value::Tokens(ids) => JsonValue::from(ids.clone()),
            };
            (column.clone(), json)
        })
        .collect()
}

fn open_error(e: DbError) -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({"error": e.to_string()}))
}

// --- Handlers ---

async fn create_table_handler(body: web::Json<CreateTableRequest>) -> impl Responder {
    let db = match Database::open(&body.db) {
        Ok(db) => db,
        Err(e) => return open_error(e),
    };

    match db.create_table(&body.name, &body.columns, body.primary_key.as_deref()) {
        Ok(()) => {
            let columns = db.table_columns(&body.name).unwrap_or_default();
            HttpResponse::Ok().json(CreateTableResponse { table: body.name.clone(), columns })
        }
        Err(e) => HttpResponse::BadRequest().json(serde_json::json!({"error": e.to_string()})),
    }
}

async fn insert_handler(body: web::Json<InsertRequest>) -> impl Responder {
    let db = match Database::open(&body.db) {
        Ok(db) => db,
        Err(e) => return open_error(e),
    };

    let mut results = Vec::new();
    let mut inserted = 0;

    for record in &body.rows {
        let row = match json_to_row(record) {
            Ok(row) => row,
            Err(message) => {
                results.push(InsertResult { status: "error".to_string(), message });
                continue;
            }
        };

        match db.insert(&body.table, row) {
            Ok(key) => {
                inserted += 1;
                results.push(InsertResult {
                    status: "ok".to_string(),
                    message: format!("inserted with key {}", key),
                });
            }
            Err(e) => {
                results.push(InsertResult {
                    status: "error".to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    HttpResponse::Ok().json(InsertResponse { inserted, results })
}

async fn nearest_handler(body: web::Json<NearestRequest>) -> impl Responder {
    let db = match Database::open(&body.db) {
        Ok(db) => db,
        Err(e) => return open_error(e),
    };

    let engine = Engine::new(&db);
    let mut results = Vec::new();

    for query in &body.queries {
        match engine.find_nearest(&query.text, query.top_k) {
            Ok(matches) if matches.is_empty() => {
                results.push(MatchGroup {
                    matches: Vec::new(),
                    message: "No match found".to_string(),
                });
            }
            Ok(matches) => {
                results.push(MatchGroup {
                    matches: matches.iter()
                        .map(|m| {
                            let text = match m.row.get(crate::table::ENCODED_COLUMN) {
                                Some(Value::Tokens(ids)) => db.decode(&ids),
                                _ => String::new(),
                            };
                            MatchResult {
                                table: m.table.clone(),
                                score: m.score,
                                text,
                                row: row_to_json(&m.row),
                            }
                        })
                        .collect(),
                    message: "Search Success".to_string(),
                });
            }
            // "no rows to search" is an empty-result case for callers
            Err(DbError::Loading(message)) => {
                results.push(MatchGroup { matches: Vec::new(), message });
            }
            Err(e) => {
                results.push(MatchGroup { matches: Vec::new(), message: e.to_string() });
            }
        }
    }

    HttpResponse::Ok().json(NearestResponse { results })
}

async fn rows_handler(body: web::Json<RowsRequest>) -> impl Responder {
    let db = match Database::open(&body.db) {
        Ok(db) => db,
        Err(e) => return open_error(e),
    };

    match db.table_rows(&body.table) {
        Ok(rows) => HttpResponse::Ok().json(RowsResponse {
            table: body.table.clone(),
            rows: rows.iter().map(row_to_json).collect(),
        }),
        Err(e) => HttpResponse::BadRequest().json(serde_json::json!({"error": e.to_string()})),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/create_table").route(web::post().to(create_table_handler)))
       .service(web::resource("/insert").route(web::post().to(insert_handler)))
       .service(web::resource("/nearest").route(web::post().to(nearest_handler)))
       .service(web::resource("/rows").route(web::post().to(rows_handler)));
}
