//! Paper management handlers
//!
//! Each handler validates first, then calls the repository, then maps the
//! outcome to a status code. Domain errors render themselves.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppState;
use papershelf_common::{
    db::{Paper, Repository},
    errors::{AppError, Result},
    validation::{validate_filter, validate_id, ListQuery, PaperPayload},
};

/// Paper as returned to clients
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PaperResponse {
    pub id: i64,
    pub title: String,
    pub authors: String,
    pub published_in: String,
    pub year: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Paper> for PaperResponse {
    fn from(paper: Paper) -> Self {
        Self {
            id: paper.id,
            title: paper.title,
            authors: paper.authors,
            published_in: paper.published_in,
            year: paper.year,
            created_at: format_timestamp(&paper.created_at),
            updated_at: format_timestamp(&paper.updated_at),
        }
    }
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`
fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A body sent without a JSON content type reads as an empty object;
/// unparseable JSON is reported as is.
fn body(payload: std::result::Result<Json<Value>, JsonRejection>) -> Result<PaperPayload> {
    match payload {
        Ok(Json(value)) => Ok(PaperPayload::from_json(value)),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(PaperPayload::default()),
        Err(rejection) => Err(AppError::Validation {
            messages: vec![rejection.body_text()],
        }),
    }
}

fn paper_id(raw: std::result::Result<Path<String>, PathRejection>) -> Result<i64> {
    match raw {
        Ok(Path(raw)) => validate_id(&raw),
        Err(rejection) => Err(AppError::InvalidIdentifier {
            raw: rejection.body_text(),
        }),
    }
}

/// Create a new paper
pub async fn create_paper(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<PaperResponse>)> {
    let record = body(payload)?.into_record()?;

    let repo = Repository::new(state.db.clone());
    let paper = repo.create_paper(record).await?;

    Ok((StatusCode::CREATED, Json(paper.into())))
}

/// List papers with optional `year` / `published_in` filters and pagination
pub async fn list_papers(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<PaperResponse>>> {
    let Query(query) = query.map_err(|rejection| AppError::InvalidFilter {
        message: rejection.body_text(),
    })?;
    let filter = validate_filter(&query)?;

    let repo = Repository::new(state.db.clone());
    let papers = repo.list_papers(&filter).await?;

    Ok(Json(papers.into_iter().map(PaperResponse::from).collect()))
}

/// Get a paper by ID
pub async fn get_paper(
    State(state): State<AppState>,
    raw_id: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<PaperResponse>> {
    let id = paper_id(raw_id)?;

    let repo = Repository::new(state.db.clone());
    let paper = repo.get_paper(id).await?;

    Ok(Json(paper.into()))
}

/// Replace the mutable fields of a paper
pub async fn update_paper(
    State(state): State<AppState>,
    raw_id: std::result::Result<Path<String>, PathRejection>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PaperResponse>> {
    let id = paper_id(raw_id)?;
    let record = body(payload)?.into_record()?;

    let repo = Repository::new(state.db.clone());
    let paper = repo.update_paper(id, record).await?;

    Ok(Json(paper.into()))
}

/// Delete a paper
pub async fn delete_paper(
    State(state): State<AppState>,
    raw_id: std::result::Result<Path<String>, PathRejection>,
) -> Result<StatusCode> {
    let id = paper_id(raw_id)?;

    let repo = Repository::new(state.db.clone());
    repo.delete_paper(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
