//! # Message handlers
//!
//! This module coordinates the flow between HTTP requests and `MessageService`.
//! Bodies, paths and query strings are parsed here so that every malformed
//! input comes back in the same error envelope.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use domains::{DomainError, Message, MessageId, MessageSort, PageRequest, VoteKind};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::AuthPrincipal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: String,
}

/// Raw listing parameters. Kept as strings so that bad values produce a
/// validation error rather than an extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListQuery {
    fn sort(&self) -> Result<MessageSort, DomainError> {
        MessageSort::parse(self.sort_by.as_deref(), self.order.as_deref())
    }

    fn page_request(&self, default_size: u32) -> Result<PageRequest, DomainError> {
        let page = parse_number("page", self.page.as_deref())?;
        let limit = parse_number("limit", self.limit.as_deref())?;
        Ok(PageRequest::from_query(page, limit, default_size))
    }
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<Option<i64>, DomainError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| DomainError::validation(format!("{name} must be an integer, got {value:?}")))
    })
    .transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub posts: Vec<Message>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteAck {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

fn body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

fn query<T: DeserializeOwned>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

fn message_id(raw: &str) -> Result<MessageId, ApiError> {
    Ok(raw.parse::<MessageId>()?)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let text = state.metrics.render().map_err(|err| {
        tracing::error!(error = %err, "metrics encoding failed");
        ApiError::Internal
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        text,
    ))
}

/// `GET /api/posts`: one page of top-level messages.
pub async fn list_roots(
    State(state): State<AppState>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<MessagePage>, ApiError> {
    let params = query(params)?;
    let sort = params.sort()?;
    let page_request = params.page_request(state.default_page_size)?;
    let page = state.messages.list_roots(page_request, sort).await?;
    Ok(Json(MessagePage {
        posts: page.items,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
    }))
}

/// `POST /api/posts`: a new post, or a reply when `parentId` is present.
pub async fn create_message(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    payload: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let parent_id = request.parent_id.as_deref().map(message_id).transpose()?;
    let message = state
        .messages
        .create(&principal, &request.content, parent_id)
        .await?;
    state.metrics.record_created(message.is_root());
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let message = state.messages.get(message_id(&id)?).await?;
    Ok(Json(message))
}

pub async fn edit_message(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<String>,
    payload: Result<Json<EditMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let id = message_id(&id)?;
    let request = body(payload)?;
    let message = state.messages.edit(&principal, id, &request.content).await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<String>,
) -> Result<Json<DeleteAck>, ApiError> {
    state.messages.delete(&principal, message_id(&id)?).await?;
    Ok(Json(DeleteAck {
        message: "Post deleted successfully",
    }))
}

/// `POST /api/posts/{id}/vote`: toggles the caller's like or dislike.
pub async fn vote(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let id = message_id(&id)?;
    let kind: VoteKind = body(payload)?.vote_type.parse()?;
    let receipt = state.messages.vote(&principal, id, kind).await?;
    state.metrics.record_vote(kind, receipt.outcome);
    Ok(Json(receipt.message))
}

/// `GET /api/posts/{id}/comments`: direct replies only.
pub async fn list_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let id = message_id(&id)?;
    let sort = query(params)?.sort()?;
    let children = state.messages.list_children(id, sort).await?;
    Ok(Json(children))
}
