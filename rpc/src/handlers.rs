//! Request handlers and their wire types.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokengrid_queue::{Message, QueueCounts};
use tokengrid_store::{BaseImage, GridItem, GridItemOrder, GridItemQuery, StoreError};
use tokengrid_sync::ContentRequest;
use tokengrid_types::{Address, BlockNumber, Network, TokenId};

use crate::pagination::{next_cursor, PaginationMeta, PaginationParams};
use crate::{AppState, RpcError};

/// Redirects are stable for a given image and size.
pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

fn optional<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse the path segment and require a registered contract for it.
fn resolve_network(state: &AppState, raw: &str) -> Result<Network, RpcError> {
    let network = Network::parse(raw)?;
    state.registry.resolve(&network)?;
    Ok(network)
}

fn parse_token_id(raw: &str) -> Result<TokenId, RpcError> {
    raw.parse::<TokenId>()
        .map_err(|_| RpcError::InvalidRequest(format!("invalid token id {raw:?}")))
}

// ── Status ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub network: Network,
    /// Last block whose transfers were processed.
    pub block_number: Option<BlockNumber>,
    pub base_image_url: Option<String>,
    pub token_count: u64,
    pub queue: QueueCounts,
}

pub async fn network_status(
    State(state): State<AppState>,
    Path(network): Path<String>,
) -> Result<Json<NetworkStatus>, RpcError> {
    let network = resolve_network(&state, &network)?;
    let block_number = optional(state.store.get_network_update(&network))?.map(|u| u.block_number);
    let base_image_url = optional(state.store.get_base_image(&network))?.map(|b| b.url);
    let token_count = state.store.grid_item_count(&network)?;
    let queue = state.queue.approximate_counts().await?;
    Ok(Json(NetworkStatus {
        network,
        block_number,
        base_image_url,
        token_count,
        queue,
    }))
}

// ── Grid items ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridItemsParams {
    pub owner_id: Option<String>,
    pub group_id: Option<TokenId>,
    /// `tokenId`, `-tokenId` or `-updatedDate`.
    pub order: Option<String>,
    pub cursor: Option<String>,
    pub count: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GridItemPage {
    pub items: Vec<GridItem>,
    #[serde(flatten)]
    pub page: PaginationMeta,
}

pub async fn list_grid_items(
    State(state): State<AppState>,
    Path(network): Path<String>,
    query: Result<Query<GridItemsParams>, QueryRejection>,
) -> Result<Json<GridItemPage>, RpcError> {
    let Query(params) = query?;
    let network = resolve_network(&state, &network)?;

    let pagination = PaginationParams {
        cursor: params.cursor,
        count: params.count,
    };
    let offset = pagination.decode_offset()?;
    let limit = pagination.effective_count();

    let mut query = GridItemQuery::default().page(offset, limit);
    if let Some(owner) = params.owner_id.as_deref() {
        query = query.owned_by(Address::parse(owner)?);
    }
    if let Some(group_id) = params.group_id {
        query = query.in_group(group_id);
    }
    if let Some(order) = params.order.as_deref() {
        let order = GridItemOrder::parse(order)
            .ok_or_else(|| RpcError::InvalidRequest(format!("unknown order {order:?}")))?;
        query = query.ordered(order);
    }

    let items = state.store.query_grid_items(&network, &query)?;
    let cursor = next_cursor(offset, items.len(), limit);
    Ok(Json(GridItemPage {
        items,
        page: PaginationMeta { cursor },
    }))
}

pub async fn get_grid_item(
    State(state): State<AppState>,
    Path((network, token_id)): Path<(String, String)>,
) -> Result<Json<GridItem>, RpcError> {
    let network = resolve_network(&state, &network)?;
    let token_id = parse_token_id(&token_id)?;
    Ok(Json(state.store.get_grid_item(&network, token_id)?))
}

// ── Enqueueing ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayParams {
    pub delay_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enqueued {
    pub message_id: String,
    pub command: &'static str,
    pub delay_seconds: u64,
}

async fn enqueue(
    state: &AppState,
    message: Message,
    delay: Result<Query<DelayParams>, QueryRejection>,
) -> Result<(StatusCode, Json<Enqueued>), RpcError> {
    let Query(delay) = delay?;
    let delay_seconds = delay.delay_seconds.unwrap_or(0);
    let message_id = state.queue.send(&message, delay_seconds).await?;
    tracing::info!(
        command = message.command(),
        network = %message.network(),
        delay_seconds,
        %message_id,
        "enqueued from http"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(Enqueued {
            message_id,
            command: message.command(),
            delay_seconds,
        }),
    ))
}

pub async fn enqueue_update_tokens(
    State(state): State<AppState>,
    Path(network): Path<String>,
    delay: Result<Query<DelayParams>, QueryRejection>,
) -> Result<(StatusCode, Json<Enqueued>), RpcError> {
    let network = resolve_network(&state, &network)?;
    enqueue(&state, Message::update_tokens(&network), delay).await
}

pub async fn enqueue_update_token(
    State(state): State<AppState>,
    Path((network, token_id)): Path<(String, String)>,
    delay: Result<Query<DelayParams>, QueryRejection>,
) -> Result<(StatusCode, Json<Enqueued>), RpcError> {
    let network = resolve_network(&state, &network)?;
    let token_id = parse_token_id(&token_id)?;
    enqueue(&state, Message::update_token(&network, token_id), delay).await
}

pub async fn enqueue_upload_image(
    State(state): State<AppState>,
    Path((network, token_id)): Path<(String, String)>,
    delay: Result<Query<DelayParams>, QueryRejection>,
) -> Result<(StatusCode, Json<Enqueued>), RpcError> {
    let network = resolve_network(&state, &network)?;
    let token_id = parse_token_id(&token_id)?;
    // Only items the mirror already knows about have an image to ingest.
    state.store.get_grid_item(&network, token_id)?;
    enqueue(&state, Message::upload_token_image(&network, token_id), delay).await
}

// ── Base image ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BaseImageRequest {
    pub url: String,
}

pub async fn set_base_image(
    State(state): State<AppState>,
    Path(network): Path<String>,
    body: Result<Json<BaseImageRequest>, JsonRejection>,
) -> Result<Json<BaseImage>, RpcError> {
    let Json(body) = body?;
    let network = resolve_network(&state, &network)?;
    let url = body.url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(RpcError::InvalidRequest(format!(
            "base image url must be http(s), got {url:?}"
        )));
    }

    let now = state.clock.now();
    let created_date = optional(state.store.get_base_image(&network))?
        .map_or(now, |existing| existing.created_date);
    let image = BaseImage {
        network,
        url: url.to_string(),
        created_date,
        updated_date: now,
    };
    state.store.put_base_image(&image)?;
    tracing::info!(network = %image.network, url = %image.url, "base image set");
    Ok(Json(image))
}

// ── Off-chain content ────────────────────────────────────────────────────

pub async fn submit_group_content(
    State(state): State<AppState>,
    Path((network, group_id)): Path<(String, String)>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RpcError> {
    let Json(request) = body?;
    let network = resolve_network(&state, &network)?;
    let group_id = parse_token_id(&group_id)?;
    if request.group_id != group_id {
        return Err(RpcError::InvalidRequest(format!(
            "body groupId {} does not match path group {group_id}",
            request.group_id
        )));
    }
    let pending = state.offchain.submit(&network, request).await?;
    Ok((StatusCode::ACCEPTED, Json(pending)))
}

// ── Images ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ImageSizeParams {
    pub w: Option<u32>,
    pub h: Option<u32>,
}

pub async fn image_redirect(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    size: Result<Query<ImageSizeParams>, QueryRejection>,
) -> Result<Response, RpcError> {
    let Query(size) = size?;
    let image = state.store.get_image(&image_id)?;
    let target = image
        .select_variant(size.w.unwrap_or(0), size.h.unwrap_or(0))
        .to_string();
    tracing::debug!(%image_id, w = size.w, h = size.h, %target, "image redirect");
    Ok((
        StatusCode::TEMPORARY_REDIRECT,
        [
            (header::LOCATION, target),
            (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string()),
        ],
    )
        .into_response())
}

// ── Metrics ──────────────────────────────────────────────────────────────

pub async fn metrics(State(state): State<AppState>) -> Result<Response, RpcError> {
    let body = state.metrics.encode_text()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}
