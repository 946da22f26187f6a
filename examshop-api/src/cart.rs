use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use examshop_cart::{CartSession, ResolvedCart};
use examshop_catalog::{Paper, PaperId};
use examshop_core::{CartAddForm, SessionId};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(view_cart))
        .route("/cart/add/{paper_id}", post(add_to_cart))
        .route("/cart/remove/{paper_id}", post(remove_from_cart))
}

#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub paper_id: PaperId,
    pub title: String,
    pub slug: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_item_count: u64,
    pub total_price: Decimal,
}

impl From<&ResolvedCart> for CartView {
    fn from(resolved: &ResolvedCart) -> Self {
        Self {
            items: resolved
                .iter()
                .map(|item| CartItemView {
                    paper_id: item.paper.id,
                    title: item.paper.title.clone(),
                    slug: item.paper.slug.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                })
                .collect(),
            total_item_count: resolved.total_item_count(),
            total_price: resolved.total_price(),
        }
    }
}

async fn render(state: &AppState, cart: &CartSession) -> Result<Json<CartView>, AppError> {
    let resolved = cart.cart().resolve(state.catalog.as_ref()).await?;
    if !resolved.missing().is_empty() {
        tracing::warn!(
            "Cart for session {} references {} papers no longer in the catalog",
            cart.session_id(),
            resolved.missing().len()
        );
    }
    Ok(Json(CartView::from(&resolved)))
}

async fn available_paper(state: &AppState, paper_id: PaperId) -> Result<Paper, AppError> {
    state
        .catalog
        .paper(paper_id)
        .await?
        .filter(|paper| paper.is_available)
        .ok_or_else(|| AppError::NotFoundError(format!("Paper {} not found", paper_id)))
}

/// GET /cart
async fn view_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<CartView>, AppError> {
    let cart = CartSession::load(state.sessions.clone(), session).await?;
    render(&state, &cart).await
}

/// POST /cart/add/{paper_id}
/// Adds to the existing quantity, or replaces it when `override` is set.
async fn add_to_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(paper_id): Path<i64>,
    Json(form): Json<CartAddForm>,
) -> Result<Json<CartView>, AppError> {
    let addition = form.validate()?;
    let paper = available_paper(&state, PaperId(paper_id)).await?;

    let mut cart = CartSession::load(state.sessions.clone(), session).await?;
    cart.add(&paper, addition.quantity, addition.override_quantity).await?;
    tracing::debug!("Session {} added paper {} x{}", cart.session_id(), paper.id, u32::from(addition.quantity));

    render(&state, &cart).await
}

/// POST /cart/remove/{paper_id}
async fn remove_from_cart(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(paper_id): Path<i64>,
) -> Result<Json<CartView>, AppError> {
    let mut cart = CartSession::load(state.sessions.clone(), session).await?;
    cart.remove(PaperId(paper_id)).await?;
    render(&state, &cart).await
}
