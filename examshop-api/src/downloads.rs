use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{Extensions, HeaderMap},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::{headers::UserAgent, TypedHeader};
use examshop_order::{log_download, DownloadContext};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::error::AppError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

pub fn routes() -> Router<AppState> {
    Router::new().route("/download/{paper_slug}", get(download_paper))
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub order: Option<String>,
    pub payment: Option<String>,
    pub email: Option<String>,
}

/// GET /download/{paper_slug}
/// Records the download and redirects to the PDF.
async fn download_paper(
    State(state): State<AppState>,
    Path(paper_slug): Path<String>,
    Query(query): Query<DownloadQuery>,
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<Redirect, AppError> {
    let paper = state
        .catalog
        .paper_by_slug(&paper_slug)
        .await?
        .filter(|paper| paper.is_available)
        .ok_or_else(|| AppError::NotFoundError(format!("Paper {} not found", paper_slug)))?;

    let context = DownloadContext {
        order_reference: query.order,
        payment_reference: query.payment,
        email: query.email,
        forwarded_for: headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        remote_addr: extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip()),
        user_agent: user_agent.map(|TypedHeader(agent)| agent.to_string()),
    };

    let record = log_download(state.downloads.as_ref(), &paper, context).await?;
    tracing::info!("Download {} of {} ({})", record.id, paper.slug, paper.file_name());

    Ok(Redirect::to(&paper.pdf_url))
}
