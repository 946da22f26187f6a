use chrono::Utc;
use examshop_catalog::Paper;
use examshop_shared::models::events::PaperDownloadedEvent;
use examshop_shared::Masked;
use std::net::IpAddr;

use crate::models::{DownloadRecord, NewDownload};
use crate::repository::{DownloadRepository, RepositoryError};

/// Request metadata captured alongside a download.
#[derive(Debug, Clone, Default)]
pub struct DownloadContext {
    pub order_reference: Option<String>,
    pub payment_reference: Option<String>,
    pub email: Option<String>,
    pub forwarded_for: Option<String>,
    pub remote_addr: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// First `X-Forwarded-For` entry when it parses, else the socket address.
pub fn client_ip(forwarded_for: Option<&str>, remote_addr: Option<IpAddr>) -> Option<IpAddr> {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or(remote_addr)
}

pub async fn log_download(
    downloads: &dyn DownloadRepository,
    paper: &Paper,
    context: DownloadContext,
) -> Result<DownloadRecord, RepositoryError> {
    let ip_address = client_ip(context.forwarded_for.as_deref(), context.remote_addr);
    let record = downloads
        .record_download(NewDownload {
            paper_id: paper.id,
            order_reference: context.order_reference,
            payment_reference: context.payment_reference,
            email: context.email.map(Masked),
            ip_address,
            user_agent: context.user_agent.unwrap_or_default(),
        })
        .await?;

    let event = PaperDownloadedEvent {
        paper_id: paper.id.0,
        order_reference: record.order_reference.clone(),
        timestamp: Utc::now().timestamp(),
    };
    if let Ok(payload) = serde_json::to_string(&event) {
        tracing::info!(target: "examshop::audit", "{}", payload);
    }

    Ok(record)
}
