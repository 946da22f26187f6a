use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification channel is not configured")]
    NotConfigured,
    #[error("Notification rejected with status {0}")]
    Rejected(u16),
    #[error("Notification timed out")]
    Timeout,
    #[error("Notification transport failure: {0}")]
    Transport(String),
}

/// Outbound message channel used to deliver access credentials.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, destination: &str, message: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: String,
    pub message: String,
}

/// Keeps every message in memory. Can be switched into a failing mode to
/// exercise the best-effort delivery path.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("simulated outage".to_string()));
        }

        self.sent.lock().await.push(SentMessage {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
