use std::sync::Mutex;

pub const SESSION_FINISHED_TITLE: &str = "Study session finished!";
pub const SESSION_FINISHED_BODY: &str = "Time to take a break";

/// Best-effort user notifications. Implementations must not fail the caller.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str);
    fn play_completion_cue(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
    }

    fn play_completion_cue(&self) {
        tracing::info!("completion cue");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Message { title: String, body: String },
    Cue,
}

/// Records notifications in memory; used by tests and headless callers that
/// want to inspect what would have been shown.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|delivered| delivered.clone())
            .unwrap_or_default()
    }

    fn record(&self, notification: Notification) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(notification);
        }
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(&self, title: &str, body: &str) {
        self.record(Notification::Message {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn play_completion_cue(&self) {
        self.record(Notification::Cue);
    }
}
