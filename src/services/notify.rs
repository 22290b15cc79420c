use std::sync::Mutex;

/// User-facing notification sink.
pub trait Notifier: Send + Sync {
    fn error(&self, title: &str, message: &str);
    fn success(&self, title: &str, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, title: &str, message: &str) {
        tracing::warn!(title, message, "notification");
    }

    fn success(&self, title: &str, message: &str) {
        tracing::info!(title, message, "notification");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub is_error: bool,
    pub title: String,
    pub message: String,
}

/// Keeps every notification in memory, for callers that render them later.
#[derive(Debug, Default)]
pub struct BufferedNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl BufferedNotifier {
    pub fn drain(&self) -> Vec<Notification> {
        match self.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, is_error: bool, title: &str, message: &str) {
        let entry = Notification {
            is_error,
            title: title.to_string(),
            message: message.to_string(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

impl Notifier for BufferedNotifier {
    fn error(&self, title: &str, message: &str) {
        self.push(true, title, message);
    }

    fn success(&self, title: &str, message: &str) {
        self.push(false, title, message);
    }
}
