use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Danger,
}

/// A transient message shown at the top of the screen.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    expires_at: Instant,
}

impl Notice {
    pub fn success(message: impl Into<String>, now: Instant) -> Self {
        Self {
            message: message.into(),
            level: NoticeLevel::Success,
            expires_at: now + Duration::from_millis(2000),
        }
    }

    pub fn danger(message: impl Into<String>, now: Instant) -> Self {
        Self {
            message: message.into(),
            level: NoticeLevel::Danger,
            expires_at: now + Duration::from_millis(3000),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
