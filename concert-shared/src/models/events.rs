use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dto::{ConcertDto, PerformerDto};

/// Catalog change pushed to subscribers of `/v1/notifications/{topic}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ConcertCreated { concert: ConcertDto },
    PerformerCreated { performer: PerformerDto },
    PerformerImageUpdated { performer_id: i64, image_name: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Concerts,
    Performers,
    Images,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Concerts => "concerts",
            Topic::Performers => "performers",
            Topic::Images => "images",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Notification {
    pub fn topic(&self) -> Topic {
        match self {
            Notification::ConcertCreated { .. } => Topic::Concerts,
            Notification::PerformerCreated { .. } => Topic::Performers,
            Notification::PerformerImageUpdated { .. } => Topic::Images,
        }
    }

    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::ConcertCreated { .. } => "concert_created",
            Notification::PerformerCreated { .. } => "performer_created",
            Notification::PerformerImageUpdated { .. } => "performer_image_updated",
        }
    }

    pub fn performer_id(&self) -> Option<i64> {
        match self {
            Notification::PerformerCreated { performer } => Some(performer.id),
            Notification::PerformerImageUpdated { performer_id, .. } => Some(*performer_id),
            Notification::ConcertCreated { .. } => None,
        }
    }
}
