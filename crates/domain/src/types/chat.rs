//! Chat resources covered by the permission cache.

use serde::{Deserialize, Serialize};

/// Discussion group owned by the chat subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatGroup {
    pub id: String,
    pub title: String,
}

/// Thread belonging to a chat group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatThread {
    pub id: String,
    pub group_id: String,
    pub title: String,
}

impl ChatGroup {
    /// Cache resource key for this group.
    pub fn resource(&self) -> String {
        format!("chat-group:{}", self.id)
    }
}

impl ChatThread {
    /// Cache resource key for this thread.
    pub fn resource(&self) -> String {
        format!("chat-thread:{}", self.id)
    }
}
