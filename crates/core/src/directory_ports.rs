//! Port interfaces for the identity/authorization service and the
//! permission cache
//!
//! Consumed by the permission rebuilder and the contact-sync task. The
//! service's internals are out of scope; these traits are its boundary.

use async_trait::async_trait;
use coopsync_domain::{ChatGroup, ChatThread, Result, UserProfile};

/// User listing and lookup on the identity provider.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserProfile>>;

    async fn find_user(&self, id: &str) -> Result<Option<UserProfile>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>>;

    /// First user whose attribute `key` equals `value`.
    async fn find_user_by_attribute(&self, key: &str, value: &str)
        -> Result<Option<UserProfile>>;

    /// Persist profile fields and attributes back to the provider.
    async fn update_user(&self, user: &UserProfile) -> Result<()>;
}

/// Group membership and chat resource listing.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Ids of the identity-provider groups a user belongs to.
    async fn list_user_groups(&self, user_id: &str) -> Result<Vec<String>>;

    async fn list_chat_groups(&self) -> Result<Vec<ChatGroup>>;

    async fn list_threads(&self, chat_group_id: &str) -> Result<Vec<ChatThread>>;

    /// Scopes a single user group grants on a chat resource.
    async fn granted_scopes(&self, resource: &str, user_group_id: &str) -> Result<Vec<String>>;
}

/// Write side of the per-user, per-resource authorization cache.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    async fn set(&self, user_id: &str, resource: &str, scope: &str, allowed: bool) -> Result<()>;
}
