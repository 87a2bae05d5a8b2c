//! Domain constants shared by the queue, session, and reconciliation layers.

/// Maximum number of records the ERP returns per collection page.
pub const ERP_PAGE_SIZE: usize = 100;

/// Lifetime assigned to a freshly created ERP session.
pub const SESSION_TTL_SECS: i64 = 30 * 60;

/// Safety margin before expiry after which a session is no longer reused.
pub const SESSION_EXPIRY_MARGIN_SECS: i64 = 10 * 60;

/// Named queues owned by the reconciliation engine. One table row per job;
/// the queue column keeps dispatchers isolated from each other.
pub const QUEUE_CONTACT_SYNC: &str = "contact-sync";
pub const QUEUE_ITEM_GROUP_SYNC: &str = "item-group-sync";
pub const QUEUE_DELIVERY_PLACE_SYNC: &str = "delivery-place-sync";
pub const QUEUE_CONTRACT_SYNC: &str = "contract-sync";
pub const QUEUE_CONTRACT_PUSH: &str = "contract-push";
pub const QUEUE_CUMULATIVE_SYNC: &str = "cumulative-sync";

/// Scopes evaluated per chat group when rebuilding the permission cache.
pub const CHAT_GROUP_SCOPES: &[&str] = &["chat-group:access", "chat-group:manage"];

/// Scopes evaluated per chat thread when rebuilding the permission cache.
pub const CHAT_THREAD_SCOPES: &[&str] = &["chat-thread:access"];

/// Scope that makes a chat group's threads visible to a user.
pub const CHAT_GROUP_TRAVERSE_SCOPE: &str = "chat-group:access";
