//! Permission cache rebuilder.
//!
//! Periodically recomputes, for every user and every chat group, the union
//! of scopes granted via the user's group memberships and writes a boolean
//! per (resource, scope, user) into the cache collaborator; then, for the
//! groups the user can traverse, does the same for every thread of those
//! groups. One pass runs at a time and the next one starts a configured
//! delay after the previous one finished, so a slow pass naturally
//! throttles the cadence. Cancellation is honored between users within a
//! pass.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use coopsync_core::directory_ports::{GroupDirectory, PermissionCache, UserDirectory};
use coopsync_domain::constants::{
    CHAT_GROUP_SCOPES, CHAT_GROUP_TRAVERSE_SCOPE, CHAT_THREAD_SCOPES,
};
use coopsync_domain::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the permission cache rebuilder.
#[derive(Debug, Clone)]
pub struct PermissionRebuilderConfig {
    /// Pause between the end of one pass and the start of the next.
    pub rebuild_delay: Duration,
    /// Timeout for a single full pass.
    pub pass_timeout: Duration,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

impl Default for PermissionRebuilderConfig {
    fn default() -> Self {
        Self {
            rebuild_delay: Duration::from_secs(60),
            pass_timeout: Duration::from_secs(600),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters describing one rebuild pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub users: usize,
    pub resources: usize,
    pub writes: usize,
}

/// Permission cache rebuilder with explicit lifecycle management.
pub struct PermissionCacheRebuilder {
    users: Arc<dyn UserDirectory>,
    groups: Arc<dyn GroupDirectory>,
    cache: Arc<dyn PermissionCache>,
    config: PermissionRebuilderConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl PermissionCacheRebuilder {
    /// Create a rebuilder over the directory and cache ports.
    pub fn new(
        users: Arc<dyn UserDirectory>,
        groups: Arc<dyn GroupDirectory>,
        cache: Arc<dyn PermissionCache>,
        config: PermissionRebuilderConfig,
    ) -> Self {
        Self {
            users,
            groups,
            cache,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the rebuilder, spawning the background loop.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(coopsync_domain::CoopsyncError::InvalidInput(
                "permission rebuilder already running".into(),
            ));
        }

        info!("starting permission cache rebuilder");
        self.cancellation = CancellationToken::new();

        let users = Arc::clone(&self.users);
        let groups = Arc::clone(&self.groups);
        let cache = Arc::clone(&self.cache);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::rebuild_loop(users, groups, cache, config, cancel).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the rebuilder and wait for the loop to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(coopsync_domain::CoopsyncError::InvalidInput(
                "permission rebuilder not running".into(),
            ));
        }

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("rebuilder task panicked: {e}"),
                Err(_) => warn!("rebuilder did not stop within timeout"),
            }
        }

        self.cancellation = CancellationToken::new();
        info!("permission cache rebuilder stopped");
        Ok(())
    }

    /// Returns true when the background loop is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn rebuild_loop(
        users: Arc<dyn UserDirectory>,
        groups: Arc<dyn GroupDirectory>,
        cache: Arc<dyn PermissionCache>,
        config: PermissionRebuilderConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("permission rebuild loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(config.rebuild_delay) => {
                    let started = Instant::now();
                    match tokio::time::timeout(
                        config.pass_timeout,
                        Self::rebuild_pass(&users, &groups, &cache, &cancel),
                    )
                    .await
                    {
                        Ok(Ok(stats)) => {
                            info!(
                                users = stats.users,
                                resources = stats.resources,
                                writes = stats.writes,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "permission cache pass completed"
                            );
                        }
                        Ok(Err(e)) => {
                            error!(error = %e, "permission cache pass failed");
                        }
                        Err(_) => {
                            warn!(
                                timeout_secs = config.pass_timeout.as_secs(),
                                "permission cache pass timed out"
                            );
                        }
                    }
                }
            }
        }
    }

    /// One full recomputation over every user and chat resource.
    pub(crate) async fn rebuild_pass(
        users: &Arc<dyn UserDirectory>,
        groups: &Arc<dyn GroupDirectory>,
        cache: &Arc<dyn PermissionCache>,
        cancel: &CancellationToken,
    ) -> Result<RebuildStats> {
        let all_users = users.list_users().await?;
        let chat_groups = groups.list_chat_groups().await?;
        let mut stats = RebuildStats { users: all_users.len(), ..Default::default() };

        for user in &all_users {
            if cancel.is_cancelled() {
                debug!(done_users = stats.users, "rebuild pass interrupted by cancellation");
                return Ok(stats);
            }

            let user_group_ids = groups.list_user_groups(&user.id).await?;
            let mut traversable = Vec::new();

            for chat_group in &chat_groups {
                let resource = chat_group.resource();
                let granted =
                    Self::union_scopes(groups, &resource, &user_group_ids).await?;

                for scope in CHAT_GROUP_SCOPES {
                    cache.set(&user.id, &resource, scope, granted.contains(*scope)).await?;
                    stats.writes += 1;
                }
                stats.resources += 1;

                if granted.contains(CHAT_GROUP_TRAVERSE_SCOPE) {
                    traversable.push(chat_group);
                }
            }

            for chat_group in traversable {
                for thread in groups.list_threads(&chat_group.id).await? {
                    let resource = thread.resource();
                    let granted =
                        Self::union_scopes(groups, &resource, &user_group_ids).await?;

                    for scope in CHAT_THREAD_SCOPES {
                        cache.set(&user.id, &resource, scope, granted.contains(*scope)).await?;
                        stats.writes += 1;
                    }
                    stats.resources += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Union of the scopes every one of the user's groups grants on a
    /// resource.
    async fn union_scopes(
        groups: &Arc<dyn GroupDirectory>,
        resource: &str,
        user_group_ids: &[String],
    ) -> Result<BTreeSet<String>> {
        let mut granted = BTreeSet::new();
        for group_id in user_group_ids {
            granted.extend(groups.granted_scopes(resource, group_id).await?);
        }
        Ok(granted)
    }
}

impl Drop for PermissionCacheRebuilder {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("PermissionCacheRebuilder dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
