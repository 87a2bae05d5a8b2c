//! Shared fixtures for infra integration tests.

use std::sync::Arc;

use coopsync_infra::database::DbManager;
use once_cell::sync::OnceCell;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static TRACING: OnceCell<()> = OnceCell::new();

/// Install a fmt subscriber once per test binary; `RUST_LOG` controls
/// verbosity.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    });
}

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with migrations applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Mount `/Login` and `/Logout` so session brackets succeed against the
/// mock ERP.
#[allow(dead_code)]
pub async fn mount_session_endpoints(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/Login"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "B1SESSION=test-session; Path=/; HttpOnly")
                .append_header("Set-Cookie", "ROUTEID=.node1; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/Logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}
