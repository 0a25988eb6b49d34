//! Shared utilities for integration tests.

use std::path::Path;

use red_engine::config::EngineConfig;
use red_engine::{Engine, RedirectWriter};
use tempfile::TempDir;

/// Loopback config on an ephemeral port, with the store under `home`.
pub fn config_for(home: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.listener.bind_host = "127.0.0.1".into();
    config.listener.port = 0;
    config.store.home_dir = home.to_path_buf();
    config.store.readers = 2;
    config.timeouts.shutdown_secs = 5;
    config
}

/// Write entries the way the administrative tool would.
pub fn seed(home: &Path, entries: &[(&str, &str)]) {
    let writer = RedirectWriter::open(home).unwrap();
    for (path, target) in entries {
        writer.put(path, target).unwrap();
    }
}

/// Start an engine over a fresh home directory holding `entries`.
pub async fn start_engine(entries: &[(&str, &str)]) -> (Engine, TempDir) {
    let home = tempfile::tempdir().unwrap();
    seed(home.path(), entries);
    let engine = Engine::init(&config_for(home.path())).await.unwrap();
    (engine, home)
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(engine: &Engine, path: &str) -> String {
    format!("http://{}{}", engine.local_addr(), path)
}

/// A port that was free a moment ago.
#[allow(dead_code)]
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
