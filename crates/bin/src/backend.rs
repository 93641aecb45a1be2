//! Backend creation and persistence helpers.

use std::path::PathBuf;
use std::sync::Arc;

use fieldbook::backend::{
    BackendImpl,
    database::{InMemory, Sqlite},
};
use fieldbook::queue::Queue;

use crate::cli::{Backend, BackendConfig};

const SQLITE_FILE: &str = "fieldbook.db";
const JSON_FILE: &str = "fieldbook.json";

fn data_dir(config: &BackendConfig) -> PathBuf {
    config.data_dir.clone().unwrap_or_else(|| PathBuf::from("."))
}

/// Create the appropriate backend based on configuration
pub async fn create_backend(config: &BackendConfig) -> fieldbook::Result<Arc<dyn BackendImpl>> {
    let data_dir = data_dir(config);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    match config.backend {
        Backend::Sqlite => {
            let db_path = data_dir.join(SQLITE_FILE);
            tracing::info!("Using SQLite backend at {}", db_path.display());
            Ok(Arc::new(Sqlite::open(&db_path).await?))
        }
        Backend::Inmemory => {
            let json_path = data_dir.join(JSON_FILE);
            tracing::info!(
                "Using in-memory backend with persistence at {}",
                json_path.display()
            );
            Ok(Arc::new(InMemory::load_from_file(&json_path).await?))
        }
    }
}

/// A queue that opens the configured backend on first use.
pub fn open_queue(config: &BackendConfig) -> Queue {
    let config = config.clone();
    Queue::new(move || {
        let config = config.clone();
        async move { create_backend(&config).await }
    })
}

/// Write the in-memory backend back to its JSON file. SQLite needs nothing.
pub async fn persist(queue: &Queue, config: &BackendConfig) -> fieldbook::Result<()> {
    let backend = queue.backend().await?;
    if let Some(in_memory) = backend.as_any().downcast_ref::<InMemory>() {
        let json_path = data_dir(config).join(JSON_FILE);
        in_memory.save_to_file(&json_path).await?;
        tracing::info!("Saved in-memory data to {}", json_path.display());
    }
    Ok(())
}
