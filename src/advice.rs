//! Daily financial advice.
//!
//! One advice text per calendar day, produced by an external text generator and kept in a
//! single durable slot so restarts do not trigger another generation. An in-process moka
//! cache keyed by date sits in front of the slot; concurrent first requests of a day share a
//! single generator call.

use crate::errors::AppError;
use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Prompt sent to the generator once per day.
pub const ADVICE_PROMPT: &str =
    "Dame un consejo financiero breve y práctico para campesinos en Colombia.";

/// Contents of the advice slot: `{"fecha": "YYYY-MM-DD", "consejo": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceEntry {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "consejo")]
    pub text: String,
}

/// Durable single-slot storage for the current advice.
#[async_trait]
pub trait AdviceStore: Send + Sync {
    /// The stored entry, or `None` when the slot is missing, empty or unreadable.
    async fn read(&self) -> Option<AdviceEntry>;

    /// Replaces the slot.
    async fn write(&self, entry: &AdviceEntry) -> Result<(), AppError>;
}

/// Source of fresh advice text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

/// Advice slot backed by a pretty-printed JSON file.
pub struct FileAdviceStore {
    path: PathBuf,
}

impl FileAdviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl AdviceStore for FileAdviceStore {
    async fn read(&self) -> Option<AdviceEntry> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Advice slot {} not readable: {}", self.path.display(), e);
                return None;
            }
        };

        let content = content.trim();
        if content.is_empty() {
            tracing::debug!("Advice slot {} is empty", self.path.display());
            return None;
        }

        match serde_json::from_str::<AdviceEntry>(content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(
                    "Advice slot {} is corrupt, it will be overwritten: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    async fn write(&self, entry: &AdviceEntry) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(entry)
            .map_err(|e| AppError::InternalError(format!("Failed to encode advice: {}", e)))?;

        tokio::fs::write(&self.path, json).await.map_err(|e| {
            AppError::InternalError(format!(
                "Failed to write advice slot {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Advice slot held in memory; used by tests and by embedders that need no persistence.
#[derive(Default)]
pub struct MemoryAdviceStore {
    slot: RwLock<Option<AdviceEntry>>,
}

impl MemoryAdviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(entry: AdviceEntry) -> Self {
        Self {
            slot: RwLock::new(Some(entry)),
        }
    }

    /// Current slot contents.
    pub async fn snapshot(&self) -> Option<AdviceEntry> {
        self.slot.read().await.clone()
    }
}

#[async_trait]
impl AdviceStore for MemoryAdviceStore {
    async fn read(&self) -> Option<AdviceEntry> {
        self.slot.read().await.clone()
    }

    async fn write(&self, entry: &AdviceEntry) -> Result<(), AppError> {
        *self.slot.write().await = Some(entry.clone());
        Ok(())
    }
}

/// Daily advice with a durable slot and a generator fallback.
pub struct AdviceService {
    store: Arc<dyn AdviceStore>,
    generator: Arc<dyn TextGenerator>,
    by_day: Cache<NaiveDate, String>,
}

impl AdviceService {
    pub fn new(store: Arc<dyn AdviceStore>, generator: Arc<dyn TextGenerator>) -> Self {
        let by_day = Cache::builder()
            .max_capacity(4)
            .time_to_live(Duration::from_secs(86_400))
            .build();

        Self {
            store,
            generator,
            by_day,
        }
    }

    /// Returns the advice for `today`, generating and persisting it on a miss.
    ///
    /// A missing, corrupt or stale slot is a miss. Generator failures are returned to the
    /// caller and nothing is cached, so the next call tries again.
    ///
    /// The in-process cache is keyed by date and does not re-read the slot on a hit. Asking
    /// again for an earlier date after the slot has moved on returns the text cached for that
    /// date, while the slot keeps the newer day. Callers pass the wall-clock date, which only
    /// moves forward.
    pub async fn get_advice(&self, today: NaiveDate) -> Result<String, AppError> {
        self.by_day
            .try_get_with(today, self.load_or_generate(today))
            .await
            .map_err(|shared| match Arc::try_unwrap(shared) {
                Ok(err) => err,
                Err(shared) => AppError::ExternalApiError(shared.to_string()),
            })
    }

    async fn load_or_generate(&self, today: NaiveDate) -> Result<String, AppError> {
        if let Some(entry) = self.store.read().await {
            if entry.date == today {
                tracing::debug!("Advice slot hit for {}", today);
                return Ok(entry.text);
            }
            tracing::debug!("Advice slot holds {}, refreshing for {}", entry.date, today);
        }

        tracing::info!("Generating advice for {}", today);
        let text = self.generator.generate(ADVICE_PROMPT).await?.trim().to_string();

        let entry = AdviceEntry {
            date: today,
            text: text.clone(),
        };
        if let Err(e) = self.store.write(&entry).await {
            tracing::warn!("Advice generated but not persisted: {}", e);
        }

        Ok(text)
    }
}
