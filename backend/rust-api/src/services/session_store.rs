//! Key-value backends for persisted assessment sessions.
//!
//! Every backend stores `(revision, payload)` and refuses a write whose
//! revision is not newer than the stored one, so an out-of-order save can
//! never replace fresher state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::metrics::track_store_operation;

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Stored,
    /// A newer (or equal) revision was already stored; nothing was written.
    Stale,
}

/// Raw record as kept by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub revision: u64,
    pub payload: String,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    /// Live record under `key`; expired records read as absent.
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>>;

    async fn put_if_newer(&self, key: &str, revision: u64, payload: String)
        -> Result<SaveOutcome>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Removes expired records, returning how many were dropped.
    /// Backends with native expiry have nothing to do.
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    revision: u64,
    payload: String,
    // absent in envelopes written before expiry was tracked
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn new(revision: u64, payload: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            revision,
            payload,
            expires_at: Some(now + ttl),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    fn into_record(self) -> StoredRecord {
        StoredRecord {
            revision: self.revision,
            payload: self.payload,
        }
    }
}

const MAX_SESSION_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

fn ttl_from_seconds(seconds: u64) -> Duration {
    Duration::seconds(seconds.min(MAX_SESSION_TTL_SECONDS) as i64)
}

pub struct MemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL_SECONDS)
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl_seconds: u64) -> Self {
        Self {
            ttl: ttl_from_seconds(ttl_seconds),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Writes `payload` as-is, bypassing revision checks.
    pub async fn insert_raw(&self, key: &str, revision: u64, payload: &str) {
        self.entries.lock().await.insert(
            key.to_string(),
            StoredEntry::new(revision, payload.to_string(), self.ttl, Utc::now()),
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        let now = Utc::now();
        Ok(self
            .entries
            .lock()
            .await
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
            .map(StoredEntry::into_record))
    }

    async fn put_if_newer(
        &self,
        key: &str,
        revision: u64,
        payload: String,
    ) -> Result<SaveOutcome> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;

        // keeps the map bounded by live sessions
        entries.retain(|_, entry| !entry.is_expired(now));

        if let Some(existing) = entries.get(key) {
            if existing.revision >= revision {
                return Ok(SaveOutcome::Stale);
            }
        }
        entries.insert(
            key.to_string(),
            StoredEntry::new(revision, payload, self.ttl, now),
        );
        Ok(SaveOutcome::Stored)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }
}

/// One JSON envelope per session inside `dir`.
pub struct FileSessionStore {
    dir: PathBuf,
    ttl: Duration,
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_ttl(dir, DEFAULT_SESSION_TTL_SECONDS)
    }

    pub fn with_ttl(dir: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl: ttl_from_seconds(ttl_seconds),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }

    async fn read_entry(path: &Path) -> Result<Option<StoredEntry>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        match serde_json::from_str::<StoredEntry>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!("Ignoring malformed session file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn read_live_entry(path: &Path, now: DateTime<Utc>) -> Result<Option<StoredEntry>> {
        Ok(Self::read_entry(path)
            .await?
            .filter(|entry| !entry.is_expired(now)))
    }

    async fn remove_file(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn ping(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Session directory {} is not usable", self.dir.display()))
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        let path = self.path_for(key);
        track_store_operation("get", async {
            Ok(Self::read_live_entry(&path, Utc::now())
                .await?
                .map(StoredEntry::into_record))
        })
        .await
    }

    async fn put_if_newer(
        &self,
        key: &str,
        revision: u64,
        payload: String,
    ) -> Result<SaveOutcome> {
        let path = self.path_for(key);
        let _guard = self.write_lock.lock().await;

        track_store_operation("put", async {
            let now = Utc::now();
            if let Some(existing) = Self::read_live_entry(&path, now).await? {
                if existing.revision >= revision {
                    return Ok(SaveOutcome::Stale);
                }
            }

            tokio::fs::create_dir_all(&self.dir)
                .await
                .context("Failed to create session directory")?;
            let body = serde_json::to_string(&StoredEntry::new(revision, payload, self.ttl, now))?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, body)
                .await
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            tokio::fs::rename(&tmp, &path)
                .await
                .with_context(|| format!("Failed to move session file to {}", path.display()))?;
            Ok(SaveOutcome::Stored)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        let _guard = self.write_lock.lock().await;
        Self::remove_file(&path).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();

        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to list {}", self.dir.display()))
            }
        };

        let mut removed = 0;
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(entry) = Self::read_entry(&path).await? {
                if entry.is_expired(now) {
                    Self::remove_file(&path).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

// Compare-and-set on the stored revision, atomic inside Redis.
const PUT_IF_NEWER_SCRIPT: &str = r#"
    local current = redis.call('HGET', KEYS[1], 'rev')
    if current and tonumber(current) >= tonumber(ARGV[1]) then
        return 0
    end
    redis.call('HSET', KEYS[1], 'rev', ARGV[1], 'data', ARGV[2])
    redis.call('EXPIRE', KEYS[1], ARGV[3])
    return 1
"#;

pub struct RedisSessionStore {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    /// Connects and verifies the server answers PING.
    pub async fn connect(uri: &str, ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(uri).context("Failed to create Redis client")?;

        tracing::info!("Attempting to connect to Redis...");
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");
        Ok(Self::new(redis, ttl_seconds))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_millis(500),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis timeout after 500ms"))??;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        let mut conn = self.redis.clone();
        let (revision, payload) = track_store_operation("get", async {
            redis::cmd("HMGET")
                .arg(key)
                .arg("rev")
                .arg("data")
                .query_async::<(Option<u64>, Option<String>)>(&mut conn)
                .await
                .context("Failed to read session from Redis")
        })
        .await?;

        Ok(payload.map(|payload| StoredRecord {
            revision: revision.unwrap_or_default(),
            payload,
        }))
    }

    async fn put_if_newer(
        &self,
        key: &str,
        revision: u64,
        payload: String,
    ) -> Result<SaveOutcome> {
        let mut conn = self.redis.clone();
        let stored: i64 = track_store_operation("put", async {
            redis::Script::new(PUT_IF_NEWER_SCRIPT)
                .key(key)
                .arg(revision)
                .arg(&payload)
                .arg(self.ttl_seconds)
                .invoke_async(&mut conn)
                .await
                .context("Failed to save session to Redis")
        })
        .await?;

        Ok(if stored == 1 {
            SaveOutcome::Stored
        } else {
            SaveOutcome::Stale
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        track_store_operation("del", async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to delete session from Redis")
        })
        .await
    }
}
