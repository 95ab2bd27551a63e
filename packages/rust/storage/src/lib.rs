//! Message document store.
//!
//! [`DocumentStore`] is the persistence capability the ingest pipeline writes
//! to once per stage. [`Storage`] implements it on an embedded libSQL file;
//! [`MemoryStore`] keeps everything in process for tests and dry runs.
//!
//! **Access rules:**
//! - The CLI ingest path is the sole writer, via [`Storage::open`]
//! - Listing and inspection may use [`Storage::open_readonly`]

mod memory;
mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use civicmap_shared::{
    CivicMapError, Message, MessageId, MessageUpdate, NewMessage, PipelineStage, Result,
};
use libsql::{Connection, Database, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use memory::MemoryStore;

/// Persistence for messages, written incrementally by the pipeline.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new message at the `Stored` stage and return its id.
    async fn create(&self, message: NewMessage) -> Result<MessageId>;

    /// Write the `Some` fields of `update`, leaving all other fields intact.
    async fn update(&self, id: &MessageId, update: MessageUpdate) -> Result<()>;

    /// Fetch one message.
    async fn get(&self, id: &MessageId) -> Result<Option<Message>>;

    /// All messages, newest first.
    async fn list(&self) -> Result<Vec<Message>>;
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

const SELECT_MESSAGE: &str = "SELECT id, text, source, stage, extracted_data, addresses, geo_json, created_at, updated_at FROM messages";

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CivicMapError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CivicMapError::persistence(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CivicMapError::persistence(
                "database is opened in read-only mode",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn create(&self, message: NewMessage) -> Result<MessageId> {
        self.check_writable()?;
        let id = MessageId::new();
        let now = timestamp_now();
        self.conn
            .execute(
                "INSERT INTO messages (id, text, source, stage, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    message.text,
                    message.source,
                    PipelineStage::Stored.as_str(),
                    now.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        tracing::debug!(%id, "message stored");
        Ok(id)
    }

    async fn update(&self, id: &MessageId, update: MessageUpdate) -> Result<()> {
        self.check_writable()?;
        let stage = update.stage.map(|s| s.as_str().to_string());
        let extracted_data = update.extracted_data.as_ref().map(to_json).transpose()?;
        let addresses = update.addresses.as_ref().map(to_json).transpose()?;
        let geo_json = update.geo_json.as_ref().map(to_json).transpose()?;
        let now = timestamp_now();

        let affected = self
            .conn
            .execute(
                "UPDATE messages SET
                   stage = COALESCE(?1, stage),
                   extracted_data = COALESCE(?2, extracted_data),
                   addresses = COALESCE(?3, addresses),
                   geo_json = COALESCE(?4, geo_json),
                   updated_at = ?5
                 WHERE id = ?6",
                params![
                    stage,
                    extracted_data,
                    addresses,
                    geo_json,
                    now.as_str(),
                    id.to_string()
                ],
            )
            .await
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        if affected == 0 {
            return Err(CivicMapError::persistence(format!("message {id} not found")));
        }
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<Option<Message>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_MESSAGE} WHERE id = ?1"), params![id.to_string()])
            .await
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_message(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(CivicMapError::persistence(e.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Message>> {
        let mut rows = self
            .conn
            .query(
                &format!("{SELECT_MESSAGE} ORDER BY created_at DESC, id DESC"),
                params![],
            )
            .await
            .map_err(|e| CivicMapError::persistence(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| CivicMapError::persistence(e.to_string()))?
        {
            results.push(row_to_message(&row)?);
        }
        Ok(results)
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CivicMapError::persistence(e.to_string()))
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| CivicMapError::parse(format!("invalid {column} JSON: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CivicMapError::parse(format!("invalid date: {e}")))
}

/// Convert a database row to a [`Message`].
///
/// Stored values that cannot be decoded are `Parse` errors.
fn row_to_message(row: &libsql::Row) -> Result<Message> {
    let get = |idx: i32| {
        row.get::<String>(idx)
            .map_err(|e| CivicMapError::parse(format!("column {idx}: {e}")))
    };
    let get_opt = |idx: i32| {
        row.get::<Option<String>>(idx)
            .map_err(|e| CivicMapError::parse(format!("column {idx}: {e}")))
    };

    let id = get(0)?;
    let stage = get(3)?;

    Ok(Message {
        id: id
            .parse()
            .map_err(|e| CivicMapError::parse(format!("invalid message id {id}: {e}")))?,
        text: get(1)?,
        source: get(2)?,
        stage: stage.parse().map_err(CivicMapError::parse)?,
        extracted_data: get_opt(4)?
            .map(|raw| from_json("extracted_data", &raw))
            .transpose()?,
        addresses: get_opt(5)?
            .map(|raw| from_json("addresses", &raw))
            .transpose()?
            .unwrap_or_default(),
        geo_json: get_opt(6)?
            .map(|raw| from_json("geo_json", &raw))
            .transpose()?,
        created_at: parse_timestamp(&get(7)?)?,
        updated_at: parse_timestamp(&get(8)?)?,
    })
}
