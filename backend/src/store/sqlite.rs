use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use warden_common::{Role, UserRecord};

use super::{StoreError, UserChanges, UserFilter, UserOrder, UserStore};

const USER_COLUMNS: &str =
    "id, email, full_name, avatar_url, role, is_active, created_at, last_seen, updated_at";

/// SQLite-backed user store.
///
/// Rows are inserted by the sign-up trigger that owns the `users` table; this
/// store never inserts or deletes.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Create parent directories if needed
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
            }
            Connection::open(path)?
        };

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT,
                avatar_url TEXT,
                role TEXT NOT NULL DEFAULT 'user'
                    CHECK (role IN ('user', 'admin', 'super_admin')),
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now') || '000Z'),
                last_seen TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now') || '000Z'),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now') || '000Z')
            );
            CREATE INDEX IF NOT EXISTS idx_users_last_seen ON users(last_seen);
            CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);",
        )?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))
    }

    fn select_by_id(conn: &Connection, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let raw = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                RawUser::from_row,
            )
            .optional()?;

        raw.map(RawUser::into_record).transpose()
    }
}

/// Timestamps are written with fixed precision so text order is time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: &str, column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord {
            id: id.to_string(),
            reason: format!("{column}: {e}"),
        })
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build a `WHERE` clause and its positional parameters.
fn where_clause(filter: &UserFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(active) = filter.active {
        conditions.push("is_active = ?".to_string());
        values.push(Value::Integer(i64::from(active)));
    }

    if let Some(roles) = &filter.roles {
        if roles.is_empty() {
            conditions.push("0".to_string());
        } else {
            let placeholders = vec!["?"; roles.len()].join(", ");
            conditions.push(format!("role IN ({placeholders})"));
            values.extend(roles.iter().map(|r| Value::Text(r.as_str().to_string())));
        }
    }

    if let Some(text) = &filter.text {
        let pattern = format!("%{}%", escape_like(text));
        conditions.push(
            "(LOWER(email) LIKE ? ESCAPE '\\' OR LOWER(COALESCE(full_name, '')) LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }

    if let Some(since) = filter.created_since {
        conditions.push("created_at >= ?".to_string());
        values.push(Value::Text(format_timestamp(since)));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

struct RawUser {
    id: String,
    email: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    role: String,
    is_active: bool,
    created_at: String,
    last_seen: String,
    updated_at: String,
}

impl RawUser {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            avatar_url: row.get(3)?,
            role: row.get(4)?,
            is_active: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
            last_seen: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<UserRecord, StoreError> {
        let role: Role = self.role.parse().map_err(|e| StoreError::CorruptRecord {
            id: self.id.clone(),
            reason: format!("role: {e}"),
        })?;

        Ok(UserRecord {
            created_at: parse_timestamp(&self.id, "created_at", &self.created_at)?,
            last_seen: parse_timestamp(&self.id, "last_seen", &self.last_seen)?,
            updated_at: parse_timestamp(&self.id, "updated_at", &self.updated_at)?,
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
            role,
            is_active: self.is_active,
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.lock()?;
        Self::select_by_id(&conn, id)
    }

    async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE users SET
                full_name = COALESCE(?1, full_name),
                avatar_url = COALESCE(?2, avatar_url),
                role = COALESCE(?3, role),
                is_active = COALESCE(?4, is_active),
                last_seen = COALESCE(?5, last_seen),
                updated_at = COALESCE(?6, updated_at)
             WHERE id = ?7",
            params![
                changes.full_name,
                changes.avatar_url,
                changes.role.map(|r| r.as_str()),
                changes.is_active,
                changes.last_seen.map(format_timestamp),
                changes.updated_at.map(format_timestamp),
                id,
            ],
        )?;

        if updated == 0 {
            return Ok(None);
        }

        tracing::debug!("Updated user: {}", id);
        Self::select_by_id(&conn, id)
    }

    async fn list(
        &self,
        filter: UserFilter,
        order: UserOrder,
        skip: u64,
        take: Option<u64>,
    ) -> Result<Vec<UserRecord>, StoreError> {
        let conn = self.lock()?;

        let (clause, mut values) = where_clause(&filter);
        let order_by = match order {
            UserOrder::LastSeenDesc => "last_seen DESC, id ASC",
            UserOrder::CreatedAtDesc => "created_at DESC, id ASC",
        };
        let limit = take.map(|t| t as i64).unwrap_or(-1);
        values.push(Value::Integer(limit));
        values.push(Value::Integer(skip as i64));

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users{clause} ORDER BY {order_by} LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), RawUser::from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.into_record()?);
        }
        Ok(users)
    }

    async fn count(&self, filter: UserFilter) -> Result<u64, StoreError> {
        let conn = self.lock()?;

        let (clause, values) = where_clause(&filter);
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM users{clause}"),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
