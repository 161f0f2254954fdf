use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension};
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;
use tracing::*;

pub const MEMORY_SPECIAL: &str = ":memory:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UserId(i64);

impl UserId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedUser {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutRecord {
    pub user_id: UserId,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Username '{0}' is already registered")]
    AlreadyRegistered(String),
}

pub trait Storage {
    fn create_user(&self, user: &NewUser) -> Result<UserId>;

    fn find_user_by_username(&self, username: &str) -> Result<Option<PersistedUser>>;

    fn find_user_by_id(&self, id: &UserId) -> Result<Option<PersistedUser>>;

    fn save_logout(&self, user_id: &UserId, time: DateTime<Utc>) -> Result<()>;

    fn logout_history(&self, user_id: &UserId) -> Result<Vec<LogoutRecord>>;
}

pub trait StorageFactory: Send + Sync {
    fn migrate(&self) -> Result<()>;

    fn create_storage(&self) -> Result<Box<dyn Storage>>;
}

pub struct SqliteStorage<C>
where
    C: AsConnection,
{
    conn: C,
}

enum SetupQuery {
    Execute(&'static str),
    Query(&'static str),
}

pub trait AsConnection {
    fn connection(&self) -> &Connection;
}

pub trait Migrate {
    fn migrate(&self) -> Result<()>;
}

impl Migrate for Connection {
    fn migrate(&self) -> Result<()> {
        let exec = |query: SetupQuery| -> Result<()> {
            match query {
                SetupQuery::Execute(sql) => {
                    let mut stmt = self.prepare(sql)?;
                    stmt.execute([])?;
                }
                SetupQuery::Query(sql) => {
                    let mut stmt = self.prepare(sql)?;
                    let _ = stmt.query([])?;
                }
            };
            Ok(())
        };

        exec(SetupQuery::Query("PRAGMA journal_mode = WAL"))?;

        exec(SetupQuery::Execute(
            r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    password TEXT NOT NULL
                )"#,
        ))?;

        exec(SetupQuery::Execute(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS users_username ON users (username)"#,
        ))?;

        exec(SetupQuery::Execute(
            r#"
                CREATE TABLE IF NOT EXISTS logout_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    logout_time TIMESTAMP NOT NULL
                )"#,
        ))?;

        exec(SetupQuery::Execute(
            r#"CREATE INDEX IF NOT EXISTS logout_history_user ON logout_history (user_id)"#,
        ))?;

        Ok(())
    }
}

struct Owned {
    conn: Connection,
}

impl Owned {
    fn new(uri: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            uri,
            OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        Ok(Self { conn })
    }
}

impl AsConnection for Owned {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

struct Pooled {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl AsConnection for Pooled {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

const USER_COLUMNS: &str = "id, username, first_name, last_name, password";

impl<C> SqliteStorage<C>
where
    C: AsConnection,
{
    pub fn wrap(conn: C) -> Self {
        Self { conn }
    }

    fn connection(&self) -> &Connection {
        self.conn.connection()
    }

    fn single_user<T: rusqlite::Params>(
        &self,
        query: &str,
        params: T,
    ) -> Result<Option<PersistedUser>> {
        trace!("querying");

        let mut stmt = self.connection().prepare(query)?;

        let user = stmt
            .query_row(params, |row| {
                Ok(PersistedUser {
                    id: UserId(row.get(0)?),
                    username: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    password_hash: row.get(4)?,
                })
            })
            .optional()?;

        Ok(user)
    }
}

impl<C> Storage for SqliteStorage<C>
where
    C: AsConnection,
{
    fn create_user(&self, user: &NewUser) -> Result<UserId> {
        let mut stmt = self.connection().prepare(
            "INSERT INTO users (username, first_name, last_name, password) VALUES (?1, ?2, ?3, ?4)",
        )?;

        let affected = stmt
            .execute((
                &user.username,
                &user.first_name,
                &user.last_name,
                &user.password_hash,
            ))
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(failure, _)
                    if failure.code == ErrorCode::ConstraintViolation =>
                {
                    warn!(username = %user.username, "already registered");
                    anyhow::Error::from(StorageError::AlreadyRegistered(user.username.clone()))
                }
                e => anyhow::Error::from(e).context("inserting user"),
            })?;

        if affected != 1 {
            return Err(anyhow!("no rows affected by insert"));
        }

        let id = UserId(self.connection().last_insert_rowid());

        info!(%id, username = %user.username, "user:created");

        Ok(id)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<PersistedUser>> {
        self.single_user(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            [username],
        )
    }

    fn find_user_by_id(&self, id: &UserId) -> Result<Option<PersistedUser>> {
        self.single_user(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id.0],
        )
    }

    fn save_logout(&self, user_id: &UserId, time: DateTime<Utc>) -> Result<()> {
        let mut stmt = self
            .connection()
            .prepare("INSERT INTO logout_history (user_id, logout_time) VALUES (?1, ?2)")?;

        stmt.execute((user_id.0, &time))
            .with_context(|| "inserting logout history")?;

        debug!(%user_id, %time, "logout:saved");

        Ok(())
    }

    fn logout_history(&self, user_id: &UserId) -> Result<Vec<LogoutRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT user_id, logout_time FROM logout_history WHERE user_id = ?1 ORDER BY logout_time",
        )?;

        let records = stmt.query_map([user_id.0], |row| {
            Ok(LogoutRecord {
                user_id: UserId(row.get(0)?),
                time: row.get(1)?,
            })
        })?;

        records.into_iter().map(|v| Ok(v?)).collect::<Result<_>>()
    }
}

struct InMemoryKeepAlive {
    _connection: Mutex<Connection>,
    url: String,
}

impl InMemoryKeepAlive {
    fn new(id: &str) -> Result<Self> {
        let url = format!("file:doorway-{}?mode=memory&cache=shared", id);
        Ok(Self {
            _connection: Mutex::new(Connection::open_with_flags(
                &url,
                OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE,
            )?),
            url,
        })
    }
}

pub struct Factory {
    uri: String,
    _keep_alive: Option<InMemoryKeepAlive>,
}

impl Factory {
    pub fn new(path: &str) -> Result<Self> {
        let (keep_alive, uri) = if path == MEMORY_SPECIAL {
            let keep_alive = InMemoryKeepAlive::new(&nanoid::nanoid!())?;
            let uri = keep_alive.url.to_owned();
            (Some(keep_alive), uri)
        } else {
            (None, format!("file:{}", path))
        };

        Ok(Factory {
            uri,
            _keep_alive: keep_alive,
        })
    }
}

impl StorageFactory for Factory {
    fn migrate(&self) -> Result<()> {
        let conn = Owned::new(&self.uri)?;
        conn.connection().migrate()
    }

    fn create_storage(&self) -> Result<Box<dyn Storage>> {
        Ok(Box::new(SqliteStorage::wrap(Owned::new(&self.uri)?)))
    }
}

pub struct ConnectionPool {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl ConnectionPool {
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = r2d2::Pool::new(manager)?;
        Ok(Self { pool })
    }
}

impl StorageFactory for ConnectionPool {
    fn migrate(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.migrate()
    }

    fn create_storage(&self) -> Result<Box<dyn Storage>> {
        Ok(Box::new(SqliteStorage::wrap(Pooled {
            conn: self.pool.get()?,
        })))
    }
}
