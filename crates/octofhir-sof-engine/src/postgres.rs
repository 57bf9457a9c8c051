//! Postgres document store
//!
//! `tokio-postgres` backed [`DocumentStore`] with a small internal pool:
//! connections are created lazily up to a maximum, handed out under a
//! semaphore, and parked on an idle list between uses. Every connection gets
//! a session statement timeout so a runaway statement surfaces as an
//! execution error rather than a hang.

use crate::DocumentStore;
use async_trait::async_trait;
use octofhir_sof_diagnostics::{
    Result, SOF0200, SOF0201, SOF0202, SOF0203, SofError,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

/// Connection settings for the Postgres store
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Connections opened eagerly at startup
    pub min_connections: usize,
    /// Upper bound on concurrent connections
    pub max_connections: usize,
    /// Session statement timeout
    pub statement_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "fhir".to_string(),
            password: String::new(),
            dbname: "fhir".to_string(),
            min_connections: 2,
            max_connections: 8,
            statement_timeout: Duration::from_secs(30),
        }
    }
}

struct PoolInner {
    config: PostgresConfig,
    idle: Mutex<Vec<Client>>,
    permits: Arc<Semaphore>,
}

/// Pooled `tokio-postgres` document store
pub struct PostgresStore {
    inner: Arc<PoolInner>,
}

struct PooledClient {
    client: Option<Client>,
    inner: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client present until drop")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            if !client.is_closed() {
                self.inner.idle.lock().push(client);
            }
        }
    }
}

impl PostgresStore {
    /// Connect, opening the minimum number of connections eagerly
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        let inner = Arc::new(PoolInner {
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
            idle: Mutex::new(Vec::new()),
            config,
        });

        for _ in 0..inner.config.min_connections.min(inner.config.max_connections) {
            let client = open_connection(&inner.config).await?;
            inner.idle.lock().push(client);
        }
        log::info!(
            "connected to postgres {}:{}/{} (pool {}..{})",
            inner.config.host,
            inner.config.port,
            inner.config.dbname,
            inner.config.min_connections,
            inner.config.max_connections
        );

        Ok(Self { inner })
    }

    async fn acquire(&self) -> Result<PooledClient> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SofError::execution(SOF0201, "connection pool closed"))?;

        let parked = self.inner.idle.lock().pop();
        let client = match parked {
            Some(client) if !client.is_closed() => client,
            _ => open_connection(&self.inner.config).await?,
        };

        Ok(PooledClient {
            client: Some(client),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn query_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Value>> {
        let client = self.acquire().await?;
        // The wrapper keys every row by output column name, which keeps row
        // decoding independent of the column types a view declares.
        let wrapped = format!("SELECT row_to_json(q)::jsonb AS row FROM ({sql}) q");
        let rows = client
            .query(wrapped.as_str(), &to_sql_params(params))
            .await
            .map_err(|e| map_pg_error(e, sql))?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<_, Value>(0))
            .collect())
    }

    async fn query_count(&self, sql: &str, params: &[String]) -> Result<i64> {
        let client = self.acquire().await?;
        let row = client
            .query_one(sql, &to_sql_params(params))
            .await
            .map_err(|e| map_pg_error(e, sql))?;
        Ok(row.get(0))
    }

    async fn list_matviews(&self, schema: &str) -> Result<Vec<String>> {
        let client = self.acquire().await?;
        let rows = client
            .query(
                "SELECT matviewname FROM pg_matviews WHERE schemaname = $1 ORDER BY matviewname",
                &[&schema],
            )
            .await
            .map_err(|e| map_pg_error(e, "pg_matviews lookup"))?;
        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        let client = self.acquire().await?;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| map_pg_error(e, sql))
    }

    async fn refresh_matview(&self, schema: &str, name: &str, definition: &str) -> Result<()> {
        let client = self.acquire().await?;
        let relation = format!("{schema}.{name}");

        let locked: bool = client
            .query_one("SELECT pg_try_advisory_lock(hashtext($1))", &[&relation])
            .await
            .map_err(|e| map_pg_error(e, "advisory lock"))?
            .get(0);
        if !locked {
            return Err(SofError::execution_of(
                SOF0203,
                format!("materialized view '{relation}' is being refreshed by another writer"),
                relation,
            ));
        }

        let result = refresh_locked(&client, &relation, schema, name, definition).await;

        // Unlock regardless of the refresh outcome; the lock is
        // session-scoped and this client goes back to the pool.
        let unlock = client
            .query_one("SELECT pg_advisory_unlock(hashtext($1))", &[&relation])
            .await;
        if let Err(e) = unlock {
            log::error!("failed to release advisory lock for {relation}: {e}");
        }

        result
    }
}

async fn refresh_locked(
    client: &Client,
    relation: &str,
    schema: &str,
    name: &str,
    definition: &str,
) -> Result<()> {
    // Refreshes routinely outlive the per-statement query timeout.
    client
        .batch_execute("SET statement_timeout = 0")
        .await
        .map_err(|e| map_pg_error(e, "disable statement timeout"))?;

    let exists: bool = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_matviews WHERE schemaname = $1 AND matviewname = $2)",
            &[&schema, &name],
        )
        .await
        .map_err(|e| map_pg_error(e, "pg_matviews lookup"))?
        .get(0);

    let ddl = if exists {
        format!("REFRESH MATERIALIZED VIEW {relation}")
    } else {
        format!("CREATE MATERIALIZED VIEW {relation} AS {definition}")
    };
    let result = client
        .batch_execute(&ddl)
        .await
        .map_err(|e| map_pg_error(e, &ddl));

    if result.is_ok() {
        log::info!("materialized view {relation} {}", if exists { "refreshed" } else { "created" });
    }
    result
}

async fn open_connection(config: &PostgresConfig) -> Result<Client> {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .user(&config.user)
        .dbname(&config.dbname);
    if !config.password.is_empty() {
        pg.password(&config.password);
    }

    let (client, connection) = pg.connect(NoTls).await.map_err(|e| {
        SofError::execution(SOF0201, format!("cannot connect to postgres: {e}"))
    })?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("postgres connection error: {e}");
        }
    });

    client
        .batch_execute(&format!(
            "SET statement_timeout = {}",
            config.statement_timeout.as_millis()
        ))
        .await
        .map_err(|e| map_pg_error(e, "set statement timeout"))?;

    Ok(client)
}

fn to_sql_params(params: &[String]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn map_pg_error(error: tokio_postgres::Error, statement: &str) -> SofError {
    let identity: String = statement.chars().take(200).collect();
    match error.as_db_error() {
        Some(db) if db.code() == &SqlState::QUERY_CANCELED => {
            SofError::execution_of(SOF0202, "statement timed out", identity)
        }
        Some(db) => SofError::execution_of(SOF0200, db.message().to_string(), identity),
        None => SofError::execution_of(SOF0201, error.to_string(), identity),
    }
}
