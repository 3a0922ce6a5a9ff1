//! Forum page-load, provisioning, ticket, and event-log persistence.
//!
//! # Design
//! - Every operation is a single stored-procedure call; SQL lives in the
//!   migrations, Rust only binds arguments and decodes results.
//! - `ForumStore` implements the core collaborator traits so the bootstrap
//!   handler and theme resolver never see `sqlx`.

use agora_core::{
    AuthenticatedUser, EventLogEntry, EventLogSink, IdentityResolver, PageLoadRequest,
    PageLoadRow, PageLoadStore, UserProvisioner,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use crate::error::{DataError, Result};

const PAGE_LOAD_CALL: &str = r"
    SELECT agora.page_load(
        _session_id => $1,
        _board_id => $2,
        _provider_key => $3,
        _client_address => $4,
        _file_path => $5,
        _query_string => $6,
        _browser => $7,
        _platform => $8,
        _category_id => $9,
        _forum_id => $10,
        _topic_id => $11,
        _message_id => $12,
        _is_search_engine => $13,
        _is_mobile_device => $14,
        _dont_track => $15
    )
";

const CREATE_FORUM_USER_CALL: &str = r"
    SELECT agora.create_forum_user(
        _board_id => $1,
        _provider_key => $2,
        _user_name => $3,
        _email => $4
    )
";

const ISSUE_AUTH_TICKET_CALL: &str = r"
    SELECT agora.issue_auth_ticket(
        _ticket => $1,
        _provider_key => $2,
        _user_name => $3,
        _email => $4,
        _expires_at => $5
    )
";

const RESOLVE_AUTH_TICKET_CALL: &str = r"
    SELECT provider_key, user_name, email
    FROM agora.resolve_auth_ticket(_ticket => $1)
";

const REVOKE_AUTH_TICKET_CALL: &str = r"
    SELECT agora.revoke_auth_ticket(_ticket => $1)
";

const EVENTLOG_CREATE_CALL: &str = r"
    SELECT agora.eventlog_create(
        _user_id => $1,
        _source => $2,
        _description => $3,
        _event_type => $4,
        _created_at => $5
    )
";

const EVENTLOG_LIST_CALL: &str = r"
    SELECT event_id, user_id, source, description, event_type, created_at
    FROM agora.eventlog_list(_limit => $1)
";

fn map_query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

/// Apply the forum schema migrations.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })?;
    Ok(())
}

/// Authentication ticket handed out by the membership subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTicket {
    /// Opaque ticket value carried in the auth cookie.
    pub ticket: String,
    /// Identity the ticket resolves to.
    pub user: AuthenticatedUser,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Raw projection of an event-log row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct EventLogRecord {
    /// Row id.
    pub event_id: i64,
    /// Forum user id, when known.
    pub user_id: Option<i32>,
    /// Raising component.
    pub source: String,
    /// Description text.
    pub description: String,
    /// Severity code.
    pub event_type: i16,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct TicketRow {
    provider_key: String,
    user_name: String,
    email: Option<String>,
}

/// Database-backed forum repository.
#[derive(Clone)]
pub struct ForumStore {
    pool: PgPool,
}

impl ForumStore {
    /// Wrap an existing pool. Migrations are not run.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or migrations fail.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_query_err("connect"))?;
        run_migrations(&pool).await?;
        info!(max_connections, "forum store connected");
        Ok(Self { pool })
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query to confirm the pool can reach the database.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be acquired or the query fails.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_query_err("ping"))?;
        Ok(())
    }

    /// Load the page-state row for a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or returns a non-object payload.
    pub async fn load_page(&self, request: &PageLoadRequest) -> Result<Option<PageLoadRow>> {
        let location = &request.location;
        let classification = &request.classification;
        let payload: Option<Json<Value>> = sqlx::query_scalar(PAGE_LOAD_CALL)
            .bind(&request.session_id)
            .bind(request.board_id)
            .bind(request.identity.as_provider_key())
            .bind(&request.client_address)
            .bind(&request.file_path)
            .bind(&request.query_string)
            .bind(&request.browser)
            .bind(&request.platform)
            .bind(location.category_id)
            .bind(location.forum_id)
            .bind(location.topic_id)
            .bind(location.message_id)
            .bind(classification.is_search_engine)
            .bind(classification.is_mobile_device)
            .bind(classification.dont_track)
            .fetch_one(&self.pool)
            .await
            .map_err(map_query_err("page load"))?;

        let row = match payload.map(|Json(value)| value) {
            None | Some(Value::Null) => None,
            Some(Value::Object(fields)) => Some(PageLoadRow::new(fields)),
            Some(other) => {
                return Err(DataError::UnexpectedPayload {
                    operation: "page load",
                    found: json_type(&other),
                });
            }
        };
        debug!(
            board_id = request.board_id,
            guest = request.identity.is_anonymous(),
            found = row.is_some(),
            "page load call completed"
        );
        Ok(row)
    }

    /// Create the forum profile for `user` on `board_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn create_forum_user(&self, user: &AuthenticatedUser, board_id: i32) -> Result<bool> {
        let created: Option<bool> = sqlx::query_scalar(CREATE_FORUM_USER_CALL)
            .bind(board_id)
            .bind(&user.provider_key)
            .bind(&user.user_name)
            .bind(user.email.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(map_query_err("create forum user"))?;
        let created = created.unwrap_or(false);
        info!(user = %user.user_name, board_id, created, "forum user provisioning");
        Ok(created)
    }

    /// Store (or replace) an authentication ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn issue_auth_ticket(&self, ticket: &AuthTicket) -> Result<()> {
        sqlx::query(ISSUE_AUTH_TICKET_CALL)
            .bind(&ticket.ticket)
            .bind(&ticket.user.provider_key)
            .bind(&ticket.user.user_name)
            .bind(ticket.user.email.as_deref())
            .bind(ticket.expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("issue auth ticket"))?;
        Ok(())
    }

    /// Identity for an unexpired ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn resolve_auth_ticket(&self, ticket: &str) -> Result<Option<AuthenticatedUser>> {
        let row: Option<TicketRow> = sqlx::query_as(RESOLVE_AUTH_TICKET_CALL)
            .bind(ticket)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_err("resolve auth ticket"))?;
        Ok(row.map(|row| AuthenticatedUser {
            provider_key: row.provider_key,
            user_name: row.user_name,
            email: row.email,
        }))
    }

    /// Delete a ticket. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn revoke_auth_ticket(&self, ticket: &str) -> Result<bool> {
        let removed: Option<bool> = sqlx::query_scalar(REVOKE_AUTH_TICKET_CALL)
            .bind(ticket)
            .fetch_one(&self.pool)
            .await
            .map_err(map_query_err("revoke auth ticket"))?;
        Ok(removed.unwrap_or(false))
    }

    /// Append an event-log entry and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn create_event(&self, entry: &EventLogEntry) -> Result<i64> {
        let event_id: i64 = sqlx::query_scalar(EVENTLOG_CREATE_CALL)
            .bind(entry.user_id)
            .bind(&entry.source)
            .bind(&entry.description)
            .bind(entry.kind.code())
            .bind(entry.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_query_err("create event log entry"))?;
        Ok(event_id)
    }

    /// Most recent event-log rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn recent_events(&self, limit: i32) -> Result<Vec<EventLogRecord>> {
        sqlx::query_as(EVENTLOG_LIST_CALL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_err("list event log"))
    }
}

#[async_trait]
impl PageLoadStore for ForumStore {
    async fn page_load(&self, request: &PageLoadRequest) -> anyhow::Result<Option<PageLoadRow>> {
        Ok(self.load_page(request).await?)
    }
}

#[async_trait]
impl UserProvisioner for ForumStore {
    async fn provision(&self, user: &AuthenticatedUser, board_id: i32) -> anyhow::Result<bool> {
        Ok(self.create_forum_user(user, board_id).await?)
    }
}

#[async_trait]
impl IdentityResolver for ForumStore {
    async fn resolve(&self, ticket: &str) -> anyhow::Result<Option<AuthenticatedUser>> {
        Ok(self.resolve_auth_ticket(ticket).await?)
    }

    async fn revoke(&self, ticket: &str) -> anyhow::Result<bool> {
        Ok(self.revoke_auth_ticket(ticket).await?)
    }
}

#[async_trait]
impl EventLogSink for ForumStore {
    async fn record(&self, entry: EventLogEntry) -> anyhow::Result<()> {
        self.create_event(&entry).await?;
        Ok(())
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_labels() {
        assert_eq!(json_type(&json!(null)), "null");
        assert_eq!(json_type(&json!([1])), "array");
        assert_eq!(json_type(&json!({"UserID": 1})), "object");
        assert_eq!(json_type(&json!("x")), "string");
    }

    #[test]
    fn procedure_calls_use_named_arguments() {
        for call in [
            PAGE_LOAD_CALL,
            CREATE_FORUM_USER_CALL,
            ISSUE_AUTH_TICKET_CALL,
            EVENTLOG_CREATE_CALL,
        ] {
            assert!(call.contains("agora."));
            assert!(call.contains("=> $1"));
        }
        assert_eq!(PAGE_LOAD_CALL.matches("=> $").count(), 15);
    }
}
