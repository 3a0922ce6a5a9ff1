//! Scripted collaborators for bootstrap and HTTP tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use agora_core::{
    AuthenticatedUser, EventLogEntry, EventLogSink, IdentityResolver, PageLoadRequest,
    PageLoadRow, PageLoadStore, UserProvisioner,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, json};

/// Row shaped like the `PostgreSQL` page-load payload.
#[must_use]
pub fn sample_row(user_id: i64, is_guest: bool) -> PageLoadRow {
    let mut fields = Map::new();
    fields.insert("UserID".to_string(), json!(user_id));
    fields.insert("BoardID".to_string(), json!(1));
    fields.insert("IsGuest".to_string(), json!(is_guest));
    fields.insert(
        "UserName".to_string(),
        json!(if is_guest { "Guest" } else { "member" }),
    );
    PageLoadRow::new(fields)
}

/// Forum member fixture.
#[must_use]
pub fn member(provider_key: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        provider_key: provider_key.to_string(),
        user_name: format!("member-{provider_key}"),
        email: None,
    }
}

/// What a scripted lookup should do.
#[derive(Debug, Clone)]
pub enum ScriptedLookup {
    /// Return the row.
    Row(PageLoadRow),
    /// Report a miss.
    Miss,
    /// Fail with a collaborator error.
    Fail,
}

/// Page-load store replaying a script, then a fallback for every later call.
pub struct ScriptedPageLoadStore {
    script: Mutex<VecDeque<ScriptedLookup>>,
    fallback: ScriptedLookup,
    calls: AtomicUsize,
    requests: Mutex<Vec<PageLoadRequest>>,
}

impl ScriptedPageLoadStore {
    /// Store that plays `script`, then repeats `fallback`.
    #[must_use]
    pub fn new(script: Vec<ScriptedLookup>, fallback: ScriptedLookup) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Store that always returns `row`.
    #[must_use]
    pub fn always(row: PageLoadRow) -> Self {
        Self::new(Vec::new(), ScriptedLookup::Row(row))
    }

    /// Store that never finds a row.
    #[must_use]
    pub fn missing() -> Self {
        Self::new(Vec::new(), ScriptedLookup::Miss)
    }

    /// Store whose every lookup fails.
    #[must_use]
    pub fn failing() -> Self {
        Self::new(Vec::new(), ScriptedLookup::Fail)
    }

    /// Lookups performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<PageLoadRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageLoadStore for ScriptedPageLoadStore {
    async fn page_load(&self, request: &PageLoadRequest) -> Result<Option<PageLoadRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .map_err(|_| anyhow!("request log poisoned"))?
            .push(request.clone());
        let next = self
            .script
            .lock()
            .map_err(|_| anyhow!("script poisoned"))?
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match next {
            ScriptedLookup::Row(row) => Ok(Some(row)),
            ScriptedLookup::Miss => Ok(None),
            ScriptedLookup::Fail => Err(anyhow!("scripted page load failure")),
        }
    }
}

/// Provisioner answering every call with the same result.
pub struct StaticProvisioner {
    result: bool,
    calls: AtomicUsize,
}

impl StaticProvisioner {
    /// Provisioner returning `result`.
    #[must_use]
    pub const fn new(result: bool) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    /// Provisioning calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserProvisioner for StaticProvisioner {
    async fn provision(&self, _user: &AuthenticatedUser, _board_id: i32) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }
}

/// Ticket resolver backed by an in-memory map; revoked tickets are removed.
#[derive(Default)]
pub struct StaticIdentityResolver {
    tickets: Mutex<HashMap<String, AuthenticatedUser>>,
    revoked: Mutex<Vec<String>>,
}

impl StaticIdentityResolver {
    /// Resolver knowing the given tickets.
    #[must_use]
    pub fn with_ticket(mut self, ticket: &str, user: AuthenticatedUser) -> Self {
        if let Ok(tickets) = self.tickets.get_mut() {
            tickets.insert(ticket.to_string(), user);
        }
        self
    }

    /// Tickets passed to `revoke`, in call order.
    #[must_use]
    pub fn revoked(&self) -> Vec<String> {
        self.revoked
            .lock()
            .map(|revoked| revoked.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, ticket: &str) -> Result<Option<AuthenticatedUser>> {
        let tickets = self
            .tickets
            .lock()
            .map_err(|_| anyhow!("ticket map poisoned"))?;
        Ok(tickets.get(ticket).cloned())
    }

    async fn revoke(&self, ticket: &str) -> Result<bool> {
        self.revoked
            .lock()
            .map_err(|_| anyhow!("revocation log poisoned"))?
            .push(ticket.to_string());
        let mut tickets = self
            .tickets
            .lock()
            .map_err(|_| anyhow!("ticket map poisoned"))?;
        Ok(tickets.remove(ticket).is_some())
    }
}

/// Event-log sink keeping entries in memory.
#[derive(Default)]
pub struct RecordingEventLog {
    entries: Mutex<Vec<EventLogEntry>>,
}

impl RecordingEventLog {
    /// Entries recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<EventLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventLogSink for RecordingEventLog {
    async fn record(&self, entry: EventLogEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("event log poisoned"))?
            .push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{IdentityKey, PageClassification, PageLocation};

    fn request() -> PageLoadRequest {
        PageLoadRequest {
            session_id: "s".to_string(),
            board_id: 1,
            identity: IdentityKey::Anonymous,
            client_address: "unknown".to_string(),
            file_path: "/".to_string(),
            query_string: String::new(),
            browser: String::new(),
            platform: String::new(),
            location: PageLocation::default(),
            classification: PageClassification::default(),
        }
    }

    #[tokio::test]
    async fn scripted_store_plays_script_then_fallback() -> Result<()> {
        let store = ScriptedPageLoadStore::new(
            vec![ScriptedLookup::Miss, ScriptedLookup::Fail],
            ScriptedLookup::Row(sample_row(3, false)),
        );
        assert!(store.page_load(&request()).await?.is_none());
        assert!(store.page_load(&request()).await.is_err());
        assert!(store.page_load(&request()).await?.is_some());
        assert!(store.page_load(&request()).await?.is_some());
        assert_eq!(store.calls(), 4);
        assert_eq!(store.requests().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn static_collaborators_answer_consistently() -> Result<()> {
        let provisioner = StaticProvisioner::new(false);
        assert!(!provisioner.provision(&member("a"), 1).await?);
        assert_eq!(provisioner.calls(), 1);

        let resolver = StaticIdentityResolver::default().with_ticket("t", member("a"));
        assert_eq!(resolver.resolve("t").await?, Some(member("a")));
        assert_eq!(resolver.resolve("x").await?, None);

        assert!(resolver.revoke("t").await?);
        assert!(!resolver.revoke("t").await?);
        assert_eq!(resolver.resolve("t").await?, None);
        assert_eq!(resolver.revoked(), vec!["t".to_string(), "t".to_string()]);
        Ok(())
    }
}
