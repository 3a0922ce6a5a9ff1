//! Request, identity, and page-state types shared across the workspace.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Visitor identity handed to the page-load lookup.
///
/// Guests are represented by an explicit marker rather than an empty key so
/// the store never has to guess whether `""` means "anonymous".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum IdentityKey {
    /// No authenticated visitor.
    Anonymous,
    /// Provider-specific key of an authenticated visitor.
    Provider(String),
}

impl IdentityKey {
    /// Identity key for the optional authenticated user.
    #[must_use]
    pub fn for_user(user: Option<&AuthenticatedUser>) -> Self {
        user.map_or(Self::Anonymous, |user| {
            Self::Provider(user.provider_key.clone())
        })
    }

    /// Provider key, or `None` for guests.
    #[must_use]
    pub fn as_provider_key(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Provider(key) => Some(key.as_str()),
        }
    }

    /// Whether this key represents a guest.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Visitor known to the membership subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Stable provider key (membership identifier).
    pub provider_key: String,
    /// Login name.
    pub user_name: String,
    /// Contact email, when the membership record has one.
    pub email: Option<String>,
}

/// Forum page classification derived from the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForumPage {
    /// Board index.
    Forum,
    /// Topic listing for a forum.
    Topics,
    /// Posts within a topic.
    Posts,
    /// Member profile.
    Profile,
    /// Search page.
    Search,
    /// Member list.
    Members,
    /// Information / failure notice page.
    Info,
    /// Anything else.
    Other,
}

impl ForumPage {
    /// Classify a request path by its first segment.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let segment = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();
        match segment.to_ascii_lowercase().as_str() {
            "" | "forum" => Self::Forum,
            "topics" => Self::Topics,
            "posts" => Self::Posts,
            "profile" => Self::Profile,
            "search" => Self::Search,
            "members" => Self::Members,
            "info" => Self::Info,
            _ => Self::Other,
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forum => "forum",
            Self::Topics => "topics",
            Self::Posts => "posts",
            Self::Profile => "profile",
            Self::Search => "search",
            Self::Members => "members",
            Self::Info => "info",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ForumPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages shown on the information page. Codes are stable and travel in
/// redirect URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoMessage {
    /// Post is awaiting moderation.
    Moderated = 1,
    /// Account is suspended.
    Suspended = 2,
    /// Registration email has been sent.
    RegistrationEmail = 3,
    /// Access to the page was denied.
    AccessDenied = 4,
    /// Feature is disabled.
    Disabled = 5,
    /// Invalid request.
    Invalid = 6,
    /// Generic failure notice.
    Failure = 7,
    /// Cookies are required.
    RequiresCookies = 8,
}

impl InfoMessage {
    /// Numeric code used in `?i=` query parameters.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Moderated),
            2 => Some(Self::Suspended),
            3 => Some(Self::RegistrationEmail),
            4 => Some(Self::AccessDenied),
            5 => Some(Self::Disabled),
            6 => Some(Self::Invalid),
            7 => Some(Self::Failure),
            8 => Some(Self::RequiresCookies),
            _ => None,
        }
    }

    /// Translation key for the message text.
    #[must_use]
    pub const fn message_key(self) -> &'static str {
        match self {
            Self::Moderated => "info.moderated",
            Self::Suspended => "info.suspended",
            Self::RegistrationEmail => "info.registration_email",
            Self::AccessDenied => "info.access_denied",
            Self::Disabled => "info.disabled",
            Self::Invalid => "info.invalid",
            Self::Failure => "info.failure",
            Self::RequiresCookies => "info.requires_cookies",
        }
    }
}

/// Location identifiers carried by forum URLs (`c`, `f`, `t`, `m`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    /// Category being viewed.
    pub category_id: Option<i32>,
    /// Forum being viewed.
    pub forum_id: Option<i32>,
    /// Topic being viewed.
    pub topic_id: Option<i32>,
    /// Message being viewed.
    pub message_id: Option<i32>,
}

/// Visitor classification flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageClassification {
    /// Request comes from a search engine crawler; activity is not tracked.
    pub is_search_engine: bool,
    /// Request comes from a mobile device.
    pub is_mobile_device: bool,
    /// Visitor asked not to be tracked.
    pub dont_track: bool,
}

/// Payload gathered by the host before the page-load event fires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    /// Browser name and version.
    pub browser: String,
    /// Operating system / platform name.
    pub platform: String,
    /// Location identifiers from the URL.
    pub location: PageLocation,
    /// Crawler / mobile / do-not-track flags.
    pub classification: PageClassification,
}

/// Request-scoped context passed explicitly into the bootstrap and theme
/// components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Current authenticated visitor, if any.
    pub user: Option<AuthenticatedUser>,
    /// Board serving the request.
    pub board_id: i32,
    /// Page classification of the current request.
    pub page: ForumPage,
    /// Host session identifier.
    pub session_id: String,
    /// Client network address.
    pub client_address: String,
    /// Requested file path.
    pub file_path: String,
    /// Raw query string, without the leading `?`.
    pub query_string: String,
}

/// Arguments for a single page-load lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLoadRequest {
    /// Host session identifier.
    pub session_id: String,
    /// Board serving the request.
    pub board_id: i32,
    /// Visitor identity, or the anonymous marker.
    pub identity: IdentityKey,
    /// Client network address.
    pub client_address: String,
    /// Requested file path.
    pub file_path: String,
    /// Raw query string.
    pub query_string: String,
    /// Browser name and version.
    pub browser: String,
    /// Operating system / platform name.
    pub platform: String,
    /// Location identifiers from the URL.
    pub location: PageLocation,
    /// Crawler / mobile / do-not-track flags.
    pub classification: PageClassification,
}

impl PageLoadRequest {
    /// Assemble a lookup request from the context and event payload.
    #[must_use]
    pub fn from_context(ctx: &RequestContext, data: &PageData) -> Self {
        Self {
            session_id: ctx.session_id.clone(),
            board_id: ctx.board_id,
            identity: IdentityKey::for_user(ctx.user.as_ref()),
            client_address: ctx.client_address.clone(),
            file_path: ctx.file_path.clone(),
            query_string: ctx.query_string.clone(),
            browser: data.browser.clone(),
            platform: data.platform.clone(),
            location: data.location,
            classification: data.classification,
        }
    }
}

/// Named-field row returned by a successful page-load lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageLoadRow {
    fields: Map<String, Value>,
}

impl PageLoadRow {
    /// Wrap a field map.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Field value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of fields in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl From<Map<String, Value>> for PageLoadRow {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

impl IntoIterator for PageLoadRow {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Request-scoped output mapping read by later request stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageDataDictionary {
    entries: HashMap<String, Value>,
}

impl PageDataDictionary {
    /// Empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a single entry, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Copy every field of `row` in; duplicate keys take the row's value and
    /// keys the row does not mention are kept.
    pub fn extend_from_row(&mut self, row: PageLoadRow) {
        self.entries.extend(row);
    }

    /// Entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

/// The "page load requested" event: host-gathered payload plus the shared
/// output dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitPageLoadEvent {
    /// Browser/platform/location payload.
    pub page_data: PageData,
    /// Output populated by the bootstrap handler.
    pub data: PageDataDictionary,
}

impl InitPageLoadEvent {
    /// Event with an empty output dictionary.
    #[must_use]
    pub fn new(page_data: PageData) -> Self {
        Self {
            page_data,
            data: PageDataDictionary::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_key_uses_explicit_guest_marker() {
        assert_eq!(IdentityKey::for_user(None), IdentityKey::Anonymous);
        assert!(IdentityKey::Anonymous.as_provider_key().is_none());

        let user = AuthenticatedUser {
            provider_key: "a1b2".to_string(),
            user_name: "ada".to_string(),
            email: None,
        };
        let key = IdentityKey::for_user(Some(&user));
        assert_eq!(key.as_provider_key(), Some("a1b2"));
        assert!(!key.is_anonymous());
    }

    #[test]
    fn forum_page_classifies_first_segment() {
        assert_eq!(ForumPage::from_path("/"), ForumPage::Forum);
        assert_eq!(ForumPage::from_path("/info"), ForumPage::Info);
        assert_eq!(ForumPage::from_path("/Topics/12"), ForumPage::Topics);
        assert_eq!(ForumPage::from_path("/theme/x/y"), ForumPage::Other);
    }

    #[test]
    fn info_message_codes_round_trip() {
        for code in 1..=8 {
            let message = InfoMessage::from_code(code).expect("known code");
            assert_eq!(message.code(), code);
        }
        assert!(InfoMessage::from_code(0).is_none());
        assert_eq!(InfoMessage::Failure.code(), 7);
    }

    #[test]
    fn dictionary_merge_is_last_write_wins_and_keeps_upstream_keys() {
        let mut dictionary = PageDataDictionary::new();
        dictionary.insert("upstream", json!("kept"));
        dictionary.insert("UserID", json!(0));

        let mut fields = Map::new();
        fields.insert("UserID".to_string(), json!(42));
        fields.insert("BoardID".to_string(), json!(1));
        dictionary.extend_from_row(PageLoadRow::new(fields));

        assert_eq!(dictionary.get("upstream"), Some(&json!("kept")));
        assert_eq!(dictionary.get("UserID"), Some(&json!(42)));
        assert_eq!(dictionary.get("BoardID"), Some(&json!(1)));
        assert_eq!(dictionary.len(), 3);
    }
}
