//! # Design
//!
//! - `Accept-Language` picks both the info-page locale and the theme language.
//! - Unsupported locales fall back to English; missing keys echo the key.
//! - Bundle parse failures degrade to empty bundles and log once at load time.

use std::collections::HashMap;
use std::sync::OnceLock;

use axum::http::{HeaderMap, header::ACCEPT_LANGUAGE};
use serde::Deserialize;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LocaleCode {
    En,
    De,
}

impl LocaleCode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }

    fn from_language(language: &str) -> Self {
        if language.eq_ignore_ascii_case("de") {
            Self::De
        } else {
            DEFAULT_LOCALE
        }
    }
}

const DEFAULT_LOCALE: LocaleCode = LocaleCode::En;

#[derive(Debug, Default)]
struct TranslationBundle {
    messages: HashMap<String, String>,
}

impl TranslationBundle {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.messages.get(key).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct TranslationFile {
    #[serde(default)]
    messages: HashMap<String, String>,
}

/// Upper-cased primary subtag of the first usable `Accept-Language` entry.
pub(crate) fn negotiate_language(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(ACCEPT_LANGUAGE)?.to_str().ok()?;
    value
        .split(',')
        .filter_map(|part| part.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .filter_map(|tag| tag.split('-').next())
        .find(|primary| {
            (2..=8).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic())
        })
        .map(str::to_ascii_uppercase)
}

/// Translate `key` for `language`, falling back to English, then to the key.
pub(crate) fn localize_message(language: &str, key: &str) -> String {
    let locale = LocaleCode::from_language(language);
    translations_for(locale)
        .lookup(key)
        .or_else(|| translations_for(DEFAULT_LOCALE).lookup(key))
        .map_or_else(|| key.to_string(), ToString::to_string)
}

fn translations_for(locale: LocaleCode) -> &'static TranslationBundle {
    static EN_TRANSLATIONS: OnceLock<TranslationBundle> = OnceLock::new();
    static DE_TRANSLATIONS: OnceLock<TranslationBundle> = OnceLock::new();
    match locale {
        LocaleCode::En => EN_TRANSLATIONS.get_or_init(|| load_translations(LocaleCode::En)),
        LocaleCode::De => DE_TRANSLATIONS.get_or_init(|| load_translations(LocaleCode::De)),
    }
}

fn load_translations(locale: LocaleCode) -> TranslationBundle {
    let raw = match locale {
        LocaleCode::En => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/i18n/en.json")),
        LocaleCode::De => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/i18n/de.json")),
    };
    match serde_json::from_str::<TranslationFile>(raw) {
        Ok(file) => TranslationBundle {
            messages: file.messages,
        },
        Err(err) => {
            error!(
                error = %err,
                locale = locale.as_str(),
                "failed to parse i18n bundle"
            );
            TranslationBundle::default()
        }
    }
}
