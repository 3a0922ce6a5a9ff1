//! Theme documents, the shared document cache, and per-request resolution.

mod cache;
mod document;
mod resolver;

pub use cache::{ThemeCache, ThemeCacheStats};
pub use document::{ThemeDocument, ThemeResource};
pub use resolver::{DEFAULT_LANGUAGE, ThemeResolver, ThemeSettings, is_valid_theme};
