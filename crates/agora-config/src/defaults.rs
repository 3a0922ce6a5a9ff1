//! Fallback values used when a variable is unset.
//!
//! # Design
//! - Keep every default in one place so the docs table and the loader agree.

pub(crate) const BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);
pub(crate) const BOARD_ID: i32 = 1;
pub(crate) const THEME_DIR: &str = "themes";
pub(crate) const THEME_SERVER_ROOT: &str = "/themes";
pub(crate) const THEME_CLIENT_ROOT: &str = "/themes";
pub(crate) const DEFAULT_THEME: &str = "cleanslate.xml";
pub(crate) const LOG_LEVEL: &str = "info";
