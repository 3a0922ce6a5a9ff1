//! Theme directory fixtures.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;

/// File name of the sample theme written by [`ThemeFixture::new`].
pub const SAMPLE_THEME_FILE: &str = "cleanslate.xml";

/// Sample theme with a language-specific override and a `~` path.
pub const SAMPLE_THEME: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Theme name="Clean Slate" dir="cleanslate">
  <page name="ICONS">
    <Resource tag="NEW_POSTS">~/images/topic_new.png</Resource>
    <Resource tag="NEW_POSTS" language="DE">~/images/de/topic_new.png</Resource>
  </page>
  <page name="BUTTONS">
    <Resource tag="REPLY">Reply</Resource>
    <Resource tag="REPLY" language="DE">Antworten</Resource>
  </page>
</Theme>
"#;

/// Temporary theme directory; removed on drop.
pub struct ThemeFixture {
    dir: TempDir,
}

impl ThemeFixture {
    /// Directory holding [`SAMPLE_THEME`] as [`SAMPLE_THEME_FILE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn new() -> Result<Self> {
        let fixture = Self {
            dir: TempDir::new().context("failed to create theme directory")?,
        };
        fixture.write(SAMPLE_THEME_FILE, SAMPLE_THEME)?;
        Ok(fixture)
    }

    /// Write (or overwrite) a theme file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, file: &str, xml: &str) -> Result<()> {
        let path = self.dir.path().join(file);
        fs::write(&path, xml).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_contains_sample_theme() -> Result<()> {
        let fixture = ThemeFixture::new()?;
        let contents = fs::read_to_string(fixture.path().join(SAMPLE_THEME_FILE))?;
        assert!(contents.contains("dir=\"cleanslate\""));

        fixture.write("dark.xml", "<Theme dir=\"dark\"/>")?;
        assert!(fixture.path().join("dark.xml").is_file());
        Ok(())
    }
}
