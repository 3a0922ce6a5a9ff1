//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::theme::{ThemeItem, ThemeListing, ThemeSummary};
use crate::error::{CliError, CliResult};

pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn render_theme_summary(
    summary: &ThemeSummary,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => render_json(summary),
        OutputFormat::Table => {
            let mut out = String::new();
            let _ = writeln!(out, "file: {}", summary.file);
            if let Some(name) = &summary.name {
                let _ = writeln!(out, "name: {name}");
            }
            let _ = writeln!(out, "dir: {}", summary.dir);
            let _ = writeln!(out, "pages: {}", summary.pages);
            let _ = write!(out, "resources: {}", summary.resources);
            Ok(out)
        }
    }
}

pub(crate) fn render_theme_item(item: &ThemeItem, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => render_json(item),
        OutputFormat::Table if item.found => Ok(item.value.clone()),
        OutputFormat::Table => Ok(format!("{} (missing)", item.value)),
    }
}

pub(crate) fn render_theme_list(themes: &[ThemeListing], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => render_json(themes),
        OutputFormat::Table => {
            let mut out = format!("{:<32} DIR", "FILE");
            for theme in themes {
                let dir = match (&theme.dir, &theme.error) {
                    (Some(dir), _) => dir.clone(),
                    (None, Some(error)) => format!("<invalid: {error}>"),
                    (None, None) => "<unknown>".to_string(),
                };
                let _ = write!(out, "\n{:<32} {dir}", theme.file);
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> ThemeSummary {
        ThemeSummary {
            file: "cleanslate.xml".to_string(),
            name: Some("Clean Slate".to_string()),
            dir: "cleanslate".to_string(),
            pages: 2,
            resources: 4,
        }
    }

    #[test]
    fn summary_table_lists_counts() {
        let text = render_theme_summary(&summary(), OutputFormat::Table).expect("render");
        assert_eq!(
            text,
            "file: cleanslate.xml\nname: Clean Slate\ndir: cleanslate\npages: 2\nresources: 4"
        );
        let json = render_theme_summary(&summary(), OutputFormat::Json).expect("render");
        assert!(json.contains("\"resources\": 4"));
    }

    #[test]
    fn missing_items_are_flagged_in_tables() {
        let mut item = ThemeItem {
            file: "cleanslate.xml".to_string(),
            page: "BUTTONS".to_string(),
            tag: "GONE".to_string(),
            language: "EN".to_string(),
            value: "[BUTTONS.GONE]".to_string(),
            found: false,
        };
        assert_eq!(
            render_theme_item(&item, OutputFormat::Table).expect("render"),
            "[BUTTONS.GONE] (missing)"
        );
        item.found = true;
        item.value = "Reply".to_string();
        assert_eq!(
            render_theme_item(&item, OutputFormat::Table).expect("render"),
            "Reply"
        );
    }

    #[test]
    fn list_table_marks_unparsable_themes() {
        let themes = vec![
            ThemeListing {
                file: "broken.xml".to_string(),
                dir: None,
                error: Some("theme document is missing its dir attribute".to_string()),
            },
            ThemeListing {
                file: "cleanslate.xml".to_string(),
                dir: Some("cleanslate".to_string()),
                error: None,
            },
        ];
        let text = render_theme_list(&themes, OutputFormat::Table).expect("render");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("broken.xml"));
        assert!(lines[1].ends_with("<invalid: theme document is missing its dir attribute>"));
        assert!(lines[2].ends_with(" cleanslate"));
    }
}
