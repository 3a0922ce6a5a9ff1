//! Offline theme inspection: name validation, parsing, lookups, and listing.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use agora_config::ForumConfig;
use agora_core::{ThemeCache, ThemeDocument, ThemeError, ThemeResolver, is_valid_theme};
use anyhow::{Context, anyhow};
use serde::Serialize;
use walkdir::WalkDir;

use crate::cli::{OutputFormat, ThemeCheckArgs, ThemeItemArgs};
use crate::error::{CliError, CliResult};
use crate::output::{render_theme_item, render_theme_list, render_theme_summary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ThemeSummary {
    pub(crate) file: String,
    pub(crate) name: Option<String>,
    pub(crate) dir: String,
    pub(crate) pages: usize,
    pub(crate) resources: usize,
}

impl ThemeSummary {
    fn from_document(document: &ThemeDocument) -> Self {
        Self {
            file: document.file().to_string(),
            name: document.name().map(ToString::to_string),
            dir: document.dir().to_string(),
            pages: document.pages().len(),
            resources: document.resources().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ThemeItem {
    pub(crate) file: String,
    pub(crate) page: String,
    pub(crate) tag: String,
    pub(crate) language: String,
    pub(crate) value: String,
    pub(crate) found: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ThemeListing {
    pub(crate) file: String,
    pub(crate) dir: Option<String>,
    pub(crate) error: Option<String>,
}

pub(crate) fn handle_theme_check(args: &ThemeCheckArgs, format: OutputFormat) -> CliResult<()> {
    let summary = check_theme(&args.file)?;
    println!("{}", render_theme_summary(&summary, format)?);
    Ok(())
}

pub(crate) async fn handle_theme_item(
    config: &ForumConfig,
    args: &ThemeItemArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let item = resolve_item(config, args).await?;
    println!("{}", render_theme_item(&item, format)?);
    Ok(())
}

pub(crate) fn handle_theme_list(config: &ForumConfig, format: OutputFormat) -> CliResult<()> {
    let themes = list_themes(&config.theme_directory)?;
    println!("{}", render_theme_list(&themes, format)?);
    Ok(())
}

pub(crate) fn check_theme(path: &Path) -> CliResult<ThemeSummary> {
    let (directory, file) = split_theme_path(path)?;
    if !is_valid_theme(directory, file) {
        return Err(invalid_name(path));
    }
    let xml = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .map_err(CliError::failure)?;
    let document = ThemeDocument::parse(file, &xml).map_err(theme_error)?;
    Ok(ThemeSummary::from_document(&document))
}

/// Resolve one item the way the host does, with the configured roots for
/// `~` substitution and the file's own directory as the theme directory.
pub(crate) async fn resolve_item(
    config: &ForumConfig,
    args: &ThemeItemArgs,
) -> CliResult<ThemeItem> {
    let (directory, file) = split_theme_path(&args.file)?;
    let cache = Arc::new(ThemeCache::with_bypass(directory, true));
    let mut resolver =
        ThemeResolver::new(Arc::new(config.theme.clone()), cache).with_language(&args.language);
    resolver
        .set_theme_file(file)
        .await
        .map_err(theme_error)?;

    let resolved = resolver
        .lookup(&args.page, &args.tag)
        .await
        .map_err(theme_error)?;
    let page = args.page.to_uppercase();
    let tag = args.tag.to_uppercase();
    Ok(ThemeItem {
        file: file.to_string(),
        found: resolved.is_some(),
        value: resolved.unwrap_or_else(|| format!("[{page}.{tag}]")),
        language: resolver.language().to_string(),
        page,
        tag,
    })
}

pub(crate) fn list_themes(directory: &Path) -> CliResult<Vec<ThemeListing>> {
    if !directory.is_dir() {
        return Err(CliError::validation(format!(
            "theme directory {} does not exist",
            directory.display()
        )));
    }

    let mut themes = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let Some(file) = entry.file_name().to_str() else {
            continue;
        };
        if !is_valid_theme(directory, file) {
            continue;
        }
        let parsed = fs::read_to_string(entry.path())
            .map_err(|err| err.to_string())
            .and_then(|xml| ThemeDocument::parse(file, &xml).map_err(|err| err.to_string()));
        themes.push(match parsed {
            Ok(document) => ThemeListing {
                file: file.to_string(),
                dir: Some(document.dir().to_string()),
                error: None,
            },
            Err(error) => ThemeListing {
                file: file.to_string(),
                dir: None,
                error: Some(error),
            },
        });
    }
    Ok(themes)
}

fn split_theme_path(path: &Path) -> CliResult<(&Path, &str)> {
    let file = path
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| invalid_name(path))?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((directory, file))
}

fn invalid_name(path: &Path) -> CliError {
    theme_error(ThemeError::InvalidName {
        file: path.display().to_string(),
    })
}

fn theme_error(err: ThemeError) -> CliError {
    match err {
        ThemeError::Read { .. } => CliError::failure(anyhow!(err)),
        ThemeError::Parse { ref file, ref source } => {
            CliError::validation(format!("{file}: {err}: {source}"))
        }
        ThemeError::InvalidName { ref file } => CliError::validation(format!(
            "{file}: {err} (expected an existing `.xml` file)"
        )),
        ThemeError::MissingDir { ref file } => CliError::validation(format!("{file}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_test_support::themes::{SAMPLE_THEME_FILE, ThemeFixture};
    use std::path::PathBuf;

    fn item_args(fixture: &ThemeFixture, page: &str, tag: &str, language: &str) -> ThemeItemArgs {
        ThemeItemArgs {
            file: fixture.path().join(SAMPLE_THEME_FILE),
            page: page.to_string(),
            tag: tag.to_string(),
            language: language.to_string(),
        }
    }

    #[test]
    fn check_reports_dir_and_counts() {
        let fixture = ThemeFixture::new().expect("fixture");
        let summary = check_theme(&fixture.path().join(SAMPLE_THEME_FILE)).expect("check");
        assert_eq!(summary.file, SAMPLE_THEME_FILE);
        assert_eq!(summary.name.as_deref(), Some("Clean Slate"));
        assert_eq!(summary.dir, "cleanslate");
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.resources, 4);
    }

    #[test]
    fn check_rejects_bad_names_and_documents() {
        let fixture = ThemeFixture::new().expect("fixture");
        fixture
            .write("notes.txt", "<Theme dir=\"x\"/>")
            .expect("write");
        fixture
            .write("nodir.xml", "<Theme name=\"No Dir\"></Theme>")
            .expect("write");

        let err = check_theme(&fixture.path().join("notes.txt")).expect_err("suffix");
        assert_eq!(err.exit_code(), 2);
        let err = check_theme(&fixture.path().join("absent.xml")).expect_err("missing");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("invalid theme file name"));
        let err = check_theme(&fixture.path().join("nodir.xml")).expect_err("no dir");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("missing its dir attribute"));
        assert!(check_theme(&PathBuf::from("/")).is_err());
    }

    #[tokio::test]
    async fn item_lookup_uses_language_and_roots() {
        let fixture = ThemeFixture::new().expect("fixture");
        let config = ForumConfig::default();

        let item = resolve_item(&config, &item_args(&fixture, "buttons", "reply", "de"))
            .await
            .expect("item");
        assert_eq!(item.value, "Antworten");
        assert_eq!(item.language, "DE");
        assert!(item.found);

        let item = resolve_item(&config, &item_args(&fixture, "icons", "new_posts", "EN"))
            .await
            .expect("item");
        assert_eq!(item.value, "/themes/cleanslate/images/topic_new.png");
    }

    #[tokio::test]
    async fn missing_items_fall_back_to_placeholder() {
        let fixture = ThemeFixture::new().expect("fixture");
        let item = resolve_item(
            &ForumConfig::default(),
            &item_args(&fixture, "buttons", "gone", "EN"),
        )
        .await
        .expect("item");
        assert!(!item.found);
        assert_eq!(item.value, "[BUTTONS.GONE]");
        assert_eq!(item.page, "BUTTONS");
    }

    #[tokio::test]
    async fn item_lookup_rejects_unknown_files() {
        let fixture = ThemeFixture::new().expect("fixture");
        let mut args = item_args(&fixture, "buttons", "reply", "EN");
        args.file = fixture.path().join("absent.xml");
        let err = resolve_item(&ForumConfig::default(), &args)
            .await
            .expect_err("unknown theme");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("absent.xml"));
    }

    #[test]
    fn list_skips_invalid_names_and_flags_broken_documents() {
        let fixture = ThemeFixture::new().expect("fixture");
        fixture.write("readme.md", "# themes").expect("write");
        fixture.write("broken.xml", "<Theme>").expect("write");

        let themes = list_themes(fixture.path()).expect("list");
        let files: Vec<&str> = themes.iter().map(|theme| theme.file.as_str()).collect();
        assert_eq!(files, vec!["broken.xml", SAMPLE_THEME_FILE]);
        assert!(themes[0].dir.is_none());
        assert!(themes[0].error.is_some());
        assert_eq!(themes[1].dir.as_deref(), Some("cleanslate"));

        let err = list_themes(&fixture.path().join("nowhere")).expect_err("missing dir");
        assert_eq!(err.exit_code(), 2);
    }
}
