//! Parsed theme definition files.
//!
//! A theme file looks like:
//!
//! ```xml
//! <Theme name="Clean Slate" dir="cleanslate">
//!   <page name="ICONS">
//!     <Resource tag="NEW_POSTS">~/images/topic_new.png</Resource>
//!     <Resource tag="NEW_POSTS" language="DE">~/images/de/topic_new.png</Resource>
//!   </page>
//! </Theme>
//! ```
//!
//! Resources are kept in document order. Page names, tags and languages are
//! stored upper-cased so lookups can compare them directly.

use std::collections::BTreeSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ThemeError;

const PAGE_ELEMENT: &[u8] = b"page";
const RESOURCE_ELEMENT: &[u8] = b"Resource";

/// Single `(page, tag, language?) -> text` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeResource {
    /// Upper-cased page name.
    pub page: String,
    /// Upper-cased tag.
    pub tag: String,
    /// Upper-cased language code, when the resource is language-specific.
    pub language: Option<String>,
    /// Concatenated text content, unescaped.
    pub text: String,
}

/// Immutable theme document shared through the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeDocument {
    file: String,
    name: Option<String>,
    dir: String,
    resources: Vec<ThemeResource>,
}

struct OpenResource {
    page: String,
    tag: String,
    language: Option<String>,
    text: String,
    depth: usize,
}

impl ThemeDocument {
    /// Parse the XML text of `file`.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Parse`] for malformed XML and
    /// [`ThemeError::MissingDir`] when the root element has no `dir`
    /// attribute.
    pub fn parse(file: &str, xml: &str) -> Result<Self, ThemeError> {
        let parse_err = |source: quick_xml::Error| ThemeError::Parse {
            file: file.to_string(),
            source,
        };

        let mut reader = Reader::from_str(xml);
        let mut root: Option<(Option<String>, Option<String>)> = None;
        let mut resources = Vec::new();
        let mut pages: Vec<(String, usize)> = Vec::new();
        let mut open: Option<OpenResource> = None;
        let mut depth = 0_usize;

        loop {
            match reader.read_event().map_err(parse_err)? {
                Event::Start(element) => {
                    depth += 1;
                    if root.is_none() {
                        root = Some(root_attributes(&element).map_err(parse_err)?);
                        continue;
                    }
                    if open.is_some() {
                        continue;
                    }
                    if element.name().as_ref() == PAGE_ELEMENT {
                        let name = attribute(&element, "name").map_err(parse_err)?;
                        pages.push((name.unwrap_or_default().to_uppercase(), depth));
                    } else if let Some(resource) =
                        open_resource(&element, &pages, depth).map_err(parse_err)?
                    {
                        open = Some(resource);
                    }
                }
                Event::Empty(element) => {
                    if root.is_none() {
                        root = Some(root_attributes(&element).map_err(parse_err)?);
                        continue;
                    }
                    if open.is_some() {
                        continue;
                    }
                    if let Some(resource) =
                        open_resource(&element, &pages, depth + 1).map_err(parse_err)?
                    {
                        resources.push(resource.finish());
                    }
                }
                Event::Text(text) => {
                    if let Some(resource) = open.as_mut() {
                        resource.text.push_str(&text.unescape().map_err(parse_err)?);
                    }
                }
                Event::CData(data) => {
                    if let Some(resource) = open.as_mut() {
                        resource.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::End(_) => {
                    if open.as_ref().is_some_and(|resource| resource.depth == depth) {
                        if let Some(resource) = open.take() {
                            resources.push(resource.finish());
                        }
                    } else if pages.last().is_some_and(|(_, page_depth)| *page_depth == depth) {
                        pages.pop();
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let (name, dir) = root.unwrap_or_default();
        let dir = dir
            .filter(|dir| !dir.trim().is_empty())
            .ok_or_else(|| ThemeError::MissingDir {
                file: file.to_string(),
            })?;

        Ok(Self {
            file: file.to_string(),
            name,
            dir: dir.trim().to_string(),
            resources,
        })
    }

    /// File name the document was loaded from.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Display name from the root element, if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Asset sub-directory declared on the root element.
    #[must_use]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// All resources in document order.
    #[must_use]
    pub fn resources(&self) -> &[ThemeResource] {
        &self.resources
    }

    /// Distinct page names.
    #[must_use]
    pub fn pages(&self) -> BTreeSet<&str> {
        self.resources
            .iter()
            .map(|resource| resource.page.as_str())
            .collect()
    }

    /// Raw resource text for `(page, tag)`.
    ///
    /// Prefers the resource declared for `language`; otherwise falls back to
    /// the first `(page, tag)` resource in document order regardless of its
    /// language. Comparisons are upper-cased.
    #[must_use]
    pub fn lookup(&self, page: &str, tag: &str, language: &str) -> Option<&str> {
        let page = page.to_uppercase();
        let tag = tag.to_uppercase();
        let language = language.to_uppercase();

        let mut candidates = self
            .resources
            .iter()
            .filter(|resource| resource.page == page && resource.tag == tag);
        let first = candidates.clone().next()?;

        candidates
            .find(|resource| resource.language.as_deref() == Some(language.as_str()))
            .or(Some(first))
            .map(|resource| resource.text.as_str())
    }
}

impl OpenResource {
    fn finish(self) -> ThemeResource {
        ThemeResource {
            page: self.page,
            tag: self.tag,
            language: self.language,
            text: self.text,
        }
    }
}

fn root_attributes(
    element: &BytesStart<'_>,
) -> Result<(Option<String>, Option<String>), quick_xml::Error> {
    Ok((attribute(element, "name")?, attribute(element, "dir")?))
}

/// `Resource` elements only count as direct children of an open `page`.
fn open_resource(
    element: &BytesStart<'_>,
    pages: &[(String, usize)],
    depth: usize,
) -> Result<Option<OpenResource>, quick_xml::Error> {
    if element.name().as_ref() != RESOURCE_ELEMENT {
        return Ok(None);
    }
    let Some((page, page_depth)) = pages.last() else {
        return Ok(None);
    };
    if *page_depth + 1 != depth {
        return Ok(None);
    }

    let tag = attribute(element, "tag")?.unwrap_or_default().to_uppercase();
    let language = attribute(element, "language")?
        .map(|language| language.trim().to_uppercase())
        .filter(|language| !language.is_empty());

    Ok(Some(OpenResource {
        page: page.clone(),
        tag,
        language,
        text: String::new(),
        depth,
    }))
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, quick_xml::Error> {
    match element.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}
