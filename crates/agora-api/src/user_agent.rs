//! `User-Agent` classification for page-load tracking.
//!
//! # Design
//! - Patterns are compiled once when the server is built and shared by every request.
//! - Browser rules are ordered: engines that embed another's token (Edge, Opera
//!   carry `Chrome/`) are matched first.

use regex::Regex;

const UNKNOWN: &str = "Unknown";

const BROWSER_RULES: &[(&str, &str)] = &[
    ("Edge", r"Edg(?:e|A|iOS)?/(\d+)"),
    ("Opera", r"(?:OPR|Opera)/(\d+)"),
    ("Chrome", r"(?:Chrome|CriOS)/(\d+)"),
    ("Firefox", r"(?:Firefox|FxiOS)/(\d+)"),
    ("Safari", r"Version/(\d+)[^ ]* (?:Mobile/\S+ )?Safari/"),
    ("IE", r"(?:MSIE |Trident/.*rv:)(\d+)"),
];

const PLATFORM_RULES: &[(&str, &str)] = &[
    ("Windows", r"Windows"),
    ("Android", r"Android"),
    ("iOS", r"iPhone|iPad|iPod"),
    ("MacOS", r"Macintosh|Mac OS X"),
    ("Linux", r"Linux|X11"),
];

const CRAWLER_PATTERN: &str =
    r"(?i)bot\b|crawl|spider|slurp|bingpreview|mediapartners|facebookexternalhit|archiver";
const MOBILE_PATTERN: &str =
    r"(?i)mobile|android|iphone|ipod|windows phone|blackberry|opera mini|iemobile";

/// Browser, platform, and device flags extracted from a `User-Agent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AgentProfile {
    pub(crate) browser: String,
    pub(crate) platform: String,
    pub(crate) is_search_engine: bool,
    pub(crate) is_mobile_device: bool,
}

pub(crate) struct UserAgentClassifier {
    browsers: Vec<(&'static str, Regex)>,
    platforms: Vec<(&'static str, Regex)>,
    crawler: Regex,
    mobile: Regex,
}

impl UserAgentClassifier {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            browsers: compile(BROWSER_RULES)?,
            platforms: compile(PLATFORM_RULES)?,
            crawler: Regex::new(CRAWLER_PATTERN)?,
            mobile: Regex::new(MOBILE_PATTERN)?,
        })
    }

    pub(crate) fn classify(&self, agent: Option<&str>) -> AgentProfile {
        let agent = agent.unwrap_or_default().trim();
        let is_search_engine = !agent.is_empty() && self.crawler.is_match(agent);

        let browser = if is_search_engine {
            "Crawler".to_string()
        } else {
            self.browsers
                .iter()
                .find_map(|(name, pattern)| {
                    pattern
                        .captures(agent)
                        .and_then(|captures| captures.get(1))
                        .map(|version| format!("{name} {}", version.as_str()))
                })
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        let platform = self
            .platforms
            .iter()
            .find(|(_, pattern)| pattern.is_match(agent))
            .map_or(UNKNOWN, |(name, _)| *name)
            .to_string();

        AgentProfile {
            browser,
            platform,
            is_search_engine,
            is_mobile_device: self.mobile.is_match(agent),
        }
    }
}

fn compile(rules: &[(&'static str, &str)]) -> Result<Vec<(&'static str, Regex)>, regex::Error> {
    rules
        .iter()
        .map(|(name, pattern)| Regex::new(pattern).map(|regex| (*name, regex)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";
    const CHROME_ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0.6478.71 Mobile Safari/537.36";
    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    fn classifier() -> UserAgentClassifier {
        UserAgentClassifier::new().expect("patterns compile")
    }

    #[test]
    fn desktop_browsers() {
        let profile = classifier().classify(Some(FIREFOX_LINUX));
        assert_eq!(profile.browser, "Firefox 128");
        assert_eq!(profile.platform, "Linux");
        assert!(!profile.is_mobile_device);
        assert!(!profile.is_search_engine);

        let profile = classifier().classify(Some(EDGE_WINDOWS));
        assert_eq!(profile.browser, "Edge 126");
        assert_eq!(profile.platform, "Windows");
    }

    #[test]
    fn mobile_browsers() {
        let profile = classifier().classify(Some(SAFARI_IPHONE));
        assert_eq!(profile.browser, "Safari 17");
        assert_eq!(profile.platform, "iOS");
        assert!(profile.is_mobile_device);

        let profile = classifier().classify(Some(CHROME_ANDROID));
        assert_eq!(profile.browser, "Chrome 126");
        assert_eq!(profile.platform, "Android");
        assert!(profile.is_mobile_device);
    }

    #[test]
    fn crawlers_are_flagged() {
        let profile = classifier().classify(Some(GOOGLEBOT));
        assert!(profile.is_search_engine);
        assert_eq!(profile.browser, "Crawler");
    }

    #[test]
    fn missing_agent_is_unknown() {
        let profile = classifier().classify(None);
        assert_eq!(profile.browser, "Unknown");
        assert_eq!(profile.platform, "Unknown");
        assert!(!profile.is_search_engine);
        assert!(!profile.is_mobile_device);
    }
}
