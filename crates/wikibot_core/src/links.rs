use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::NamespaceTable;

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\[\]|\n]+)(?:\|([^\[\]]*))?\]\]").expect("link pattern compiles")
});

static BOLD_RUN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'''(.+?)'''").expect("bold pattern compiles"));

static BOLD_DISPLAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\[\]|\n]+)\|'''([^\[\]\n]*?)'''\]\]").expect("bold link pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiLink {
    pub target: String,
    pub display: Option<String>,
    pub span: Range<usize>,
}

impl WikiLink {
    /// Target page without leading colon or `#fragment`, `_` read as space.
    pub fn page(&self) -> String {
        let target = self.target.trim().trim_start_matches(':');
        let target = target.split_once('#').map_or(target, |(page, _)| page);
        normalize_spaces(&target.replace('_', " "))
    }

    /// Namespace prefix of the target, if it names one the table knows.
    pub fn namespace(&self, namespaces: &NamespaceTable) -> Option<String> {
        let page = self.page();
        let (prefix, _) = page.split_once(':')?;
        let prefix = prefix.trim();
        namespaces
            .is_non_article(prefix)
            .then(|| prefix.to_string())
    }
}

pub fn find_links(text: &str) -> Vec<WikiLink> {
    links_in(text, 0..text.len())
}

fn links_in(text: &str, range: Range<usize>) -> Vec<WikiLink> {
    let offset = range.start;
    LINK_PATTERN
        .captures_iter(&text[range])
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let target = captures.get(1)?.as_str().trim();
            if target.is_empty() {
                return None;
            }
            Some(WikiLink {
                target: target.to_string(),
                display: captures.get(2).map(|display| display.as_str().to_string()),
                span: offset + whole.start()..offset + whole.end(),
            })
        })
        .collect()
}

/// Links written in bold: `'''[[a]]'''`, `'''text [[a]] text'''` and
/// `[[a|'''text''']]`. Plain links are left out.
pub fn find_bold_links(text: &str) -> Vec<WikiLink> {
    let mut by_offset = BTreeMap::new();
    for run in BOLD_RUN_PATTERN.captures_iter(text) {
        if let Some(inner) = run.get(1) {
            for link in links_in(text, inner.range()) {
                by_offset.entry(link.span.start).or_insert(link);
            }
        }
    }
    for captures in BOLD_DISPLAY_PATTERN.captures_iter(text) {
        let (Some(whole), Some(target)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let target = target.as_str().trim();
        if target.is_empty() {
            continue;
        }
        by_offset.entry(whole.start()).or_insert_with(|| WikiLink {
            target: target.to_string(),
            display: captures.get(2).map(|display| format!("'''{}'''", display.as_str())),
            span: whole.range(),
        });
    }
    by_offset.into_values().collect()
}

/// Links into the article namespace only.
pub fn find_article_links(text: &str, namespaces: &NamespaceTable) -> Vec<WikiLink> {
    find_links(text)
        .into_iter()
        .filter(|link| !link.page().is_empty() && link.namespace(namespaces).is_none())
        .collect()
}

fn normalize_spaces(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
