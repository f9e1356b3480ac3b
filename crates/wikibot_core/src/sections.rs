//! Heading-delimited sections at a single `=` level.
//!
//! The splitter does not recurse: callers needing sub-sections re-split a
//! section body at `level + 1`.

use std::sync::LazyLock;

use regex::Regex;

pub const MAX_HEADING_LEVEL: usize = 6;

static HEADING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    (1..=MAX_HEADING_LEVEL)
        .map(|level| {
            let marks = "=".repeat(level);
            Regex::new(&format!(r"(?m)^{marks}[^=\n].*{marks}[^\S\n]*$"))
                .expect("heading pattern compiles")
        })
        .collect()
});

pub(crate) fn heading_pattern(level: usize) -> Option<&'static Regex> {
    if level == 0 {
        return None;
    }
    HEADING_PATTERNS.get(level - 1)
}

/// Heading line and body text exposed by every section type.
pub trait SectionText {
    fn heading(&self) -> &str;
    fn body(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: String,
    pub level: usize,
}

impl Section {
    pub fn title(&self) -> &str {
        heading_title(&self.heading, self.level)
    }

    /// Re-split the body at a deeper heading level. Levels not below this
    /// section's own yield the whole body as prefix.
    pub fn subsections(&self, level: usize) -> SectionedDocument<Section> {
        if level <= self.level {
            return SectionedDocument {
                prefix: self.body.clone(),
                sections: Vec::new(),
            };
        }
        split(&self.body, level)
    }
}

impl SectionText for Section {
    fn heading(&self) -> &str {
        &self.heading
    }

    fn body(&self) -> &str {
        &self.body
    }
}

/// A candidate section handed to the `split_with` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSection<'a> {
    pub heading: &'a str,
    pub body: &'a str,
    pub level: usize,
    /// Byte offset of the heading line in the split text.
    pub offset: usize,
}

impl RawSection<'_> {
    pub fn title(&self) -> &str {
        heading_title(self.heading, self.level)
    }

    pub fn to_section(&self) -> Section {
        Section {
            heading: self.heading.to_string(),
            body: self.body.to_string(),
            level: self.level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionedDocument<S> {
    pub prefix: String,
    pub sections: Vec<S>,
}

impl<S: SectionText> SectionedDocument<S> {
    /// Reassemble the page as `heading + "\n" + body + "\n"` per section, both
    /// trimmed at the end. Sections the hook rejected are not part of the output.
    pub fn full_text(&self) -> String {
        let mut out = self.prefix.clone();
        for section in &self.sections {
            out.push_str(section.heading().trim_end());
            out.push('\n');
            out.push_str(section.body().trim_end());
            out.push('\n');
        }
        out
    }
}

impl SectionedDocument<Section> {
    pub fn find(&self, title: &str) -> Option<&Section> {
        let wanted = normalize_title(title);
        self.sections
            .iter()
            .find(|section| normalize_title(section.title()) == wanted)
    }

    pub fn find_mut(&mut self, title: &str) -> Option<&mut Section> {
        let wanted = normalize_title(title);
        self.sections
            .iter_mut()
            .find(|section| normalize_title(section.title()) == wanted)
    }
}

pub fn split(text: &str, level: usize) -> SectionedDocument<Section> {
    split_with(text, level, |raw| Some(raw.to_section()))
}

/// Split `text` at headings of exactly `level` equals signs, passing every
/// candidate through `parse`. Candidates for which `parse` returns `None` are
/// dropped from the section list and therefore from `full_text`.
pub fn split_with<S, F>(text: &str, level: usize, mut parse: F) -> SectionedDocument<S>
where
    F: FnMut(RawSection<'_>) -> Option<S>,
{
    let Some(pattern) = heading_pattern(level) else {
        return SectionedDocument {
            prefix: text.to_string(),
            sections: Vec::new(),
        };
    };

    let headings: Vec<_> = pattern.find_iter(text).collect();
    let Some(first) = headings.first() else {
        return SectionedDocument {
            prefix: text.to_string(),
            sections: Vec::new(),
        };
    };

    let mut sections = Vec::new();
    for (index, heading) in headings.iter().enumerate() {
        let body_start = if text[heading.end()..].starts_with('\n') {
            heading.end() + 1
        } else {
            heading.end()
        };
        let body_end = headings
            .get(index + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let raw = RawSection {
            heading: heading.as_str(),
            body: &text[body_start..body_end],
            level,
            offset: heading.start(),
        };
        if let Some(section) = parse(raw) {
            sections.push(section);
        }
    }

    SectionedDocument {
        prefix: text[..first.start()].to_string(),
        sections,
    }
}

pub(crate) fn heading_title(heading: &str, level: usize) -> &str {
    let trimmed = heading.trim();
    let marks = "=".repeat(level);
    trimmed
        .strip_prefix(marks.as_str())
        .and_then(|rest| rest.strip_suffix(marks.as_str()))
        .unwrap_or(trimmed)
        .trim()
}

fn normalize_title(title: &str) -> String {
    title.replace('_', " ").trim().to_string()
}
