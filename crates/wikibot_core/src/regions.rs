use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::sections::{heading_pattern, heading_title};

static PROTECTED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?(?:-->|\z)|<nowiki\s*/>|<nowiki(?:\s[^>]*)?>.*?(?:</nowiki>|\z)")
        .expect("protected region pattern compiles")
});

/// Comment and nowiki spans, in order. Unclosed ones run to the end of text.
pub fn protected_regions(text: &str) -> Vec<Range<usize>> {
    PROTECTED_PATTERN
        .find_iter(text)
        .map(|found| found.range())
        .collect()
}

pub fn is_protected(regions: &[Range<usize>], offset: usize) -> bool {
    regions.iter().any(|region| region.contains(&offset))
}

/// The whole line holding `offset`, including its trailing newline. An offset
/// at or past the end of text yields an empty region at the end; one inside a
/// multi-byte character counts as that character's start.
pub fn line_at(text: &str, mut offset: usize) -> Range<usize> {
    if offset >= text.len() {
        return text.len()..text.len();
    }
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let start = text[..offset].rfind('\n').map_or(0, |index| index + 1);
    let end = text[offset..]
        .find('\n')
        .map_or(text.len(), |index| offset + index + 1);
    start..end
}

/// Title of the last heading at `level` that starts before `offset`.
pub fn enclosing_section(text: &str, offset: usize, level: usize) -> Option<String> {
    let pattern = heading_pattern(level)?;
    pattern
        .find_iter(text)
        .take_while(|heading| heading.start() < offset)
        .last()
        .map(|heading| heading_title(heading.as_str(), level).to_string())
}

/// Delete `regions` from `text`. Overlapping or touching regions are merged
/// and removal runs from the highest offset down.
pub fn remove_regions(text: &str, mut regions: Vec<Range<usize>>) -> String {
    for region in &mut regions {
        region.end = region.end.min(text.len());
    }
    regions.retain(|region| {
        region.start < region.end
            && text.is_char_boundary(region.start)
            && text.is_char_boundary(region.end)
    });
    regions.sort_by_key(|region| region.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(last) if region.start <= last.end => last.end = last.end.max(region.end),
            _ => merged.push(region),
        }
    }

    let mut out = text.to_string();
    for region in merged.into_iter().rev() {
        out.replace_range(region, "");
    }
    out
}

/// Non-empty lines made only of whitespace. Empty lines between paragraphs
/// are not included.
pub fn whitespace_only_lines(text: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for line in text.split_inclusive('\n') {
        let content = line
            .strip_suffix('\n')
            .map_or(line, |content| content.strip_suffix('\r').unwrap_or(content));
        if !content.is_empty() && content.trim().is_empty() {
            out.push(start..start + line.len());
        }
        start += line.len();
    }
    out
}

/// Delete each span. When the spans on a line are all of its non-whitespace
/// content, the whole line goes with them.
pub fn delete_with_lines(text: &str, spans: &[Range<usize>]) -> String {
    let mut entries: Vec<(Range<usize>, Range<usize>)> = spans
        .iter()
        .filter(|span| {
            span.start <= span.end
                && span.end <= text.len()
                && text.is_char_boundary(span.start)
                && text.is_char_boundary(span.end)
        })
        .map(|span| (lines_around(text, span), span.clone()))
        .collect();
    entries.sort_by_key(|(lines, _)| lines.start);

    let mut regions = Vec::with_capacity(entries.len());
    let mut entries = entries.into_iter().peekable();
    while let Some((mut lines, span)) = entries.next() {
        let mut group = vec![span];
        while let Some((next, _)) = entries.peek()
            && next.start < lines.end
        {
            if let Some((next, span)) = entries.next() {
                lines.end = lines.end.max(next.end);
                group.push(span);
            }
        }
        let local = group
            .iter()
            .map(|span| span.start - lines.start..span.end - lines.start)
            .collect();
        if remove_regions(&text[lines.clone()], local).trim().is_empty() {
            regions.push(lines);
        } else {
            regions.extend(group);
        }
    }
    remove_regions(text, regions)
}

fn lines_around(text: &str, span: &Range<usize>) -> Range<usize> {
    let start = text[..span.start].rfind('\n').map_or(0, |index| index + 1);
    let end = text[span.end..]
        .find('\n')
        .map_or(text.len(), |index| span.end + index + 1);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_at_returns_full_line_with_newline() {
        let text = "first\nsecond line\nlast";
        assert_eq!(&text[line_at(text, 8)], "second line\n");
        assert_eq!(&text[line_at(text, 0)], "first\n");
        assert_eq!(&text[line_at(text, 20)], "last");
        assert_eq!(line_at(text, text.len()), text.len()..text.len());
    }

    #[test]
    fn enclosing_section_uses_last_preceding_heading() {
        let text = "intro\n== One ==\na\n=== Sub ===\nb\n== Two ==\nc\n";
        assert_eq!(enclosing_section(text, 2, 2), None);
        let in_sub = text.find("\nb\n").expect("b") + 1;
        assert_eq!(enclosing_section(text, in_sub, 2).as_deref(), Some("One"));
        assert_eq!(enclosing_section(text, in_sub, 3).as_deref(), Some("Sub"));
        let in_two = text.rfind('c').expect("c");
        assert_eq!(enclosing_section(text, in_two, 2).as_deref(), Some("Two"));
    }

    #[test]
    fn removing_whitespace_only_lines_joins_neighbours() {
        let text = "first\n   \nthird";
        assert_eq!(remove_regions(text, whitespace_only_lines(text)), "first\nthird");
    }

    #[test]
    fn empty_lines_are_not_whitespace_only() {
        assert!(whitespace_only_lines("a\n\nb\n").is_empty());
    }

    #[test]
    fn crlf_empty_lines_are_not_whitespace_only() {
        assert!(whitespace_only_lines("a\r\n\r\nb\r\n").is_empty());
        assert_eq!(whitespace_only_lines("a\r\n \t\r\nb"), vec![3..7]);
    }

    #[test]
    fn line_at_inside_multibyte_char_snaps_back() {
        let text = "Привет\nмир";
        assert_eq!(&text[line_at(text, 1)], "Привет\n");
        let inside_second = text.find('м').expect("м") + 1;
        assert_eq!(&text[line_at(text, inside_second)], "мир");
    }

    #[test]
    fn remove_regions_merges_overlaps() {
        let text = "0123456789";
        assert_eq!(remove_regions(text, vec![5..7, 1..3, 2..4, 9..20]), "0478");
    }

    #[test]
    fn delete_with_lines_drops_lines_left_blank() {
        let text = "keep\n  {{Stub}}\nalso {{Stub}} here\nend";
        let first = text.find("{{Stub}}").expect("first");
        let second = text.rfind("{{Stub}}").expect("second");
        let spans = vec![first..first + 8, second..second + 8];
        assert_eq!(delete_with_lines(text, &spans), "keep\nalso  here\nend");
    }

    #[test]
    fn delete_with_lines_drops_line_emptied_by_several_spans() {
        let text = "a\n{{X}}{{X}}\nb\n";
        let spans = vec![2..7, 7..12];
        assert_eq!(delete_with_lines(text, &spans), "a\nb\n");
        assert_eq!(delete_with_lines(text, &spans[..1]), "a\n{{X}}\nb\n");
    }

    #[test]
    fn protected_regions_cover_comments_and_nowiki() {
        let text = "a <!-- b --> c <nowiki>d</nowiki> e <nowiki/> <!-- open";
        let regions = protected_regions(text);
        let texts: Vec<&str> = regions.iter().map(|region| &text[region.clone()]).collect();
        assert_eq!(
            texts,
            vec!["<!-- b -->", "<nowiki>d</nowiki>", "<nowiki/>", "<!-- open"]
        );
        assert!(is_protected(&regions, text.find('b').expect("b")));
        assert!(!is_protected(&regions, text.find('c').expect("c")));
    }
}
