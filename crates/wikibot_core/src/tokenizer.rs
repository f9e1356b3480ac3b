//! Flat tokenization of wikitext.
//!
//! The scanner makes one left-to-right pass and never fails: anything it
//! cannot close degrades to `Text`. Token spans are disjoint and cover the
//! whole input, so concatenating token texts reproduces the source exactly.

use std::ops::Range;

use serde::Serialize;

use crate::config::NamespaceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Text,
    Whitespace,
    NewLine,
    Link,
    Template,
    Comment,
    NoWiki,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }
}

/// Construct currently being scanned. Links and templates stay unconfirmed
/// until a `|` is seen; an unconfirmed construct is abandoned at a newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Comment,
    NoWiki,
    Link {
        confirmed: bool,
        file: bool,
        depth: usize,
    },
    Template {
        confirmed: bool,
        depth: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    CommentOpen,
    NoWikiOpen,
    LinkOpen,
    LinkClose,
    TemplateOpen,
    TemplateClose,
    Pipe,
    NewLine,
    Space(usize),
}

impl Marker {
    fn len(self) -> usize {
        match self {
            Self::CommentOpen => 4,
            Self::NoWikiOpen => 7,
            Self::LinkOpen | Self::LinkClose | Self::TemplateOpen | Self::TemplateClose => 2,
            Self::Pipe | Self::NewLine => 1,
            Self::Space(len) => len,
        }
    }
}

const COMMENT_CLOSE: &str = "-->";
const NOWIKI_CLOSE: &str = "</nowiki>";

pub fn tokenize(text: &str, namespaces: &NamespaceTable) -> Vec<Token> {
    let mut scanner = Scanner {
        text,
        bytes: text.as_bytes(),
        namespaces,
        state: State::None,
        pending: 0,
        cursor: 0,
        tokens: Vec::new(),
    };
    scanner.run();
    merge_plain(scanner.tokens, text)
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    namespaces: &'a NamespaceTable,
    state: State,
    /// Start of the span not yet emitted. While a construct is open this is
    /// the construct's opening marker.
    pending: usize,
    cursor: usize,
    tokens: Vec<Token>,
}

impl Scanner<'_> {
    fn run(&mut self) {
        while self.cursor < self.bytes.len() {
            match self.state {
                State::Comment => self.close_at(COMMENT_CLOSE, false, TokenKind::Comment),
                State::NoWiki => self.close_at(NOWIKI_CLOSE, true, TokenKind::NoWiki),
                _ => match marker_at(self.bytes, self.cursor) {
                    Some(marker) => self.step(marker),
                    None => self.cursor += 1,
                },
            }
        }
        self.state = State::None;
        self.flush_text(self.bytes.len());
    }

    fn step(&mut self, marker: Marker) {
        let at = self.cursor;
        match (self.state, marker) {
            (State::None, Marker::CommentOpen) => {
                self.open(State::Comment);
                self.cursor = at + marker.len();
            }
            (State::None, Marker::NoWikiOpen) => self.open_nowiki(),
            (State::None | State::Link { .. }, Marker::LinkOpen) => {
                if let State::Link {
                    file: true,
                    depth: 0,
                    confirmed,
                } = self.state
                {
                    self.state = State::Link {
                        confirmed,
                        file: true,
                        depth: 1,
                    };
                } else {
                    // Ordinary links do not nest; the outer one stays text.
                    let file = self.is_file_link(at + 2);
                    self.open(State::Link {
                        confirmed: false,
                        file,
                        depth: 0,
                    });
                }
                self.cursor = at + 2;
            }
            (State::None, Marker::TemplateOpen) => {
                self.open(State::Template {
                    confirmed: false,
                    depth: 0,
                });
                self.cursor = at + 2;
            }
            (State::None, Marker::NewLine) => {
                self.flush_text(at);
                self.emit(TokenKind::NewLine, at..at + 1);
                self.pending = at + 1;
                self.cursor = at + 1;
            }
            (State::None, Marker::Space(len)) => {
                self.flush_text(at);
                self.emit(TokenKind::Whitespace, at..at + len);
                self.pending = at + len;
                self.cursor = at + len;
            }
            (
                State::Link {
                    confirmed: false, ..
                }
                | State::Template {
                    confirmed: false, ..
                },
                Marker::NewLine,
            ) => {
                // Abandon the construct; its text, newline included, joins
                // the pending plain text.
                self.state = State::None;
                self.cursor = at + 1;
            }
            (State::Link { file, depth, .. }, Marker::Pipe) => {
                self.state = State::Link {
                    confirmed: true,
                    file,
                    depth,
                };
                self.cursor = at + 1;
            }
            (State::Template { depth, .. }, Marker::Pipe) => {
                self.state = State::Template {
                    confirmed: true,
                    depth,
                };
                self.cursor = at + 1;
            }
            (
                State::Link {
                    confirmed,
                    file,
                    depth,
                },
                Marker::LinkClose,
            ) => {
                if depth == 0 {
                    self.close(TokenKind::Link, at + 2);
                } else {
                    self.state = State::Link {
                        confirmed,
                        file,
                        depth: depth - 1,
                    };
                }
                self.cursor = at + 2;
            }
            (State::Template { confirmed, depth }, Marker::TemplateOpen) => {
                self.state = State::Template {
                    confirmed,
                    depth: depth + 1,
                };
                self.cursor = at + 2;
            }
            (State::Template { confirmed, depth }, Marker::TemplateClose) => {
                if depth == 0 {
                    self.close(TokenKind::Template, at + 2);
                } else {
                    self.state = State::Template {
                        confirmed,
                        depth: depth - 1,
                    };
                }
                self.cursor = at + 2;
            }
            (_, marker) => self.cursor = at + marker.len(),
        }
    }

    fn open(&mut self, state: State) {
        self.flush_text(self.cursor);
        self.pending = self.cursor;
        self.state = state;
    }

    fn open_nowiki(&mut self) {
        let at = self.cursor;
        let Some(gt) = self.text[at..].find('>').map(|offset| at + offset) else {
            self.cursor = at + Marker::NoWikiOpen.len();
            return;
        };
        self.flush_text(at);
        self.pending = at;
        if self.bytes[gt - 1] == b'/' {
            self.close(TokenKind::NoWiki, gt + 1);
        } else {
            self.state = State::NoWiki;
        }
        self.cursor = gt + 1;
    }

    fn close_at(&mut self, marker: &str, ignore_case: bool, kind: TokenKind) {
        let found = if ignore_case {
            find_ignore_ascii_case(&self.text[self.cursor..], marker)
        } else {
            self.text[self.cursor..].find(marker)
        };
        match found {
            Some(offset) => {
                let end = self.cursor + offset + marker.len();
                self.close(kind, end);
                self.cursor = end;
            }
            None => self.cursor = self.bytes.len(),
        }
    }

    fn close(&mut self, kind: TokenKind, end: usize) {
        self.emit(kind, self.pending..end);
        self.pending = end;
        self.state = State::None;
    }

    fn flush_text(&mut self, end: usize) {
        if self.pending < end {
            self.emit(TokenKind::Text, self.pending..end);
            self.pending = end;
        }
    }

    fn emit(&mut self, kind: TokenKind, span: Range<usize>) {
        self.tokens.push(Token { kind, span });
    }

    /// `start` points just past `[[`.
    fn is_file_link(&self, start: usize) -> bool {
        let rest = &self.text[start..];
        let head_end = rest.find(['|', ']', '\n']).unwrap_or(rest.len());
        let head = rest[..head_end].trim_start().trim_start_matches(':');
        match head.split_once(':') {
            Some((prefix, _)) => self.namespaces.is_file(prefix),
            None => false,
        }
    }
}

fn marker_at(bytes: &[u8], at: usize) -> Option<Marker> {
    let rest = &bytes[at..];
    match rest[0] {
        b'<' if rest.starts_with(b"<!--") => Some(Marker::CommentOpen),
        b'<' if rest.len() > 7
            && rest[..7].eq_ignore_ascii_case(b"<nowiki")
            && (rest[7] == b'>' || rest[7] == b'/' || rest[7].is_ascii_whitespace()) =>
        {
            Some(Marker::NoWikiOpen)
        }
        b'[' if rest.starts_with(b"[[") => Some(Marker::LinkOpen),
        b']' if rest.starts_with(b"]]") => Some(Marker::LinkClose),
        b'{' if rest.starts_with(b"{{") => Some(Marker::TemplateOpen),
        b'}' if rest.starts_with(b"}}") => Some(Marker::TemplateClose),
        b'|' => Some(Marker::Pipe),
        b'\n' => Some(Marker::NewLine),
        byte if is_inline_space(byte) => {
            let len = rest
                .iter()
                .take_while(|byte| is_inline_space(**byte))
                .count();
            Some(Marker::Space(len))
        }
        _ => None,
    }
}

fn is_inline_space(byte: u8) -> bool {
    byte != b'\n' && byte.is_ascii_whitespace()
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Join runs of adjacent Text/Whitespace tokens. A merged run is Whitespace
/// only when every character in it is whitespace.
fn merge_plain(tokens: Vec<Token>, text: &str) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(last) = out.last_mut()
            && is_plain(last.kind)
            && is_plain(token.kind)
            && last.span.end == token.span.start
        {
            last.span.end = token.span.end;
            last.kind = if text[last.span.clone()].chars().all(char::is_whitespace) {
                TokenKind::Whitespace
            } else {
                TokenKind::Text
            };
            continue;
        }
        out.push(token);
    }
    out
}

fn is_plain(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Text | TokenKind::Whitespace)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn kinds_and_texts(text: &str) -> Vec<(TokenKind, &str)> {
        tokenize(text, &NamespaceTable::default())
            .iter()
            .map(|token| (token.kind, token.text(text)))
            .collect()
    }

    #[rstest]
    #[case("")]
    #[case("plain words and  spaces\n\nsecond line")]
    #[case("{{unterminated|template")]
    #[case("<!-- open comment [[x]]")]
    #[case("[[a|b]] {{c|{{d}}}} <nowiki>[[e]]</nowiki> <!-- f -->\n")]
    #[case("Привет [[мир|всем]]\t{{шаблон|x=y}}")]
    #[case("]] }} | --> </nowiki>")]
    fn tokens_cover_input_exactly(#[case] text: &str) {
        let tokens = tokenize(text, &NamespaceTable::default());
        let joined: String = tokens.iter().map(|token| token.text(text)).collect();
        assert_eq!(joined, text);
        for pair in tokens.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
    }

    #[test]
    fn newline_before_pipe_aborts_link() {
        assert_eq!(
            kinds_and_texts("[[link\nwith an enter]]"),
            vec![(TokenKind::Text, "[[link\nwith an enter]]")]
        );
    }

    #[test]
    fn pipe_confirms_link_across_newline() {
        assert_eq!(
            kinds_and_texts("[[link|\nwith an enter]]"),
            vec![(TokenKind::Link, "[[link|\nwith an enter]]")]
        );
    }

    #[test]
    fn file_link_allows_one_nested_link() {
        let text = "[[File:link|nested [[link]] is allowed]]";
        assert_eq!(kinds_and_texts(text), vec![(TokenKind::Link, text)]);
    }

    #[test]
    fn ordinary_link_does_not_nest() {
        assert_eq!(
            kinds_and_texts("[[NonFile:link|nested [[link]] isnt allowed]]"),
            vec![
                (TokenKind::Text, "[[NonFile:link|nested "),
                (TokenKind::Link, "[[link]]"),
                (TokenKind::Text, " isnt allowed]]"),
            ]
        );
    }

    #[test]
    fn newline_is_its_own_token() {
        assert_eq!(
            kinds_and_texts("a b\n  \nc"),
            vec![
                (TokenKind::Text, "a b"),
                (TokenKind::NewLine, "\n"),
                (TokenKind::Whitespace, "  "),
                (TokenKind::NewLine, "\n"),
                (TokenKind::Text, "c"),
            ]
        );
    }

    #[test]
    fn nested_templates_close_on_matching_braces() {
        assert_eq!(
            kinds_and_texts("x {{outer|{{inner}}|y}} z"),
            vec![
                (TokenKind::Text, "x "),
                (TokenKind::Template, "{{outer|{{inner}}|y}}"),
                (TokenKind::Text, " z"),
            ]
        );
    }

    #[test]
    fn multiline_template_needs_a_pipe_first() {
        assert_eq!(
            kinds_and_texts("{{Card\n}}"),
            vec![(TokenKind::Text, "{{Card\n}}")]
        );
        assert_eq!(
            kinds_and_texts("{{Card|\nname=x\n}}"),
            vec![(TokenKind::Template, "{{Card|\nname=x\n}}")]
        );
    }

    #[test]
    fn comments_and_nowiki_span_newlines() {
        assert_eq!(
            kinds_and_texts("<!-- a\n[[b]] -->x<NOWIKI>{{c\n}}</nowiki>"),
            vec![
                (TokenKind::Comment, "<!-- a\n[[b]] -->"),
                (TokenKind::Text, "x"),
                (TokenKind::NoWiki, "<NOWIKI>{{c\n}}</nowiki>"),
            ]
        );
    }

    #[test]
    fn self_closing_nowiki_is_a_single_token() {
        assert_eq!(
            kinds_and_texts("a<nowiki />[[b]]"),
            vec![
                (TokenKind::Text, "a"),
                (TokenKind::NoWiki, "<nowiki />"),
                (TokenKind::Link, "[[b]]"),
            ]
        );
    }

    #[test]
    fn unterminated_constructs_become_text() {
        assert_eq!(
            kinds_and_texts("see [[open link"),
            vec![(TokenKind::Text, "see [[open link")]
        );
        assert_eq!(
            kinds_and_texts("<nowiki>never closed"),
            vec![(TokenKind::Text, "<nowiki>never closed")]
        );
    }

    #[test]
    fn retokenizing_is_deterministic() {
        let text = "== H ==\n{{a|b}} [[c]]<!-- d -->\n";
        let table = NamespaceTable::default();
        assert_eq!(tokenize(text, &table), tokenize(text, &table));
    }
}
