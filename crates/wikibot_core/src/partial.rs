//! A page held as alternating literal spans and recognised items.
//!
//! Items live in an arena addressed by [`ItemId`]; the ordered piece list maps
//! each item to the literal text it currently renders as. Concatenating the
//! pieces always yields the current page text with no gaps.

use std::fmt;
use std::ops::Range;

use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(usize);

#[derive(Debug, Clone)]
enum Literal {
    Source(Range<usize>),
    Owned(String),
}

#[derive(Debug, Clone)]
struct Piece {
    literal: Literal,
    item: Option<ItemId>,
}

#[derive(Debug, Clone)]
pub struct PartialDocument<T> {
    source: String,
    pieces: Vec<Piece>,
    items: Vec<Option<T>>,
}

impl<T> PartialDocument<T> {
    /// Build from `(span, item)` matches in increasing, non-overlapping order.
    /// Matches that break that order, fall outside the text or split a
    /// character are skipped.
    pub fn new(
        text: impl Into<String>,
        matches: impl IntoIterator<Item = (Range<usize>, T)>,
    ) -> Self {
        let source = text.into();
        let mut document = Self {
            source,
            pieces: Vec::new(),
            items: Vec::new(),
        };

        let mut cursor = 0usize;
        for (span, item) in matches {
            if span.start < cursor
                || span.start > span.end
                || span.end > document.source.len()
                || !document.source.is_char_boundary(span.start)
                || !document.source.is_char_boundary(span.end)
            {
                tracing::debug!(
                    start = span.start,
                    end = span.end,
                    cursor,
                    "skipping out-of-order partial document match"
                );
                continue;
            }
            if cursor < span.start {
                document.push_gap(cursor..span.start);
            }
            let id = ItemId(document.items.len());
            document.items.push(Some(item));
            document.pieces.push(Piece {
                literal: Literal::Source(span.clone()),
                item: Some(id),
            });
            cursor = span.end;
        }
        if cursor < document.source.len() {
            document.push_gap(cursor..document.source.len());
        }
        document
    }

    /// Build from every match of `pattern`; captures for which `parse`
    /// returns `None` stay literal text.
    pub fn from_regex<F>(text: impl Into<String>, pattern: &Regex, mut parse: F) -> Self
    where
        F: FnMut(&Captures<'_>) -> Option<T>,
    {
        let text = text.into();
        let matches: Vec<(Range<usize>, T)> = pattern
            .captures_iter(&text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                parse(&captures).map(|item| (whole.range(), item))
            })
            .collect();
        Self::new(text, matches)
    }

    fn push_gap(&mut self, span: Range<usize>) {
        self.pieces.push(Piece {
            literal: Literal::Source(span),
            item: None,
        });
    }

    fn literal<'a>(&'a self, literal: &'a Literal) -> &'a str {
        match literal {
            Literal::Source(span) => &self.source[span.clone()],
            Literal::Owned(text) => text,
        }
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        self.pieces.iter().position(|piece| piece.item == Some(id))
    }

    fn live_position(&self, id: ItemId, operation: &str) -> usize {
        match self.position(id) {
            Some(position) => position,
            None => panic!("{operation}: {id:?} is not a live item of this partial document"),
        }
    }

    /// Live items in document order.
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &T)> + '_ {
        self.pieces.iter().filter_map(|piece| {
            let id = piece.item?;
            self.items[id.0].as_ref().map(|item| (id, item))
        })
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items().map(|(id, _)| id).collect()
    }

    pub fn item(&self, id: ItemId) -> Option<&T> {
        self.items.get(id.0).and_then(Option::as_ref)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut T> {
        self.items.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current literal text of an item.
    pub fn span_text(&self, id: ItemId) -> Option<&str> {
        let position = self.position(id)?;
        Some(self.literal(&self.pieces[position].literal))
    }

    /// Replace the item's text. The handle stays valid.
    ///
    /// # Panics
    /// When `id` was removed or belongs to another document.
    pub fn update(&mut self, id: ItemId, text: impl Into<String>) {
        let position = self.live_position(id, "update");
        self.pieces[position].literal = Literal::Owned(text.into());
    }

    /// Drop the item and its text.
    ///
    /// # Panics
    /// When `id` was removed or belongs to another document.
    pub fn remove(&mut self, id: ItemId) -> T {
        let position = self.live_position(id, "remove");
        self.pieces.remove(position);
        match self.items[id.0].take() {
            Some(item) => item,
            None => panic!("remove: {id:?} has no item"),
        }
    }

    /// Insert `item` with empty text right after `after`, or at the front
    /// when `after` is `None` or not live.
    pub fn insert_after(&mut self, item: T, after: Option<ItemId>) -> ItemId {
        let position = after
            .and_then(|after| self.position(after))
            .map_or(0, |position| position + 1);
        let id = ItemId(self.items.len());
        self.items.push(Some(item));
        self.pieces.insert(
            position,
            Piece {
                literal: Literal::Owned(String::new()),
                item: Some(id),
            },
        );
        id
    }

    /// Byte offset where the item's text currently starts.
    pub fn offset(&self, id: ItemId) -> Option<usize> {
        let mut offset = 0usize;
        for piece in &self.pieces {
            if piece.item == Some(id) {
                return Some(offset);
            }
            offset += self.literal(&piece.literal).len();
        }
        None
    }

    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for piece in &self.pieces {
            out.push_str(self.literal(&piece.literal));
        }
        out
    }
}

impl<T: fmt::Display> PartialDocument<T> {
    /// Re-render an item after editing it through `item_mut`.
    pub fn refresh(&mut self, id: ItemId) {
        let rendered = match self.item(id) {
            Some(item) => item.to_string(),
            None => panic!("refresh: {id:?} is not a live item of this partial document"),
        };
        self.update(id, rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> PartialDocument<String> {
        let pattern = Regex::new(r"\w+").expect("pattern");
        PartialDocument::from_regex(text, &pattern, |captures| {
            Some(captures[0].to_uppercase())
        })
    }

    #[test]
    fn untouched_document_reproduces_source() {
        let text = "  alpha, beta;\ngamma  ";
        assert_eq!(words(text).text(), text);
        assert_eq!(words("").text(), "");
        assert_eq!(words("...").len(), 0);
    }

    #[test]
    fn items_come_back_in_document_order() {
        let document = words("one two three");
        let items: Vec<&String> = document.items().map(|(_, item)| item).collect();
        assert_eq!(items, vec!["ONE", "TWO", "THREE"]);
    }

    #[test]
    fn update_is_idempotent() {
        let mut document = words("a b c");
        let ids = document.ids();
        document.update(ids[1], "beta");
        let once = document.text();
        document.update(ids[1], "beta");
        assert_eq!(document.text(), once);
        assert_eq!(once, "a beta c");
        assert_eq!(document.span_text(ids[1]), Some("beta"));
    }

    #[test]
    fn remove_closes_the_gap() {
        let mut document = words("a b c");
        let ids = document.ids();
        let removed = document.remove(ids[1]);
        assert_eq!(removed, "B");
        assert_eq!(document.text(), "a  c");
        assert!(document.item(ids[1]).is_none());
        assert_eq!(document.len(), 2);
    }

    #[test]
    fn insert_after_places_empty_placeholder() {
        let mut document = words("a b");
        let ids = document.ids();
        let inserted = document.insert_after("NEW".to_string(), Some(ids[0]));
        assert_eq!(document.text(), "a b");
        document.update(inserted, "+x");
        assert_eq!(document.text(), "a+x b");

        let front = document.insert_after("FRONT".to_string(), None);
        document.update(front, ">");
        assert_eq!(document.text(), ">a+x b");
        assert_eq!(document.offset(inserted), Some(2));
    }

    #[test]
    fn insert_after_removed_item_goes_to_front() {
        let mut document = words("a b");
        let ids = document.ids();
        document.remove(ids[1]);
        let inserted = document.insert_after("Z".to_string(), Some(ids[1]));
        document.update(inserted, "z");
        assert_eq!(document.text(), "za ");
    }

    #[test]
    fn offsets_follow_edits() {
        let mut document = words("ab cd ef");
        let ids = document.ids();
        assert_eq!(document.offset(ids[2]), Some(6));
        document.update(ids[0], "abcd");
        assert_eq!(document.offset(ids[2]), Some(8));
    }

    #[test]
    fn overlapping_matches_are_skipped() {
        let document = PartialDocument::new(
            "abcdef",
            vec![(1..3, 'x'), (2..4, 'y'), (4..9, 'z'), (4..5, 'w')],
        );
        let items: Vec<char> = document.items().map(|(_, item)| *item).collect();
        assert_eq!(items, vec!['x', 'w']);
        assert_eq!(document.text(), "abcdef");
    }

    #[test]
    fn refresh_renders_edited_item() {
        let mut document = words("x y");
        let ids = document.ids();
        if let Some(item) = document.item_mut(ids[0]) {
            item.push('!');
        }
        document.refresh(ids[0]);
        assert_eq!(document.text(), "X! y");
    }

    #[test]
    #[should_panic(expected = "is not a live item")]
    fn update_of_removed_item_panics() {
        let mut document = words("a b");
        let ids = document.ids();
        document.remove(ids[0]);
        document.update(ids[0], "again");
    }
}
