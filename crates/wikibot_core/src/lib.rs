//! Wikitext structure engine shared by the wiki maintenance tasks.
//!
//! Every task reads a page, locates a fragment (a section, a template
//! invocation, a bolded link, a line), rewrites only that fragment and submits
//! the whole page back. The modules here do the locating and the splicing;
//! fetching and saving pages happens elsewhere.

pub mod config;
pub mod error;
pub mod links;
pub mod partial;
pub mod regions;
pub mod sections;
pub mod template;
pub mod tokenizer;

pub use config::{EngineConfig, NamespaceTable, load_config};
pub use error::FormatError;
pub use links::{WikiLink, find_article_links, find_bold_links, find_links};
pub use partial::{ItemId, PartialDocument};
pub use sections::{RawSection, Section, SectionText, SectionedDocument, split, split_with};
pub use template::{Argument, Template, find_templates};
pub use tokenizer::{Token, TokenKind, tokenize};
