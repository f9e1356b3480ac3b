use wikibot_core::regions::{
    delete_with_lines, enclosing_section, remove_regions, whitespace_only_lines,
};
use wikibot_core::{
    NamespaceTable, PartialDocument, Template, TokenKind, find_bold_links, find_templates, split,
    tokenize,
};

const PAGE: &str = "{{Archive header|days=7}}\n\
Intro text with '''[[Moscow]]'''.\n\
\n\
== Request one ==\n\
Please review. {{Status|open|by=Alice}}\n\
\n\
== Request two ==\n\
Done already.\n\
{{Status|closed}}\n\
<!-- {{Status|ignored}} -->\n";

#[test]
fn tokens_concatenate_back_to_the_page() {
    let tokens = tokenize(PAGE, &NamespaceTable::default());
    let joined: String = tokens.iter().map(|token| token.text(PAGE)).collect();
    assert_eq!(joined, PAGE);
    assert!(tokens.iter().any(|token| token.kind == TokenKind::Comment));
    assert_eq!(
        tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Template)
            .count(),
        3
    );
}

#[test]
fn template_edit_leaves_everything_else_untouched() {
    let mut document = PartialDocument::new(PAGE, find_templates(PAGE, Some("status")));
    assert_eq!(document.len(), 2);

    let ids = document.ids();
    let open = ids
        .iter()
        .copied()
        .find(|id| {
            document
                .item(*id)
                .is_some_and(|template| template.positional(0) == Some("open"))
        })
        .expect("open request");
    let offset = document.offset(open).expect("offset");
    assert_eq!(
        enclosing_section(PAGE, offset, 2).as_deref(),
        Some("Request one")
    );

    if let Some(template) = document.item_mut(open) {
        template.args[0].value = "closed".to_string();
        template.set("by", "Bob");
    }
    document.refresh(open);
    document.refresh(open);

    let expected = PAGE.replace("{{Status|open|by=Alice}}", "{{Status|closed|by=Bob}}");
    assert_eq!(document.text(), expected);
}

#[test]
fn removing_a_template_drops_its_now_empty_line() {
    let spans: Vec<_> = find_templates(PAGE, Some("Status"))
        .into_iter()
        .map(|(span, _)| span)
        .collect();
    let rewritten = delete_with_lines(PAGE, &spans);
    assert!(rewritten.contains("Please review. \n"));
    assert!(rewritten.contains("Done already.\n<!-- {{Status|ignored}} -->\n"));
}

#[test]
fn blanked_line_is_stripped_by_region_removal() {
    let text = "first line\n{{Obsolete}}\nthird line";
    let (span, _) = find_templates(text, None).remove(0);
    let blanked = format!("{}   {}", &text[..span.start], &text[span.end..]);
    assert_eq!(
        remove_regions(&blanked, whitespace_only_lines(&blanked)),
        "first line\nthird line"
    );
}

#[test]
fn sections_round_trip_and_edit() {
    let mut document = split(PAGE, 2);
    // Trailing blank lines inside a section are normalised away.
    assert_eq!(
        document.full_text(),
        PAGE.replace("\n\n== Request two", "\n== Request two")
    );

    let section = document.find_mut("Request two").expect("section");
    section.body = "Archived.\n".to_string();
    let rewritten = document.full_text();
    assert!(rewritten.ends_with("== Request two ==\nArchived.\n"));
    assert!(rewritten.starts_with("{{Archive header|days=7}}\nIntro text"));
}

#[test]
fn bold_links_and_template_order_survive() {
    let links = find_bold_links(PAGE);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target, "Moscow");

    let template = Template::parse("{{T|a|b|n=c|d}}").expect("parse");
    assert_eq!(template.to_string(), "{{T|a|b|n=c|d}}");
}
