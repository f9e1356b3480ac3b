use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;
use wikibot_core::config::DEFAULT_CONFIG_PATH;
use wikibot_core::regions::delete_with_lines;
use wikibot_core::{
    EngineConfig, NamespaceTable, PartialDocument, Template, TokenKind, WikiLink,
    find_article_links, find_bold_links, find_links, find_templates, load_config, split, tokenize,
};

#[derive(Debug, Parser)]
#[command(
    name = "wikibot",
    version,
    about = "Inspect and rewrite wikitext page bodies with the wikibot engine"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: PathBuf,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Print the token stream of a page as JSON")]
    Tokens(PageArgs),
    #[command(about = "Print the sections of a page at one heading level")]
    Sections(SectionsArgs),
    #[command(about = "Print parsed template invocations")]
    Templates(TemplatesArgs),
    #[command(about = "Print wiki links")]
    Links(LinksArgs),
    #[command(name = "set-arg", about = "Set a named argument on matching templates")]
    SetArg(SetArgArgs),
    #[command(
        name = "remove-template",
        about = "Delete matching templates and lines they leave empty"
    )]
    RemoveTemplate(RemoveTemplateArgs),
}

#[derive(Debug, Args)]
struct PageArgs {
    #[arg(help = "Page body file, or - for stdin")]
    file: PathBuf,
}

#[derive(Debug, Args)]
struct SectionsArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, default_value_t = 2)]
    level: usize,
}

#[derive(Debug, Args)]
struct TemplatesArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, value_name = "NAME", help = "Only templates with this name")]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct LinksArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, conflicts_with = "articles", help = "Only links written in bold")]
    bold: bool,
    #[arg(long, help = "Only links into the article namespace")]
    articles: bool,
}

#[derive(Debug, Args)]
struct SetArgArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, value_name = "NAME")]
    template: String,
    #[arg(long, value_name = "KEY")]
    arg: String,
    #[arg(long)]
    value: String,
    #[arg(long, help = "Write the result back instead of printing a diff")]
    write: bool,
}

#[derive(Debug, Args)]
struct RemoveTemplateArgs {
    #[command(flatten)]
    page: PageArgs,
    #[arg(long, value_name = "NAME")]
    name: String,
    #[arg(long, help = "Write the result back instead of printing a diff")]
    write: bool,
}

#[derive(Debug, Serialize)]
struct TokenRow<'a> {
    kind: TokenKind,
    start: usize,
    end: usize,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SectionRow<'a> {
    title: &'a str,
    heading: &'a str,
    body_bytes: usize,
}

#[derive(Debug, Serialize)]
struct TemplateRow {
    start: usize,
    end: usize,
    template: Template,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Tokens(args)) => run_tokens(&runtime, &args),
        Some(Commands::Sections(args)) => run_sections(&args),
        Some(Commands::Templates(args)) => run_templates(&args),
        Some(Commands::Links(args)) => run_links(&runtime, &args),
        Some(Commands::SetArg(args)) => run_set_arg(&args),
        Some(Commands::RemoveTemplate(args)) => run_remove_template(&args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn run_tokens(runtime: &RuntimeOptions, args: &PageArgs) -> Result<()> {
    let namespaces = resolve_namespaces(runtime)?;
    let content = read_page(&args.file)?;
    let rows: Vec<TokenRow<'_>> = tokenize(&content, &namespaces)
        .into_iter()
        .map(|token| TokenRow {
            kind: token.kind,
            start: token.span.start,
            end: token.span.end,
            text: &content[token.span],
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn run_sections(args: &SectionsArgs) -> Result<()> {
    if args.level == 0 {
        bail!("heading level must be at least 1");
    }
    let content = read_page(&args.page.file)?;
    let document = split(&content, args.level);
    let rows: Vec<SectionRow<'_>> = document
        .sections
        .iter()
        .map(|section| SectionRow {
            title: section.title(),
            heading: &section.heading,
            body_bytes: section.body.len(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn run_templates(args: &TemplatesArgs) -> Result<()> {
    let content = read_page(&args.page.file)?;
    let rows: Vec<TemplateRow> = find_templates(&content, args.name.as_deref())
        .into_iter()
        .map(|(span, template)| TemplateRow {
            start: span.start,
            end: span.end,
            template,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn run_links(runtime: &RuntimeOptions, args: &LinksArgs) -> Result<()> {
    let content = read_page(&args.page.file)?;
    let links: Vec<WikiLink> = if args.bold {
        find_bold_links(&content)
    } else if args.articles {
        let namespaces = resolve_namespaces(runtime)?;
        find_article_links(&content, &namespaces)
    } else {
        find_links(&content)
    };
    println!("{}", serde_json::to_string_pretty(&links)?);
    Ok(())
}

fn run_set_arg(args: &SetArgArgs) -> Result<()> {
    let content = read_page(&args.page.file)?;
    let mut document = PartialDocument::new(
        content.as_str(),
        find_templates(&content, Some(&args.template)),
    );
    let ids = document.ids();
    if ids.is_empty() {
        bail!("no {{{{{}}}}} invocation found", args.template);
    }
    tracing::debug!(count = ids.len(), template = %args.template, "setting argument");
    for id in ids {
        if let Some(template) = document.item_mut(id) {
            template.set(&args.arg, args.value.as_str());
        }
        document.refresh(id);
    }
    emit_result(&args.page.file, &content, &document.text(), args.write)
}

fn run_remove_template(args: &RemoveTemplateArgs) -> Result<()> {
    let content = read_page(&args.page.file)?;
    let spans: Vec<_> = find_templates(&content, Some(&args.name))
        .into_iter()
        .map(|(span, _)| span)
        .collect();
    if spans.is_empty() {
        bail!("no {{{{{}}}}} invocation found", args.name);
    }
    tracing::debug!(count = spans.len(), template = %args.name, "removing invocations");
    let rewritten = delete_with_lines(&content, &spans);
    emit_result(&args.page.file, &content, &rewritten, args.write)
}

fn emit_result(path: &Path, original: &str, rewritten: &str, write: bool) -> Result<()> {
    if original == rewritten {
        println!("No changes");
        return Ok(());
    }
    if write {
        if is_stdin(path) {
            print!("{rewritten}");
            return Ok(());
        }
        fs::write(path, rewritten)
            .with_context(|| format!("failed to write {}", normalize_path(path)))?;
        println!("Updated {}", normalize_path(path));
        return Ok(());
    }
    let label = normalize_path(path);
    let diff = TextDiff::from_lines(original, rewritten);
    print!(
        "{}",
        diff.unified_diff()
            .context_radius(2)
            .header(&label, &label)
    );
    Ok(())
}

fn resolve_namespaces(runtime: &RuntimeOptions) -> Result<NamespaceTable> {
    dotenvy::dotenv().ok();
    let config: EngineConfig = load_config(&runtime.config)?;
    Ok(config.namespace_table())
}

fn read_page(path: &Path) -> Result<String> {
    if is_stdin(path) {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("failed to read page from stdin")?;
        return Ok(content);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", normalize_path(path)))
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
