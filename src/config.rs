// src/config.rs
use crate::constants::{DEFAULT_DELAY_MS, DEFAULT_MAX_CONCURRENT, DEFAULT_OUTPUT_DIR};
use crate::error::AppError;
use crate::export::SpaceFilter;
use crate::types::{BaseUrl, Credentials, PageId, SpaceKey, ValidationError};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL_VAR: &str = "CONFLUENCE_BASE_URL";
pub const USERNAME_VAR: &str = "CONFLUENCE_USERNAME";
pub const API_TOKEN_VAR: &str = "CONFLUENCE_API_TOKEN";
pub const METRICS_URL_VAR: &str = "WIKI2MD_METRICS_URL";

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    #[command(subcommand)]
    pub command: Command,

    /// Directory the export is written to
    #[arg(short, long, global = true, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Output format for each page
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Maximum number of pages exported at the same time
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CONCURRENT)]
    pub max_concurrent: usize,

    /// Pause after each page export before its slot is released, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// Nest page directories under their ancestors
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    pub preserve_hierarchy: bool,

    /// Download images referenced by pages
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    pub include_images: bool,

    /// Download attachments linked from pages
    #[arg(long, global = true, default_value_t = false, action = ArgAction::Set)]
    pub include_attachments: bool,

    /// Write an INDEX.md for each exported space
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    pub create_index: bool,

    /// Only export these space keys (comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub include_spaces: Vec<String>,

    /// Never export these space keys (comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub exclude_spaces: Vec<String>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Export a single page by id or URL
    Page { id: String },
    /// Export every page of a space
    Space { key: String },
    /// Export a page and all of its descendants
    Hierarchy { id: String },
    /// Export every space
    All,
    /// List the spaces visible to the configured account
    ListSpaces,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Markdown,
    Html,
    Both,
}

impl OutputFormat {
    pub fn writes_markdown(&self) -> bool {
        matches!(self, OutputFormat::Markdown | OutputFormat::Both)
    }

    pub fn writes_html(&self) -> bool {
        matches!(self, OutputFormat::Html | OutputFormat::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
            OutputFormat::Both => "both",
        }
    }
}

/// What a run exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    Page(PageId),
    Space(SpaceKey),
    Hierarchy(PageId),
    AllSpaces,
    ListSpaces,
}

impl ExportScope {
    pub fn name(&self) -> &'static str {
        match self {
            ExportScope::Page(_) => "page",
            ExportScope::Space(_) => "space",
            ExportScope::Hierarchy(_) => "hierarchy",
            ExportScope::AllSpaces => "all",
            ExportScope::ListSpaces => "list-spaces",
        }
    }
}

/// Settings the exporter runs with. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub max_concurrent: usize,
    pub delay: Duration,
    pub preserve_hierarchy: bool,
    pub include_images: bool,
    pub include_attachments: bool,
    pub create_index: bool,
    pub spaces: SpaceFilter,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            format: OutputFormat::Markdown,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            preserve_hierarchy: true,
            include_images: true,
            include_attachments: false,
            create_index: true,
            spaces: SpaceFilter::default(),
        }
    }
}

/// Where the wiki lives and who we are.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub base_url: BaseUrl,
    pub credentials: Credentials,
    pub metrics_url: Option<String>,
}

/// Resolved pipeline configuration, validated and ready to run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scope: ExportScope,
    pub export: ExportConfig,
    pub connection: ConnectionSettings,
    pub verbose: bool,
}

impl PipelineConfig {
    /// Resolves a complete pipeline configuration from CLI input and environment.
    pub fn resolve(cli: CommandLineInput) -> Result<Self, AppError> {
        Self::resolve_with(cli, |name| std::env::var(name).ok())
    }

    /// Resolves against an arbitrary variable lookup.
    pub fn resolve_with<F>(cli: CommandLineInput, env: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            env(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    AppError::MissingConfiguration(format!(
                        "{} environment variable not set",
                        name
                    ))
                })
        };

        let base_url = BaseUrl::parse(&required(BASE_URL_VAR)?)?;
        let credentials = Credentials::new(required(USERNAME_VAR)?, required(API_TOKEN_VAR)?)?;
        let metrics_url = env(METRICS_URL_VAR).filter(|url| !url.trim().is_empty());

        if cli.max_concurrent == 0 {
            return Err(ValidationError::OutOfBounds {
                value: 0,
                min: 1,
                max: u64::MAX,
            }
            .into());
        }

        let scope = match cli.command {
            Command::Page { id } => ExportScope::Page(PageId::parse(&id)?),
            Command::Space { key } => ExportScope::Space(SpaceKey::new(key)?),
            Command::Hierarchy { id } => ExportScope::Hierarchy(PageId::parse(&id)?),
            Command::All => ExportScope::AllSpaces,
            Command::ListSpaces => ExportScope::ListSpaces,
        };

        Ok(PipelineConfig {
            scope,
            export: ExportConfig {
                output_dir: cli.output_dir,
                format: cli.format,
                max_concurrent: cli.max_concurrent,
                delay: Duration::from_millis(cli.delay_ms),
                preserve_hierarchy: cli.preserve_hierarchy,
                include_images: cli.include_images,
                include_attachments: cli.include_attachments,
                create_index: cli.create_index,
                spaces: SpaceFilter::new(cli.include_spaces, cli.exclude_spaces),
            },
            connection: ConnectionSettings {
                base_url,
                credentials,
                metrics_url,
            },
            verbose: cli.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (BASE_URL_VAR, "https://acme.atlassian.net"),
            (USERNAME_VAR, "me@acme.com"),
            (API_TOKEN_VAR, "token"),
        ])
    }

    fn resolve(args: &[&str], vars: HashMap<&'static str, &'static str>) -> Result<PipelineConfig, AppError> {
        let cli = CommandLineInput::try_parse_from(args).unwrap();
        PipelineConfig::resolve_with(cli, |name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&["wiki2md", "space", "ENG"], env()).unwrap();
        assert_eq!(config.scope, ExportScope::Space(SpaceKey::new("ENG").unwrap()));
        assert_eq!(config.export.output_dir, PathBuf::from("./export"));
        assert_eq!(config.export.format, OutputFormat::Markdown);
        assert_eq!(config.export.max_concurrent, 5);
        assert_eq!(config.export.delay, Duration::from_millis(100));
        assert!(config.export.preserve_hierarchy);
        assert!(config.export.include_images);
        assert!(!config.export.include_attachments);
        assert!(config.export.create_index);
        assert!(config.connection.metrics_url.is_none());
    }

    #[test]
    fn test_options_after_subcommand() {
        let config = resolve(
            &[
                "wiki2md",
                "all",
                "--format",
                "both",
                "--preserve-hierarchy",
                "false",
                "--include-spaces",
                "A,B",
                "--exclude-spaces",
                "b",
                "--max-concurrent",
                "2",
            ],
            env(),
        )
        .unwrap();
        assert_eq!(config.scope, ExportScope::AllSpaces);
        assert_eq!(config.export.format, OutputFormat::Both);
        assert!(!config.export.preserve_hierarchy);
        assert_eq!(config.export.max_concurrent, 2);
        assert!(config.export.spaces.allows("A"));
        assert!(!config.export.spaces.allows("B"));
        assert!(!config.export.spaces.allows("C"));
    }

    #[test]
    fn test_page_url_accepted() {
        let config = resolve(
            &["wiki2md", "page", "https://acme.atlassian.net/wiki/spaces/ENG/pages/123/Title"],
            env(),
        )
        .unwrap();
        assert_eq!(config.scope, ExportScope::Page(PageId::parse("123").unwrap()));
    }

    #[test]
    fn test_missing_token() {
        let mut vars = env();
        vars.remove(API_TOKEN_VAR);
        let err = resolve(&["wiki2md", "list-spaces"], vars).unwrap_err();
        assert!(matches!(err, AppError::MissingConfiguration(msg) if msg.contains(API_TOKEN_VAR)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = resolve(&["wiki2md", "all", "--max-concurrent", "0"], env());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_format_flags() {
        assert!(OutputFormat::Both.writes_markdown() && OutputFormat::Both.writes_html());
        assert!(!OutputFormat::Html.writes_markdown());
        assert!(!OutputFormat::Markdown.writes_html());
    }
}
