//! Markview - render, watch and search markdown from the command line.
//!
//! # Usage
//!
//! ```bash
//! markview render README.md -o README.html
//! markview watch README.md --theme paper -o /tmp/preview.html
//! markview search README.md "install"
//! markview themes
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use markview::app::{App, HostContext, Notification, StatusLevel};
use markview::config::ConfigStore;
use markview::document::Renderer;
use markview::files::{enforce_file_limit, normalize_path, read_document};
use markview::theme::{Palette, ThemeSet};

/// A markdown viewer core: themed HTML, TOC, search and live reload
#[derive(Parser, Debug)]
#[command(name = "markview", version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Directory holding `<name>.css` theme files
    #[arg(long, value_name = "DIR", global = true)]
    themes_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a markdown file to a standalone HTML page
    Render {
        #[arg(value_name = "FILE")]
        file: String,

        /// Theme name (defaults to the configured theme)
        #[arg(long)]
        theme: Option<String>,

        /// Color palette (defaults to the configured palette)
        #[arg(long, value_enum)]
        palette: Option<Palette>,

        /// Font scale in percent, clamped to 50..=200
        #[arg(long, allow_negative_numbers = true)]
        font_scale: Option<i64>,

        /// Write the page here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Print the table of contents as JSON on stderr
        #[arg(long)]
        toc: bool,
    },

    /// Render a file and re-render it whenever it or its theme changes
    Watch {
        #[arg(value_name = "FILE")]
        file: String,

        /// Theme name, saved as the configured theme so its file is watched
        #[arg(long)]
        theme: Option<String>,

        /// Color palette (defaults to the configured palette)
        #[arg(long, value_enum)]
        palette: Option<Palette>,

        /// Page to keep up to date
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Search a markdown file and print the result as JSON
    Search {
        #[arg(value_name = "FILE")]
        file: String,

        query: String,

        #[arg(long)]
        case_sensitive: bool,
    },

    /// List available themes
    Themes,
}

fn config_store(cli: &Cli) -> ConfigStore {
    let defaults = ConfigStore::global();
    ConfigStore::new(
        cli.config
            .clone()
            .unwrap_or_else(|| defaults.path().to_path_buf()),
        cli.themes_dir
            .clone()
            .unwrap_or_else(|| defaults.themes_dir().to_path_buf()),
    )
}

fn load_text(config: &ConfigStore, file: &str) -> Result<String> {
    let path = normalize_path(file).context("No file given")?;
    enforce_file_limit(&path, config.max_file_bytes())?;
    Ok(read_document(&path)?)
}

fn write_output(output: Option<&Path>, html: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, html)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(html.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn render(
    config: &ConfigStore,
    file: &str,
    theme: Option<String>,
    palette: Option<Palette>,
    font_scale: Option<i64>,
    output: Option<&Path>,
    toc: bool,
) -> Result<()> {
    let text = load_text(config, file)?;
    let theme = theme.unwrap_or_else(|| config.theme());
    let palette = palette.unwrap_or_else(|| config.palette());
    let font_scale = font_scale.unwrap_or_else(|| config.font_scale().into());

    let renderer = Renderer::new(ThemeSet::new(config.themes_dir()));
    let page = renderer.render(&text, &theme, palette, font_scale)?;
    write_output(output, &page.html)?;
    if toc {
        eprintln!("{}", serde_json::to_string_pretty(&page.toc)?);
    }
    Ok(())
}

fn watch(
    app: &App,
    file: &str,
    theme: Option<String>,
    palette: Option<Palette>,
    output: &Path,
) -> Result<()> {
    if let Some(theme) = theme {
        app.set_theme(&theme)?;
    }
    let palette = palette.unwrap_or_else(|| app.config().palette());

    let (ctx, rx) = HostContext::channel();
    app.startup(ctx, [file]);

    let render_once = || -> Result<()> {
        let result = app.render_file_with_palette_and_toc(file, &app.theme(), palette.as_str())?;
        fs::write(output, result.html)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        tracing::info!(path = %result.path.display(), words = result.word_count, "rendered");
        Ok(())
    };

    render_once()?;
    app.start_watching_file(file)?;
    eprintln!("Watching {file} (Ctrl-C to stop)");

    for notification in rx {
        match notification {
            Notification::FileChanged(_) | Notification::ThemeChanged(_) => {
                if let Err(err) = render_once() {
                    eprintln!("[warn] {err:#}");
                }
            }
            Notification::Status(status) => {
                let level = match status.level {
                    StatusLevel::Warning => "warn",
                    StatusLevel::Error => "error",
                };
                eprintln!("[{level}] {}: {}", status.code, status.message);
            }
            Notification::FileOpen(_) => {}
        }
    }
    Ok(())
}

fn search(app: &App, file: &str, query: &str, case_sensitive: bool) -> Result<()> {
    let text = load_text(app.config(), file)?;
    app.set_current_document(&text);
    let result = app.search_document(query, case_sensitive)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config_store(&cli);

    match cli.command {
        Command::Render {
            file,
            theme,
            palette,
            font_scale,
            output,
            toc,
        } => render(&config, &file, theme, palette, font_scale, output.as_deref(), toc),
        Command::Watch {
            file,
            theme,
            palette,
            output,
        } => watch(&App::new(config), &file, theme, palette, &output),
        Command::Search {
            file,
            query,
            case_sensitive,
        } => search(&App::new(config), &file, &query, case_sensitive),
        Command::Themes => {
            for name in App::new(config).list_themes() {
                println!("{name}");
            }
            Ok(())
        }
    }
}
