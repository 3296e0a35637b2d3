//! KeyHighlight CLI
//!
//! Tools for inspecting exported extension settings and previewing how a
//! page would be highlighted.

use std::fs;
use std::io::Read;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use kh_core::{
    build_highlight_plan, find_matching_profiles, generate_signature, matching_pattern_entry, parse_keywords_with,
    parse_url_list, BoundaryCompiler, KeywordDelimiters, StoredSettings,
};
use kh_page::settings::JsonStore;
use kh_page::{ContentRuntime, Document, OutboundMessage, RuntimeConfig};

#[derive(Parser)]
#[command(name = "kh-cli")]
#[command(about = "KeyHighlight profile inspection and preview tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ParseMode {
    /// Commas, semicolons, pipes, tabs and newlines
    FreeText,
    /// Like free text, but newlines are kept inside keywords
    FormField,
    CommaOnly,
    /// URL pattern list
    Urls,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which profiles apply to a URL
    Match {
        /// Exported settings JSON
        #[arg(short, long)]
        settings: String,

        /// Page URL
        #[arg(short, long)]
        url: String,
    },

    /// Print the keyword color plan for a URL
    Colors {
        #[arg(short, long)]
        settings: String,

        #[arg(short, long)]
        url: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Split keyword text the way the editor does
    Parse {
        /// Text to split; read from stdin when omitted
        text: Option<String>,

        #[arg(short, long, value_enum, default_value = "free-text")]
        mode: ParseMode,
    },

    /// Print the boundary pattern compiled for each keyword
    Pattern {
        #[arg(required = true)]
        keywords: Vec<String>,
    },

    /// Highlight a text file (one paragraph per line) and print the markup
    Highlight {
        #[arg(short, long)]
        settings: String,

        #[arg(short, long)]
        url: String,

        /// Text file to highlight
        #[arg(short, long)]
        input: String,

        /// Print the whole document, including injected styles
        #[arg(long)]
        full: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Match { settings, url } => cmd_match(&settings, &url),
        Commands::Colors { settings, url, json } => cmd_colors(&settings, &url, json),
        Commands::Parse { text, mode } => cmd_parse(text, mode),
        Commands::Pattern { keywords } => cmd_pattern(&keywords),
        Commands::Highlight {
            settings,
            url,
            input,
            full,
            verbose,
        } => cmd_highlight(&settings, &url, &input, full, verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_settings(path: &str) -> Result<StoredSettings, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    JsonStore::parse(&content).map_err(|e| format!("Invalid settings '{}': {}", path, e))
}

fn cmd_match(settings_path: &str, url: &str) -> Result<(), String> {
    let settings = load_settings(settings_path)?;
    let matching = find_matching_profiles(&settings.profiles, url);

    println!("URL: {}", url);
    println!("  Enabled:  {}", settings.extension_enabled);
    println!(
        "  Profiles: {} stored, {} active, {} matching",
        settings.profiles.len(),
        settings.profiles.iter().filter(|p| p.is_active()).count(),
        matching.len()
    );

    for profile in &matching {
        let name = profile.name.as_deref().unwrap_or("(unnamed)");
        let pattern = matching_pattern_entry(profile, url)
            .map(|entry| entry.url_pattern.raw().join(", "))
            .unwrap_or_else(|| "(legacy pattern)".to_string());
        println!("  - {} [{}] via {}", profile.id, name, pattern);
    }

    println!("  Signature: {}", generate_signature(matching.iter().copied()));
    Ok(())
}

fn cmd_colors(settings_path: &str, url: &str, json: bool) -> Result<(), String> {
    let settings = load_settings(settings_path)?;
    let matching = find_matching_profiles(&settings.profiles, url);
    let plan = build_highlight_plan(&matching, url);

    if json {
        let out = serde_json::to_string_pretty(&plan).map_err(|e| format!("Failed to encode plan: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    if plan.is_empty() {
        println!("No keywords for {}", url);
        return Ok(());
    }

    println!("{} keywords (exact case: {})", plan.keywords.len(), plan.exact_case);
    for keyword in &plan.keywords {
        let colors = plan
            .colors_for(keyword)
            .map(|colors| {
                colors
                    .iter()
                    .map(|c| match &c.text_color {
                        Some(text) => format!("{} on {}", text, c.background_color),
                        None => c.background_color.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
            .unwrap_or_default();
        println!("  {:<24} {}", keyword, colors);
    }
    Ok(())
}

fn cmd_parse(text: Option<String>, mode: ParseMode) -> Result<(), String> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            buf
        }
    };

    let items = match mode {
        ParseMode::FreeText => parse_keywords_with(&text, KeywordDelimiters::FreeText),
        ParseMode::FormField => parse_keywords_with(&text, KeywordDelimiters::FormField),
        ParseMode::CommaOnly => parse_keywords_with(&text, KeywordDelimiters::CommaOnly),
        ParseMode::Urls => parse_url_list(&text),
    };
    for item in items {
        println!("{}", item);
    }
    Ok(())
}

fn cmd_pattern(keywords: &[String]) -> Result<(), String> {
    let mut compiler = BoundaryCompiler::new();
    for keyword in keywords {
        println!("{:<24} {}", keyword, compiler.compile(keyword));
    }
    if keywords.len() > 1 {
        println!("{:<24} {}", "(combined)", compiler.alternation(keywords.iter().map(String::as_str)));
    }
    Ok(())
}

fn cmd_highlight(settings_path: &str, url: &str, input: &str, full: bool, verbose: bool) -> Result<(), String> {
    // Validate up front so errors are reported instead of silently defaulted
    load_settings(settings_path)?;
    let content = fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;

    let mut doc = Document::new();
    let body = doc.body();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let p = doc.create_element("p");
        let text = doc.create_text(line);
        doc.append_child(p, text).map_err(|e| e.to_string())?;
        doc.append_child(body, p).map_err(|e| e.to_string())?;
    }

    log::debug!("loaded {} paragraphs from {}", doc.children(body).len(), input);

    let start = Instant::now();
    let store = JsonStore::new(settings_path);
    let mut runtime = ContentRuntime::new(doc, store, Vec::<OutboundMessage>::new(), RuntimeConfig::default());
    runtime.start(url);
    let report = runtime.settle();
    let elapsed = start.elapsed();

    let doc = runtime.document();
    if full {
        println!("{}", doc.outer_html(doc.root()));
    } else {
        println!("{}", doc.inner_html(doc.body()));
    }

    if verbose {
        let stats = runtime.stats();
        eprintln!("Highlighted '{}' for {}", input, url);
        eprintln!("  Enabled:  {}", runtime.is_enabled());
        eprintln!("  Keywords: {}", runtime.plan().keywords.len());
        match report {
            Some(report) => eprintln!(
                "  Nodes:    {} scanned, {} highlighted, {} matches, {} errors",
                report.nodes_scanned, report.nodes_highlighted, report.matches, report.errors
            ),
            None => eprintln!("  Nodes:    no pass ran"),
        }
        eprintln!("  Passes:   {}", stats.passes_completed);
        eprintln!("  Time:     {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    }

    Ok(())
}
