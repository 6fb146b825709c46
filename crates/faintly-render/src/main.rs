/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render one block against a directory of templates and print the result
 */

use anyhow::{Context as _, Result};
use clap::Parser;
use faintly::{Context, Environment, RenderConfig, Renderer, SecurityMode, TemplateDescriptor};
use faintly_dom::Node;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "faintly-render")]
#[command(about = "Render a faintly block and print its HTML")]
struct Args {
    /// Block name; the template defaults to
    /// <CODE_BASE_PATH>/blocks/<BLOCK>/<BLOCK>.html
    #[arg(short, long)]
    block: String,

    /// Directory serving as the site root for template paths
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// JSON file whose top-level object becomes the render context
    #[arg(short, long, value_name = "FILE")]
    context: Option<PathBuf>,

    /// TOML or JSON render configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Code base path prefixed to block template paths
    #[arg(long)]
    code_base_path: Option<String>,

    /// Explicit template reference, e.g. /blocks/card/card.html#compact
    #[arg(short, long, value_name = "REF")]
    template: Option<String>,

    /// Page origin used for include checks
    #[arg(long, value_name = "URL")]
    origin: Option<String>,

    /// Disable the security policy entirely
    #[arg(long = "unsafe")]
    unsafe_mode: bool,

    /// Refuse to evaluate utils:eval expressions
    #[arg(long)]
    no_eval: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = match args.verbose {
        0 => "faintly=info",
        1 => "faintly=debug",
        _ => "faintly=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => RenderConfig::from_path(path)?,
        None => RenderConfig::default(),
    };
    let mut options = config.to_options()?;
    if let Some(origin) = &args.origin {
        let environment = Environment::new(origin)
            .with_context(|| format!("Invalid origin: {origin}"))?
            .with_code_base_path(options.environment.code_base_path());
        options = options.with_environment(environment);
    }
    if let Some(path) = &args.code_base_path {
        let environment = options.environment.clone().with_code_base_path(path);
        options = options.with_environment(environment);
    }
    if args.no_eval {
        options = options.with_unsafe_eval(false);
    }

    let mut ctx = match &args.context {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read context file: {}", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?;
            Context::from_json(json)
        }
        None => Context::new(),
    };
    if let Some(reference) = &args.template {
        ctx.set_template(TemplateDescriptor::parse(reference));
    }
    if args.unsafe_mode {
        ctx = ctx.with_security(SecurityMode::Unsafe);
    }

    info!(block = %args.block, root = %args.root.display(), "Rendering block");

    let block = Node::element("div");
    block.set_attribute("class", &args.block);
    block.set_attribute(faintly::BLOCK_NAME_ATTR, &args.block);

    let renderer = Renderer::from_directory(&args.root, options);
    pollster::block_on(renderer.render_block(&block, &mut ctx))
        .with_context(|| format!("Failed to render block '{}'", args.block))?;

    println!("{}", block.outer_html());
    Ok(())
}
