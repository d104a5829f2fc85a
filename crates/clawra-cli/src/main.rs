mod install;
mod persona;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use clawra_contracts::providers::identities;
use clawra_contracts::{AspectRatio, EditRequest, GenerationRequest, OutputFormat, ProviderId};
use clawra_engine::{
    build_provider, edit_image, generate_image, DeliveryMode, MessageDispatcher, Orchestrator,
    ProviderRegistry, RuntimeConfig, SendOptions,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::install::{
    InstallOptions, InstallStatus, Installer, LinePrompt, OpenClawPaths, Prompt, TerminalPrompt,
};
use crate::persona::PersonaMode;

#[derive(Debug, Parser)]
#[command(
    name = "clawra",
    version,
    about = "Generate images with fal, OpenAI, Gemini or x.ai and post them through OpenClaw"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one image and deliver it to a channel.
    Send(SendArgs),
    /// Generate images and print the result without delivering.
    Generate(GenerateArgs),
    /// Edit an existing image and print the result without delivering.
    Edit(EditArgs),
    /// List supported providers and whether their credentials are set.
    Providers,
    /// Install the selfie skill into an OpenClaw home.
    Install(InstallArgs),
}

#[derive(Debug, Parser)]
struct SendArgs {
    prompt: String,
    /// Target channel, e.g. `#general` or `@user`.
    channel: String,
    caption: Option<String>,
    aspect_ratio: Option<AspectRatio>,
    output_format: Option<OutputFormat>,
    provider: Option<String>,
    /// Edit this image instead of generating from scratch.
    #[arg(long)]
    image_url: Option<String>,
    /// Post through the local gateway instead of the openclaw CLI.
    #[arg(long)]
    gateway: bool,
}

#[derive(Debug, Args)]
struct ImageArgs {
    #[arg(long, default_value = "1:1")]
    aspect_ratio: AspectRatio,
    #[arg(long, default_value = "jpeg")]
    output_format: OutputFormat,
    #[arg(long)]
    provider: Option<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    prompt: String,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Debug, Parser)]
struct EditArgs {
    prompt: String,
    /// Source image: http(s) URL, or a local path for providers that upload inline.
    image_url: String,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Debug, Parser)]
struct InstallArgs {
    #[arg(long)]
    provider: Option<ProviderId>,
    #[arg(long)]
    api_key: Option<String>,
    /// Accept the default answer to every question.
    #[arg(long, short = 'y')]
    yes: bool,
    /// Print what would change without writing anything.
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    skip_prereq: bool,
    #[arg(long, default_value = "skill")]
    skill_source: PathBuf,
    #[arg(long, default_value = "templates")]
    templates: PathBuf,
    #[arg(long)]
    openclaw_dir: Option<PathBuf>,
    #[arg(long)]
    persona: Option<PersonaMode>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("clawra error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing("info");
    match cli.command {
        Command::Send(args) => run_send(args),
        Command::Generate(args) => run_generate(args),
        Command::Edit(args) => run_edit(args),
        Command::Providers => run_providers(),
        Command::Install(args) => run_install(args),
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run_send(args: SendArgs) -> Result<i32> {
    let config = RuntimeConfig::from_env();
    let mode = if args.gateway {
        DeliveryMode::Gateway
    } else {
        DeliveryMode::Subprocess
    };
    let dispatcher = MessageDispatcher::new(&config, mode);
    let orchestrator = Orchestrator::new(ProviderRegistry::new(&config), &dispatcher);
    let options = SendOptions {
        caption: args.caption,
        aspect_ratio: args.aspect_ratio,
        output_format: args.output_format,
        provider: args.provider,
    };

    let outcome = match args.image_url.as_deref() {
        Some(image_url) => {
            orchestrator.edit_and_deliver(&args.prompt, image_url, &args.channel, &options)?
        }
        None => orchestrator.generate_and_deliver(&args.prompt, &args.channel, &options)?,
    };
    print_json(&serde_json::to_value(&outcome)?)?;
    Ok(0)
}

fn image_request(prompt: &str, count: u32, image: &ImageArgs) -> Result<GenerationRequest> {
    Ok(GenerationRequest::new(prompt)?
        .with_num_images(count)?
        .with_aspect_ratio(image.aspect_ratio)
        .with_output_format(image.output_format))
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let config = RuntimeConfig::from_env();
    let request = image_request(&args.prompt, args.count, &args.image)?;
    let generated = generate_image(
        &ProviderRegistry::new(&config),
        args.image.provider.as_deref(),
        &request,
    )?;
    print_json(&json!({
        "provider": generated.provider,
        "result": generated.result,
    }))?;
    Ok(0)
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let config = RuntimeConfig::from_env();
    let request = EditRequest::new(
        image_request(&args.prompt, args.count, &args.image)?,
        args.image_url,
    )?;
    let generated = edit_image(
        &ProviderRegistry::new(&config),
        args.image.provider.as_deref(),
        &request,
    )?;
    print_json(&json!({
        "provider": generated.provider,
        "result": generated.result,
    }))?;
    Ok(0)
}

fn run_providers() -> Result<i32> {
    let config = RuntimeConfig::from_env();
    print_json(&providers_report(&config)?)?;
    Ok(0)
}

fn providers_report(config: &RuntimeConfig) -> Result<Value> {
    let mut rows = Vec::new();
    for identity in identities() {
        let adapter = build_provider(identity.id, config.provider_settings(identity.id))?;
        rows.push(json!({
            "id": identity.id.as_str(),
            "name": identity.display_name,
            "credentialVar": identity.credential_var,
            "credentialSet": config.has_credential(identity.id),
            "supportsEdit": adapter.editor().is_some(),
            "keyUrl": identity.key_url,
        }));
    }
    Ok(Value::Array(rows))
}

fn run_install(args: InstallArgs) -> Result<i32> {
    let paths = OpenClawPaths::resolve(args.openclaw_dir.as_deref(), |key| {
        std::env::var(key).ok()
    })?;
    let options = InstallOptions {
        provider: args.provider,
        api_key: args.api_key,
        assume_yes: args.yes,
        dry_run: args.dry_run,
        skip_prereq: args.skip_prereq,
        skill_source: args.skill_source,
        templates_dir: args.templates,
        persona: args.persona,
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut prompt_out = io::stderr();
    let mut terminal = TerminalPrompt;
    let mut lines = LinePrompt::new(&mut input, &mut prompt_out);
    let prompt: &mut dyn Prompt = if console::user_attended() {
        &mut terminal
    } else {
        &mut lines
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let status = Installer::new(paths, options, prompt, &mut out).run()?;
    match status {
        InstallStatus::Installed => {
            info!("skill installed");
            writeln!(out, "\n  {}", style("Clawra is ready.").green().bold())?;
        }
        InstallStatus::Declined => info!("install declined, nothing changed"),
    }
    Ok(0)
}

fn print_json(value: &Value) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to write result")?;
    writeln!(out)?;
    Ok(())
}
