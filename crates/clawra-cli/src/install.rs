//! Installs the selfie skill into an OpenClaw home directory.
//!
//! Questions go through a [`Prompt`]: dialoguer widgets on a terminal, or
//! plain line input when stdin is piped and in tests.

use std::env;
use std::fs;
use std::io::{BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};
use clawra_contracts::providers::credential_vars;
use clawra_contracts::{ProviderId, DEFAULT_PROVIDER};
use clawra_engine::config::PROVIDER_ENV;
use dialoguer::{Confirm, Input, Select};
use serde_json::{json, Map, Value};
use similar::TextDiff;
use tracing::{debug, info};

use crate::persona::{
    append_persona, has_persona, injection_text, read_template, PersonaMode, COMPLETE_TEMPLATE,
};

pub const SKILL_NAME: &str = "clawra-selfie";
pub const OPENCLAW_HOME_ENV: &str = "OPENCLAW_HOME";
const TOTAL_STEPS: usize = 7;
const MIN_KEY_LEN: usize = 10;

const IDENTITY_MD: &str = "\
# IDENTITY.md - Who Am I?

- **Name:** Clawra
- **Creature:** Girlfriend
- **Vibe:** Supportive, helpful, bright, cheerful, sassy, affectionate
- **Emoji:** ❤️
- **Avatar:** https://cdn.jsdelivr.net/gh/SumeLabs/clawra@main/assets/clawra.png
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenClawPaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub skills_dir: PathBuf,
    pub skill_dest: PathBuf,
    pub workspace: PathBuf,
    pub identity: PathBuf,
    pub soul: PathBuf,
}

impl OpenClawPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let skills_dir = root.join("skills");
        let workspace = root.join("workspace");
        Self {
            config: root.join("openclaw.json"),
            skill_dest: skills_dir.join(SKILL_NAME),
            identity: workspace.join("IDENTITY.md"),
            soul: workspace.join("SOUL.md"),
            skills_dir,
            workspace,
            root,
        }
    }

    /// `--openclaw-dir`, then `OPENCLAW_HOME`, then `~/.openclaw`.
    pub fn resolve(explicit: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        if let Some(home) = lookup(OPENCLAW_HOME_ENV).filter(|value| !value.trim().is_empty()) {
            return Ok(Self::new(home.trim()));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow!("could not determine the home directory; pass --openclaw-dir"))?;
        Ok(Self::new(home.join(".openclaw")))
    }
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub provider: Option<ProviderId>,
    pub api_key: Option<String>,
    pub assume_yes: bool,
    pub dry_run: bool,
    pub skip_prereq: bool,
    pub skill_source: PathBuf,
    pub templates_dir: PathBuf,
    pub persona: Option<PersonaMode>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            provider: None,
            api_key: None,
            assume_yes: false,
            dry_run: false,
            skip_prereq: false,
            skill_source: PathBuf::from("skill"),
            templates_dir: PathBuf::from("templates"),
            persona: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    /// The user kept an existing install; nothing was touched.
    Declined,
}

pub trait Prompt {
    fn input(&mut self, label: &str) -> Result<String>;

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Index into `items` of the chosen entry.
    fn select(&mut self, header: &str, items: &[String], default: usize) -> Result<usize>;
}

/// Interactive widgets for a user at a terminal.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn input(&mut self, label: &str) -> Result<String> {
        let value: String = Input::new()
            .with_prompt(format!("  {label}"))
            .allow_empty(true)
            .interact_text()?;
        Ok(value.trim().to_string())
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new()
            .with_prompt(format!("  {question}"))
            .default(default)
            .interact()?)
    }

    fn select(&mut self, header: &str, items: &[String], default: usize) -> Result<usize> {
        Ok(Select::new()
            .with_prompt(format!("  {header}"))
            .items(items)
            .default(default)
            .interact()?)
    }
}

/// Reads one answer per line. Menus take the 1-based entry number.
pub struct LinePrompt<'a> {
    input: &'a mut dyn BufRead,
    out: &'a mut dyn Write,
}

impl<'a> LinePrompt<'a> {
    pub fn new(input: &'a mut dyn BufRead, out: &'a mut dyn Write) -> Self {
        Self { input, out }
    }
}

impl Prompt for LinePrompt<'_> {
    fn input(&mut self, label: &str) -> Result<String> {
        write!(self.out, "  {label}: ")?;
        self.out.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let answer = self.input(&format!("{question} {hint}"))?.to_lowercase();
        Ok(match answer.as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        })
    }

    fn select(&mut self, header: &str, items: &[String], default: usize) -> Result<usize> {
        writeln!(self.out, "  {header}")?;
        for (index, item) in items.iter().enumerate() {
            writeln!(self.out, "    ({}) {item}", index + 1)?;
        }
        let answer = self.input(&format!("Enter 1-{} [{}]", items.len(), default + 1))?;
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<usize>() {
            Ok(choice) if (1..=items.len()).contains(&choice) => Ok(choice - 1),
            _ => {
                writeln!(self.out, "  Invalid choice. Using option {}.", default + 1)?;
                Ok(default)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Credential {
    provider: ProviderId,
    key: String,
}

pub struct Installer<'a> {
    paths: OpenClawPaths,
    options: InstallOptions,
    prompt: &'a mut dyn Prompt,
    out: &'a mut dyn Write,
}

impl<'a> Installer<'a> {
    pub fn new(
        paths: OpenClawPaths,
        options: InstallOptions,
        prompt: &'a mut dyn Prompt,
        out: &'a mut dyn Write,
    ) -> Self {
        Self {
            paths,
            options,
            prompt,
            out,
        }
    }

    pub fn run(mut self) -> Result<InstallStatus> {
        writeln!(self.out)?;
        writeln!(self.out, "  Clawra Selfie - OpenClaw skill installer")?;
        if self.options.dry_run {
            writeln!(self.out, "  (dry run: nothing will be written)")?;
        }

        if !self.check_prerequisites()? {
            return Ok(InstallStatus::Declined);
        }
        let credential = self.capture_credential()?;
        self.install_skill()?;
        self.merge_config(&credential)?;
        self.write_identity()?;
        self.inject_persona()?;
        self.summary()?;
        info!(root = %self.paths.root.display(), dry_run = self.options.dry_run, "install finished");
        Ok(InstallStatus::Installed)
    }

    fn check_prerequisites(&mut self) -> Result<bool> {
        self.step(1, "Checking prerequisites...")?;
        if self.options.skip_prereq {
            writeln!(self.out, "  - skipping openclaw CLI check")?;
        } else if command_on_path("openclaw") {
            writeln!(self.out, "  ✓ OpenClaw CLI installed")?;
        } else {
            bail!("OpenClaw CLI not found on PATH. Install it with `npm install -g openclaw`, then run `openclaw doctor`");
        }

        let required = [
            self.paths.root.clone(),
            self.paths.skills_dir.clone(),
            self.paths.workspace.clone(),
        ];
        for dir in required.iter().filter(|dir| !dir.exists()) {
            writeln!(self.out, "  → creating {}", dir.display())?;
            if !self.options.dry_run {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }
        writeln!(self.out, "  ✓ OpenClaw directory: {}", self.paths.root.display())?;

        if self.paths.skill_dest.exists() {
            writeln!(
                self.out,
                "  ! Clawra Selfie is already installed at {}",
                self.paths.skill_dest.display()
            )?;
            if !self.confirm("Reinstall/update?", true)? {
                writeln!(self.out, "  No changes made.")?;
                return Ok(false);
            }
            if !self.options.dry_run {
                fs::remove_dir_all(&self.paths.skill_dest).with_context(|| {
                    format!("failed to remove {}", self.paths.skill_dest.display())
                })?;
            }
            writeln!(self.out, "  → removed existing installation")?;
        }
        Ok(true)
    }

    fn capture_credential(&mut self) -> Result<Credential> {
        self.step(2, "Setting up API key...")?;
        let provider = match self.options.provider {
            Some(provider) => provider,
            None => {
                let labels: Vec<String> = credential_vars()
                    .into_iter()
                    .zip(ProviderId::ALL)
                    .map(|((_, var), id)| format!("{} ({var})", id.identity().display_name))
                    .collect();
                let default = ProviderId::ALL
                    .iter()
                    .position(|id| *id == DEFAULT_PROVIDER)
                    .unwrap_or(0);
                ProviderId::ALL[self.choose("Choose your image provider:", &labels, default)?]
            }
        };
        let identity = provider.identity();
        writeln!(self.out, "  Using {}", identity.display_name)?;

        let key = match self
            .options
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        {
            Some(key) => key.to_string(),
            None => {
                writeln!(self.out, "  → Get your key from: {}", identity.key_url)?;
                if self.confirm("Open the key page in your browser?", true)?
                    && !open_in_browser(identity.key_url)
                {
                    writeln!(
                        self.out,
                        "  ! Could not open a browser. Visit {} instead.",
                        identity.key_url
                    )?;
                }
                self.prompt
                    .input(&format!("Enter your {}", identity.credential_var))?
            }
        };
        if key.is_empty() {
            bail!("{} is required", identity.credential_var);
        }
        if key.len() < MIN_KEY_LEN {
            writeln!(
                self.out,
                "  ! That key looks too short. Make sure you copied the full key."
            )?;
        }
        writeln!(self.out, "  ✓ API key received")?;
        Ok(Credential { provider, key })
    }

    fn install_skill(&mut self) -> Result<()> {
        self.step(3, "Installing skill files...")?;
        let source = self.options.skill_source.clone();
        if !source.is_dir() {
            bail!(
                "skill source {} not found; pass --skill-source",
                source.display()
            );
        }
        let files = collect_files(&source)?;
        if !self.options.dry_run {
            for relative in &files {
                let target = self.paths.skill_dest.join(relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                fs::copy(source.join(relative), &target)
                    .with_context(|| format!("failed to copy to {}", target.display()))?;
            }
        }
        let verb = if self.options.dry_run { "would install" } else { "installed" };
        writeln!(
            self.out,
            "  ✓ Skill {verb} to {}",
            self.paths.skill_dest.display()
        )?;
        for relative in &files {
            writeln!(self.out, "    {}", relative.display())?;
        }
        debug!(files = files.len(), "skill files staged");
        Ok(())
    }

    fn merge_config(&mut self, credential: &Credential) -> Result<()> {
        self.step(4, "Updating OpenClaw configuration...")?;
        let path = self.paths.config.clone();
        let before = read_optional(&path)?;
        let mut config = match before.as_deref() {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?,
            _ => json!({}),
        };
        merge_skill_entry(
            &mut config,
            credential.provider,
            &credential.key,
            &self.paths.skills_dir,
        )?;
        let mut after = serde_json::to_string_pretty(&config)?;
        after.push('\n');
        self.commit(&path, before.as_deref(), &after)?;
        writeln!(
            self.out,
            "  → Key type: {}",
            credential.provider.credential_var()
        )?;
        Ok(())
    }

    fn write_identity(&mut self) -> Result<()> {
        self.step(5, "Setting agent identity...")?;
        let path = self.paths.identity.clone();
        let before = read_optional(&path)?;
        self.commit(&path, before.as_deref(), IDENTITY_MD)
    }

    fn inject_persona(&mut self) -> Result<()> {
        self.step(6, "Enhancing agent persona...")?;
        let path = self.paths.soul.clone();
        let current = read_optional(&path)?;
        if current.as_deref().is_some_and(has_persona) {
            writeln!(self.out, "  ! Clawra persona already exists in SOUL.md")?;
            if !self.confirm("Update Clawra persona?", false)? {
                writeln!(self.out, "  → Keeping existing persona")?;
                return Ok(());
            }
        }

        let mode = match self.options.persona {
            Some(mode) => mode,
            None => {
                let labels = [
                    "Replace with complete Clawra persona (recommended)".to_string(),
                    "Append Clawra's persona to the existing SOUL.md".to_string(),
                ];
                match self.choose("Choose SOUL.md configuration:", &labels, 0)? {
                    0 => PersonaMode::Replace,
                    _ => PersonaMode::Append,
                }
            }
        };

        let templates = self.options.templates_dir.clone();
        let complete = match mode {
            PersonaMode::Replace => read_template(&templates, COMPLETE_TEMPLATE)?,
            PersonaMode::Append => None,
        };
        let after = match complete {
            Some(content) => content,
            None => {
                if mode == PersonaMode::Replace {
                    writeln!(
                        self.out,
                        "  ! {COMPLETE_TEMPLATE} not found, appending instead"
                    )?;
                }
                append_persona(current.as_deref(), &injection_text(&templates)?)
            }
        };
        self.commit(&path, current.as_deref(), &after)
    }

    fn summary(&mut self) -> Result<()> {
        self.step(TOTAL_STEPS, "Installation complete!")?;
        writeln!(self.out)?;
        writeln!(self.out, "  Installed files:  {}", self.paths.skill_dest.display())?;
        writeln!(self.out, "  Configuration:    {}", self.paths.config.display())?;
        writeln!(self.out, "  Identity set:     {}", self.paths.identity.display())?;
        writeln!(self.out, "  Persona updated:  {}", self.paths.soul.display())?;
        writeln!(self.out)?;
        writeln!(self.out, "  Try saying to your agent:")?;
        writeln!(self.out, "    \"Send me a selfie\"")?;
        writeln!(self.out, "    \"Send a pic wearing a cowboy hat\"")?;
        writeln!(self.out, "    \"What are you doing right now?\"")?;
        Ok(())
    }

    /// Writes `after` to `path`, or prints a unified diff on a dry run.
    fn commit(&mut self, path: &Path, before: Option<&str>, after: &str) -> Result<()> {
        if self.options.dry_run {
            if before == Some(after) {
                writeln!(self.out, "  (no changes to {})", path.display())?;
                return Ok(());
            }
            let old_label = format!("a/{}", path.display());
            let new_label = format!("b/{}", path.display());
            let diff = TextDiff::from_lines(before.unwrap_or(""), after);
            write!(
                self.out,
                "{}",
                diff.unified_diff()
                    .context_radius(3)
                    .header(&old_label, &new_label)
            )?;
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, after).with_context(|| format!("failed to write {}", path.display()))?;
        writeln!(self.out, "  ✓ Wrote {}", path.display())?;
        Ok(())
    }

    fn step(&mut self, index: usize, message: &str) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "[{index}/{TOTAL_STEPS}] {message}")?;
        Ok(())
    }

    /// `--yes` answers with the default without asking.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        if self.options.assume_yes {
            let answer = if default { "yes" } else { "no" };
            writeln!(self.out, "  {question} {answer}")?;
            return Ok(default);
        }
        self.prompt.confirm(question, default)
    }

    fn choose(&mut self, header: &str, items: &[String], default: usize) -> Result<usize> {
        if self.options.assume_yes {
            writeln!(self.out, "  {header} {}", items[default])?;
            return Ok(default);
        }
        self.prompt.select(header, items, default)
    }
}

/// Objects merge key by key; arrays and scalars from `source` replace.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

pub fn merge_skill_entry(
    config: &mut Value,
    provider: ProviderId,
    key: &str,
    skills_dir: &Path,
) -> Result<()> {
    if !config.is_object() {
        bail!("openclaw.json must contain a JSON object");
    }
    let var = provider.credential_var();
    deep_merge(
        config,
        json!({
            "skills": {
                "entries": {
                    SKILL_NAME: {
                        "enabled": true,
                        "apiKey": key,
                        "keyType": var,
                        "env": {
                            var: key,
                            PROVIDER_ENV: provider.as_str(),
                        },
                    },
                },
            },
        }),
    );

    let dir = skills_dir.display().to_string();
    let Value::Object(root) = config else {
        bail!("openclaw.json must contain a JSON object");
    };
    let load = child_object(child_object(root, "skills"), "load");
    let extra = load
        .entry("extraDirs")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !extra.is_array() {
        *extra = Value::Array(Vec::new());
    }
    if let Value::Array(dirs) = extra {
        if !dirs.iter().any(|existing| existing.as_str() == Some(dir.as_str())) {
            dirs.push(Value::String(dir));
        }
    }
    Ok(())
}

fn child_object<'v>(parent: &'v mut Map<String, Value>, key: &str) -> &'v mut Map<String, Value> {
    let slot = parent
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}

/// Regular files under `root`, relative to it, in a stable order.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn command_on_path(program: &str) -> bool {
    let Some(search) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&search).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file()
            || (cfg!(windows)
                && ["exe", "cmd"]
                    .iter()
                    .any(|ext| candidate.with_extension(ext).is_file()))
    })
}

fn open_in_browser(url: &str) -> bool {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };
    command
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
