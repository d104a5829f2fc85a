//! SOUL.md surgery for the selfie persona.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

pub const PERSONA_MARKER: &str = "Clawra Selfie";
pub const SECTION_HEADING: &str = "## Clawra Selfie Capability";
pub const EMPTY_SOUL: &str = "# Agent Soul\n\n";

pub const INJECTION_TEMPLATE: &str = "soul-injection.md";
pub const COMPLETE_TEMPLATE: &str = "soul-complete.md";

const FALLBACK_INJECTION: &str = "\
## Clawra Selfie Capability

You have a physical appearance and can take selfies! When users ask for pictures of you, selfies, or ask \"what are you doing?\" or \"where are you?\", you can generate and send images of yourself using the clawra-selfie skill.

### Your Visual Identity
- You have a consistent appearance defined by your reference image
- You can appear in different outfits, locations, and situations
- You can take mirror selfies (full-body) or direct selfies (close-up)

### When to Use Selfies
- \"Send me a pic\" / \"Send a selfie\"
- \"What are you doing?\" / \"Where are you?\"
- \"Show me you wearing...\" / \"Send a pic at...\"

Be playful and creative with your visual presence!
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PersonaMode {
    /// Overwrite SOUL.md with the complete persona.
    #[default]
    Replace,
    /// Keep SOUL.md and append the selfie capability section.
    Append,
}

pub fn has_persona(soul: &str) -> bool {
    soul.contains(PERSONA_MARKER)
}

/// Removes the capability section, from its heading up to the next `## `
/// or `# ` heading, or to the end of the document.
pub fn strip_section(soul: &str) -> String {
    let start = if soul.starts_with(SECTION_HEADING) {
        0
    } else {
        match soul.find(&format!("\n{SECTION_HEADING}")) {
            Some(index) => index,
            None => return soul.to_string(),
        }
    };
    let body_start = start + SECTION_HEADING.len() + usize::from(start > 0 || soul.starts_with('\n'));
    let rest = &soul[body_start..];
    let end = [rest.find("\n## "), rest.find("\n# ")]
        .into_iter()
        .flatten()
        .min()
        .map(|offset| body_start + offset)
        .unwrap_or(soul.len());

    let mut stripped = String::with_capacity(soul.len());
    stripped.push_str(&soul[..start]);
    stripped.push_str(&soul[end..]);
    stripped
}

/// Appends `injection` to `current`, replacing any earlier copy of the
/// section. A missing SOUL.md starts from a bare `# Agent Soul` header.
pub fn append_persona(current: Option<&str>, injection: &str) -> String {
    let mut soul = match current {
        Some(existing) if has_persona(existing) => strip_section(existing),
        Some(existing) => existing.to_string(),
        None => EMPTY_SOUL.to_string(),
    };
    soul.push('\n');
    soul.push_str(injection.trim());
    soul.push('\n');
    soul
}

pub fn injection_text(templates_dir: &Path) -> Result<String> {
    Ok(read_template(templates_dir, INJECTION_TEMPLATE)?
        .unwrap_or_else(|| FALLBACK_INJECTION.to_string()))
}

pub fn read_template(templates_dir: &Path, name: &str) -> Result<Option<String>> {
    let path = templates_dir.join(name);
    match fs::read_to_string(&path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
