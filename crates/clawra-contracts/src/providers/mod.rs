use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROVIDER: ProviderId = ProviderId::Fal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Fal,
    Openai,
    Google,
    Xai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub id: ProviderId,
    pub display_name: &'static str,
    pub credential_var: &'static str,
    pub key_url: &'static str,
}

static IDENTITIES: [ProviderIdentity; 4] = [
    ProviderIdentity {
        id: ProviderId::Fal,
        display_name: "fal.ai (Grok Imagine)",
        credential_var: "FAL_KEY",
        key_url: "https://fal.ai/dashboard/keys",
    },
    ProviderIdentity {
        id: ProviderId::Openai,
        display_name: "OpenAI (gpt-image-1)",
        credential_var: "OPENAI_API_KEY",
        key_url: "https://platform.openai.com/api-keys",
    },
    ProviderIdentity {
        id: ProviderId::Google,
        display_name: "Google Gemini (gemini-2.5-flash-image)",
        credential_var: "GEMINI_API_KEY",
        key_url: "https://aistudio.google.com/apikey",
    },
    ProviderIdentity {
        id: ProviderId::Xai,
        display_name: "x.ai (Grok Imagine Direct)",
        credential_var: "XAI_API_KEY",
        key_url: "https://console.x.ai",
    },
];

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Fal,
        ProviderId::Openai,
        ProviderId::Google,
        ProviderId::Xai,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Fal => "fal",
            ProviderId::Openai => "openai",
            ProviderId::Google => "google",
            ProviderId::Xai => "xai",
        }
    }

    pub fn identity(self) -> &'static ProviderIdentity {
        match self {
            ProviderId::Fal => &IDENTITIES[0],
            ProviderId::Openai => &IDENTITIES[1],
            ProviderId::Google => &IDENTITIES[2],
            ProviderId::Xai => &IDENTITIES[3],
        }
    }

    pub fn credential_var(self) -> &'static str {
        self.identity().credential_var
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == trimmed)
            .ok_or_else(|| trimmed.to_string())
    }
}

/// Ordered provider identifiers, as shown in help text and menus.
pub fn provider_names() -> Vec<&'static str> {
    ProviderId::ALL.iter().map(|id| id.as_str()).collect()
}

pub fn identities() -> &'static [ProviderIdentity] {
    &IDENTITIES
}

/// Provider id → credential environment variable, in registry order.
pub fn credential_vars() -> IndexMap<&'static str, &'static str> {
    IDENTITIES
        .iter()
        .map(|identity| (identity.id.as_str(), identity.credential_var))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{credential_vars, provider_names, ProviderId, DEFAULT_PROVIDER};

    #[test]
    fn provider_names_keep_registry_order() {
        assert_eq!(provider_names(), vec!["fal", "openai", "google", "xai"]);
        assert_eq!(DEFAULT_PROVIDER, ProviderId::Fal);
    }

    #[test]
    fn credential_vars_map_each_provider() {
        let vars = credential_vars();
        assert_eq!(
            vars.iter().map(|(id, var)| (*id, *var)).collect::<Vec<_>>(),
            vec![
                ("fal", "FAL_KEY"),
                ("openai", "OPENAI_API_KEY"),
                ("google", "GEMINI_API_KEY"),
                ("xai", "XAI_API_KEY"),
            ]
        );
    }

    #[test]
    fn provider_id_round_trips_through_identity() {
        for id in ProviderId::ALL {
            assert_eq!(id.identity().id, id);
            assert_eq!(id.as_str().parse::<ProviderId>(), Ok(id));
        }
        assert_eq!("bogus".parse::<ProviderId>(), Err("bogus".to_string()));
    }
}
