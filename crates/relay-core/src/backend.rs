//! Answer backends.
//!
//! A backend is a fixed pairing of a language model with a retrieval store.
//! The set is closed: clients select one by wire id in a `config` frame and
//! anything outside [`Backend::ALL`] is rejected at parse time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

/// A retrieval + LLM combination a session can be bound to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// Gemini chat model over a Supabase vector table.
    #[serde(rename = "supabase-gemini")]
    SupabaseGemini,
    /// Local Gemma 3 via Ollama over a Chroma collection with Nomic embeddings.
    #[default]
    #[serde(rename = "upstash-gemma3-nomic")]
    UpstashGemma3Nomic,
}

impl Backend {
    /// Every backend, in display order.
    pub const ALL: [Backend; 2] = [Backend::SupabaseGemini, Backend::UpstashGemma3Nomic];

    /// Wire identifier.
    pub fn id(self) -> &'static str {
        match self {
            Self::SupabaseGemini => "supabase-gemini",
            Self::UpstashGemma3Nomic => "upstash-gemma3-nomic",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Backend {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.id() == s.trim())
            .ok_or_else(|| RelayError::UnknownBackend(s.to_owned()))
    }
}
