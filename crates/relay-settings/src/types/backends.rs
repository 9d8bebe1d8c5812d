//! Answer backend endpoints.
//!
//! Every backend talks to an OpenAI-compatible chat completions endpoint:
//! Gemini through Google's compatibility layer, Gemma through Ollama's `/v1`.

use relay_core::Backend;
use serde::{Deserialize, Serialize};

/// LLM endpoint settings for one backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Base URL, without the trailing `/chat/completions`.
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Environment variable holding the API key. `None` sends no
    /// `Authorization` header (local Ollama).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Rewrite the question into a standalone query before retrieval. Only
    /// pays off with a retriever that searches on the query text.
    pub condense_question: bool,
    /// Documents injected as retrieval context on every question.
    pub static_context: Vec<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/v1".to_string(),
            model: "gemma3:1b".to_string(),
            temperature: 0.1,
            api_key_env: None,
            request_timeout_ms: 120_000,
            condense_question: false,
            static_context: Vec::new(),
        }
    }
}

/// Endpoint settings for every [`Backend`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendsSettings {
    /// `supabase-gemini`.
    pub supabase_gemini: LlmSettings,
    /// `upstash-gemma3-nomic`.
    pub upstash_gemma3_nomic: LlmSettings,
}

impl Default for BackendsSettings {
    fn default() -> Self {
        Self {
            supabase_gemini: LlmSettings {
                base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
                model: "gemini-2.5-flash-lite".to_string(),
                temperature: 0.5,
                api_key_env: Some("GOOGLE_API_KEY".to_string()),
                ..LlmSettings::default()
            },
            upstash_gemma3_nomic: LlmSettings::default(),
        }
    }
}

impl BackendsSettings {
    /// Settings for one backend.
    pub fn get(&self, backend: Backend) -> &LlmSettings {
        match backend {
            Backend::SupabaseGemini => &self.supabase_gemini,
            Backend::UpstashGemma3Nomic => &self.upstash_gemma3_nomic,
        }
    }

    /// Mutable settings for one backend.
    pub fn get_mut(&mut self, backend: Backend) -> &mut LlmSettings {
        match backend {
            Backend::SupabaseGemini => &mut self.supabase_gemini,
            Backend::UpstashGemma3Nomic => &mut self.upstash_gemma3_nomic,
        }
    }

    /// All backends with their settings.
    pub fn iter(&self) -> impl Iterator<Item = (Backend, &LlmSettings)> {
        Backend::ALL.into_iter().map(|b| (b, self.get(b)))
    }
}
