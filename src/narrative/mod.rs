//! Natural-language narratives for plan and group summaries.
//!
//! Three modes are supported at plan scope:
//! - `rules`: deterministic template
//! - `prompt`: rule-derived insights with seeded random variation
//! - `llm`: delegated to the generative backend, falling back to `rules`
//!
//! Group scope knows only `rules` and `llm`.

pub mod backend;
pub mod llm;
pub mod prompt;
pub mod rules;

use crate::config::BackendConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{GroupSummary, NameMap, PlanSummary};
use backend::{GenerateRequest, TextBackend};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub use backend::OllamaBackend;

/// Narrative mode for a single plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    #[default]
    Rules,
    Prompt,
    Llm,
}

impl PlanMode {
    /// Resolve a mode name. Anything other than `rules` or `llm` selects
    /// the insight generator.
    pub fn resolve(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "rules" => PlanMode::Rules,
            "llm" => PlanMode::Llm,
            _ => PlanMode::Prompt,
        }
    }
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanMode::Rules => write!(f, "rules"),
            PlanMode::Prompt => write!(f, "prompt"),
            PlanMode::Llm => write!(f, "llm"),
        }
    }
}

/// Narrative mode for a group of plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    Rules,
    #[default]
    Llm,
}

impl GroupMode {
    /// Resolve a mode name. Anything other than `llm` selects `rules`.
    pub fn resolve(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("llm") {
            GroupMode::Llm
        } else {
            GroupMode::Rules
        }
    }
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupMode::Rules => write!(f, "rules"),
            GroupMode::Llm => write!(f, "llm"),
        }
    }
}

/// Inputs shaping a plan narrative.
#[derive(Debug, Clone, Default)]
pub struct PlanNarrativeOptions {
    pub mode: PlanMode,
    pub style: String,
    pub notes: String,
    /// Makes `prompt` output reproducible.
    pub seed: Option<i64>,
    pub names: NameMap,
}

/// Produces narratives, delegating `llm` mode to a [`TextBackend`].
pub struct Synthesizer<B> {
    backend: B,
    model: String,
    system_prompt: String,
}

impl<B: TextBackend> Synthesizer<B> {
    pub fn new(backend: B, config: &BackendConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
        }
    }

    /// Narrative for one plan. Never fails.
    pub async fn plan_text(&self, summary: &PlanSummary, options: &PlanNarrativeOptions) -> String {
        match options.mode {
            PlanMode::Rules => rules::plan_text(summary, &options.names),
            PlanMode::Prompt => {
                // Seeded once, before any random choice.
                let mut rng = narrative_rng(options.seed);
                prompt::varied_text(
                    summary,
                    &options.names,
                    &options.style,
                    &options.notes,
                    &mut rng,
                )
            }
            PlanMode::Llm => {
                let prompt = llm::plan_prompt(summary, &options.names, &options.style, &options.notes);
                match self.delegate(&prompt).await {
                    Some(text) => text,
                    None => rules::plan_text(summary, &options.names),
                }
            }
        }
    }

    /// Narrative for a group summary. Never fails.
    pub async fn group_text(
        &self,
        summary: &GroupSummary,
        mode: GroupMode,
        style: &str,
        notes: &str,
    ) -> String {
        match mode {
            GroupMode::Rules => rules::group_text(summary),
            GroupMode::Llm => {
                let prompt = llm::group_prompt(summary, style, notes);
                match self.delegate(&prompt).await {
                    Some(text) => text,
                    None => rules::group_text(summary),
                }
            }
        }
    }

    /// Pass a prompt straight to the backend, surfacing failures.
    pub async fn generate(&self, system: &str, prompt: &str) -> ServiceResult<String> {
        let request = GenerateRequest::new(&self.model, system, prompt);
        self.backend
            .generate(&request)
            .await
            .map_err(|e| ServiceError::BackendUnavailable(e.to_string()))
    }

    /// One backend attempt; `None` means the caller should fall back.
    async fn delegate(&self, prompt: &str) -> Option<String> {
        let request = GenerateRequest::new(&self.model, &self.system_prompt, prompt);
        match self.backend.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Backend produced {} characters", text.len());
                Some(llm::sanitize_tone(text.trim()))
            }
            Ok(_) => {
                warn!("Backend returned empty text, using rules narrative");
                None
            }
            Err(e) => {
                warn!("Backend call failed ({}), using rules narrative", e);
                None
            }
        }
    }
}

/// Generator for prompt mode: reproducible with a seed, from entropy without.
fn narrative_rng(seed: Option<i64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed as u64),
        None => StdRng::from_entropy(),
    }
}
