//! Known-model table: filename substrings mapped onto the context-size
//! and RAM guidance the spec calls for, so `Supervisor::start` can pick
//! sane defaults without asking the user to look up model metadata.
//!
//! Grounded on the same "small static table, substring match, sane
//! fallback" shape as `src/kubectl/risk_classifier.rs`'s keyword tree,
//! applied here to GGUF model filenames instead of kubectl verbs.

/// Context-window and RAM guidance for one model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    pub max_context: u32,
    pub recommended_context_4gb_ram: u32,
    pub min_ram_gb: u32,
}

/// Fallback for any model file not recognized below.
pub const DEFAULT_PROFILE: ModelProfile =
    ModelProfile { max_context: 4096, recommended_context_4gb_ram: 2048, min_ram_gb: 4 };

const KNOWN_MODELS: &[(&str, ModelProfile)] = &[
    ("tinyllama", ModelProfile { max_context: 2048, recommended_context_4gb_ram: 2048, min_ram_gb: 2 }),
    ("phi-2", ModelProfile { max_context: 2048, recommended_context_4gb_ram: 2048, min_ram_gb: 3 }),
    ("phi-3-mini", ModelProfile { max_context: 4096, recommended_context_4gb_ram: 4096, min_ram_gb: 4 }),
    ("gemma-2b", ModelProfile { max_context: 8192, recommended_context_4gb_ram: 4096, min_ram_gb: 4 }),
    ("gemma-7b", ModelProfile { max_context: 8192, recommended_context_4gb_ram: 2048, min_ram_gb: 8 }),
    ("mistral-7b", ModelProfile { max_context: 8192, recommended_context_4gb_ram: 2048, min_ram_gb: 8 }),
    ("llama-2-7b", ModelProfile { max_context: 4096, recommended_context_4gb_ram: 2048, min_ram_gb: 8 }),
    ("llama-2-13b", ModelProfile { max_context: 4096, recommended_context_4gb_ram: 2048, min_ram_gb: 16 }),
    ("llama-3-8b", ModelProfile { max_context: 8192, recommended_context_4gb_ram: 2048, min_ram_gb: 8 }),
    ("llama-3.1-8b", ModelProfile { max_context: 131072, recommended_context_4gb_ram: 4096, min_ram_gb: 8 }),
    ("qwen2.5-0.5b", ModelProfile { max_context: 32768, recommended_context_4gb_ram: 8192, min_ram_gb: 2 }),
    ("qwen2.5-1.5b", ModelProfile { max_context: 32768, recommended_context_4gb_ram: 8192, min_ram_gb: 3 }),
    ("qwen2.5-7b", ModelProfile { max_context: 32768, recommended_context_4gb_ram: 4096, min_ram_gb: 8 }),
    ("codellama-7b", ModelProfile { max_context: 16384, recommended_context_4gb_ram: 4096, min_ram_gb: 8 }),
    ("deepseek-coder", ModelProfile { max_context: 16384, recommended_context_4gb_ram: 4096, min_ram_gb: 8 }),
];

/// Looks up a model's profile by filename substring match (case
/// insensitive), falling back to [`DEFAULT_PROFILE`] for anything
/// unrecognized.
pub fn model_profile(filename: &str) -> ModelProfile {
    let lower = filename.to_lowercase();
    KNOWN_MODELS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, profile)| *profile)
        .unwrap_or(DEFAULT_PROFILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_substrings_case_insensitively() {
        let profile = model_profile("Llama-3.1-8B-Instruct.Q4_K_M.gguf");
        assert_eq!(profile.max_context, 131072);
    }

    #[test]
    fn unknown_model_falls_back_to_default() {
        let profile = model_profile("some-exotic-model.gguf");
        assert_eq!(profile, DEFAULT_PROFILE);
    }
}
