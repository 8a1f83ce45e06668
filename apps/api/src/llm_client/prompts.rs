// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment for calls whose answer is parsed from plain text.
pub const PLAIN_ANSWER_SYSTEM: &str = "You are a precise, terse assistant. \
    Answer exactly in the requested format. \
    Do NOT add preambles, apologies or markdown.";
