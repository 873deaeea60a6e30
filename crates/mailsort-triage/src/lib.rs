//! Email triage: decide an action label for each message and apply it.
//!
//! - **llm_categorizer**: prompt building, reply parsing and fallbacks
//! - **keyword**: rule-based categorizer used for label fallback
//! - **pipeline**: label application, incremental passes and the batch run

pub mod keyword;
pub mod llm_categorizer;
pub mod pipeline;

pub use keyword::{best_label_for, CategorizedEmail, EmailCategory, KeywordCategorizer};
pub use llm_categorizer::{
    build_prompt, format_email_for_llm, group_by_label, label_stats, parse_llm_reply,
    LabelDecision, LlmCategorizedEmail, LlmCategorizer,
};
pub use pipeline::{
    apply_labels, error_hints, process_recent, run_batch, BatchReport, LabelOutcome,
    ProcessSummary,
};
