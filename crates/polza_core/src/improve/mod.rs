//! AI-assisted improve operation: targeting, splicing and triggering.

pub mod orchestrator;
pub mod target;
pub mod trigger;

pub use orchestrator::{ImproveOrchestrator, ImproveOutcome, ImproveState, Notifier};
pub use target::{extract_target, splice_transaction, ExtractedTarget, ImproveTarget};
pub use trigger::{
    shortcut_trigger, trigger_channel, ImproveTrigger, Key, KeyPress, TriggerHandle,
    TriggerSource,
};
