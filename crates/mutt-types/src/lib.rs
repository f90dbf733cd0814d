//! Core domain types shared by every MUTT service.
//!
//! This crate has no I/O of its own: it is the vocabulary the Ingestor,
//! Classifier, Deliverer, Remediator, and Admin API all speak so that a
//! message staged by one service deserializes cleanly in the next.

mod audit;
mod dlq;
mod error;
mod event;
mod rule;

pub use audit::{ConfigAuditRow, ConfigOperation, EventAuditRow};
pub use dlq::DlqEntry;
pub use error::PoisonRecord;
pub use event::{
    EnrichedEvent, Event, EventSource, InternalAnnotations, ValidationError,
};
pub use rule::{
    sort_for_matching, DevHandling, Handling, MatchSpec, MatchTypeTag, Rule, RuleValidationError,
    DEFAULT_RULE_ID,
};
