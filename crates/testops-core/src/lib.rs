//! Prompt override resolution and submission orchestration for TestOps Copilot.
//!
//! Built-in scenarios carry a backend-owned factory prompt that users may
//! override locally. Custom scenarios are user-defined name/prompt pairs. This
//! crate persists both collections, resolves which prompt is in effect, gates
//! user text, builds the backend requests, and tracks the lifecycle of each
//! submission. The HTTP transport is injected via [`BackendTransport`].

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod library;
pub mod orchestrator;
pub mod request;
pub mod resolver;
pub mod scenario;
pub mod store;
pub mod transport;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, CopilotConfig};
pub use library::{BuiltinEditOutcome, CustomSaveOutcome, LibraryError, PromptLibrary};
pub use orchestrator::{
    CommitOutcome, DefectsOutcome, GenerationOutcome, OperationKind, OperationPhase,
    OperationState, SubmissionOrchestrator, SubmitError,
};
pub use request::{
    CommitDraft, DefectState, DefectsDraft, GenerationRequest, RepoRef, SessionArtifacts,
    SubmissionTarget, build_generation_request,
};
pub use resolver::{
    PromptResolver, PromptSource, ResetError, ResolvedPrompt, resolve_submission_target,
};
pub use scenario::{BuiltinOverride, BuiltinScenario, CustomScenario, ScenarioSelection};
pub use store::{FileKeyValueStore, KeyValueStore, PromptStore, StoreError};
pub use transport::{BackendTransport, CopilotApi, TransportError};
pub use validation::{DraftKind, ValidationOutcome, ValidationRejection, validate};
