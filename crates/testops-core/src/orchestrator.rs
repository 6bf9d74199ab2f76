//! Per-operation submission lifecycle for generate, commit and defect analysis.
//!
//! Each operation moves through `Idle -> Validating -> Pending` and settles as
//! `Succeeded` or `Failed`. The three operations are independent: a host can
//! hold all of them in flight by pairing the `begin_*` and `finish_*` halves
//! itself, or await one at a time through [`SubmissionOrchestrator::generate`]
//! and friends.
//!
//! Settled calls are always applied, even if the selection changed while the
//! call was in flight. Late results are not discarded.

use std::fmt;

use crate::library::PromptLibrary;
use crate::request::{
    CommitDraft, CommitRequestBody, DefectsDraft, DefectsRequestBody, GenerateRequestBody,
    SessionArtifacts, SubmissionTarget, build_commit_body, build_defects_body,
    build_generation_request,
};
use crate::resolver::{PromptResolver, ResolvedPrompt, resolve_submission_target};
use crate::scenario::ScenarioSelection;
use crate::transport::{
    CommitResponse, CopilotApi, DefectsResponse, GENERIC_ERROR_MESSAGE, GenerateResponse,
    GenerationMetrics, GenerationValidation, TransportError,
};
use crate::validation::{
    DraftKind, ValidationRejection, check_commit_fields, check_defects_fields, validate_draft,
};

pub const NO_DEFECT_DATA: &str = "No defect data";
pub const DEFECTS_FALLBACK_MESSAGE: &str = "Failed to load defects";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Generate,
    Commit,
    AnalyzeDefects,
}

impl OperationKind {
    /// Shown when a failed call carries no detail and no transport message.
    #[must_use]
    pub const fn fallback_message(self) -> &'static str {
        match self {
            Self::Generate | Self::Commit => GENERIC_ERROR_MESSAGE,
            Self::AnalyzeDefects => DEFECTS_FALLBACK_MESSAGE,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generate => "generate",
            Self::Commit => "commit",
            Self::AnalyzeDefects => "analyze_defects",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Idle,
    Validating,
    Pending,
    Succeeded,
    Failed,
}

impl OperationPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{0} is already in progress")]
    AlreadyPending(OperationKind),
    #[error(transparent)]
    Rejected(#[from] ValidationRejection),
}

#[derive(Debug, Clone)]
pub struct OperationState<T> {
    kind: OperationKind,
    phase: OperationPhase,
    result: Option<T>,
    error: Option<String>,
}

impl<T> OperationState<T> {
    fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            phase: OperationPhase::Idle,
            result: None,
            error: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> OperationPhase {
        self.phase
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.phase == OperationPhase::Pending
    }

    #[must_use]
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn transition(&mut self, phase: OperationPhase) {
        tracing::debug!(
            operation = %self.kind,
            from = self.phase.label(),
            to = phase.label(),
            "operation phase changed"
        );
        self.phase = phase;
    }

    fn enter_validating(&mut self) -> Result<(), SubmitError> {
        if self.is_pending() {
            return Err(SubmitError::AlreadyPending(self.kind));
        }
        self.transition(OperationPhase::Validating);
        Ok(())
    }

    fn reject(&mut self, rejection: ValidationRejection) -> SubmitError {
        tracing::info!(operation = %self.kind, reason = %rejection, "submission rejected");
        self.error = Some(rejection.to_string());
        self.transition(OperationPhase::Idle);
        SubmitError::Rejected(rejection)
    }

    fn enter_pending(&mut self) {
        self.result = None;
        self.error = None;
        self.transition(OperationPhase::Pending);
    }

    fn settle<R>(&mut self, outcome: Result<R, TransportError>, apply: impl FnOnce(R) -> T) {
        match outcome {
            Ok(response) => {
                self.result = Some(apply(response));
                self.error = None;
                self.transition(OperationPhase::Succeeded);
            }
            Err(error) => {
                tracing::warn!(operation = %self.kind, error = %error, "backend call failed");
                self.error = Some(error.user_message(self.kind.fallback_message()));
                self.transition(OperationPhase::Failed);
            }
        }
    }

    fn clear_feedback(&mut self) {
        self.result = None;
        self.error = None;
        if !self.is_pending() {
            self.phase = OperationPhase::Idle;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub code: String,
    pub metrics: Option<GenerationMetrics>,
    pub validation: Option<GenerationValidation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit_sha: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectsOutcome {
    pub summary: String,
    pub count: Option<u64>,
    pub recommendations: Option<String>,
}

/// A generation that has passed validation and is waiting on the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateTicket {
    pub body: GenerateRequestBody,
    records_code: bool,
}

pub struct SubmissionOrchestrator {
    library: PromptLibrary,
    resolver: PromptResolver,
    api: CopilotApi,
    session: SessionArtifacts,
    selection: ScenarioSelection,
    analysis_repo: String,
    commit_draft: CommitDraft,
    defects_draft: DefectsDraft,
    commit_dialog_open: bool,
    generation: OperationState<GenerationOutcome>,
    commit: OperationState<CommitOutcome>,
    defects: OperationState<DefectsOutcome>,
}

impl SubmissionOrchestrator {
    pub fn new(library: PromptLibrary, api: CopilotApi) -> Self {
        Self {
            library,
            resolver: PromptResolver::new(api.clone()),
            api,
            session: SessionArtifacts::default(),
            selection: ScenarioSelection::default(),
            analysis_repo: String::new(),
            commit_draft: CommitDraft::default(),
            defects_draft: DefectsDraft::default(),
            commit_dialog_open: false,
            generation: OperationState::new(OperationKind::Generate),
            commit: OperationState::new(OperationKind::Commit),
            defects: OperationState::new(OperationKind::AnalyzeDefects),
        }
    }

    #[must_use]
    pub fn library(&self) -> &PromptLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut PromptLibrary {
        &mut self.library
    }

    #[must_use]
    pub fn resolver(&self) -> &PromptResolver {
        &self.resolver
    }

    #[must_use]
    pub fn session(&self) -> &SessionArtifacts {
        &self.session
    }

    #[must_use]
    pub fn selection(&self) -> &ScenarioSelection {
        &self.selection
    }

    /// Results of earlier operations survive a selection change.
    pub fn select(&mut self, selection: ScenarioSelection) {
        tracing::debug!(selection = %selection, "scenario selected");
        self.selection = selection;
    }

    pub async fn effective_prompt(&self) -> ResolvedPrompt {
        self.resolver
            .resolve_effective_prompt(&self.library, &self.selection)
            .await
    }

    /// Seeds the remembered code, e.g. with output from an earlier session.
    pub fn remember_generated_code(&mut self, code: impl Into<String>) {
        self.session.remember_generated_code(code);
    }

    /// Blank input clears the pasted code. Oversized code is refused and the
    /// previous value is kept.
    pub fn set_pasted_code(&mut self, code: Option<String>) -> Result<(), ValidationRejection> {
        let code = code.filter(|text| !text.trim().is_empty());
        if let Some(text) = code.as_deref() {
            validate_draft(DraftKind::AnalysisCode, text).into_result()?;
        }
        self.session.set_pasted_code(code);
        Ok(())
    }

    /// Repository used by both optimization and defect analysis.
    pub fn set_analysis_repo(&mut self, repo: impl Into<String>) {
        self.analysis_repo = repo.into();
    }

    #[must_use]
    pub fn analysis_repo(&self) -> &str {
        &self.analysis_repo
    }

    #[must_use]
    pub fn commit_draft(&self) -> &CommitDraft {
        &self.commit_draft
    }

    pub fn commit_draft_mut(&mut self) -> &mut CommitDraft {
        &mut self.commit_draft
    }

    #[must_use]
    pub fn defects_draft(&self) -> &DefectsDraft {
        &self.defects_draft
    }

    pub fn defects_draft_mut(&mut self) -> &mut DefectsDraft {
        &mut self.defects_draft
    }

    #[must_use]
    pub fn generation(&self) -> &OperationState<GenerationOutcome> {
        &self.generation
    }

    #[must_use]
    pub fn commit_state(&self) -> &OperationState<CommitOutcome> {
        &self.commit
    }

    #[must_use]
    pub fn defects(&self) -> &OperationState<DefectsOutcome> {
        &self.defects
    }

    #[must_use]
    pub fn commit_dialog_open(&self) -> bool {
        self.commit_dialog_open
    }

    pub fn open_commit_dialog(&mut self) {
        self.commit_dialog_open = true;
        self.commit.clear_feedback();
    }

    /// Ignored while a commit is in flight.
    pub fn close_commit_dialog(&mut self) {
        if self.commit.is_pending() {
            return;
        }
        self.commit_dialog_open = false;
        self.commit.clear_feedback();
    }

    pub fn dismiss_error(&mut self, kind: OperationKind) {
        let (error, phase) = match kind {
            OperationKind::Generate => (&mut self.generation.error, &mut self.generation.phase),
            OperationKind::Commit => (&mut self.commit.error, &mut self.commit.phase),
            OperationKind::AnalyzeDefects => (&mut self.defects.error, &mut self.defects.phase),
        };
        *error = None;
        if *phase == OperationPhase::Failed {
            *phase = OperationPhase::Idle;
        }
    }

    pub fn begin_generate(&mut self) -> Result<GenerateTicket, SubmitError> {
        self.generation.enter_validating()?;
        let request = match self.validated_target() {
            Ok(target) => build_generation_request(
                &target,
                &self.session,
                Some(self.analysis_repo.as_str()),
            ),
            Err(rejection) => return Err(self.generation.reject(rejection)),
        };
        let ticket = GenerateTicket {
            body: request.to_body(),
            records_code: self.selection.records_generated_code(),
        };
        self.generation.enter_pending();
        tracing::info!(scenario = %ticket.body.scenario_type, "generation submitted");
        Ok(ticket)
    }

    /// Applies a settled generation, whatever is selected now.
    pub fn finish_generate(
        &mut self,
        ticket: GenerateTicket,
        outcome: Result<GenerateResponse, TransportError>,
    ) {
        let session = &mut self.session;
        self.generation.settle(outcome, |response| {
            let code = response.code.unwrap_or_default();
            if ticket.records_code {
                session.remember_generated_code(code.clone());
            }
            GenerationOutcome {
                code,
                metrics: response.metrics,
                validation: response.validation,
            }
        });
    }

    pub async fn generate(&mut self) -> Result<(), SubmitError> {
        let ticket = self.begin_generate()?;
        let outcome = self.api.generate(&ticket.body).await;
        self.finish_generate(ticket, outcome);
        Ok(())
    }

    pub fn begin_commit(&mut self) -> Result<CommitRequestBody, SubmitError> {
        self.commit.enter_validating()?;
        let code = self.session.last_generated_code();
        let checked = check_commit_fields(
            code,
            &self.commit_draft.repo_id,
            &self.commit_draft.file_path,
        )
        .and_then(|()| {
            build_commit_body(&self.commit_draft, code.unwrap_or_default())
                .ok_or(ValidationRejection::MissingCommitFields)
        });
        let body = match checked {
            Ok(body) => body,
            Err(rejection) => return Err(self.commit.reject(rejection)),
        };
        self.commit.enter_pending();
        Ok(body)
    }

    pub fn finish_commit(&mut self, outcome: Result<CommitResponse, TransportError>) {
        self.commit.settle(outcome, |response| CommitOutcome {
            commit_sha: response.commit_sha,
            message: response.message,
        });
    }

    pub async fn commit(&mut self) -> Result<(), SubmitError> {
        let body = self.begin_commit()?;
        let outcome = self.api.commit(&body).await;
        self.finish_commit(outcome);
        Ok(())
    }

    pub fn begin_analyze_defects(&mut self) -> Result<DefectsRequestBody, SubmitError> {
        self.defects.enter_validating()?;
        let checked = check_defects_fields(&self.analysis_repo).and_then(|()| {
            build_defects_body(&self.analysis_repo, &self.defects_draft)
                .ok_or(ValidationRejection::MissingDefectsRepo)
        });
        let body = match checked {
            Ok(body) => body,
            Err(rejection) => return Err(self.defects.reject(rejection)),
        };
        self.defects.enter_pending();
        Ok(body)
    }

    pub fn finish_analyze_defects(&mut self, outcome: Result<DefectsResponse, TransportError>) {
        self.defects.settle(outcome, |response| DefectsOutcome {
            summary: response
                .summary
                .filter(|summary| !summary.trim().is_empty())
                .unwrap_or_else(|| NO_DEFECT_DATA.to_string()),
            count: response.count,
            recommendations: response.recommendations,
        });
    }

    pub async fn analyze_defects(&mut self) -> Result<(), SubmitError> {
        let body = self.begin_analyze_defects()?;
        let outcome = self.api.analyze_defects(&body).await;
        self.finish_analyze_defects(outcome);
        Ok(())
    }

    /// Resolves the selection and re-runs the gate on every text about to be sent.
    fn validated_target(&self) -> Result<SubmissionTarget, ValidationRejection> {
        let target = resolve_submission_target(&self.library, &self.selection)?;
        match &target {
            SubmissionTarget::Custom { prompt, .. } => {
                validate_draft(DraftKind::CustomPrompt, prompt).into_result()?;
            }
            SubmissionTarget::Builtin {
                scenario,
                prompt_override,
            } => {
                if let Some(prompt) = prompt_override {
                    validate_draft(DraftKind::BuiltinPrompt, prompt).into_result()?;
                }
                if scenario.consumes_previous_code()
                    && let Some(pasted) = self
                        .session
                        .pasted_code()
                        .filter(|code| !code.trim().is_empty())
                {
                    validate_draft(DraftKind::AnalysisCode, pasted).into_result()?;
                }
            }
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::scenario::BuiltinScenario;
    use crate::store::PromptStore;
    use crate::test_support::FakeBackend;
    use crate::transport::{ANALYZE_DEFECTS_PATH, COMMIT_PATH, GENERATE_PATH};
    use crate::validation::ANALYSIS_CODE_MAX_CHARS;

    fn orchestrator(backend: &FakeBackend) -> SubmissionOrchestrator {
        SubmissionOrchestrator::new(PromptLibrary::load(PromptStore::memory()), backend.api())
    }

    #[tokio::test]
    async fn custom_scenario_generation_sends_its_prompt_only() {
        let backend = FakeBackend::default();
        backend.respond(GENERATE_PATH, json!({ "code": "def test_x(): pass" }));
        let mut orchestrator = orchestrator(&backend);
        orchestrator
            .library_mut()
            .save_custom("X", "do thing")
            .expect("save custom");
        orchestrator.session.remember_generated_code("earlier code");

        orchestrator.select(ScenarioSelection::Custom("X".to_string()));
        orchestrator.generate().await.expect("generate");

        assert_eq!(
            backend.last_body(GENERATE_PATH),
            Some(json!({ "type": "custom", "custom_prompt": "do thing" }))
        );
        assert_eq!(orchestrator.generation().phase(), OperationPhase::Succeeded);
        assert_eq!(
            orchestrator.session().last_generated_code(),
            Some("def test_x(): pass")
        );
    }

    #[tokio::test]
    async fn builtin_edit_then_reset_toggles_custom_prompt() {
        let backend = FakeBackend::default();
        backend.respond(GENERATE_PATH, json!({ "code": "def test_unit(): pass" }));
        backend.respond_prompt(BuiltinScenario::UnitCi, "FACTORY");
        let mut orchestrator = orchestrator(&backend);
        let selection = ScenarioSelection::Builtin(BuiltinScenario::UnitCi);
        orchestrator.select(selection.clone());

        orchestrator
            .library_mut()
            .save_builtin_edit(BuiltinScenario::UnitCi, "CUSTOM")
            .expect("edit");
        orchestrator.generate().await.expect("first generate");
        assert_eq!(
            backend.last_body(GENERATE_PATH),
            Some(json!({ "type": "unit_ci", "custom_prompt": "CUSTOM" }))
        );

        let resolver = orchestrator.resolver().clone();
        let restored = resolver
            .reset_to_factory_default(orchestrator.library_mut(), &selection)
            .await
            .expect("reset");
        assert_eq!(restored, "FACTORY");

        orchestrator.generate().await.expect("second generate");
        let body = backend.last_body(GENERATE_PATH).expect("body sent");
        assert!(body.get("custom_prompt").is_none());
        assert_eq!(body["previous_code"], json!("def test_unit(): pass"));
    }

    #[tokio::test]
    async fn rejected_commit_skips_the_network_until_the_dialog_clears_it() {
        let backend = FakeBackend::default();
        backend.respond(GENERATE_PATH, json!({ "code": "def test_ui(): pass" }));
        backend.respond(
            COMMIT_PATH,
            json!({ "commit_sha": "abc123", "message": "Committed" }),
        );
        let mut orchestrator = orchestrator(&backend);
        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::ManualUi));
        orchestrator.generate().await.expect("generate");

        orchestrator.open_commit_dialog();
        orchestrator.commit_draft_mut().repo_id = "42".to_string();
        orchestrator.commit().await.expect("commit");
        assert_eq!(
            orchestrator
                .commit_state()
                .result()
                .and_then(|outcome| outcome.commit_sha.as_deref()),
            Some("abc123")
        );
        let calls_before = backend.calls().len();

        orchestrator.commit_draft_mut().repo_id = "  ".to_string();
        let error = orchestrator.commit().await.expect_err("missing repo id");
        assert!(matches!(
            error,
            SubmitError::Rejected(ValidationRejection::MissingCommitFields)
        ));
        assert_eq!(backend.calls().len(), calls_before);
        assert_eq!(orchestrator.commit_state().phase(), OperationPhase::Idle);
        assert!(orchestrator.commit_state().result().is_some());
        assert_eq!(
            orchestrator.commit_state().error(),
            Some("repository ID and file path are required")
        );

        orchestrator.open_commit_dialog();
        assert!(orchestrator.commit_state().result().is_none());
        assert!(orchestrator.commit_state().error().is_none());
    }

    #[tokio::test]
    async fn commit_without_generated_code_is_refused() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        orchestrator.commit_draft_mut().repo_id = "42".to_string();

        let error = orchestrator.commit().await.expect_err("nothing to commit");
        assert!(matches!(
            error,
            SubmitError::Rejected(ValidationRejection::NoGeneratedCode)
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn commit_sends_remembered_code_with_form_defaults() {
        let backend = FakeBackend::default();
        backend.respond(COMMIT_PATH, json!({ "commit_sha": "def456" }));
        let mut orchestrator = orchestrator(&backend);
        orchestrator.session.remember_generated_code("def test(): pass");
        orchestrator.commit_draft_mut().repo_id = "group/project".to_string();

        orchestrator.commit().await.expect("commit");
        assert_eq!(
            backend.last_body(COMMIT_PATH),
            Some(json!({
                "repo_id": "group/project",
                "branch": "main",
                "file_path": "tests/generated_tests.py",
                "commit_message": "Generated tests from TestOps Copilot",
                "code": "def test(): pass"
            }))
        );
    }

    #[test]
    fn a_pending_operation_refuses_to_start_again() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::AutoApi));

        let ticket = orchestrator.begin_generate().expect("first begin");
        assert!(orchestrator.generation().is_pending());
        assert!(matches!(
            orchestrator.begin_generate(),
            Err(SubmitError::AlreadyPending(OperationKind::Generate))
        ));

        orchestrator.finish_generate(
            ticket,
            Ok(GenerateResponse {
                code: Some("code".to_string()),
                metrics: None,
                validation: None,
                scenario: None,
                raw_length: None,
                clean_length: None,
            }),
        );
        assert_eq!(orchestrator.generation().phase(), OperationPhase::Succeeded);
        assert!(orchestrator.begin_generate().is_ok());
    }

    #[test]
    fn operations_run_independently() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        orchestrator.session.remember_generated_code("code");
        orchestrator.commit_draft_mut().repo_id = "1".to_string();
        orchestrator.set_analysis_repo("group/project");

        let ticket = orchestrator.begin_generate().expect("generate");
        orchestrator.begin_commit().expect("commit");
        orchestrator.begin_analyze_defects().expect("defects");
        assert!(orchestrator.generation().is_pending());
        assert!(orchestrator.commit_state().is_pending());
        assert!(orchestrator.defects().is_pending());

        orchestrator.finish_commit(Err(TransportError::Http {
            status: 404,
            detail: Some("Repository not found".to_string()),
            body: r#"{"detail":"Repository not found"}"#.to_string(),
        }));
        assert_eq!(orchestrator.commit_state().phase(), OperationPhase::Failed);
        assert_eq!(
            orchestrator.commit_state().error(),
            Some("Repository not found")
        );
        assert!(orchestrator.generation().is_pending());

        orchestrator.close_commit_dialog();
        assert_eq!(orchestrator.commit_state().error(), None);

        orchestrator.finish_generate(
            ticket,
            Err(TransportError::Request {
                message: String::new(),
            }),
        );
        assert_eq!(orchestrator.generation().error(), Some("Unknown error"));
        assert!(orchestrator.defects().is_pending());
    }

    #[test]
    fn closing_the_dialog_is_ignored_while_committing() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        orchestrator.session.remember_generated_code("code");
        orchestrator.commit_draft_mut().repo_id = "7".to_string();
        orchestrator.open_commit_dialog();

        orchestrator.begin_commit().expect("begin");
        orchestrator.close_commit_dialog();
        assert!(orchestrator.commit_dialog_open());
        assert!(orchestrator.commit_state().is_pending());
    }

    #[tokio::test]
    async fn analysis_code_is_gated_at_set_time_and_submit_time() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        let oversized = "x".repeat(ANALYSIS_CODE_MAX_CHARS + 1);

        assert!(orchestrator.set_pasted_code(Some(oversized.clone())).is_err());
        assert_eq!(orchestrator.session().pasted_code(), None);

        orchestrator.session.set_pasted_code(Some(oversized));
        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::TestPlan));
        let error = orchestrator.generate().await.expect_err("oversized");
        assert!(matches!(
            error,
            SubmitError::Rejected(ValidationRejection::TooLong { .. })
        ));
        assert!(backend.calls().is_empty());
        assert_eq!(orchestrator.generation().phase(), OperationPhase::Idle);
    }

    #[tokio::test]
    async fn analysis_results_do_not_replace_remembered_code() {
        let backend = FakeBackend::default();
        backend.respond(GENERATE_PATH, json!({ "code": "## Test plan" }));
        let mut orchestrator = orchestrator(&backend);
        orchestrator.session.remember_generated_code("def test(): pass");
        orchestrator
            .set_pasted_code(Some("def pasted(): pass".to_string()))
            .expect("paste");
        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::TestPlan));

        orchestrator.generate().await.expect("generate");
        assert_eq!(
            backend.last_body(GENERATE_PATH),
            Some(json!({ "type": "test_plan", "previous_code": "def pasted(): pass" }))
        );
        assert_eq!(
            orchestrator.session().last_generated_code(),
            Some("def test(): pass")
        );

        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::ManualApi));
        assert_eq!(
            orchestrator
                .generation()
                .result()
                .map(|outcome| outcome.code.as_str()),
            Some("## Test plan")
        );
    }

    #[tokio::test]
    async fn blank_generation_clears_remembered_code() {
        let backend = FakeBackend::default();
        backend.respond(GENERATE_PATH, json!({ "code": "" }));
        let mut orchestrator = orchestrator(&backend);
        orchestrator.session.remember_generated_code("OLD CODE");

        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::ManualUi));
        orchestrator.generate().await.expect("generate");
        assert_eq!(orchestrator.session().last_generated_code(), Some(""));

        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::TestPlan));
        orchestrator.generate().await.expect("analyze");
        assert_eq!(
            backend.last_body(GENERATE_PATH),
            Some(json!({ "type": "test_plan" }))
        );
    }

    #[test]
    fn entering_pending_clears_prior_feedback() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::AutoUi));

        let ticket = orchestrator.begin_generate().expect("first generate");
        orchestrator.finish_generate(
            ticket,
            Ok(GenerateResponse {
                code: Some("def test_ui(): pass".to_string()),
                metrics: None,
                validation: None,
                scenario: None,
                raw_length: None,
                clean_length: None,
            }),
        );
        assert!(orchestrator.generation().result().is_some());

        orchestrator.begin_generate().expect("second generate");
        assert!(orchestrator.generation().is_pending());
        assert!(orchestrator.generation().result().is_none());
        assert!(orchestrator.generation().error().is_none());

        orchestrator.commit_draft_mut().repo_id = "42".to_string();
        orchestrator.begin_commit().expect("first commit");
        orchestrator.finish_commit(Err(TransportError::Request {
            message: "connection refused".to_string(),
        }));
        assert_eq!(orchestrator.commit_state().phase(), OperationPhase::Failed);
        assert!(orchestrator.commit_state().error().is_some());

        orchestrator.begin_commit().expect("retry commit");
        assert!(orchestrator.commit_state().is_pending());
        assert!(orchestrator.commit_state().error().is_none());
        assert!(orchestrator.commit_state().result().is_none());
    }

    #[test]
    fn failed_defect_analysis_falls_back_to_its_own_message() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        orchestrator.set_analysis_repo("42");

        orchestrator.begin_analyze_defects().expect("begin");
        orchestrator.finish_analyze_defects(Err(TransportError::Request {
            message: String::new(),
        }));
        assert_eq!(orchestrator.defects().phase(), OperationPhase::Failed);
        assert_eq!(
            orchestrator.defects().error(),
            Some(DEFECTS_FALLBACK_MESSAGE)
        );
        assert_eq!(
            OperationKind::Generate.fallback_message(),
            GENERIC_ERROR_MESSAGE
        );
    }

    #[tokio::test]
    async fn optimize_uses_the_shared_analysis_repo() {
        let backend = FakeBackend::default();
        backend.respond(GENERATE_PATH, json!({ "code": "optimized" }));
        let mut orchestrator = orchestrator(&backend);
        orchestrator.select(ScenarioSelection::Builtin(BuiltinScenario::Optimize));
        orchestrator.set_analysis_repo(" 12345 ");

        orchestrator.generate().await.expect("generate");
        assert_eq!(
            backend.last_body(GENERATE_PATH),
            Some(json!({ "type": "optimize", "repo_id": 12345 }))
        );
    }

    #[tokio::test]
    async fn defect_analysis_requires_a_repo_and_fills_the_summary() {
        let backend = FakeBackend::default();
        backend.respond(ANALYZE_DEFECTS_PATH, json!({ "count": 0 }));
        let mut orchestrator = orchestrator(&backend);

        let error = orchestrator.analyze_defects().await.expect_err("no repo");
        assert!(matches!(
            error,
            SubmitError::Rejected(ValidationRejection::MissingDefectsRepo)
        ));
        assert!(backend.calls().is_empty());

        orchestrator.set_analysis_repo("group/project");
        orchestrator.defects_draft_mut().labels = "bug, regression".to_string();
        orchestrator.analyze_defects().await.expect("analyze");
        assert_eq!(
            backend.last_body(ANALYZE_DEFECTS_PATH),
            Some(json!({
                "repo_id": "group/project",
                "labels": ["bug", "regression"],
                "state": "all"
            }))
        );
        let outcome = orchestrator.defects().result().expect("outcome");
        assert_eq!(outcome.summary, NO_DEFECT_DATA);
        assert_eq!(outcome.count, Some(0));
        assert!(orchestrator.defects().error().is_none());
    }

    #[tokio::test]
    async fn missing_custom_selection_is_rejected_before_sending() {
        let backend = FakeBackend::default();
        let mut orchestrator = orchestrator(&backend);
        orchestrator.select(ScenarioSelection::Custom("deleted".to_string()));

        let error = orchestrator.generate().await.expect_err("unknown");
        assert!(matches!(
            error,
            SubmitError::Rejected(ValidationRejection::UnknownCustomScenario(_))
        ));
        assert!(backend.calls().is_empty());
        orchestrator.dismiss_error(OperationKind::Generate);
        assert!(orchestrator.generation().error().is_none());
    }
}
