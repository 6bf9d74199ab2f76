//! Presence and length checks that gate saves and submissions.

pub const CUSTOM_PROMPT_MAX_CHARS: usize = 5_000;
pub const BUILTIN_PROMPT_MAX_CHARS: usize = 8_000;
pub const ANALYSIS_CODE_MAX_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    CustomPrompt,
    BuiltinPrompt,
    AnalysisCode,
}

impl DraftKind {
    #[must_use]
    pub const fn limit(self) -> usize {
        match self {
            Self::CustomPrompt => CUSTOM_PROMPT_MAX_CHARS,
            Self::BuiltinPrompt => BUILTIN_PROMPT_MAX_CHARS,
            Self::AnalysisCode => ANALYSIS_CODE_MAX_CHARS,
        }
    }

    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::CustomPrompt | Self::BuiltinPrompt => "Prompt",
            Self::AnalysisCode => "Code for analysis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationRejection {
    #[error("{} must not be empty", .kind.subject())]
    Empty { kind: DraftKind },
    #[error("{} is too long ({actual} characters, max {limit})", .kind.subject())]
    TooLong {
        kind: DraftKind,
        limit: usize,
        actual: usize,
    },
    #[error("scenario name must not be empty")]
    EmptyName,
    #[error("custom scenario '{0}' does not exist")]
    UnknownCustomScenario(String),
    #[error("no generated code to commit")]
    NoGeneratedCode,
    #[error("repository ID and file path are required")]
    MissingCommitFields,
    #[error("repository ID is required for defect analysis")]
    MissingDefectsRepo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Ok,
    Rejected(ValidationRejection),
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn into_result(self) -> Result<(), ValidationRejection> {
        match self {
            Self::Ok => Ok(()),
            Self::Rejected(reason) => Err(reason),
        }
    }
}

/// Presence first, then length; the first failing rule wins.
#[must_use]
pub fn validate(kind: DraftKind, draft: &str, limit: usize) -> ValidationOutcome {
    let trimmed = draft.trim();
    if trimmed.is_empty() {
        return ValidationOutcome::Rejected(ValidationRejection::Empty { kind });
    }
    let actual = trimmed.chars().count();
    if actual > limit {
        return ValidationOutcome::Rejected(ValidationRejection::TooLong {
            kind,
            limit,
            actual,
        });
    }
    ValidationOutcome::Ok
}

/// [`validate`] with the limit that belongs to `kind`.
#[must_use]
pub fn validate_draft(kind: DraftKind, draft: &str) -> ValidationOutcome {
    validate(kind, draft, kind.limit())
}

pub fn check_commit_fields(
    generated_code: Option<&str>,
    repo_id: &str,
    file_path: &str,
) -> Result<(), ValidationRejection> {
    if generated_code.is_none_or(|code| code.trim().is_empty()) {
        return Err(ValidationRejection::NoGeneratedCode);
    }
    if repo_id.trim().is_empty() || file_path.trim().is_empty() {
        return Err(ValidationRejection::MissingCommitFields);
    }
    Ok(())
}

pub fn check_defects_fields(repo_id: &str) -> Result<(), ValidationRejection> {
    if repo_id.trim().is_empty() {
        return Err(ValidationRejection::MissingDefectsRepo);
    }
    Ok(())
}
