//! Pure builders for the outbound request bodies.

use serde::{Deserialize, Serialize};

use crate::scenario::{BuiltinScenario, CUSTOM_SCENARIO_TYPE};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_COMMIT_FILE_PATH: &str = "tests/generated_tests.py";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Generated tests from TestOps Copilot";
pub const DEFAULT_DEFECT_LABEL: &str = "bug";

/// Repository reference: a numeric project id or a `group/project` path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoRef {
    Id(u64),
    Path(String),
}

impl RepoRef {
    /// Blank input yields `None`; all-digit input becomes a numeric id.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.bytes().all(|byte| byte.is_ascii_digit())
            && let Ok(id) = trimmed.parse::<u64>()
        {
            return Some(Self::Id(id));
        }
        Some(Self::Path(trimmed.to_string()))
    }
}

/// Code carried between submissions within one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionArtifacts {
    last_generated_code: Option<String>,
    pasted_code: Option<String>,
}

impl SessionArtifacts {
    #[must_use]
    pub fn last_generated_code(&self) -> Option<&str> {
        self.last_generated_code.as_deref()
    }

    #[must_use]
    pub fn pasted_code(&self) -> Option<&str> {
        self.pasted_code.as_deref()
    }

    pub fn remember_generated_code(&mut self, code: impl Into<String>) {
        self.last_generated_code = Some(code.into());
    }

    pub fn set_pasted_code(&mut self, code: Option<String>) {
        self.pasted_code = code;
    }

    /// Pasted code wins over remembered code; blank values count as absent.
    #[must_use]
    pub fn analysis_code(&self) -> Option<&str> {
        non_blank(self.pasted_code.as_deref())
            .or_else(|| non_blank(self.last_generated_code()))
    }
}

/// What the resolver decided to send for the selected scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionTarget {
    Custom {
        name: String,
        prompt: String,
    },
    Builtin {
        scenario: BuiltinScenario,
        /// `None` leaves the prompt to the backend's factory default.
        prompt_override: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Custom {
        prompt: String,
    },
    /// `manual_*` and `auto_*`: produce code from the prompt alone.
    Authoring {
        scenario: BuiltinScenario,
        prompt_override: Option<String>,
    },
    /// `test_plan` and `unit_ci`: analyze previously produced code.
    Analysis {
        scenario: BuiltinScenario,
        prompt_override: Option<String>,
        previous_code: Option<String>,
    },
    Optimization {
        prompt_override: Option<String>,
        previous_code: Option<String>,
        repo: Option<RepoRef>,
    },
}

#[must_use]
pub fn build_generation_request(
    target: &SubmissionTarget,
    artifacts: &SessionArtifacts,
    repo_identifier: Option<&str>,
) -> GenerationRequest {
    match target {
        SubmissionTarget::Custom { prompt, .. } => GenerationRequest::Custom {
            prompt: prompt.clone(),
        },
        SubmissionTarget::Builtin {
            scenario,
            prompt_override,
        } => {
            let prompt_override = prompt_override.clone();
            let previous_code = || artifacts.analysis_code().map(str::to_string);
            match scenario {
                scenario if scenario.accepts_repo_id() => GenerationRequest::Optimization {
                    prompt_override,
                    previous_code: previous_code(),
                    repo: repo_identifier.and_then(RepoRef::parse),
                },
                scenario if scenario.consumes_previous_code() => GenerationRequest::Analysis {
                    scenario: *scenario,
                    prompt_override,
                    previous_code: previous_code(),
                },
                scenario => GenerationRequest::Authoring {
                    scenario: *scenario,
                    prompt_override,
                },
            }
        }
    }
}

impl GenerationRequest {
    #[must_use]
    pub fn scenario_type(&self) -> &'static str {
        match self {
            Self::Custom { .. } => CUSTOM_SCENARIO_TYPE,
            Self::Authoring { scenario, .. } | Self::Analysis { scenario, .. } => {
                scenario.as_str()
            }
            Self::Optimization { .. } => BuiltinScenario::Optimize.as_str(),
        }
    }

    #[must_use]
    pub fn to_body(&self) -> GenerateRequestBody {
        let scenario_type = self.scenario_type().to_string();
        match self {
            Self::Custom { prompt } => GenerateRequestBody {
                scenario_type,
                custom_prompt: Some(prompt.clone()),
                previous_code: None,
                repo_id: None,
            },
            Self::Authoring {
                prompt_override, ..
            } => GenerateRequestBody {
                scenario_type,
                custom_prompt: prompt_override.clone(),
                previous_code: None,
                repo_id: None,
            },
            Self::Analysis {
                prompt_override,
                previous_code,
                ..
            } => GenerateRequestBody {
                scenario_type,
                custom_prompt: prompt_override.clone(),
                previous_code: previous_code.clone(),
                repo_id: None,
            },
            Self::Optimization {
                prompt_override,
                previous_code,
                repo,
            } => GenerateRequestBody {
                scenario_type,
                custom_prompt: prompt_override.clone(),
                previous_code: previous_code.clone(),
                repo_id: repo.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequestBody {
    #[serde(rename = "type")]
    pub scenario_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<RepoRef>,
}

/// Commit form fields as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDraft {
    pub repo_id: String,
    pub branch: String,
    pub file_path: String,
    pub commit_message: String,
}

impl Default for CommitDraft {
    fn default() -> Self {
        Self {
            repo_id: String::new(),
            branch: DEFAULT_BRANCH.to_string(),
            file_path: DEFAULT_COMMIT_FILE_PATH.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRequestBody {
    pub repo_id: RepoRef,
    pub branch: String,
    pub file_path: String,
    pub commit_message: String,
    pub code: String,
}

/// `None` when the repository id is blank.
#[must_use]
pub fn build_commit_body(draft: &CommitDraft, code: &str) -> Option<CommitRequestBody> {
    Some(CommitRequestBody {
        repo_id: RepoRef::parse(&draft.repo_id)?,
        branch: non_blank(Some(draft.branch.as_str()))
            .unwrap_or(DEFAULT_BRANCH)
            .trim()
            .to_string(),
        file_path: draft.file_path.trim().to_string(),
        commit_message: non_blank(Some(draft.commit_message.as_str()))
            .unwrap_or(DEFAULT_COMMIT_MESSAGE)
            .to_string(),
        code: code.to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectState {
    #[default]
    All,
    Opened,
    Closed,
}

impl DefectState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Opened => "opened",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "opened" | "open" => Some(Self::Opened),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectsDraft {
    /// Comma-separated label filter.
    pub labels: String,
    pub state: DefectState,
}

impl Default for DefectsDraft {
    fn default() -> Self {
        Self {
            labels: DEFAULT_DEFECT_LABEL.to_string(),
            state: DefectState::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefectsRequestBody {
    pub repo_id: RepoRef,
    pub labels: Vec<String>,
    pub state: DefectState,
}

#[must_use]
pub fn parse_labels(raw: &str) -> Vec<String> {
    let labels: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        vec![DEFAULT_DEFECT_LABEL.to_string()]
    } else {
        labels
    }
}

#[must_use]
pub fn build_defects_body(
    repo_identifier: &str,
    draft: &DefectsDraft,
) -> Option<DefectsRequestBody> {
    Some(DefectsRequestBody {
        repo_id: RepoRef::parse(repo_identifier)?,
        labels: parse_labels(&draft.labels),
        state: draft.state,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}
