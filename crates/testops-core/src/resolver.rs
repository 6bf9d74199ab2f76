//! Decides which prompt text is in effect for a selected scenario.

use crate::library::{LibraryError, PromptLibrary};
use crate::request::SubmissionTarget;
use crate::scenario::{BuiltinScenario, ScenarioSelection};
use crate::transport::CopilotApi;
use crate::validation::ValidationRejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSource {
    Custom,
    Override,
    FactoryDefault,
    /// The selected custom scenario no longer exists.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub text: String,
    pub label: String,
    pub source: PromptSource,
}

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("custom scenario '{0}' has no factory default")]
    CustomScenario(String),
    #[error(transparent)]
    Library(#[from] LibraryError),
}

#[derive(Clone)]
pub struct PromptResolver {
    api: CopilotApi,
}

impl PromptResolver {
    pub fn new(api: CopilotApi) -> Self {
        Self { api }
    }

    pub async fn resolve_effective_prompt(
        &self,
        library: &PromptLibrary,
        selection: &ScenarioSelection,
    ) -> ResolvedPrompt {
        match selection {
            ScenarioSelection::Custom(name) => match library.custom(name) {
                Some(entry) => ResolvedPrompt {
                    text: entry.prompt.clone(),
                    label: entry.name.clone(),
                    source: PromptSource::Custom,
                },
                None => {
                    tracing::debug!(name = %name, "selected custom scenario is missing");
                    ResolvedPrompt {
                        text: String::new(),
                        label: name.clone(),
                        source: PromptSource::Unresolved,
                    }
                }
            },
            ScenarioSelection::Builtin(scenario) => match library.override_for(*scenario) {
                Some(entry) => ResolvedPrompt {
                    text: entry.prompt.clone(),
                    label: entry.name.clone(),
                    source: PromptSource::Override,
                },
                None => ResolvedPrompt {
                    text: self.fetch_factory_default(*scenario).await,
                    label: scenario.label().to_string(),
                    source: PromptSource::FactoryDefault,
                },
            },
        }
    }

    /// Backend-owned default text. Failures are logged and yield an empty string.
    pub async fn fetch_factory_default(&self, scenario: BuiltinScenario) -> String {
        match self.api.fetch_prompt(scenario).await {
            Ok(response) => response.prompt,
            Err(error) => {
                tracing::warn!(
                    scenario = %scenario,
                    error = %error,
                    "factory default prompt fetch failed"
                );
                String::new()
            }
        }
    }

    /// Drops any override for the built-in and returns the freshly fetched default.
    pub async fn reset_to_factory_default(
        &self,
        library: &mut PromptLibrary,
        selection: &ScenarioSelection,
    ) -> Result<String, ResetError> {
        let scenario = match selection {
            ScenarioSelection::Builtin(scenario) => *scenario,
            ScenarioSelection::Custom(name) => return Err(ResetError::CustomScenario(name.clone())),
        };
        library.remove_override(scenario)?;
        Ok(self.fetch_factory_default(scenario).await)
    }
}

/// The offline decision made at submit time. A built-in without an override
/// leaves the prompt to the backend, so nothing is fetched here.
pub fn resolve_submission_target(
    library: &PromptLibrary,
    selection: &ScenarioSelection,
) -> Result<SubmissionTarget, ValidationRejection> {
    match selection {
        ScenarioSelection::Custom(name) => library
            .custom(name)
            .map(|entry| SubmissionTarget::Custom {
                name: entry.name.clone(),
                prompt: entry.prompt.clone(),
            })
            .ok_or_else(|| ValidationRejection::UnknownCustomScenario(name.clone())),
        ScenarioSelection::Builtin(scenario) => Ok(SubmissionTarget::Builtin {
            scenario: *scenario,
            prompt_override: library
                .override_for(*scenario)
                .map(|entry| entry.prompt.clone()),
        }),
    }
}
