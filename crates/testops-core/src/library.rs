//! In-memory prompt collections with write-through persistence.

use crate::scenario::{BuiltinOverride, BuiltinScenario, CustomScenario};
use crate::store::{PromptStore, StoreError};
use crate::validation::{DraftKind, ValidationRejection, validate_draft};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error(transparent)]
    Invalid(#[from] ValidationRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomSaveOutcome {
    Created,
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinEditOutcome {
    Saved,
    /// The edit was blank, so the override was dropped (same as a reset).
    Reset,
}

pub struct PromptLibrary {
    store: PromptStore,
    custom: Vec<CustomScenario>,
    overrides: Vec<BuiltinOverride>,
}

impl PromptLibrary {
    pub fn load(store: PromptStore) -> Self {
        let custom = store.load_custom();
        let overrides = store.load_overrides();
        tracing::info!(
            custom = custom.len(),
            overrides = overrides.len(),
            "prompt library loaded"
        );
        Self {
            store,
            custom,
            overrides,
        }
    }

    #[must_use]
    pub fn custom_scenarios(&self) -> &[CustomScenario] {
        &self.custom
    }

    #[must_use]
    pub fn custom(&self, name: &str) -> Option<&CustomScenario> {
        self.custom.iter().find(|entry| entry.name == name)
    }

    #[must_use]
    pub fn overrides(&self) -> &[BuiltinOverride] {
        &self.overrides
    }

    #[must_use]
    pub fn override_for(&self, scenario: BuiltinScenario) -> Option<&BuiltinOverride> {
        self.overrides
            .iter()
            .find(|entry| entry.scenario == scenario)
    }

    pub fn save_custom(
        &mut self,
        name: &str,
        prompt: &str,
    ) -> Result<CustomSaveOutcome, LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationRejection::EmptyName.into());
        }
        validate_draft(DraftKind::CustomPrompt, prompt).into_result()?;

        let entry = CustomScenario {
            name: name.to_string(),
            prompt: prompt.to_string(),
        };
        let mut next = self.custom.clone();
        let outcome = match next.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => {
                *existing = entry;
                CustomSaveOutcome::Replaced
            }
            None => {
                next.push(entry);
                CustomSaveOutcome::Created
            }
        };
        self.store.save_custom(&next)?;
        self.custom = next;
        tracing::info!(name, ?outcome, "custom scenario saved");
        Ok(outcome)
    }

    pub fn delete_custom(&mut self, name: &str) -> Result<bool, LibraryError> {
        let mut next = self.custom.clone();
        next.retain(|entry| entry.name != name);
        if next.len() == self.custom.len() {
            return Ok(false);
        }
        self.store.save_custom(&next)?;
        self.custom = next;
        tracing::info!(name, "custom scenario deleted");
        Ok(true)
    }

    /// Saves an edited built-in prompt. A blank edit removes the override.
    pub fn save_builtin_edit(
        &mut self,
        scenario: BuiltinScenario,
        prompt: &str,
    ) -> Result<BuiltinEditOutcome, LibraryError> {
        if prompt.trim().is_empty() {
            self.remove_override(scenario)?;
            return Ok(BuiltinEditOutcome::Reset);
        }
        validate_draft(DraftKind::BuiltinPrompt, prompt).into_result()?;

        let entry = BuiltinOverride {
            scenario,
            name: scenario.label().to_string(),
            prompt: prompt.to_string(),
        };
        let mut next = self.overrides.clone();
        match next.iter_mut().find(|existing| existing.scenario == scenario) {
            Some(existing) => *existing = entry,
            None => next.push(entry),
        }
        self.store.save_overrides(&next)?;
        self.overrides = next;
        tracing::info!(scenario = %scenario, "built-in prompt override saved");
        Ok(BuiltinEditOutcome::Saved)
    }

    pub fn remove_override(&mut self, scenario: BuiltinScenario) -> Result<bool, LibraryError> {
        let mut next = self.overrides.clone();
        next.retain(|entry| entry.scenario != scenario);
        if next.len() == self.overrides.len() {
            return Ok(false);
        }
        self.store.save_overrides(&next)?;
        self.overrides = next;
        tracing::info!(scenario = %scenario, "built-in prompt override removed");
        Ok(true)
    }
}
