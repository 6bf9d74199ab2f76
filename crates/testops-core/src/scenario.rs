//! Scenario identifiers and the two persisted prompt collections.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire tag the backend expects for user-defined scenarios.
pub const CUSTOM_SCENARIO_TYPE: &str = "custom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinScenario {
    ManualUi,
    ManualApi,
    AutoUi,
    AutoApi,
    TestPlan,
    Optimize,
    UnitCi,
}

impl BuiltinScenario {
    pub const ALL: [Self; 7] = [
        Self::ManualUi,
        Self::ManualApi,
        Self::AutoUi,
        Self::AutoApi,
        Self::TestPlan,
        Self::Optimize,
        Self::UnitCi,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManualUi => "manual_ui",
            Self::ManualApi => "manual_api",
            Self::AutoUi => "auto_ui",
            Self::AutoApi => "auto_api",
            Self::TestPlan => "test_plan",
            Self::Optimize => "optimize",
            Self::UnitCi => "unit_ci",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ManualUi => "Manual tests: UI calculator (28+ cases)",
            Self::ManualApi => "Manual tests: Evolution Compute API (29+ cases)",
            Self::AutoUi => "Automated e2e UI tests (Playwright + pytest)",
            Self::AutoApi => "Automated API tests (pytest + requests + allure)",
            Self::TestPlan => "Test plan generator",
            Self::Optimize => "Test optimization (duplicates, coverage, full code)",
            Self::UnitCi => "Unit tests for CI/CD (pytest + .gitlab-ci.yml)",
        }
    }

    /// Scenarios that analyze existing code and so carry `previous_code`.
    #[must_use]
    pub const fn consumes_previous_code(self) -> bool {
        matches!(self, Self::TestPlan | Self::Optimize | Self::UnitCi)
    }

    #[must_use]
    pub const fn accepts_repo_id(self) -> bool {
        matches!(self, Self::Optimize)
    }

    /// Scenarios whose output becomes the session's remembered code.
    #[must_use]
    pub const fn records_generated_code(self) -> bool {
        matches!(
            self,
            Self::ManualUi | Self::ManualApi | Self::AutoUi | Self::AutoApi | Self::UnitCi
        )
    }
}

impl fmt::Display for BuiltinScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown built-in scenario: {0}")]
pub struct ScenarioParseError(pub String);

impl FromStr for BuiltinScenario {
    type Err = ScenarioParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim();
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| ScenarioParseError(normalized.to_string()))
    }
}

/// The scenario currently picked in the generation form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioSelection {
    Builtin(BuiltinScenario),
    Custom(String),
}

impl ScenarioSelection {
    #[must_use]
    pub fn records_generated_code(&self) -> bool {
        match self {
            Self::Builtin(scenario) => scenario.records_generated_code(),
            Self::Custom(_) => true,
        }
    }
}

impl Default for ScenarioSelection {
    fn default() -> Self {
        Self::Builtin(BuiltinScenario::TestPlan)
    }
}

impl fmt::Display for ScenarioSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(scenario) => f.write_str(scenario.as_str()),
            Self::Custom(name) => write!(f, "{CUSTOM_SCENARIO_TYPE}:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomScenario {
    pub name: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinOverride {
    #[serde(rename = "type")]
    pub scenario: BuiltinScenario,
    pub name: String,
    pub prompt: String,
}
