//! Declarative verification scenario
//!
//! The report flow is built in code by [`Scenario::report_flow`]; the same
//! structure can be loaded from YAML to point the verifier at a variant of
//! the page without recompiling.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{self, Viewport, VerifierConfig};
use crate::error::{VerifyError, VerifyResult};
use crate::playwright::Observation;
use crate::report::{OutcomeKind, StepOutcome};
use crate::stubs::{self, RouteStub};

/// A complete verification scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub viewport: Viewport,

    /// Routes fulfilled for the lifetime of the page
    #[serde(default)]
    pub stubs: Vec<RouteStub>,

    /// Steps to execute in order; each one is its own fault boundary
    pub steps: Vec<Step>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Print a progress line
    Log { message: String },

    /// Navigate to an absolute URL
    Navigate { url: String },

    /// Wait for marker text to appear
    WaitForText {
        text: String,
        #[serde(default = "default_text_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        label: Option<String>,
    },

    /// Set a file on the first control matching `selector`
    UploadFile {
        #[serde(default = "default_file_input")]
        selector: String,
        path: PathBuf,
    },

    /// Check the rendered markup for a literal substring
    ContentContains {
        needle: String,
        #[serde(default)]
        label: Option<String>,
    },

    /// Click the control labelled `text`
    Click {
        text: String,
        #[serde(default = "default_click_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        label: Option<String>,
    },

    /// Read the value of the `index`-th selection control and compare it
    SelectValue {
        #[serde(default = "default_select")]
        selector: String,
        #[serde(default)]
        index: usize,
        expected: String,
        #[serde(default)]
        label: Option<String>,
    },

    /// Capture a screenshot into the output directory as `<name>.png`
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },
}

fn default_text_timeout() -> u64 {
    config::TEXT_WAIT_TIMEOUT_MS
}

fn default_click_timeout() -> u64 {
    config::CLICK_TIMEOUT_MS
}

fn default_file_input() -> String {
    config::FILE_INPUT_SELECTOR.to_string()
}

fn default_select() -> String {
    config::CATEGORY_SELECT_SELECTOR.to_string()
}

impl Step {
    /// Short identifier used in the report, e.g. `wait:Civic Hero`
    pub fn action_name(&self) -> String {
        match self {
            Step::Log { .. } => "log".to_string(),
            Step::Navigate { url } => format!("navigate:{}", url),
            Step::WaitForText { text, .. } => format!("wait:{}", text),
            Step::UploadFile { selector, .. } => format!("upload:{}", selector),
            Step::ContentContains { needle, .. } => format!("contains:{}", needle),
            Step::Click { text, .. } => format!("click:{}", text),
            Step::SelectValue { selector, index, .. } => format!("select:{}[{}]", selector, index),
            Step::Screenshot { name, .. } => format!("screenshot:{}", name),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Step::Log { .. } => OutcomeKind::Progress,
            Step::Navigate { .. } | Step::UploadFile { .. } | Step::Screenshot { .. } => {
                OutcomeKind::Action
            }
            Step::WaitForText { .. }
            | Step::ContentContains { .. }
            | Step::Click { .. }
            | Step::SelectValue { .. } => OutcomeKind::Check,
        }
    }

    /// Turn what the browser observed into a pass/fail outcome
    pub fn evaluate(&self, index: usize, observation: &Observation) -> StepOutcome {
        let error = observation.error.clone();
        let (passed, message) = match self {
            Step::Log { message } => (true, message.clone()),
            Step::Navigate { url } => match &error {
                None => (true, format!("Loaded {}", url)),
                Some(e) => (false, format!("Navigation to {} failed: {}", url, e)),
            },
            Step::WaitForText { text, label, .. } => {
                let label = label.as_deref().unwrap_or(text);
                if observation.ok {
                    (true, format!("Found {}!", label))
                } else {
                    (false, format!("{} NOT found!", label))
                }
            }
            Step::UploadFile { path, .. } => match &error {
                None => (true, format!("Uploaded {}", path.display())),
                Some(e) => (false, format!("Upload of {} failed: {}", path.display(), e)),
            },
            Step::ContentContains { needle, label } => {
                let label = label.as_deref().unwrap_or("Page text");
                let found = observation.ok && observation.bool_value() == Some(true);
                if found {
                    (true, format!("{} '{}' found.", label, needle))
                } else {
                    (false, format!("{} '{}' not found.", label, needle))
                }
            }
            Step::Click { text, label, .. } => {
                let label = label.clone().unwrap_or_else(|| format!("{} control", text));
                if observation.ok {
                    (true, format!("Clicked {}.", label))
                } else {
                    (false, format!("{} not clickable or found", label))
                }
            }
            Step::SelectValue { expected, label, .. } => {
                let label = label.as_deref().unwrap_or("Selection");
                match (&error, observation.str_value()) {
                    (Some(e), _) => (false, format!("Error checking {}: {}", label.to_lowercase(), e)),
                    (None, Some(value)) if value == expected.as_str() => {
                        (true, format!("{} successfully applied! (value: {})", label, value))
                    }
                    (None, value) => (
                        false,
                        format!(
                            "{} failed to apply. Expected '{}', got '{}'",
                            label,
                            expected,
                            value.unwrap_or_default()
                        ),
                    ),
                }
            }
            Step::Screenshot { name, .. } => match &error {
                None => (true, format!("Captured screenshot {}", name)),
                Some(e) => (false, format!("Screenshot {} failed: {}", name, e)),
            },
        };

        let detail = match (&error, &observation.value) {
            (Some(e), _) => Some(e.clone()),
            (None, Some(serde_json::Value::String(s))) => Some(s.clone()),
            (None, Some(other)) => Some(other.to_string()),
            (None, None) => None,
        };

        StepOutcome {
            index,
            action: self.action_name(),
            kind: self.kind(),
            passed,
            message,
            detail,
        }
    }
}

impl Scenario {
    /// The leaderboard badge and smart-suggestion flow against `config.app_url`
    pub fn report_flow(config: &VerifierConfig) -> VerifyResult<Self> {
        let steps = vec![
            Step::Log {
                message: "Navigating to Leaderboard...".to_string(),
            },
            Step::Navigate {
                url: config.leaderboard_url(),
            },
            Step::WaitForText {
                text: config::BADGE_MARKER.to_string(),
                timeout_ms: config.text_wait_timeout_ms,
                label: Some(format!("{} badge", config::BADGE_MARKER)),
            },
            Step::Screenshot {
                name: config::LEADERBOARD_SCREENSHOT.to_string(),
                full_page: false,
            },
            Step::Log {
                message: "Navigating to Report Form...".to_string(),
            },
            Step::Navigate {
                url: config.report_url(),
            },
            Step::Log {
                message: "Uploading image...".to_string(),
            },
            Step::UploadFile {
                selector: config::FILE_INPUT_SELECTOR.to_string(),
                path: config.upload_path.clone(),
            },
            Step::Log {
                message: "Waiting for AI Suggestion...".to_string(),
            },
            Step::WaitForText {
                text: config::SUGGESTION_MARKER.to_string(),
                timeout_ms: config.text_wait_timeout_ms,
                label: None,
            },
            Step::ContentContains {
                needle: config.expected_category.clone(),
                label: Some("Suggestion text".to_string()),
            },
            Step::Screenshot {
                name: config::SUGGESTION_SCREENSHOT.to_string(),
                full_page: false,
            },
            Step::Log {
                message: "Clicking Apply...".to_string(),
            },
            Step::Click {
                text: config::APPLY_LABEL.to_string(),
                timeout_ms: config.click_timeout_ms,
                label: Some(format!("{} button", config::APPLY_LABEL)),
            },
            Step::SelectValue {
                selector: config::CATEGORY_SELECT_SELECTOR.to_string(),
                index: 0,
                expected: config.expected_category.clone(),
                label: Some("Category".to_string()),
            },
        ];

        Ok(Self {
            name: "report-flow".to_string(),
            description: "Leaderboard badge and AI category suggestion on the report form"
                .to_string(),
            viewport: config.viewport,
            stubs: stubs::default_stubs(&config.expected_category)?,
            steps,
        })
    }

    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> VerifyResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> VerifyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject scenarios the script builder cannot render sensibly
    pub fn validate(&self) -> VerifyResult<()> {
        if self.steps.is_empty() {
            return Err(VerifyError::ScenarioParse(format!(
                "scenario '{}' has no steps",
                self.name
            )));
        }

        if let Some(stub) = self.stubs.iter().find(|s| s.pattern.trim().is_empty()) {
            return Err(VerifyError::ScenarioParse(format!(
                "stub '{}' has an empty pattern",
                stub.name
            )));
        }

        let mut seen = HashSet::new();
        for name in self.screenshot_names() {
            if name == config::ERROR_SCREENSHOT {
                return Err(VerifyError::ScenarioParse(format!(
                    "screenshot name '{}' is reserved",
                    name
                )));
            }
            if !seen.insert(name) {
                return Err(VerifyError::ScenarioParse(format!(
                    "duplicate screenshot name '{}'",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Names of the screenshots a successful run produces, in order
    pub fn screenshot_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Screenshot { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Paths of every file the scenario uploads
    pub fn upload_paths(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::UploadFile { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passed() -> Observation {
        Observation {
            ok: true,
            error: None,
            value: None,
        }
    }

    fn failed(error: &str) -> Observation {
        Observation {
            ok: false,
            error: Some(error.to_string()),
            value: None,
        }
    }

    fn value(v: serde_json::Value) -> Observation {
        Observation {
            ok: true,
            error: None,
            value: Some(v),
        }
    }

    #[test]
    fn test_report_flow_order() {
        let scenario = Scenario::report_flow(&VerifierConfig::default()).unwrap();
        assert_eq!(scenario.stubs.len(), 4);
        assert_eq!(
            scenario.screenshot_names(),
            vec!["leaderboard_badge", "smart_suggestion"]
        );

        let actions: Vec<String> = scenario
            .steps
            .iter()
            .filter(|s| s.kind() != OutcomeKind::Progress)
            .map(Step::action_name)
            .collect();
        assert_eq!(
            actions,
            vec![
                "navigate:http://localhost:5173/leaderboard",
                "wait:Civic Hero",
                "screenshot:leaderboard_badge",
                "navigate:http://localhost:5173/report",
                "upload:input[type='file']",
                "wait:AI Suggestion",
                "contains:garbage",
                "screenshot:smart_suggestion",
                "click:Apply",
                "select:select[0]",
            ]
        );
    }

    #[test]
    fn test_wait_messages() {
        let step = Step::WaitForText {
            text: "Civic Hero".to_string(),
            timeout_ms: 5000,
            label: Some("Civic Hero badge".to_string()),
        };
        assert_eq!(step.evaluate(2, &passed()).message, "Found Civic Hero badge!");

        let outcome = step.evaluate(2, &failed("Timeout 5000ms exceeded."));
        assert!(!outcome.passed);
        assert_eq!(outcome.message, "Civic Hero badge NOT found!");
        assert_eq!(outcome.detail.as_deref(), Some("Timeout 5000ms exceeded."));
    }

    #[test]
    fn test_content_contains_requires_true() {
        let step = Step::ContentContains {
            needle: "garbage".to_string(),
            label: Some("Suggestion text".to_string()),
        };
        assert!(step.evaluate(0, &value(json!(true))).passed);
        assert!(!step.evaluate(0, &value(json!(false))).passed);
        assert!(!step.evaluate(0, &failed("page closed")).passed);
    }

    #[test]
    fn test_select_value_comparison() {
        let step = Step::SelectValue {
            selector: "select".to_string(),
            index: 0,
            expected: "garbage".to_string(),
            label: Some("Category".to_string()),
        };

        let ok = step.evaluate(14, &value(json!("garbage")));
        assert!(ok.passed);
        assert_eq!(ok.detail.as_deref(), Some("garbage"));

        let wrong = step.evaluate(14, &value(json!("pothole")));
        assert!(!wrong.passed);
        assert_eq!(
            wrong.message,
            "Category failed to apply. Expected 'garbage', got 'pothole'"
        );

        let missing = step.evaluate(14, &failed("no select on page"));
        assert!(!missing.passed);
        assert!(missing.message.starts_with("Error checking category"));
    }

    #[test]
    fn test_log_is_progress() {
        let step = Step::Log {
            message: "Clicking Apply...".to_string(),
        };
        let outcome = step.evaluate(0, &passed());
        assert_eq!(outcome.kind, OutcomeKind::Progress);
        assert_eq!(outcome.message, "Clicking Apply...");
    }

    #[test]
    fn test_parse_yaml_scenario() {
        let yaml = r#"
name: leaderboard-only
stubs:
  - name: leaderboard
    pattern: "**/api/leaderboard"
    body: '{"leaderboard":[]}'
steps:
  - action: navigate
    url: http://localhost:5173/leaderboard
  - action: wait_for_text
    text: Civic Hero
  - action: screenshot
    name: leaderboard_badge
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.viewport, Viewport::default());
        match &scenario.steps[1] {
            Step::WaitForText { timeout_ms, .. } => assert_eq!(*timeout_ms, 5000),
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_reserved_screenshot_name_rejected() {
        let yaml = r#"
name: bad
steps:
  - action: screenshot
    name: error
"#;
        assert!(matches!(
            Scenario::from_yaml(yaml),
            Err(VerifyError::ScenarioParse(_))
        ));
    }

    #[test]
    fn test_duplicate_screenshot_rejected() {
        let yaml = r#"
name: bad
steps:
  - action: screenshot
    name: page
  - action: screenshot
    name: page
"#;
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_steps_rejected() {
        assert!(Scenario::from_yaml("name: empty\nsteps: []\n").is_err());
    }
}
