//! Verifier configuration
//!
//! Every literal the report flow depends on lives here as a named constant.
//! `VerifierConfig::default()` reproduces the flow exactly; a TOML file or CLI
//! flags only override individual fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VerifyError, VerifyResult};

/// Base URL of the separately running front-end dev server
pub const DEFAULT_APP_URL: &str = "http://localhost:5173";
pub const LEADERBOARD_PATH: &str = "/leaderboard";
pub const REPORT_PATH: &str = "/report";

pub const TEXT_WAIT_TIMEOUT_MS: u64 = 5000;
pub const CLICK_TIMEOUT_MS: u64 = 2000;
pub const PROBE_TIMEOUT_MS: u64 = 3000;

pub const BADGE_MARKER: &str = "Civic Hero";
pub const SUGGESTION_MARKER: &str = "AI Suggestion";
pub const APPLY_LABEL: &str = "Apply";
pub const EXPECTED_CATEGORY: &str = "garbage";

pub const FILE_INPUT_SELECTOR: &str = "input[type='file']";
pub const CATEGORY_SELECT_SELECTOR: &str = "select";

pub const OUTPUT_DIR: &str = "verification";
pub const LEADERBOARD_SCREENSHOT: &str = "leaderboard_badge";
pub const SUGGESTION_SCREENSHOT: &str = "smart_suggestion";
pub const ERROR_SCREENSHOT: &str = "error";
pub const UPLOAD_FILE: &str = "dummy.jpg";
pub const REPORT_FILE: &str = "report.json";

/// Browser engine launched by Playwright
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// Run configuration for the verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Base URL of the application under test
    pub app_url: String,

    /// Directory for screenshots and the JSON report
    pub output_dir: PathBuf,

    /// Where the synthetic upload image is written
    pub upload_path: PathBuf,

    /// Timeout for marker-text waits
    pub text_wait_timeout_ms: u64,

    /// Timeout for the Apply click
    pub click_timeout_ms: u64,

    /// Category the smart-scan stub returns and the dropdown must end up on
    pub expected_category: String,

    pub browser: Browser,
    pub headless: bool,
    pub viewport: Viewport,

    /// Remove the upload image once the run is over
    pub cleanup_upload: bool,

    /// How long to wait for the app to answer before driving the browser
    pub probe_timeout_ms: u64,

    /// Baseline screenshots to compare against (None = no comparison)
    pub baseline_dir: Option<PathBuf>,

    /// Allowed pixel difference against a baseline (0.0 - 100.0 percent)
    pub visual_threshold: f64,

    /// Node.js executable used to run the Playwright script
    pub node_binary: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            output_dir: PathBuf::from(OUTPUT_DIR),
            upload_path: PathBuf::from(UPLOAD_FILE),
            text_wait_timeout_ms: TEXT_WAIT_TIMEOUT_MS,
            click_timeout_ms: CLICK_TIMEOUT_MS,
            expected_category: EXPECTED_CATEGORY.to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport: Viewport::default(),
            cleanup_upload: false,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            baseline_dir: None,
            visual_threshold: 0.5,
            node_binary: "node".to_string(),
        }
    }
}

impl VerifierConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> VerifyResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values that would make every run meaningless
    pub fn validate(&self) -> VerifyResult<()> {
        if !(0.0..=100.0).contains(&self.visual_threshold) {
            return Err(VerifyError::Config(format!(
                "visual_threshold must be between 0 and 100 percent, got {}",
                self.visual_threshold
            )));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> VerifyResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn leaderboard_url(&self) -> String {
        self.page_url(LEADERBOARD_PATH)
    }

    pub fn report_url(&self) -> String {
        self.page_url(REPORT_PATH)
    }

    fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.app_url.trim_end_matches('/'), path)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }

    pub fn diff_dir(&self) -> PathBuf {
        self.output_dir.join("diffs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_report_flow_literals() {
        let config = VerifierConfig::default();
        assert_eq!(config.leaderboard_url(), "http://localhost:5173/leaderboard");
        assert_eq!(config.report_url(), "http://localhost:5173/report");
        assert_eq!(config.text_wait_timeout_ms, 5000);
        assert_eq!(config.click_timeout_ms, 2000);
        assert_eq!(config.report_path(), PathBuf::from("verification/report.json"));
        assert_eq!(config.upload_path, PathBuf::from("dummy.jpg"));
        assert!(!config.cleanup_upload);
    }

    #[test]
    fn test_trailing_slash_in_app_url() {
        let config = VerifierConfig {
            app_url: "http://127.0.0.1:4173/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.report_url(), "http://127.0.0.1:4173/report");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: VerifierConfig = toml::from_str(
            r#"
app_url = "http://staging.local:8080"
browser = "firefox"
"#,
        )
        .unwrap();
        assert_eq!(config.app_url, "http://staging.local:8080");
        assert_eq!(config.browser, Browser::Firefox);
        assert_eq!(config.expected_category, "garbage");
        assert_eq!(config.viewport, Viewport::default());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let config = VerifierConfig::load(Path::new("/nonexistent/ui-verify.toml")).unwrap();
        assert_eq!(config, VerifierConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ui-verify.toml");
        let config = VerifierConfig {
            browser: Browser::Webkit,
            baseline_dir: Some(PathBuf::from("baselines")),
            cleanup_upload: true,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(VerifierConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ui-verify.toml");

        for threshold in ["-1.0", "100.5", "nan"] {
            std::fs::write(&path, format!("visual_threshold = {}\n", threshold)).unwrap();
            assert!(
                matches!(VerifierConfig::load(&path), Err(VerifyError::Config(_))),
                "threshold {} accepted",
                threshold
            );
        }

        std::fs::write(&path, "visual_threshold = 100.0\n").unwrap();
        assert_eq!(VerifierConfig::load(&path).unwrap().visual_threshold, 100.0);
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert_eq!("webkit".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("opera".parse::<Browser>().is_err());
    }
}
