//! The UI verifier: probe, fixture, browser run, audit, report

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{self, VerifierConfig};
use crate::error::VerifyResult;
use crate::fixture;
use crate::playwright::{PlaywrightConfig, PlaywrightHandle};
use crate::report::{ReportBuilder, VerificationReport};
use crate::server::AppProbe;
use crate::spec::Scenario;
use crate::visual::{VisualAuditor, VisualConfig};

/// Runs one scenario against the application
pub struct Verifier {
    config: VerifierConfig,
    scenario: Scenario,

    /// Print a console line for every event as it arrives
    echo: bool,
}

impl Verifier {
    /// Verifier for the built-in report flow
    pub fn new(config: VerifierConfig) -> VerifyResult<Self> {
        let scenario = Scenario::report_flow(&config)?;
        Ok(Self {
            config,
            scenario,
            echo: true,
        })
    }

    /// Verifier for a custom scenario
    pub fn with_scenario(config: VerifierConfig, scenario: Scenario) -> VerifyResult<Self> {
        scenario.validate()?;
        Ok(Self {
            config,
            scenario,
            echo: true,
        })
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Run the scenario once.
    ///
    /// Failed checks end up in the report; only infrastructure problems
    /// (node/Playwright missing, output directory not writable) are errors.
    pub async fn run(&self) -> VerifyResult<VerificationReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        std::fs::create_dir_all(&self.config.output_dir)?;
        let mut builder = ReportBuilder::new(&self.scenario, started_at);

        let probe = AppProbe::new(&self.config.app_url)?;
        let reachable = probe
            .wait_until_reachable(Duration::from_millis(self.config.probe_timeout_ms))
            .await;
        builder.app_reachable(reachable);

        self.prepare_upload();

        let playwright = match PlaywrightHandle::new(PlaywrightConfig::from(&self.config)) {
            Ok(playwright) => playwright,
            Err(e) => {
                self.cleanup_upload();
                return Err(e);
            }
        };
        let (tx, mut rx) = mpsc::unbounded_channel();

        let run = playwright.run_scenario(&self.scenario, tx);
        let consume = async {
            while let Some(event) = rx.recv().await {
                debug!("Script event: {:?}", event);
                if let Some(signal) = builder.apply(&event) {
                    if self.echo {
                        println!("{signal}");
                    }
                }
            }
        };
        let (exit, ()) = tokio::join!(run, consume);

        let exit = match exit {
            Ok(exit) => exit,
            Err(e) => {
                self.cleanup_upload();
                return Err(e);
            }
        };

        let mut report = builder.finish(start.elapsed().as_millis() as u64);

        if let Some(fatal) = &report.fatal {
            error!("Verification aborted: {}", fatal);
        }
        if !report.browser_closed {
            warn!("Browser did not report a clean shutdown (exit: {})", exit.status);
        }

        self.audit_screenshots(&mut report);
        self.cleanup_upload();

        report.write_json(&self.config.report_path())?;

        info!(
            "Verification finished: {} passed, {} failed ({} ms)",
            report.passed(),
            report.failed(),
            report.duration_ms
        );

        Ok(report)
    }

    /// Write the synthetic JPEG and make sure it decodes.
    ///
    /// A failure here is not fatal: the upload step will fail in the browser
    /// and be reported like any other step.
    fn prepare_upload(&self) {
        let path = &self.config.upload_path;
        if !self.scenario.upload_paths().contains(&path.as_path()) {
            return;
        }

        match fixture::write_upload_fixture(path) {
            Ok(bytes) => match std::fs::read(path).map(|data| fixture::inspect_jpeg(&data)) {
                Ok(Ok((width, height))) => {
                    debug!("Upload fixture {} ({} bytes, {}x{})", path.display(), bytes, width, height)
                }
                Ok(Err(e)) => warn!("Upload fixture does not decode: {}", e),
                Err(e) => warn!("Upload fixture unreadable: {}", e),
            },
            Err(e) => warn!("Could not write upload fixture {}: {}", path.display(), e),
        }
    }

    fn cleanup_upload(&self) {
        if !self.config.cleanup_upload {
            return;
        }

        match std::fs::remove_file(&self.config.upload_path) {
            Ok(()) => debug!("Removed {}", self.config.upload_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove {}: {}",
                self.config.upload_path.display(),
                e
            ),
        }
    }

    fn audit_screenshots(&self, report: &mut VerificationReport) {
        let auditor = VisualAuditor::new(VisualConfig::from(&self.config));

        for shot in &mut report.screenshots {
            match auditor.audit(&shot.name, &shot.path) {
                Ok(audit) => shot.audit = Some(audit),
                Err(e) => warn!("Screenshot '{}' failed audit: {}", shot.name, e),
            }
        }

        for name in self.scenario.screenshot_names() {
            if report.screenshot(name).is_none() {
                warn!("Expected screenshot '{}' was not written", name);
            }
        }
    }

    /// Copy this run's screenshots into the baseline directory
    pub fn update_baselines(&self, report: &VerificationReport) -> VerifyResult<usize> {
        let auditor = VisualAuditor::new(VisualConfig::from(&self.config));
        let mut updated = 0;

        for shot in &report.screenshots {
            if shot.name == config::ERROR_SCREENSHOT {
                continue;
            }
            auditor.update_baseline(&shot.name, &shot.path)?;
            updated += 1;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Step;

    #[test]
    fn test_new_uses_report_flow() {
        let verifier = Verifier::new(VerifierConfig::default()).unwrap();
        assert_eq!(verifier.scenario().name, "report-flow");
        assert_eq!(verifier.scenario().upload_paths().len(), 1);
    }

    #[test]
    fn test_with_scenario_validates() {
        let scenario = Scenario {
            name: "empty".to_string(),
            description: String::new(),
            viewport: Default::default(),
            stubs: Vec::new(),
            steps: Vec::new(),
        };
        assert!(Verifier::with_scenario(VerifierConfig::default(), scenario).is_err());
    }

    #[test]
    fn test_prepare_upload_writes_decodable_fixture() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = VerifierConfig {
            upload_path: dir.path().join("dummy.jpg"),
            output_dir: dir.path().join("verification"),
            ..Default::default()
        };
        let verifier = Verifier::new(config.clone()).unwrap().echo(false);
        verifier.prepare_upload();

        let data = std::fs::read(&config.upload_path).unwrap();
        assert!(fixture::inspect_jpeg(&data).is_ok());
    }

    #[test]
    fn test_cleanup_upload_only_when_enabled() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dummy.jpg");

        let keep = VerifierConfig {
            upload_path: path.clone(),
            ..Default::default()
        };
        let verifier = Verifier::new(keep.clone()).unwrap();
        verifier.prepare_upload();
        verifier.cleanup_upload();
        assert!(path.exists());

        let remove = VerifierConfig {
            cleanup_upload: true,
            ..keep
        };
        let verifier = Verifier::new(remove).unwrap();
        verifier.cleanup_upload();
        assert!(!path.exists());
        // Second removal is a no-op
        verifier.cleanup_upload();
    }

    #[test]
    fn test_update_baselines_without_dir_is_config_error() {
        let verifier = Verifier::new(VerifierConfig::default()).unwrap();
        let mut builder = ReportBuilder::new(verifier.scenario(), Utc::now());
        builder.apply(&crate::playwright::ScriptEvent::Screenshot {
            name: "leaderboard_badge".to_string(),
            path: "verification/leaderboard_badge.png".into(),
        });
        let report = builder.finish(0);

        assert!(matches!(
            verifier.update_baselines(&report),
            Err(crate::error::VerifyError::Config(_))
        ));
    }

    #[test]
    fn test_prepare_upload_skipped_without_upload_step() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = VerifierConfig {
            upload_path: dir.path().join("dummy.jpg"),
            ..Default::default()
        };
        let scenario = Scenario {
            name: "leaderboard-only".to_string(),
            description: String::new(),
            viewport: Default::default(),
            stubs: Vec::new(),
            steps: vec![Step::Navigate {
                url: config.leaderboard_url(),
            }],
        };
        let verifier = Verifier::with_scenario(config.clone(), scenario).unwrap();
        verifier.prepare_upload();
        assert!(!config.upload_path.exists());
    }
}
