//! Civic report UI verifier
//!
//! Smoke-tests the leaderboard and report pages of the civic reporting
//! front-end:
//! - Stubs the leaderboard, smart-scan, severity and depth APIs
//! - Checks the "Civic Hero" badge on the leaderboard
//! - Uploads a synthetic JPEG on the report form and checks the AI suggestion
//! - Applies the suggestion and reads back the category dropdown
//! - Writes screenshots and a JSON report to `verification/`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Verifier (Rust)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  AppProbe ──> write_upload_fixture ──> PlaywrightHandle     │
//! │                                          │ node - (stdin)    │
//! │                                          ▼                   │
//! │   ReportBuilder <── ScriptEvent lines <── Playwright script  │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  VisualAuditor ──> VerificationReport ──> report.json        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step runs inside its own `try/catch` in the generated script, so a
//! missing badge or dropdown is a failed outcome rather than an aborted run.

pub mod config;
pub mod error;
pub mod fixture;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod server;
pub mod spec;
pub mod stubs;
pub mod visual;

pub use config::VerifierConfig;
pub use error::{VerifyError, VerifyResult};
pub use report::{OutputFormat, VerificationReport};
pub use runner::Verifier;
pub use spec::{Scenario, Step};
