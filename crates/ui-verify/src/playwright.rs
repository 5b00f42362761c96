//! Playwright browser automation
//!
//! A scenario is rendered into a single Node.js script and piped to `node -`.
//! The script reports back over stdout: every line starting with
//! [`EVENT_PREFIX`] carries one JSON-encoded [`ScriptEvent`].

use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{self, Browser, VerifierConfig, Viewport};
use crate::error::{VerifyError, VerifyResult};
use crate::spec::{Scenario, Step};
use crate::stubs::RouteStub;

pub const EVENT_PREFIX: &str = "@@ui-verify ";

/// What the browser saw while running one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The step body ran without throwing
    pub ok: bool,

    #[serde(default)]
    pub error: Option<String>,

    /// Value read back from the page, if the step reads one
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl Observation {
    pub fn bool_value(&self) -> Option<bool> {
        self.value.as_ref().and_then(serde_json::Value::as_bool)
    }

    pub fn str_value(&self) -> Option<&str> {
        self.value.as_ref().and_then(serde_json::Value::as_str)
    }
}

/// One structured line emitted by the generated script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// A route stub was registered
    Stub { name: String, pattern: String },

    /// A step finished, successfully or not
    Step {
        index: usize,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        value: Option<serde_json::Value>,
    },

    /// A screenshot file was written
    Screenshot { name: String, path: PathBuf },

    /// Something outside any step's boundary threw
    Fatal { error: String },

    /// The browser was closed
    Closed,
}

impl ScriptEvent {
    /// Parse a stdout line; `None` for ordinary console output
    pub fn parse_line(line: &str) -> Option<Self> {
        let payload = line.trim_end().strip_prefix(EVENT_PREFIX)?;
        match serde_json::from_str(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Malformed script event ({}): {}", e, payload);
                None
            }
        }
    }

    pub fn observation(&self) -> Option<Observation> {
        match self {
            ScriptEvent::Step { ok, error, value, .. } => Some(Observation {
                ok: *ok,
                error: error.clone(),
                value: value.clone(),
            }),
            _ => None,
        }
    }
}

/// How the node process ended
#[derive(Debug, Clone)]
pub struct ScriptExit {
    pub status: ExitStatus,
    pub events: usize,
    pub stderr: String,
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub screenshot_dir: PathBuf,
    pub browser: Browser,
    pub headless: bool,
    pub node_binary: String,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from(config::OUTPUT_DIR),
            browser: Browser::Chromium,
            headless: true,
            node_binary: "node".to_string(),
        }
    }
}

impl From<&VerifierConfig> for PlaywrightConfig {
    fn from(config: &VerifierConfig) -> Self {
        Self {
            screenshot_dir: config.output_dir.clone(),
            browser: config.browser,
            headless: config.headless,
            node_binary: config.node_binary.clone(),
        }
    }
}

/// Render `s` as a JavaScript string literal
fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Collapse every JavaScript line terminator so `s` fits in a `//` comment
fn single_line(s: &str) -> String {
    s.replace(['\n', '\r', '\u{2028}', '\u{2029}'], " ")
}

impl PlaywrightConfig {
    fn screenshot_path(&self, name: &str) -> String {
        self.screenshot_dir
            .join(format!("{}.png", name))
            .to_string_lossy()
            .into_owned()
    }

    /// Build the Playwright script for a whole scenario.
    ///
    /// Browser, context and page are acquired once; the `finally` block closes
    /// the browser on every exit path.
    pub fn build_script(&self, scenario: &Scenario) -> String {
        let mut script = String::new();

        script.push_str(&self.header(&scenario.viewport));

        for stub in &scenario.stubs {
            script.push_str(&stub_to_js(stub));
        }

        for (i, step) in scenario.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, step.action_name()));
            script.push_str(&self.step_to_js(step, i));
        }

        script.push_str(&self.footer());
        script
    }

    fn header(&self, viewport: &Viewport) -> String {
        format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

const EVENT_PREFIX = {prefix};
const emit = (event) => console.log(EVENT_PREFIX + JSON.stringify(event));
const describe = (error) => String((error && error.message) || error).split('\n')[0];

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  let page = null;

  try {{
    const context = await browser.newContext({{
      viewport: {{ width: {width}, height: {height} }}
    }});
    page = await context.newPage();
"#,
            prefix = js_str(EVENT_PREFIX),
            browser = self.browser.as_str(),
            headless = self.headless,
            width = viewport.width,
            height = viewport.height,
        )
    }

    fn footer(&self) -> String {
        let error_path = self.screenshot_path(config::ERROR_SCREENSHOT);
        format!(
            r#"
  }} catch (error) {{
    emit({{ kind: 'fatal', error: describe(error) }});
    if (page) {{
      try {{
        await page.screenshot({{ path: {path} }});
        emit({{ kind: 'screenshot', name: {name}, path: {path} }});
      }} catch (_) {{}}
    }}
  }} finally {{
    await browser.close();
    emit({{ kind: 'closed' }});
  }}
}})();
"#,
            path = js_str(&error_path),
            name = js_str(config::ERROR_SCREENSHOT),
        )
    }

    /// Wrap a step body in its own fault boundary
    fn step_to_js(&self, step: &Step, index: usize) -> String {
        let (body, after) = self.step_body(step);
        format!(
            r#"    try {{
      let value = null;
{body}
      emit({{ kind: 'step', index: {index}, ok: true, value }});{after}
    }} catch (error) {{
      emit({{ kind: 'step', index: {index}, ok: false, error: describe(error) }});
    }}
"#,
        )
    }

    /// JavaScript for the step itself, plus anything emitted after success
    fn step_body(&self, step: &Step) -> (String, String) {
        match step {
            Step::Log { message } => (format!("      // {}", single_line(message)), String::new()),
            Step::Navigate { url } => (format!("      await page.goto({});", js_str(url)), String::new()),
            Step::WaitForText { text, timeout_ms, .. } => (
                format!(
                    "      await page.waitForSelector({}, {{ timeout: {} }});",
                    js_str(&format!("text={}", text)),
                    timeout_ms
                ),
                String::new(),
            ),
            Step::UploadFile { selector, path } => (
                format!(
                    "      await page.locator({}).first().setInputFiles({});",
                    js_str(selector),
                    js_str(&path.to_string_lossy())
                ),
                String::new(),
            ),
            Step::ContentContains { needle, .. } => (
                format!("      value = (await page.content()).includes({});", js_str(needle)),
                String::new(),
            ),
            Step::Click { text, timeout_ms, .. } => (
                format!(
                    "      await page.click({}, {{ timeout: {} }});",
                    js_str(&format!("text={}", text)),
                    timeout_ms
                ),
                String::new(),
            ),
            Step::SelectValue { selector, index, .. } => (
                format!(
                    "      value = await page.locator({}).nth({}).inputValue();",
                    js_str(selector),
                    index
                ),
                String::new(),
            ),
            Step::Screenshot { name, full_page } => {
                let path = js_str(&self.screenshot_path(name));
                (
                    format!(
                        "      await page.screenshot({{ path: {}, fullPage: {} }});",
                        path, full_page
                    ),
                    format!(
                        "\n      emit({{ kind: 'screenshot', name: {}, path: {} }});",
                        js_str(name),
                        path
                    ),
                )
            }
        }
    }
}

fn stub_to_js(stub: &RouteStub) -> String {
    format!(
        r#"
    await page.route({pattern}, (route) => route.fulfill({{
      status: {status},
      contentType: {content_type},
      body: {body}
    }}));
    emit({{ kind: 'stub', name: {name}, pattern: {pattern} }});
"#,
        pattern = js_str(&stub.pattern),
        status = stub.status,
        content_type = js_str(&stub.content_type),
        body = js_str(&stub.body),
        name = js_str(&stub.name),
    )
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> VerifyResult<Self> {
        Self::check_playwright_installed(&config.node_binary)?;

        std::fs::create_dir_all(&config.screenshot_dir)?;

        Ok(Self { config })
    }

    /// Check that node can resolve the `playwright` package
    fn check_playwright_installed(node_binary: &str) -> VerifyResult<()> {
        let status = Command::new(node_binary)
            .args(["-e", "require.resolve('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(VerifyError::PlaywrightNotFound),
        }
    }

    pub fn build_script(&self, scenario: &Scenario) -> String {
        self.config.build_script(scenario)
    }

    /// Render and run a scenario, forwarding events as they arrive
    pub async fn run_scenario(
        &self,
        scenario: &Scenario,
        events: mpsc::UnboundedSender<ScriptEvent>,
    ) -> VerifyResult<ScriptExit> {
        let script = self.build_script(scenario);
        debug!("Generated {} byte script for '{}'", script.len(), scenario.name);
        self.run_script(&script, events).await
    }

    /// Execute a script via `node -`.
    ///
    /// Reading the script from stdin makes `require('playwright')` resolve
    /// from the current working directory.
    pub async fn run_script(
        &self,
        script: &str,
        events: mpsc::UnboundedSender<ScriptEvent>,
    ) -> VerifyResult<ScriptExit> {
        info!(
            "Launching {} (headless: {})",
            self.config.browser.as_str(),
            self.config.headless
        );

        let mut child = TokioCommand::new(&self.config.node_binary)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VerifyError::Playwright("node stdin unavailable".to_string()))?;
        stdin.write_all(script.as_bytes()).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VerifyError::Playwright("node stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VerifyError::Playwright("node stderr unavailable".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.map(|_| buf)
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut count = 0;
        while let Some(line) = lines.next_line().await? {
            match ScriptEvent::parse_line(&line) {
                Some(event) => {
                    count += 1;
                    if events.send(event).is_err() {
                        warn!("Event receiver dropped; discarding remaining events");
                    }
                }
                None => debug!("[node] {}", line),
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task
            .await
            .map_err(|e| VerifyError::Playwright(format!("stderr reader failed: {}", e)))??;

        if !status.success() {
            if count == 0 {
                return Err(VerifyError::Playwright(format!(
                    "node exited with {} before reporting anything:\n{}",
                    status,
                    stderr.trim()
                )));
            }
            warn!("node exited with {}: {}", status, stderr.trim());
        }

        Ok(ScriptExit {
            status,
            events: count,
            stderr,
        })
    }
}
