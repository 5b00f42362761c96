//! Screenshot audit with optional baseline comparison

use std::fmt;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat, Pixel, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::VerifierConfig;
use crate::error::{VerifyError, VerifyResult};

/// Per-channel difference tolerated before a pixel counts as changed
const TOLERANCE: i32 = 5;

/// How a screenshot compares with its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BaselineStatus {
    /// No baseline directory configured
    NotConfigured,
    /// Baseline directory configured but no file for this screenshot
    Missing,
    Matches { diff_percent: f64 },
    Differs {
        diff_percent: f64,
        diff_image: Option<PathBuf>,
    },
}

impl fmt::Display for BaselineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineStatus::NotConfigured => write!(f, "-"),
            BaselineStatus::Missing => write!(f, "no baseline"),
            BaselineStatus::Matches { diff_percent } => write!(f, "match ({:.2}%)", diff_percent),
            BaselineStatus::Differs { diff_percent, .. } => write!(f, "DIFFERS ({:.2}%)", diff_percent),
        }
    }
}

/// What we know about a screenshot file after the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotAudit {
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub sha256: String,
    pub baseline: BaselineStatus,
}

/// Configuration for visual checks
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: Option<PathBuf>,
    pub diff_dir: PathBuf,
    pub threshold: f64,
}

impl From<&VerifierConfig> for VisualConfig {
    fn from(config: &VerifierConfig) -> Self {
        Self {
            baseline_dir: config.baseline_dir.clone(),
            diff_dir: config.diff_dir(),
            threshold: config.visual_threshold,
        }
    }
}

pub struct VisualAuditor {
    config: VisualConfig,
}

impl VisualAuditor {
    pub fn new(config: VisualConfig) -> Self {
        Self { config }
    }

    /// Decode, hash and (if configured) compare a screenshot
    pub fn audit(&self, name: &str, path: &Path) -> VerifyResult<ScreenshotAudit> {
        if !path.exists() {
            return Err(VerifyError::Visual(format!(
                "screenshot not found: {}",
                path.display()
            )));
        }

        let data = std::fs::read(path)?;
        let actual = image::load_from_memory_with_format(&data, ImageFormat::Png)
            .map_err(|e| VerifyError::Visual(format!("{} is not a PNG: {}", path.display(), e)))?;
        let (width, height) = actual.dimensions();

        let baseline = match self.baseline_path(name) {
            None => BaselineStatus::NotConfigured,
            Some(baseline_path) if !baseline_path.exists() => {
                info!(
                    "No baseline for '{}' - create one with --update-baselines",
                    name
                );
                BaselineStatus::Missing
            }
            Some(baseline_path) => self.compare(name, &actual, &baseline_path)?,
        };

        Ok(ScreenshotAudit {
            width,
            height,
            bytes: data.len() as u64,
            sha256: hash_bytes(&data),
            baseline,
        })
    }

    fn baseline_path(&self, name: &str) -> Option<PathBuf> {
        self.config
            .baseline_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.png", name)))
    }

    /// Pixel-by-pixel comparison against the baseline
    fn compare(
        &self,
        name: &str,
        actual: &DynamicImage,
        baseline_path: &Path,
    ) -> VerifyResult<BaselineStatus> {
        let baseline = image::open(baseline_path)?;

        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "Screenshot dimensions differ: actual {:?} vs baseline {:?}",
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let (diff_img, diff_pixels, total_pixels) = diff_images(&actual.to_rgba8(), &baseline.to_rgba8());

        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            (diff_pixels as f64 / total_pixels as f64) * 100.0
        };

        if diff_percent <= self.config.threshold {
            debug!("'{}' matches baseline ({:.2}%)", name, diff_percent);
            return Ok(BaselineStatus::Matches { diff_percent });
        }

        warn!(
            "Visual regression detected in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
            name, diff_percent, self.config.threshold
        );

        std::fs::create_dir_all(&self.config.diff_dir)?;
        let path = self.config.diff_dir.join(format!("{}-diff.png", name));
        let diff_image = match diff_img.save(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Could not write diff image for '{}': {}", name, e);
                None
            }
        };

        Ok(BaselineStatus::Differs {
            diff_percent,
            diff_image,
        })
    }

    /// Copy a screenshot into the baseline directory
    pub fn update_baseline(&self, name: &str, path: &Path) -> VerifyResult<PathBuf> {
        let baseline_path = self.baseline_path(name).ok_or_else(|| {
            VerifyError::Config("no baseline directory configured".to_string())
        })?;

        if !path.exists() {
            return Err(VerifyError::Visual(format!(
                "Cannot update baseline: screenshot not found: {}",
                path.display()
            )));
        }

        if let Some(parent) = baseline_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(path, &baseline_path)?;
        info!("Updated baseline for '{}'", name);

        Ok(baseline_path)
    }
}

/// Mark differing pixels red and dim the rest.
///
/// Pixels outside the overlap of two differently sized images count as
/// differing.
fn diff_images(actual: &RgbaImage, baseline: &RgbaImage) -> (RgbaImage, u64, u64) {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let in_actual = x < actual.width() && y < actual.height();
            let in_baseline = x < baseline.width() && y < baseline.height();

            if in_actual && in_baseline {
                let actual_pixel = actual.get_pixel(x, y);
                if pixels_differ(actual_pixel, baseline.get_pixel(x, y)) {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                } else {
                    let channels = actual_pixel.channels();
                    diff_img.put_pixel(
                        x,
                        y,
                        image::Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                    );
                }
            } else {
                diff_pixels += 1;
                diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            }
        }
    }

    (diff_img, diff_pixels, width as u64 * height as u64)
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > TOLERANCE)
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, shade: u8) {
        RgbaImage::from_pixel(width, height, image::Rgba([shade, shade, shade, 255]))
            .save(path)
            .unwrap();
    }

    fn auditor(baseline_dir: Option<PathBuf>, dir: &Path) -> VisualAuditor {
        VisualAuditor::new(VisualConfig {
            baseline_dir,
            diff_dir: dir.join("diffs"),
            threshold: 0.5,
        })
    }

    #[test]
    fn test_audit_without_baseline() {
        let dir = TempDir::new().unwrap();
        let shot = dir.path().join("leaderboard_badge.png");
        write_png(&shot, 8, 4, 40);

        let audit = auditor(None, dir.path()).audit("leaderboard_badge", &shot).unwrap();
        assert_eq!((audit.width, audit.height), (8, 4));
        assert_eq!(audit.sha256.len(), 64);
        assert_eq!(audit.baseline, BaselineStatus::NotConfigured);
    }

    #[test]
    fn test_missing_screenshot_is_error() {
        let dir = TempDir::new().unwrap();
        let result = auditor(None, dir.path()).audit("error", &dir.path().join("error.png"));
        assert!(matches!(result, Err(VerifyError::Visual(_))));
    }

    #[test]
    fn test_baseline_missing_then_updated_then_matches() {
        let dir = TempDir::new().unwrap();
        let baselines = dir.path().join("baselines");
        let shot = dir.path().join("smart_suggestion.png");
        write_png(&shot, 6, 6, 200);

        let auditor = auditor(Some(baselines.clone()), dir.path());
        let audit = auditor.audit("smart_suggestion", &shot).unwrap();
        assert_eq!(audit.baseline, BaselineStatus::Missing);

        auditor.update_baseline("smart_suggestion", &shot).unwrap();
        assert!(baselines.join("smart_suggestion.png").exists());

        let audit = auditor.audit("smart_suggestion", &shot).unwrap();
        assert_eq!(audit.baseline, BaselineStatus::Matches { diff_percent: 0.0 });
    }

    #[test]
    fn test_changed_screenshot_differs() {
        let dir = TempDir::new().unwrap();
        let baselines = dir.path().join("baselines");
        std::fs::create_dir_all(&baselines).unwrap();
        write_png(&baselines.join("page.png"), 4, 4, 10);

        let shot = dir.path().join("page.png");
        write_png(&shot, 4, 4, 250);

        let audit = auditor(Some(baselines), dir.path()).audit("page", &shot).unwrap();
        match audit.baseline {
            BaselineStatus::Differs { diff_percent, diff_image } => {
                assert_eq!(diff_percent, 100.0);
                assert!(diff_image.unwrap().exists());
            }
            other => panic!("expected a difference, got {:?}", other),
        }
    }

    #[test]
    fn test_size_change_counts_extra_pixels() {
        let a = RgbaImage::from_pixel(4, 2, image::Rgba([0, 0, 0, 255]));
        let b = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let (_, diff, total) = diff_images(&a, &b);
        assert_eq!((diff, total), (4, 8));
    }

    #[test]
    fn test_small_channel_noise_tolerated() {
        let a = image::Rgba([100, 100, 100, 255]);
        let b = image::Rgba([104, 97, 100, 255]);
        assert!(!pixels_differ(&a, &b));
        assert!(pixels_differ(&a, &image::Rgba([120, 100, 100, 255])));
    }
}
