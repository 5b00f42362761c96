//! Canned backend responses for the report flow
//!
//! Payloads are typed so their serialized form is fixed by field order:
//! `serde_json::to_string` of each struct is the exact body the page receives.

use serde::{Deserialize, Serialize};

use crate::error::VerifyResult;

/// 1x1 transparent GIF returned as the depth map
pub const DEPTH_MAP_GIF_BASE64: &str = "R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// An intercepted URL pattern paired with a fixed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStub {
    /// Short name used in logs and the report
    pub name: String,

    /// Playwright glob, e.g. `**/api/leaderboard`
    pub pattern: String,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    pub body: String,
}

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    JSON_CONTENT_TYPE.to_string()
}

impl RouteStub {
    /// A 200 `application/json` stub whose body is `payload` serialized
    pub fn json<T: Serialize>(name: &str, pattern: &str, payload: &T) -> VerifyResult<Self> {
        Ok(Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            status: 200,
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_email: String,
    pub reports_count: u32,
    pub total_upvotes: u32,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartScanDetection {
    pub category: String,
    pub confidence: f64,
    pub all_scores: Vec<CategoryScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityDetection {
    pub level: String,
    pub confidence: f64,
    pub raw_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthAnalysis {
    pub depth_map: String,
}

pub fn leaderboard() -> LeaderboardResponse {
    LeaderboardResponse {
        leaderboard: vec![
            LeaderboardEntry {
                user_email: "hero@test.com".to_string(),
                reports_count: 10,
                total_upvotes: 50,
                rank: 1,
            },
            LeaderboardEntry {
                user_email: "normal@test.com".to_string(),
                reports_count: 2,
                total_upvotes: 5,
                rank: 2,
            },
        ],
    }
}

pub fn smart_scan(category: &str) -> SmartScanDetection {
    SmartScanDetection {
        category: category.to_string(),
        confidence: 0.95,
        all_scores: Vec::new(),
    }
}

/// Keeps the severity widget quiet; not asserted on
pub fn severity() -> SeverityDetection {
    SeverityDetection {
        level: "Medium".to_string(),
        confidence: 0.5,
        raw_label: "medium urgency".to_string(),
    }
}

/// Keeps the depth widget quiet; not asserted on
pub fn depth() -> DepthAnalysis {
    DepthAnalysis {
        depth_map: DEPTH_MAP_GIF_BASE64.to_string(),
    }
}

/// The four stubs registered before the first navigation.
///
/// `category` is what smart-scan detection reports, and therefore what the
/// category dropdown must hold after Apply.
pub fn default_stubs(category: &str) -> VerifyResult<Vec<RouteStub>> {
    Ok(vec![
        RouteStub::json("leaderboard", "**/api/leaderboard", &leaderboard())?,
        RouteStub::json("smart-scan", "**/api/detect-smart-scan", &smart_scan(category))?,
        RouteStub::json("severity", "**/api/detect-severity", &severity())?,
        RouteStub::json("depth", "**/api/analyze-depth", &depth())?,
    ])
}
