//! Detection Summary
//!
//! The service reports the same counters in two shapes: a file object
//! (`attributes.last_analysis_stats`) on a cache hit, and an analysis object
//! (`data.attributes.stats` + `meta.file_info`) once a scan completes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub malicious: u64,
    pub suspicious: u64,
    pub undetected: u64,
    pub harmless: u64,
    /// malicious + suspicious + undetected + harmless
    pub total: u64,
    pub size: Option<u64>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl DetectionSummary {
    /// From a file object (`data` of `GET /files/{hash}`)
    pub fn from_file_object(file: &Value) -> Option<Self> {
        let attributes = file.get("attributes")?;
        let stats = attributes.get("last_analysis_stats")?;
        Some(Self::build(stats, attributes))
    }

    /// From a full analysis reply (`GET /analyses/{id}`)
    pub fn from_analysis(report: &Value) -> Option<Self> {
        let stats = report.pointer("/data/attributes/stats")?;
        let meta = report.pointer("/meta/file_info").unwrap_or(&Value::Null);
        Some(Self::build(stats, meta))
    }

    fn build(stats: &Value, meta: &Value) -> Self {
        let count = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);
        let text = |key: &str| meta.get(key).and_then(Value::as_str).map(str::to_string);

        let malicious = count("malicious");
        let suspicious = count("suspicious");
        let undetected = count("undetected");
        let harmless = count("harmless");

        Self {
            malicious,
            suspicious,
            undetected,
            harmless,
            total: malicious + suspicious + undetected + harmless,
            size: meta.get("size").and_then(Value::as_u64),
            md5: text("md5"),
            sha1: text("sha1"),
            sha256: text("sha256"),
        }
    }

    /// "malicious/total"
    pub fn detection_rate(&self) -> String {
        format!("{}/{}", self.malicious, self.total)
    }
}
