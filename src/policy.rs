//! CORS policy loading.
//!
//! A policy file on disk is treated as opaque pass-through JSON: whatever keys
//! it uses are what gets applied and printed. Only the built-in default is
//! typed.
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const DEFAULT_METHODS: [&str; 6] = ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS"];
const DEFAULT_RESPONSE_HEADERS: [&str; 8] = [
    "Content-Type",
    "Authorization",
    "Content-Length",
    "User-Agent",
    "x-goog-resumable",
    "x-goog-upload-command",
    "x-goog-upload-header-content-length",
    "x-goog-upload-header-content-type",
];
const DEFAULT_MAX_AGE_SECONDS: u64 = 3600;

/// One CORS rule in the storage provider's JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsRule {
    #[serde(rename = "origin")]
    pub origins: Vec<String>,
    #[serde(rename = "method")]
    pub methods: Vec<String>,
    pub max_age_seconds: u64,
    #[serde(rename = "responseHeader")]
    pub response_headers: Vec<String>,
}

impl CorsRule {
    /// Rule allowing any origin with the upload-friendly method and header set.
    pub fn permissive() -> Self {
        Self {
            origins: vec!["*".to_string()],
            methods: DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
            response_headers: DEFAULT_RESPONSE_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }

    /// Provider JSON for this rule, keys in the order the provider documents.
    pub fn to_json(&self) -> Value {
        json!({
            "origin": self.origins,
            "method": self.methods,
            "maxAgeSeconds": self.max_age_seconds,
            "responseHeader": self.response_headers,
        })
    }
}

/// Where the active policy came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    File(PathBuf),
    BuiltIn,
}

/// The policy for this run. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CorsPolicy {
    document: Value,
    source: PolicySource,
}

/// Result of looking for the policy file.
#[derive(Debug)]
pub struct PolicyLoad {
    pub policy: CorsPolicy,
    /// Set when the file did not exist and the default was substituted.
    pub missing: bool,
}

/// File handed to the apply tool; holds the temp file alive when needed.
#[derive(Debug)]
pub struct PolicyPayload {
    path: PathBuf,
    _scratch: Option<NamedTempFile>,
}

impl PolicyPayload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CorsPolicy {
    /// The compiled-in policy used when no file is present.
    pub fn builtin() -> Self {
        Self {
            document: Value::Array(vec![CorsRule::permissive().to_json()]),
            source: PolicySource::BuiltIn,
        }
    }

    /// Parse `path` if it exists, otherwise fall back to [`CorsPolicy::builtin`].
    pub fn load_or_default(path: &Path) -> Result<PolicyLoad> {
        if !path.exists() {
            return Ok(PolicyLoad {
                policy: Self::builtin(),
                missing: true,
            });
        }
        let policy = Self::load(path)?;
        Ok(PolicyLoad {
            policy,
            missing: false,
        })
    }

    /// Parse a policy file as-is.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let document: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse CORS policy JSON {}", path.display()))?;
        Ok(Self {
            document,
            source: PolicySource::File(path.to_path_buf()),
        })
    }

    pub fn source(&self) -> &PolicySource {
        &self.source
    }

    /// Number of rules when the document is a rule array.
    pub fn rule_count(&self) -> Option<usize> {
        self.document.as_array().map(Vec::len)
    }

    /// Two-space indented JSON with keys in their loaded order.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_else(|_| self.document.to_string())
    }

    /// File to pass to the apply tool.
    ///
    /// A file-backed policy is passed by its own path; the built-in policy is
    /// written to a temporary file that lives as long as the payload.
    pub fn payload(&self) -> Result<PolicyPayload> {
        match &self.source {
            PolicySource::File(path) => Ok(PolicyPayload {
                path: path.clone(),
                _scratch: None,
            }),
            PolicySource::BuiltIn => {
                let mut scratch = tempfile::Builder::new()
                    .prefix("cors-")
                    .suffix(".json")
                    .tempfile()
                    .context("create temporary policy file")?;
                scratch
                    .write_all(self.to_pretty_json().as_bytes())
                    .context("write temporary policy file")?;
                scratch.flush().context("flush temporary policy file")?;
                Ok(PolicyPayload {
                    path: scratch.path().to_path_buf(),
                    _scratch: Some(scratch),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"origin":["https://a.com"],"method":["GET"],"maxAgeSeconds":60,"responseHeader":["X-Test"]}"#;

    #[test]
    fn builtin_allows_any_origin_and_six_methods() {
        let policy = CorsPolicy::builtin();
        assert_eq!(policy.source(), &PolicySource::BuiltIn);
        assert_eq!(policy.rule_count(), Some(1));
        let rules: Vec<CorsRule> =
            serde_json::from_value(policy.document.clone()).expect("typed rules");
        assert_eq!(rules[0].origins, vec!["*"]);
        assert_eq!(rules[0].methods.len(), 6);
        assert_eq!(rules[0].max_age_seconds, 3600);
        assert_eq!(rules[0].response_headers.len(), 8);
    }

    #[test]
    fn rule_json_reads_back_as_the_same_rule() {
        let rule = CorsRule::permissive();
        let parsed: CorsRule = serde_json::from_value(rule.to_json()).expect("parse rule");
        assert_eq!(parsed, rule);
    }

    #[test]
    fn builtin_uses_provider_key_names() {
        let text = CorsPolicy::builtin().to_pretty_json();
        for key in ["\"origin\"", "\"method\"", "\"maxAgeSeconds\"", "\"responseHeader\""] {
            assert!(text.contains(key), "missing {key} in {text}");
        }
        assert!(text.starts_with("[\n  {\n    \"origin\""));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let load = CorsPolicy::load_or_default(&dir.path().join("cors.json")).expect("load");
        assert!(load.missing);
        assert_eq!(load.policy, CorsPolicy::builtin());
    }

    #[test]
    fn file_content_is_passed_through_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cors.json");
        std::fs::write(&path, SAMPLE).expect("write");

        let load = CorsPolicy::load_or_default(&path).expect("load");
        assert!(!load.missing);
        assert_eq!(load.policy.source(), &PolicySource::File(path.clone()));
        // a bare object is not a rule array; it is still kept verbatim
        assert_eq!(load.policy.rule_count(), None);

        let expected: Value = serde_json::from_str(SAMPLE).expect("sample");
        assert_eq!(
            load.policy.to_pretty_json(),
            serde_json::to_string_pretty(&expected).expect("pretty")
        );
        let keys: Vec<&str> = load
            .policy
            .document
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["origin", "method", "maxAgeSeconds", "responseHeader"]);
    }

    #[test]
    fn non_ascii_is_kept_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cors.json");
        std::fs::write(&path, r#"[{"origin":["https://동네.kr"]}]"#).expect("write");
        let policy = CorsPolicy::load(&path).expect("load");
        assert!(policy.to_pretty_json().contains("https://동네.kr"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cors.json");
        std::fs::write(&path, "[{").expect("write");
        let err = CorsPolicy::load_or_default(&path).expect_err("should fail");
        assert!(format!("{err:#}").contains("parse CORS policy JSON"));
    }

    #[test]
    fn builtin_payload_is_written_to_a_scratch_file() {
        let policy = CorsPolicy::builtin();
        let payload = policy.payload().expect("payload");
        let written = std::fs::read_to_string(payload.path()).expect("read payload");
        assert_eq!(written, policy.to_pretty_json());

        let path = payload.path().to_path_buf();
        drop(payload);
        assert!(!path.exists());
    }

    #[test]
    fn file_payload_uses_the_source_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cors.json");
        std::fs::write(&path, SAMPLE).expect("write");
        let policy = CorsPolicy::load(&path).expect("load");
        assert_eq!(policy.payload().expect("payload").path(), path.as_path());
    }
}
