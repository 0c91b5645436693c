//! Compiled-in settings for the CORS applier.
//!
//! The bucket and project are fixed for this deployment and deliberately not
//! exposed as flags or environment variables.
use crate::exec::CommandSpec;
use std::path::PathBuf;
use std::time::Duration;

/// Storage bucket that receives the CORS policy.
pub const BUCKET: &str = "ondongne-e494a.firebasestorage.app";
/// Cloud project owning [`BUCKET`].
pub const PROJECT_ID: &str = "ondongne-e494a";
/// Policy file looked up relative to the working directory.
pub const DEFAULT_POLICY_PATH: &str = "cors.json";

pub const AUTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
pub const APPLY_TIMEOUT: Duration = Duration::from_secs(30);

const CREDENTIAL_TOOL: &str = "gcloud";
const APPLY_TOOL: &str = "gsutil";

/// Everything one applier run needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bucket: String,
    pub project_id: String,
    pub policy_path: PathBuf,
    /// Credential status probe; success means the apply tool can be used.
    pub auth_check: CommandSpec,
    /// Apply invocation prefix; the policy file and bucket URL are appended.
    pub apply: CommandSpec,
    pub auth_check_timeout: Duration,
    pub apply_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bucket: BUCKET.to_string(),
            project_id: PROJECT_ID.to_string(),
            policy_path: PathBuf::from(DEFAULT_POLICY_PATH),
            auth_check: CommandSpec::new(CREDENTIAL_TOOL, ["auth", "list"]),
            apply: CommandSpec::new(APPLY_TOOL, ["cors", "set"]),
            auth_check_timeout: AUTH_CHECK_TIMEOUT,
            apply_timeout: APPLY_TIMEOUT,
        }
    }
}

impl Settings {
    /// Storage URL of the target bucket, e.g. `gs://name`.
    pub fn bucket_url(&self) -> String {
        format!("gs://{}", self.bucket)
    }

    /// Apply invocation for the given policy file.
    pub fn apply_command(&self, policy_file: &std::path::Path) -> CommandSpec {
        let mut command = self.apply.clone();
        command.args.push(policy_file.display().to_string());
        command.args.push(self.bucket_url());
        command
    }
}
