//! Manual remediation text shown whenever the automatic apply does not succeed.
use std::fmt::Write;

const RULE_WIDTH: usize = 60;
const SDK_INSTALL_URL: &str = "https://cloud.google.com/sdk/docs/install";
const CONSOLE_BROWSER_URL: &str = "https://console.cloud.google.com/storage/browser";

/// Render both remediation paths for `bucket`.
///
/// `policy_file` is the name the operator is told to pass to `gsutil` and to
/// paste from; it is shown as given.
pub fn render(bucket: &str, project_id: &str, policy_file: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "Automatic configuration failed. Use one of the following methods:"
    );
    let _ = writeln!(out, "{rule}");

    let _ = writeln!(out);
    let _ = writeln!(out, "Method 1: install the Google Cloud SDK");
    let _ = writeln!(out, "1. Open {SDK_INSTALL_URL}");
    let _ = writeln!(out, "2. Download and run the installer");
    let _ = writeln!(out, "3. After installing, run the following commands:");
    let _ = writeln!(out, "   gcloud auth login");
    let _ = writeln!(out, "   gcloud config set project {project_id}");
    let _ = writeln!(out, "   gsutil cors set {policy_file} gs://{bucket}");

    let _ = writeln!(out);
    let _ = writeln!(out, "Method 2: configure it in the Google Cloud Console");
    let _ = writeln!(out, "1. Open {CONSOLE_BROWSER_URL}");
    let _ = writeln!(out, "2. Click the bucket '{bucket}'");
    let _ = writeln!(
        out,
        "3. Open the Configuration tab and scroll down to the CORS section"
    );
    let _ = writeln!(out, "4. Click to edit the CORS configuration");
    let _ = writeln!(out, "5. Paste the contents of {policy_file}");
    out
}
