//! Once-through CORS apply with a manual fallback.
//!
//! The applier never retries. Every failure folds into the same terminal
//! output: the manual instructions followed by the active policy.
use crate::config::Settings;
use crate::exec::{run_bounded, CommandSpec, RunOutcome};
use crate::manual;
use crate::policy::CorsPolicy;
use anyhow::Result;
use std::io::Write;
use std::process::ExitCode;

/// Why the automatic path was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The policy file exists but could not be read or parsed.
    PolicyUnreadable,
    /// The credential tool is not installed.
    ToolMissing,
    /// The credential tool ran but reported a non-zero status.
    NotAuthenticated,
    /// The credential check timed out or could not be run.
    CheckFailed,
    /// The apply tool exited non-zero.
    ApplyRejected,
    /// The apply tool could not be run, was missing, or timed out.
    ApplyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    ManualRequired(FailureReason),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Applied => 0,
            Outcome::ManualRequired(_) => 1,
        }
    }
}

impl From<&Outcome> for ExitCode {
    fn from(outcome: &Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

pub struct Applier {
    settings: Settings,
}

impl Applier {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the whole procedure, writing operator text to `out`.
    ///
    /// Only failures to write to `out` are returned as errors.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<Outcome> {
        let settings = &self.settings;
        writeln!(out, "Starting CORS configuration for the storage bucket...")?;
        writeln!(out, "Bucket: {}", settings.bucket)?;

        let policy_name = settings.policy_path.display().to_string();
        let (policy, outcome) = match CorsPolicy::load_or_default(&settings.policy_path) {
            Ok(load) => {
                if load.missing {
                    tracing::warn!(path = %policy_name, "policy file missing; using built-in");
                    writeln!(
                        out,
                        "[WARN] {policy_name} not found. Using the built-in default policy."
                    )?;
                } else {
                    tracing::debug!(
                        source = ?load.policy.source(),
                        rules = ?load.policy.rule_count(),
                        "policy loaded"
                    );
                    writeln!(out, "[OK] Read {policy_name}.")?;
                }
                let outcome = self.attempt(&load.policy, out)?;
                (load.policy, outcome)
            }
            Err(err) => {
                let detail = format!("{err:#}");
                tracing::error!(path = %policy_name, error = %detail, "policy unreadable");
                writeln!(out, "[ERROR] Could not load {policy_name}: {detail}")?;
                (
                    CorsPolicy::builtin(),
                    Outcome::ManualRequired(FailureReason::PolicyUnreadable),
                )
            }
        };

        if let Outcome::ManualRequired(reason) = &outcome {
            tracing::info!(?reason, "falling back to manual instructions");
            write!(
                out,
                "{}",
                manual::render(&settings.bucket, &settings.project_id, &policy_name)
            )?;
            writeln!(out)?;
            writeln!(out, "Current {policy_name} contents:")?;
            writeln!(out, "{}", policy.to_pretty_json())?;
        }
        Ok(outcome)
    }

    fn attempt<W: Write>(&self, policy: &CorsPolicy, out: &mut W) -> Result<Outcome> {
        let settings = &self.settings;
        let tool = &settings.auth_check.program;

        writeln!(out)?;
        writeln!(out, "Method 1: trying the {tool} CLI...")?;
        match run_bounded(&settings.auth_check, settings.auth_check_timeout) {
            Ok(outcome) if outcome.succeeded() => {
                writeln!(out, "[OK] {tool} CLI is installed and authenticated.")?;
            }
            Ok(RunOutcome::NotFound) => {
                writeln!(out, "[ERROR] {tool} CLI is not installed.")?;
                return Ok(Outcome::ManualRequired(FailureReason::ToolMissing));
            }
            Ok(RunOutcome::Exited { .. }) => {
                writeln!(
                    out,
                    "[ERROR] {tool} CLI is not installed or needs authentication."
                )?;
                return Ok(Outcome::ManualRequired(FailureReason::NotAuthenticated));
            }
            Ok(RunOutcome::TimedOut { after }) => {
                report_timeout(out, &settings.auth_check, after)?;
                return Ok(Outcome::ManualRequired(FailureReason::CheckFailed));
            }
            Err(err) => {
                writeln!(out, "[ERROR] Error: {err:#}")?;
                return Ok(Outcome::ManualRequired(FailureReason::CheckFailed));
            }
        }

        let payload = match policy.payload() {
            Ok(payload) => payload,
            Err(err) => {
                writeln!(out, "[ERROR] Error: {err:#}")?;
                return Ok(Outcome::ManualRequired(FailureReason::ApplyFailed));
            }
        };
        let apply = settings.apply_command(payload.path());
        tracing::debug!(command = %apply.display(), "applying policy");

        match run_bounded(&apply, settings.apply_timeout) {
            Ok(outcome) if outcome.succeeded() => {
                writeln!(out, "[SUCCESS] CORS configuration applied!")?;
                Ok(Outcome::Applied)
            }
            Ok(RunOutcome::Exited { stderr, .. }) => {
                writeln!(out, "[ERROR] {} failed: {}", apply.program, stderr.trim_end())?;
                Ok(Outcome::ManualRequired(FailureReason::ApplyRejected))
            }
            Ok(RunOutcome::NotFound) => {
                writeln!(out, "[ERROR] Error: {} not found", apply.program)?;
                Ok(Outcome::ManualRequired(FailureReason::ApplyFailed))
            }
            Ok(RunOutcome::TimedOut { after }) => {
                report_timeout(out, &apply, after)?;
                Ok(Outcome::ManualRequired(FailureReason::ApplyFailed))
            }
            Err(err) => {
                writeln!(out, "[ERROR] Error: {err:#}")?;
                Ok(Outcome::ManualRequired(FailureReason::ApplyFailed))
            }
        }
    }
}

fn report_timeout<W: Write>(
    out: &mut W,
    command: &CommandSpec,
    after: std::time::Duration,
) -> Result<()> {
    writeln!(
        out,
        "[ERROR] Error: `{}` timed out after {}s",
        command.display(),
        after.as_secs_f64()
    )?;
    Ok(())
}

#[cfg(all(test, unix))]
#[path = "applier_tests.rs"]
mod tests;
