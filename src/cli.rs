//! CLI argument parsing.
//!
//! The target bucket is compiled in; only the policy location and log
//! verbosity can be changed from the command line.
use crate::config::DEFAULT_POLICY_PATH;
use clap::Parser;
use std::path::PathBuf;

/// Apply the bucket CORS policy, printing manual steps if that fails.
#[derive(Parser, Debug)]
#[command(
    name = "set-cors",
    version,
    about = "Apply a CORS policy to the storage bucket via gcloud/gsutil",
    after_help = "Exit status:\n  0  policy applied\n  1  manual intervention required (instructions printed)\n\nExamples:\n  set-cors\n  set-cors --policy deploy/cors.json\n  RUST_LOG=debug set-cors"
)]
pub struct RootArgs {
    /// CORS policy JSON; the built-in default is used when it does not exist
    #[arg(long, value_name = "FILE", default_value = DEFAULT_POLICY_PATH)]
    pub policy: PathBuf,

    /// Emit debug diagnostics on stderr
    #[arg(long, short)]
    pub verbose: bool,
}
