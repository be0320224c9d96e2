use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "minipod",
    version,
    about = "A small kubectl-driven terminal dashboard for pods."
)]
pub struct CliArgs {
    /// Start in a specific namespace (defaults to the kubeconfig namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// kubectl binary to invoke
    #[arg(long)]
    pub kubectl: Option<String>,

    /// Pod list refresh interval in seconds
    #[arg(long)]
    pub refresh_secs: Option<u64>,

    /// Metrics panel polling interval in milliseconds
    #[arg(long)]
    pub metrics_ms: Option<u64>,

    /// Shell used to run exec commands inside pods
    #[arg(long)]
    pub shell: Option<String>,

    /// Explicit config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
