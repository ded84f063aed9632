//! CLI argument definitions

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "tracescope",
    about = "Live trace and memory dashboard for a language server debug server",
    after_help = "\
EXAMPLES:
    tracescope http://127.0.0.1:8098/                        Interactive dashboard
    tracescope http://127.0.0.1:8098/ --headless --duration 30
                                                             Print to stdout for 30s
    tracescope http://127.0.0.1:8098/ --poll-interval-ms 250 Faster histogram refresh"
)]
pub struct Args {
    /// Debug server URL (trace and stats endpoints are derived from it)
    #[arg(value_name = "SERVER_URL")]
    pub server_url: String,

    /// Vector profiler stats polling interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub poll_interval_ms: u64,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Run without TUI, printing to stdout
    #[arg(long)]
    pub headless: bool,

    /// Seed the LSP log with example messages
    #[arg(long)]
    pub sample_messages: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["tracescope", "http://localhost:8098"]);
        assert_eq!(args.poll_interval_ms, 1000);
        assert_eq!(args.duration, 0);
        assert!(!args.headless && !args.sample_messages && !args.quiet);
    }

    #[test]
    fn test_server_url_required() {
        assert!(Args::try_parse_from(["tracescope"]).is_err());
    }
}
