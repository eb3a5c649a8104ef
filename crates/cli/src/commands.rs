use clap::{ArgGroup, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a pending import
    Start {
        #[arg(long, help = "Name of the Data Import Custom document")]
        job: String,

        #[arg(long, help = "Keep following the import until it finishes")]
        watch: bool,

        #[arg(long, value_enum, default_value_t = FeedKind::Poll)]
        feed: FeedKind,
    },
    /// Ask a running import to stop
    Stop {
        #[arg(long, help = "Name of the Data Import Custom document")]
        job: String,
    },
    /// Show the indicator, headline and available actions of an import
    Status {
        #[arg(long, help = "Name of the Data Import Custom document")]
        job: String,

        #[arg(long, help = "Print the full view as JSON instead of a table")]
        json: bool,
    },
    /// Follow progress until the import finishes
    Watch {
        #[arg(long, help = "Name of the Data Import Custom document")]
        job: String,

        #[arg(long, value_enum, default_value_t = FeedKind::Poll)]
        feed: FeedKind,
    },
    /// Show the per-row import log
    Logs {
        #[arg(long, help = "Name of the Data Import Custom document")]
        job: String,

        #[arg(long, help = "Only show rows that failed")]
        failed_only: bool,

        #[arg(long, default_value_t = 1, help = "Page to show, starting at 1")]
        page: usize,

        #[arg(long, value_name = "ROW", help = "Print the traceback of one log row")]
        traceback: Option<usize>,

        #[arg(long, help = "Print rows as JSON")]
        json: bool,
    },
    /// Download the errored rows or the full import log
    #[command(group(ArgGroup::new("kind").required(true).args(["errored", "full"])))]
    Export {
        #[arg(long, help = "Name of the Data Import Custom document")]
        job: String,

        #[arg(long, help = "Spreadsheet of the rows that failed")]
        errored: bool,

        #[arg(long, help = "Complete import log")]
        full: bool,

        #[arg(long, help = "File to write")]
        output: PathBuf,
    },
}

/// Where push events come from while watching.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Poll the status endpoint
    Poll,
    /// Read realtime events as JSON lines from stdin
    Stdin,
}
