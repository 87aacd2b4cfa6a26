use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about = "File transfer orchestration daemon", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(about = "Run the worker, scheduler, and event-monitor tasks until shutdown")]
    Run {},
    #[clap(about = "Validate a cron expression without scheduling anything", name = "cron-validate")]
    CronValidate {
        #[clap(required = true, help = "5-field cron expression, e.g. '0 2 * * *'")]
        expression: String,
    },
    #[clap(about = "Preview the next N occurrences of a cron expression", name = "cron-next")]
    CronNext {
        #[clap(required = true)]
        expression: String,
        #[clap(short, long, default_value_t = 5)]
        count: usize,
    },
}
