use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pinkeep")]
#[command(about = "Paid pin lifespans: settle payments, reclaim expired pins", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides PINKEEP_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the catalog API and both periodic jobs
    Serve,
    /// Run one settlement batch and exit
    Settle,
    /// Run one reclamation pass and exit
    Reclaim,
    /// Record an unprocessed payment in the ledger
    RecordPayment(RecordPaymentArgs),
}

#[derive(clap::Args, Debug)]
pub struct RecordPaymentArgs {
    #[arg(long)]
    pub order_id: String,

    #[arg(long)]
    pub cid: String,

    /// Whole currency units
    #[arg(long)]
    pub amount: i64,

    #[arg(long, default_value = "")]
    pub note: String,
}
