//! # Steps Subcommand
//!
//! Lists the registered translation steps in application order.

use anyhow::{Context, Result};
use clap::Args;
use omst_migrate::registered_steps;
use serde::Serialize;

/// Arguments for the `omst steps` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct StepsArgs {
    /// Print the table as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StepRow {
    from: u32,
    to: u32,
    summary: &'static str,
}

fn rows() -> Vec<StepRow> {
    registered_steps()
        .iter()
        .map(|s| {
            let t = s.transition();
            StepRow {
                from: t.from.get(),
                to: t.to.get(),
                summary: s.summary,
            }
        })
        .collect()
}

/// Execute the steps subcommand.
pub fn run_steps(args: &StepsArgs) -> Result<u8> {
    let rows = rows();
    if args.json {
        let json = serde_json::to_string_pretty(&rows).context("failed to serialize step table")?;
        println!("{json}");
    } else {
        for r in &rows {
            println!("{:>3} → {:<3} {}", r.from, r.to, r.summary);
        }
    }
    Ok(0)
}
