//! List command - Show the built-in suites.

use anyhow::Result;
use clap::Args;

use infratest_suite::{builtin, BUILTIN_SUITES};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also print each suite's module and checked outputs
    #[arg(short, long)]
    pub long: bool,
}

pub async fn execute(args: ListArgs) -> Result<()> {
    for name in BUILTIN_SUITES {
        if !args.long {
            println!("{}", name);
            continue;
        }

        let suite = builtin(name)?;
        println!("{} ({})", name, suite.module.display());
        for check in &suite.outputs {
            println!("  - {}", check.output);
        }
    }
    Ok(())
}
