//! Unique-id command - Print a resource-name suffix.

use anyhow::Result;
use clap::Args;

use infratest_terraform::random;

#[derive(Args, Debug)]
pub struct UniqueIdArgs {
    /// Keep the mixed-case form instead of lower-casing it
    #[arg(long)]
    pub mixed_case: bool,
}

pub async fn execute(args: UniqueIdArgs) -> Result<()> {
    let id = if args.mixed_case {
        random::unique_id()
    } else {
        random::lower_unique_id()
    };
    println!("{}", id);
    Ok(())
}
