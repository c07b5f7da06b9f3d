//! Show command - Print a suite with placeholders resolved.

use anyhow::{Context, Result};
use clap::Args;

use infratest_suite::{OutputCheck, SuiteConfig};
use infratest_terraform::random;

use super::SuiteSource;

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub source: SuiteSource,

    /// Id to substitute for `{id}` (random if omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Print the suite as written, without substitution or escaping
    #[arg(long)]
    pub raw: bool,
}

/// Substitute `{id}` and `{prefix}` everywhere except `{output:...}`
/// references, which only resolve after apply. `matches` patterns show the
/// values regex-escaped (`eg\-test\-suite\-abc123`), exactly as they are
/// matched.
fn resolve(suite: &SuiteConfig, id: &str) -> SuiteConfig {
    let placeholders = suite.placeholders(id);
    let mut resolved = suite.clone();

    resolved.var_files = suite
        .var_files
        .iter()
        .map(|f| placeholders.apply(f))
        .collect();
    resolved.vars = suite
        .vars
        .iter()
        .map(|(k, v)| (k.clone(), placeholders.apply_value(v)))
        .collect();
    resolved.name_prefix = suite.name_prefix.as_ref().map(|_| placeholders.prefix.clone());
    resolved.outputs = suite
        .outputs
        .iter()
        .map(|check| OutputCheck::new(check.output.clone(), check.expect.resolve(&placeholders)))
        .collect();

    resolved
}

pub async fn execute(args: ShowArgs) -> Result<()> {
    let suite = args.source.load()?;

    let shown = if args.raw {
        suite
    } else {
        let id = args
            .id
            .clone()
            .unwrap_or_else(random::lower_unique_id)
            .to_lowercase();
        resolve(&suite, &id)
    };

    let yaml = shown.to_yaml().context("Failed to render suite")?;
    print!("{}", yaml);
    Ok(())
}
