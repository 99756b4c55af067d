//! `encap rewrite`: show what an encapsulated realm will run

use super::read_source;
use anyhow::Result;
use encap_policy::ModeController;
use encap_syntax::{RewrittenSource, Rewriter};
use tracing::info;

pub fn execute(file: &str, records: bool) -> Result<()> {
    let rewritten = rewrite(&read_source(file)?)?;
    print!("{}", rewritten.code);

    if records {
        for record in &rewritten.records {
            eprintln!(
                "{}:{}: {} -> {}",
                file, record.span, record.original, record.rewritten
            );
        }
    }
    info!("{}: {} rewrites", file, rewritten.records.len());
    Ok(())
}

/// Rewrites as if encapsulation were on, whatever the environment says
fn rewrite(source: &str) -> Result<RewrittenSource> {
    Ok(Rewriter::new(ModeController::enabled()).rewrite_source(source)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_is_stable() {
        let once = rewrite("var p = o.__proto__;").unwrap();
        let twice = rewrite(&once.code).unwrap();

        assert_eq!(once.records.len(), 1);
        assert_eq!(once.code, twice.code);
    }

    #[test]
    fn test_syntax_error() {
        assert!(rewrite("var = ;").is_err());
    }
}
