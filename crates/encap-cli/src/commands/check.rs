//! `encap check`: find code that has to change before enabling
//! encapsulation

use super::read_source;
use anyhow::Result;
use encap_syntax::{parse, scan, CompatDiagnostic};
use serde_json::json;

/// Returns `true` when no file has a blocking finding
pub fn execute(files: &[String], json: bool, all: bool) -> Result<bool> {
    let mut clean = true;
    let mut report = Vec::new();

    for file in files {
        let source = read_source(file)?;
        let findings = match check_source(&source, all) {
            Ok(findings) => findings,
            Err(message) => {
                eprintln!("{}: {}", file, message);
                clean = false;
                continue;
            }
        };
        if findings.iter().any(CompatDiagnostic::is_blocking) {
            clean = false;
        }

        if json {
            report.push(json!({ "file": file, "findings": findings }));
        } else {
            for finding in &findings {
                println!("{}: {}", file, finding);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(clean)
}

fn check_source(source: &str, all: bool) -> Result<Vec<CompatDiagnostic>, String> {
    let program = parse(source).map_err(|e| e.to_string())?;
    Ok(scan(&program)
        .into_iter()
        .filter(|finding| all || finding.is_blocking())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERGE: &str = "for (var k in s) { t[k] = s[k]; }";

    #[test]
    fn test_blocking_findings() {
        let findings = check_source("o['__' + 'proto__'] = 1; o.__proto__;", false).unwrap();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_blocking());
    }

    #[test]
    fn test_informational_findings_need_all() {
        assert!(check_source(MERGE, false).unwrap().is_empty());
        assert_eq!(check_source(MERGE, true).unwrap().len(), 1);
    }

    #[test]
    fn test_exit_status() {
        let path = std::env::temp_dir().join(format!("encap-check-{}.js", std::process::id()));
        std::fs::write(&path, "x['constructor'];").unwrap();
        let file = path.to_string_lossy().into_owned();

        assert!(!execute(&[file], false, false).unwrap());
        std::fs::remove_file(path).unwrap();
    }
}
