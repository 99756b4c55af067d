//! `encap run`: evaluate a script in a fresh realm

use super::{on_realm_thread, read_source, RealmOptions};
use anyhow::{anyhow, Result};
use encap_runtime::Realm;
use tracing::debug;

/// Returns the process exit code
pub fn execute(
    file: &str,
    options: &RealmOptions,
    print: bool,
    diagnostics: bool,
    json: bool,
) -> Result<i32> {
    let source = read_source(file)?;
    let config = options.load_config()?;
    let signal = options.signal();

    on_realm_thread(move || {
        let mut realm = Realm::new(1, config, &signal).map_err(|e| anyhow!("{}", e))?;
        let result = realm.evaluate(&source);

        for line in realm.take_output() {
            println!("{}", line);
        }
        let code = match &result {
            Ok(value) => {
                if print {
                    println!("{}", realm.display(value));
                }
                0
            }
            Err(e) => {
                eprintln!("{}", realm.describe_error(e));
                1
            }
        };

        if diagnostics || json {
            let found = realm.diagnostics();
            if json {
                eprintln!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                for diagnostic in &found {
                    eprintln!("{}", diagnostic);
                }
            }
        }
        debug!("{} (up {:?})", realm.summary(), realm.uptime());
        Ok(code)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(name: &str, source: &str) -> String {
        let path = std::env::temp_dir().join(format!("encap-run-{}-{}.js", name, std::process::id()));
        std::fs::write(&path, source).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_successful_run() {
        let file = script("ok", "var o = {}; o.__proto__ === Object.prototype;");
        let options = RealmOptions {
            secure_mode: Some("1".into()),
            ..Default::default()
        };
        assert_eq!(execute(&file, &options, true, true, false).unwrap(), 0);
        std::fs::remove_file(file).unwrap();
    }

    #[test]
    fn test_uncaught_error_exit_code() {
        let file = script("throw", "throw new TypeError('nope');");
        let code = execute(&file, &RealmOptions::default(), false, false, true).unwrap();
        assert_eq!(code, 1);
        std::fs::remove_file(file).unwrap();
    }

    #[test]
    fn test_missing_file() {
        assert!(execute("/nonexistent/encap.js", &RealmOptions::default(), false, false, false).is_err());
    }
}
