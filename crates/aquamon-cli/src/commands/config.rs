//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;
use crate::format::FormatOptions;
use crate::style;

/// Run a `config` subcommand against the file at `path`.
///
/// `effective` is the configuration after environment and flag overrides;
/// `show` prints it, the other actions work on the file alone.
pub fn cmd_config(
    action: &ConfigAction,
    path: &Path,
    effective: &Config,
    opts: &FormatOptions,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content =
                toml::to_string_pretty(effective).context("Failed to serialize config")?;
            if !path.exists() {
                eprintln!(
                    "{}",
                    style::format_info(
                        &format!("No config file at {}, showing defaults", path.display()),
                        opts.no_color
                    )
                );
            }
            print!("{}", content);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save(path)?;
            println!(
                "{}",
                style::format_success(
                    &format!("Wrote default config to {}", path.display()),
                    opts.no_color
                )
            );
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_or_default(path)?;
            config.set(*key, value)?;
            config.validate()?;
            config.save(path)?;
            println!(
                "{}",
                style::format_success(&format!("Set {:?} = {}", key, value), opts.no_color)
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ConfigKey;

    #[test]
    fn test_init_then_set_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let opts = FormatOptions::new(true);

        cmd_config(&ConfigAction::Init { force: false }, &path, &Config::default(), &opts)
            .unwrap();
        assert!(path.exists());

        let set = ConfigAction::Set {
            key: ConfigKey::IntervalSecs,
            value: "25".to_string(),
        };
        cmd_config(&set, &path, &Config::default(), &opts).unwrap();
        assert_eq!(Config::load(&path).unwrap().refresh.interval_secs, 25);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "store_root = \"custom\"\n").unwrap();
        let opts = FormatOptions::new(true);

        let result = cmd_config(&ConfigAction::Init { force: false }, &path, &Config::default(), &opts);
        assert!(result.is_err());
        assert_eq!(Config::load(&path).unwrap().store_root, "custom");

        cmd_config(&ConfigAction::Init { force: true }, &path, &Config::default(), &opts).unwrap();
        assert_eq!(Config::load(&path).unwrap().store_root, "devices");
    }

    #[test]
    fn test_set_rejects_invalid_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let set = ConfigAction::Set {
            key: ConfigKey::StoreUrl,
            value: "example.com".to_string(),
        };
        assert!(cmd_config(&set, &path, &Config::default(), &FormatOptions::new(true)).is_err());
        assert!(!path.exists());
    }
}
