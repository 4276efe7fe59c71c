/// Settings command handlers
use anyhow::{bail, Result};
use doze_core::config::Settings;
use std::path::Path;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn handle_config_list(path: &Path) -> Result<()> {
    let settings = Settings::load_from(path)?;
    let rows: Vec<SettingRow> = Settings::KEYS
        .into_iter()
        .map(|key| SettingRow {
            key,
            value: settings.get(key).unwrap_or_default(),
        })
        .collect();

    println!("Settings ({}):", path.display());
    println!("{}", Table::new(rows));
    Ok(())
}

pub fn handle_config_get(path: &Path, key: &str) -> Result<()> {
    let settings = Settings::load_from(path)?;
    match settings.get(key) {
        Some(value) => println!("{key} = {value}"),
        None => bail!(
            "Unknown setting '{key}'. Valid keys: {}",
            Settings::KEYS.join(", ")
        ),
    }
    Ok(())
}

pub fn handle_config_set(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut settings = Settings::load_from(path)?;
    settings.set(key, value)?;
    settings.save_to(path)?;
    println!("Set {key} = {}", settings.get(key).unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_persists_and_get_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doze.toml");

        handle_config_set(&path, "gestures.handwave", "true").unwrap();
        handle_config_get(&path, "gestures.handwave").unwrap();
        handle_config_list(&path).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert!(settings.gestures.handwave);
        assert!(!settings.gestures.pocket);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doze.toml");

        assert!(handle_config_get(&path, "gestures.shake").is_err());
        assert!(handle_config_set(&path, "gestures.shake", "true").is_err());
        assert!(!path.exists());
    }
}
