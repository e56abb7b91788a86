// Settings store with parsing helpers and runtime updates persisted to storage.
use std::collections::HashMap;
use std::str::FromStr;

use log::warn;

use crate::settings_storage::{SettingsStorage, unknown_keys};

/// Static settings metadata for defaults and help output.
#[derive(Debug, Clone, Copy)]
pub struct SettingSpec {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct Settings {
    map: HashMap<String, String>,
    storage: SettingsStorage,
}

impl Settings {
    pub fn new(storage: SettingsStorage) -> Self {
        let map = match storage.load() {
            Ok(map) => map,
            Err(err) => {
                warn!("Failed to load settings storage: {err}");
                HashMap::new()
            }
        };
        Self { map, storage }
    }

    /// Settings that live only in memory, seeded from `map`.
    pub fn from_map(storage: SettingsStorage, map: HashMap<String, String>) -> Self {
        Self { map, storage }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, String> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        value.parse::<T>().map(Some).map_err(|_| {
            format!(
                "Invalid setting '{key}': cannot parse '{value}' as {}",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, String> {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, String> {
        self.get_parsed_or(key, default)
    }

    /// Apply overrides for this run only; storage is left untouched.
    pub fn apply_overrides(&mut self, overrides: HashMap<String, String>) {
        self.map.extend(overrides);
    }

    /// Fill in missing keys and write them back so the file documents every
    /// option. Keys no spec knows are reported, usually typos.
    pub fn ensure_defaults(&mut self, specs: &[SettingSpec]) {
        for key in unknown_keys(&self.map, specs) {
            warn!(
                "Unknown setting '{key}' in {}",
                self.storage.path().display()
            );
        }

        let mut changed = false;
        for spec in specs {
            if !self.map.contains_key(spec.key) {
                self.map
                    .insert(spec.key.to_string(), spec.default.to_string());
                changed = true;
            }
        }
        if !changed {
            return;
        }
        if let Err(err) = self.storage.save(&self.map, specs) {
            warn!("Failed to save settings storage: {err}");
        }
    }
}

pub fn parse_settings_arg(arg: &str) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Ok(map);
    }
    let sep_index = trimmed
        .find(['=', ':'])
        .ok_or_else(|| format!("missing '=' or ':' in setting '{trimmed}'"))?;
    let (key, value) = trimmed.split_at(sep_index);
    let value = &value[1..];
    if key.is_empty() {
        return Err(format!("missing key in setting '{trimmed}'"));
    }
    if key.chars().any(|c| c.is_whitespace()) {
        return Err(format!("setting key '{key}' cannot contain whitespace"));
    }
    map.insert(key.to_string(), value.trim().to_string());

    Ok(map)
}

pub fn list_settings(specs: &[SettingSpec]) {
    for spec in specs {
        println!("{} (default: {})\n    {}", spec.key, spec.default, spec.description);
    }
}
