// Xresources-style settings file under the panel-focus config directory.
// Saved files document each known key; unknown keys are kept but reported.
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::settings::SettingSpec;

const HEADER: &str = "! panel-focus settings. Lines starting with ! or # are comments.";

#[derive(Clone, Debug)]
pub struct SettingsStorage {
    path: PathBuf,
}

impl SettingsStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `$XDG_CONFIG_HOME/panel-focus/Settings.xresources`, falling back to
    /// `~/.config`.
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        base.join("panel-focus").join("Settings.xresources")
    }

    /// A missing file is an empty one. Errors name the file and line.
    pub fn load(&self) -> Result<HashMap<String, String>, String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(format!("{}: {err}", self.path.display())),
        };
        parse_contents(&contents).map_err(|err| format!("{}:{err}", self.path.display()))
    }

    /// Write known keys in `specs` order, each under its description, then
    /// any keys `specs` does not list.
    pub fn save(
        &self,
        map: &HashMap<String, String>,
        specs: &[SettingSpec],
    ) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("{}: {err}", parent.display()))?;
        }
        fs::write(&self.path, render(map, specs))
            .map_err(|err| format!("{}: {err}", self.path.display()))
    }
}

/// Keys in `map` that no spec describes, sorted.
pub fn unknown_keys<'a>(
    map: &'a HashMap<String, String>,
    specs: &[SettingSpec],
) -> Vec<&'a str> {
    let mut unknown: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|key| !specs.iter().any(|spec| spec.key == *key))
        .collect();
    unknown.sort_unstable();
    unknown
}

fn render(map: &HashMap<String, String>, specs: &[SettingSpec]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for spec in specs {
        if let Some(value) = map.get(spec.key) {
            out.push_str(&format!("\n! {}\n{}: {value}\n", spec.description, spec.key));
        }
    }

    let unknown = unknown_keys(map, specs);
    if !unknown.is_empty() {
        out.push_str("\n! not used by panel-focus\n");
        for key in unknown {
            out.push_str(&format!("{key}: {}\n", map[key]));
        }
    }
    out
}

fn parse_contents(contents: &str) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        let entry = parse_entry(line).map_err(|err| format!("{line_number}: {err}"))?;
        let Some((key, value)) = entry else {
            continue;
        };
        if let Some(previous) = first_seen.get(&key) {
            return Err(format!(
                "{line_number}: '{key}' is already set on line {previous}"
            ));
        }
        first_seen.insert(key.clone(), line_number);
        map.insert(key, value);
    }
    Ok(map)
}

// Match rules contain '=', so only the first separator splits.
fn parse_entry(line: &str) -> Result<Option<(String, String)>, String> {
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with(['!', '#']) {
        return Ok(None);
    }
    let Some((key, value)) = entry.split_once([':', '=']) else {
        return Err(format!("expected 'key: value', got '{entry}'"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("value '{}' has no key", value.trim()));
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("key '{key}' contains whitespace"));
    }
    Ok(Some((key.to_string(), value.trim().to_string())))
}
