//! plum.toml configuration provider.
//!
//! The file is split into typed blocks and left otherwise undecoded; the
//! scheduler decides which keys each block's consumers understand.
//!
//! ```toml
//! [defaults]
//! interval = "30s"
//!
//! [[alert]]
//! name = "ops"
//! type = "debug.log"
//!
//! [[group]]
//! name = "web"
//! alert_limit = 5
//! alert_window = "10m"
//!
//! [[check]]
//! name = "homepage"
//! type = "debug.random"
//! groups = ["web"]
//! percent_good = 0.9
//! ```

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// A named configuration block with its type tag and remaining settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    /// `plugin.kind` for checks and alerts; empty for groups.
    pub kind: String,
    pub settings: toml::Table,
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    pub defaults: toml::Table,
    pub alerts: Vec<Block>,
    pub checks: Vec<Block>,
    pub groups: Vec<Block>,
}

impl ConfigDocument {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        let root: toml::Table = toml::from_str(content)?;
        let mut doc = ConfigDocument::default();

        for (section, value) in root {
            match section.as_str() {
                "defaults" => match value {
                    toml::Value::Table(table) => doc.defaults = table,
                    _ => return Err(structure("[defaults] must be a table")),
                },
                "alert" => doc.alerts = parse_blocks("alert", value, true)?,
                "check" => doc.checks = parse_blocks("check", value, true)?,
                "group" => doc.groups = parse_blocks("group", value, false)?,
                other => return Err(structure(format!("unknown section '{other}'"))),
            }
        }

        Ok(doc)
    }
}

fn structure(msg: impl Into<String>) -> ConfigError {
    ConfigError::Structure(msg.into())
}

fn parse_blocks(section: &str, value: toml::Value, typed: bool) -> ConfigResult<Vec<Block>> {
    let toml::Value::Array(entries) = value else {
        return Err(structure(format!("[[{section}]] must be an array of tables")));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let toml::Value::Table(mut settings) = entry else {
                return Err(structure(format!("{section} #{} is not a table", index + 1)));
            };

            let name = match settings.remove("name") {
                Some(toml::Value::String(name)) if !name.is_empty() => name,
                Some(_) => {
                    return Err(structure(format!(
                        "{section} #{}: name must be a non-empty string",
                        index + 1
                    )));
                }
                None => return Err(structure(format!("{section} #{} has no name", index + 1))),
            };

            let kind = if typed {
                match settings.remove("type") {
                    Some(toml::Value::String(kind)) if !kind.is_empty() => kind,
                    _ => {
                        return Err(structure(format!(
                            "{section} '{name}': type must be a non-empty string"
                        )));
                    }
                }
            } else {
                String::new()
            };

            Ok(Block {
                name,
                kind,
                settings,
            })
        })
        .collect()
}

/// Split named keys out of a settings table.
///
/// Returns the extracted keys; `table` keeps everything else.
pub fn take_keys(table: &mut toml::Table, keys: &[&str]) -> toml::Table {
    let mut taken = toml::Table::new();
    for key in keys {
        if let Some(value) = table.remove(*key) {
            taken.insert((*key).to_string(), value);
        }
    }
    taken
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[defaults]
interval = "1m"

[[alert]]
name = "ops"
type = "debug.log"

[[group]]
name = "web"
alert_limit = 2

[[check]]
name = "first"
type = "debug.random"
percent_good = 0.5

[[check]]
name = "second"
type = "debug.random"
groups = ["web"]
"#;

    #[test]
    fn parses_blocks_in_order() {
        let doc = ConfigDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.defaults["interval"].as_str(), Some("1m"));
        assert_eq!(doc.alerts.len(), 1);
        assert_eq!(doc.alerts[0].kind, "debug.log");
        assert_eq!(doc.groups[0].name, "web");
        assert_eq!(doc.groups[0].kind, "");

        let names: Vec<_> = doc.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert!(!doc.checks[0].settings.contains_key("name"));
        assert!(!doc.checks[0].settings.contains_key("type"));
        assert_eq!(doc.checks[0].settings["percent_good"].as_float(), Some(0.5));
    }

    #[test]
    fn empty_file_is_valid() {
        assert_eq!(ConfigDocument::parse("").unwrap(), ConfigDocument::default());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let err = ConfigDocument::parse("[[chek]]\nname = \"x\"").unwrap_err();
        assert!(err.to_string().contains("chek"));
    }

    #[test]
    fn missing_name_or_type_is_rejected() {
        let err = ConfigDocument::parse("[[check]]\ntype = \"a.b\"").unwrap_err();
        assert!(err.to_string().contains("has no name"));

        let err = ConfigDocument::parse("[[alert]]\nname = \"x\"").unwrap_err();
        assert!(err.to_string().contains("alert 'x'"));
    }

    #[test]
    fn syntax_errors_surface_as_parse_errors() {
        assert!(matches!(
            ConfigDocument::parse("[[check]\nname = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn take_keys_splits_table() {
        let mut table: toml::Table = toml::from_str("interval = 5\nurl = \"x\"").unwrap();
        let taken = take_keys(&mut table, &["interval", "timeout"]);
        assert_eq!(taken.len(), 1);
        assert!(taken.contains_key("interval"));
        assert_eq!(table.len(), 1);
        assert!(table.contains_key("url"));
    }
}
