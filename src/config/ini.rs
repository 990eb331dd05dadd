//! Reader for the game's INI-style text tables.
//!
//! Differs from a textbook INI reader in a few ways the data files rely on:
//! a UTF-8 byte order mark may precede the first section, comments start
//! with `//` (`;` is also tolerated), values are comma separated lists, and
//! a handful of keys were authored with inconsistent casing and get
//! normalized on read.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

const BYTE_ORDER_MARK: [u8; 3] = [0xEF, 0xBB, 0xBF];

pub type IniSection = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ini {
    sections: BTreeMap<String, IniSection>,
}

/// Keys whose casing changed between data revisions.
fn normalize_key(key: &str) -> &str {
    match key {
        "minscale" => "minScale",
        "maxscale" => "maxScale",
        "texid" => "texID",
        "fixedrot" => "fixedRot",
        "numvar" => "numVar",
        "defscale" => "defScale",
        "pathtex" => "pathTex",
        other => other,
    }
}

fn strip_quotes(part: &str) -> String {
    if part.len() < 2 {
        return part.to_string();
    }
    let part = part.strip_prefix('"').unwrap_or(part);
    let part = part.strip_suffix('"').unwrap_or(part);
    part.to_string()
}

impl Ini {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(bytes: &[u8]) -> Self {
        let bytes = bytes.strip_prefix(&BYTE_ORDER_MARK[..]).unwrap_or(bytes);
        let text = String::from_utf8_lossy(bytes);

        let mut ini = Ini::new();
        // None while inside a section header that was already seen; the
        // first definition of a section wins.
        let mut current: Option<String> = Some(String::new());

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() || line.starts_with("//") || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = match rest.find(']') {
                    Some(end) => &rest[..end],
                    None => rest,
                };
                if ini.sections.contains_key(name) {
                    current = None;
                    continue;
                }
                ini.sections.insert(name.to_string(), IniSection::new());
                current = Some(name.to_string());
                continue;
            }

            let Some(section) = current.as_ref() else {
                continue;
            };
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key.is_empty() || value.is_empty() {
                continue;
            }

            let parts = value.split(',').map(strip_quotes).collect();
            ini.sections
                .entry(section.clone())
                .or_default()
                .insert(normalize_key(key).to_string(), parts);
        }

        ini
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read INI file: {}", path.display()))?;
        Ok(Self::parse(&bytes))
    }

    pub fn section(&self, section: &str) -> Option<&IniSection> {
        self.sections.get(section)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&String, &IniSection)> {
        self.sections.iter()
    }

    pub fn section_exists(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn key_exists(&self, section: &str, key: &str) -> bool {
        self.sections
            .get(section)
            .is_some_and(|s| s.contains_key(key))
    }

    /// All comma separated parts of a value, empty when absent.
    pub fn whole_data(&self, section: &str, key: &str) -> &[String] {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn data(&self, section: &str, key: &str, index: usize) -> Option<&str> {
        self.whole_data(section, key).get(index).map(String::as_str)
    }

    pub fn data_as<T: FromStr>(&self, section: &str, key: &str, index: usize) -> Option<T> {
        self.data(section, key, index)?.trim().parse().ok()
    }

    pub fn set_whole_data(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), vec![value.into()]);
    }

    /// Replaces every value part that names a key of `table[section]` with
    /// that key's first value. Keys are left untouched.
    pub fn substitute(&mut self, table: &Ini, section: &str) {
        for values in self.sections.values_mut() {
            for parts in values.values_mut() {
                for part in parts.iter_mut() {
                    if let Some(replacement) = table.data(section, part, 0) {
                        if !replacement.is_empty() {
                            *part = replacement.to_string();
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_byte_order_mark() {
        let mut bytes = BYTE_ORDER_MARK.to_vec();
        bytes.extend_from_slice(b"[Ashenvale]\nname=Ashen\n");
        let ini = Ini::parse(&bytes);
        assert!(ini.section_exists("Ashenvale"));
        assert_eq!(ini.data("Ashenvale", "name", 0), Some("Ashen"));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let ini = Ini::parse(b"// header\n\n[A]\n; old style\n//x=1\ny=2\n");
        let section = ini.section("A").unwrap();
        assert_eq!(section.len(), 1);
        assert_eq!(ini.data("A", "y", 0), Some("2"));
    }

    #[test]
    fn splits_values_and_strips_quotes_per_field() {
        let ini = Ini::parse(b"[D]\nfile=\"Doodads\\Tree\",\"x\",7,\"\r\n");
        assert_eq!(ini.whole_data("D", "file"), &["Doodads\\Tree", "x", "7", "\""]);
    }

    #[test]
    fn normalizes_legacy_key_casing() {
        let ini = Ini::parse(b"[ATtr]\nminscale=0.8\nmaxscale=1.2\ntexid=3\nfixedrot=-1\n");
        assert!(ini.key_exists("ATtr", "minScale"));
        assert!(ini.key_exists("ATtr", "maxScale"));
        assert!(ini.key_exists("ATtr", "texID"));
        assert!(ini.key_exists("ATtr", "fixedRot"));
        assert!(!ini.key_exists("ATtr", "minscale"));
        assert_eq!(ini.data_as::<f32>("ATtr", "maxScale", 0), Some(1.2));
    }

    #[test]
    fn first_section_definition_wins() {
        let ini = Ini::parse(b"[A]\nk=1\n[A]\nk=2\nj=3\n");
        assert_eq!(ini.data("A", "k", 0), Some("1"));
        assert!(!ini.key_exists("A", "j"));
    }

    #[test]
    fn empty_keys_or_values_are_ignored() {
        let ini = Ini::parse(b"[A]\n=1\nk=\nnoequals\n");
        assert!(ini.section("A").unwrap().is_empty());
    }

    #[test]
    fn substitute_replaces_matching_values() {
        let mut ini = Ini::parse(b"[Unit]\nname=WESTRING_FOOTMAN,plain\n");
        let strings = Ini::parse(b"[WorldEditStrings]\nWESTRING_FOOTMAN=Footman\n");
        ini.substitute(&strings, "WorldEditStrings");
        assert_eq!(ini.whole_data("Unit", "name"), &["Footman", "plain"]);
    }

    #[test]
    fn set_whole_data_creates_section() {
        let mut ini = Ini::new();
        ini.set_whole_data("TileSets", "A", "Ashenvale");
        assert_eq!(ini.data("TileSets", "A", 0), Some("Ashenvale"));
        assert!(ini.whole_data("TileSets", "missing").is_empty());
    }
}
