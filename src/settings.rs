//! Patching of `ProjectSettings.asset`.
//!
//! The scripting define symbols live under
//! `PlayerSettings.scriptingDefineSymbols`, one semicolon-joined string per
//! build target group:
//!
//! ```yaml
//!   scriptingDefineSymbols:
//!     1: UNITY_POST_PROCESSING_STACK_V2
//!     7: UNITY_POST_PROCESSING_STACK_V2
//! ```
//!
//! Older editors key the entries by the numeric group id, newer ones by the
//! group name (`Standalone:`). Both spellings are read.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::asset::{AssetDocument, AssetError, UnityAsset};
use crate::error::SetupError;

pub const PLAYER_SETTINGS_CLASS_ID: i64 = 129;
const PLAYER_SETTINGS_KEY: &str = "PlayerSettings";
const DEFINES_KEY: &str = "scriptingDefineSymbols";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTargetGroup {
    Standalone,
    #[value(name = "ios")]
    IOS,
    Android,
    #[value(name = "webgl")]
    WebGL,
}

impl BuildTargetGroup {
    /// Numeric key used by editors that serialize the `BuildTargetGroup` enum value.
    pub fn legacy_key(self) -> &'static str {
        match self {
            BuildTargetGroup::Standalone => "1",
            BuildTargetGroup::IOS => "4",
            BuildTargetGroup::Android => "7",
            BuildTargetGroup::WebGL => "13",
        }
    }

    /// Key used by editors that serialize named build targets.
    pub fn name(self) -> &'static str {
        match self {
            BuildTargetGroup::Standalone => "Standalone",
            BuildTargetGroup::IOS => "iPhone",
            BuildTargetGroup::Android => "Android",
            BuildTargetGroup::WebGL => "WebGL",
        }
    }

    fn matches_key(self, key: &str) -> bool {
        key == self.legacy_key() || key == self.name()
    }
}

#[derive(Debug, Deserialize)]
struct PlayerSettingsDocument {
    #[serde(rename = "PlayerSettings")]
    player_settings: PlayerSettings,
}

/// The slice of `PlayerSettings` this tool reads; other fields are ignored.
#[derive(Debug, Deserialize)]
pub struct PlayerSettings {
    #[serde(rename = "scriptingDefineSymbols", default)]
    pub scripting_define_symbols: Option<ScriptingDefines>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct ScriptingDefines(Mapping);

/// One entry of `scriptingDefineSymbols`, with the key spelled as in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct DefineEntry {
    pub key: String,
    pub value: Value,
}

impl ScriptingDefines {
    pub fn get(&self, group: BuildTargetGroup) -> Option<DefineEntry> {
        self.0.iter().find_map(|(k, v)| {
            let key = match k {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                _ => return None,
            };
            group.matches_key(&key).then(|| DefineEntry { key, value: v.clone() })
        })
    }
}

/// A semicolon-joined define string as the editor stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefineSymbols(String);

impl DefineSymbols {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// `None` when the value is a sequence or mapping.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::default()),
            Value::String(s) => Some(Self::new(s.as_str())),
            Value::Number(n) => Some(Self::new(n.to_string())),
            Value::Bool(b) => Some(Self::new(b.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.0.split(';').map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols().any(|s| s == symbol)
    }

    /// Existing symbols are kept verbatim; the marker is appended once.
    pub fn with_marker(&self, marker: &str) -> DefineChange {
        if self.is_empty() {
            DefineChange::Set { after: marker.to_string() }
        } else if self.contains(marker) {
            DefineChange::Unchanged { value: self.0.clone() }
        } else {
            DefineChange::Appended {
                before: self.0.clone(),
                after: format!("{};{}", self.0, marker),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DefineChange {
    Set { after: String },
    Appended { before: String, after: String },
    Unchanged { value: String },
}

impl DefineChange {
    pub fn after(&self) -> &str {
        match self {
            DefineChange::Set { after } | DefineChange::Appended { after, .. } => after,
            DefineChange::Unchanged { value } => value,
        }
    }

    pub fn modifies(&self) -> bool {
        !matches!(self, DefineChange::Unchanged { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsPatch {
    pub path: PathBuf,
    pub group: BuildTargetGroup,
    pub change: DefineChange,
    pub written: bool,
}

fn parse_error(path: &Path, e: AssetError) -> SetupError {
    SetupError::Parse {
        path: path.to_path_buf(),
        line: e.line,
        message: e.message,
    }
}

fn field_name(group: BuildTargetGroup) -> String {
    format!("{}.{}.{}", PLAYER_SETTINGS_KEY, DEFINES_KEY, group.name())
}

fn read_entry(path: &Path, doc: &AssetDocument, group: BuildTargetGroup) -> Result<DefineEntry, SetupError> {
    let value = doc.value().map_err(|e| parse_error(path, e))?;
    let settings: PlayerSettingsDocument = serde_yaml::from_value(value).map_err(|e| SetupError::Parse {
        path: path.to_path_buf(),
        line: doc.line,
        message: e.to_string(),
    })?;
    let missing = |field: String| SetupError::MissingField {
        path: path.to_path_buf(),
        field,
    };
    settings
        .player_settings
        .scripting_define_symbols
        .ok_or_else(|| missing(format!("{}.{}", PLAYER_SETTINGS_KEY, DEFINES_KEY)))?
        .get(group)
        .ok_or_else(|| missing(field_name(group)))
}

/// Read-modify-write of the settings file so that `marker` is defined for `group`.
///
/// The file is only written when the define string actually changes and
/// `dry_run` is off. Every byte outside the edited entry is preserved.
pub fn patch_settings(
    path: &Path,
    marker: &str,
    group: BuildTargetGroup,
    dry_run: bool,
) -> Result<SettingsPatch, SetupError> {
    if !path.is_file() {
        return Err(SetupError::MissingPath {
            what: "settings file",
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path).map_err(|source| SetupError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut asset = UnityAsset::parse(&text).map_err(|e| parse_error(path, e))?;

    let idx = asset
        .document_by_class(PLAYER_SETTINGS_CLASS_ID)
        .or_else(|| asset.document_by_root_key(PLAYER_SETTINGS_KEY))
        .ok_or_else(|| SetupError::MissingField {
            path: path.to_path_buf(),
            field: PLAYER_SETTINGS_KEY.to_string(),
        })?;

    let field = field_name(group);
    let unsupported = |reason: &str| SetupError::UnsupportedLayout {
        path: path.to_path_buf(),
        field: field.clone(),
        reason: reason.to_string(),
    };

    let entry = read_entry(path, asset.document(idx), group)?;
    let current = DefineSymbols::from_value(&entry.value).ok_or_else(|| unsupported("value is not a scalar"))?;
    let change = current.with_marker(marker);
    debug!(field = %field, current = current.as_str(), "read scripting defines");

    if !change.modifies() {
        info!(field = %field, value = change.after(), "marker {} already defined", marker);
        return Ok(SettingsPatch {
            path: path.to_path_buf(),
            group,
            change,
            written: false,
        });
    }

    let doc = asset.document_mut(idx);
    let line = doc
        .locate(&[PLAYER_SETTINGS_KEY, DEFINES_KEY, &entry.key])
        .ok_or_else(|| unsupported("entry is not written as a block mapping line"))?;
    debug!(
        line = doc.source_line(line),
        file_id = doc.header.file_id,
        stripped = doc.header.stripped,
        "rewriting define entry"
    );
    doc.replace_scalar(line, change.after())
        .ok_or_else(|| unsupported("entry line has no key"))?;

    let reread = read_entry(path, asset.document(idx), group)?;
    let found = DefineSymbols::from_value(&reread.value).unwrap_or_default();
    if found.as_str() != change.after() {
        return Err(SetupError::Verify {
            path: path.to_path_buf(),
            field,
            expected: change.after().to_string(),
            found: found.as_str().to_string(),
        });
    }

    if !dry_run {
        fs::write(path, asset.render()).map_err(|source| SetupError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    info!(field = %field, value = change.after(), dry_run, "scripting defines updated");

    Ok(SettingsPatch {
        path: path.to_path_buf(),
        group,
        change,
        written: !dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../tests/fixtures/ProjectSettings.asset");
    const MARKER: &str = "INTEGRATION_TEST";

    fn write_fixture(text: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ProjectSettings.asset");
        fs::write(&path, text).unwrap();
        (dir, path)
    }

    #[test]
    fn with_marker_on_empty_sets_exactly_the_marker() {
        assert_eq!(
            DefineSymbols::default().with_marker(MARKER),
            DefineChange::Set { after: MARKER.to_string() }
        );
        assert_eq!(DefineSymbols::new("  ").with_marker(MARKER).after(), MARKER);
    }

    #[test]
    fn with_marker_appends_verbatim() {
        let change = DefineSymbols::new("A;B ").with_marker(MARKER);
        assert_eq!(change.after(), "A;B ;INTEGRATION_TEST");
    }

    #[test]
    fn with_marker_is_idempotent() {
        let change = DefineSymbols::new("A; INTEGRATION_TEST").with_marker(MARKER);
        assert!(!change.modifies());
        // a longer symbol sharing the prefix is a different symbol
        assert!(DefineSymbols::new("INTEGRATION_TESTS").with_marker(MARKER).modifies());
    }

    #[test]
    fn defines_accept_numeric_and_named_keys() {
        let numeric: ScriptingDefines = serde_yaml::from_str("1: A\n7: B\n").unwrap();
        assert_eq!(numeric.get(BuildTargetGroup::Android).unwrap().value, Value::from("B"));
        let named: ScriptingDefines = serde_yaml::from_str("Standalone: A\niPhone: C\n").unwrap();
        let entry = named.get(BuildTargetGroup::Standalone).unwrap();
        assert_eq!(entry.key, "Standalone");
        assert_eq!(named.get(BuildTargetGroup::IOS).unwrap().value, Value::from("C"));
        assert!(named.get(BuildTargetGroup::WebGL).is_none());
    }

    #[test]
    fn appends_to_existing_defines() {
        let (_dir, path) = write_fixture(FIXTURE);
        let patch = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap();
        assert!(patch.written);
        let out = fs::read_to_string(&path).unwrap();
        assert!(out.contains("    1: UNITY_POST_PROCESSING_STACK_V2;INTEGRATION_TEST\n"));
        assert!(out.contains("    7: UNITY_POST_PROCESSING_STACK_V2\n"));
        assert_eq!(out.lines().count(), FIXTURE.lines().count());
    }

    #[test]
    fn sets_empty_defines() {
        let text = FIXTURE.replace("    1: UNITY_POST_PROCESSING_STACK_V2\n", "    1: \n");
        let (_dir, path) = write_fixture(&text);
        let patch = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap();
        assert_eq!(patch.change, DefineChange::Set { after: MARKER.to_string() });
        assert!(fs::read_to_string(&path).unwrap().contains("    1: INTEGRATION_TEST\n"));
    }

    #[test]
    fn multi_line_value_is_rewritten_as_one_line() {
        let text = FIXTURE.replace(
            "    1: UNITY_POST_PROCESSING_STACK_V2\n",
            "    1: 'UNITY_POST_PROCESSING_STACK_V2; CROSS_PLATFORM_INPUT; MOBILE_INPUT\n      ; EXTRA_DEFINE'\n",
        );
        let (_dir, path) = write_fixture(&text);
        let patch = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap();
        let expected = "UNITY_POST_PROCESSING_STACK_V2; CROSS_PLATFORM_INPUT; MOBILE_INPUT ; EXTRA_DEFINE;INTEGRATION_TEST";
        assert_eq!(patch.change.after(), expected);
        let out = fs::read_to_string(&path).unwrap();
        assert!(out.contains(&format!("    1: '{}'\n    7: UNITY_POST_PROCESSING_STACK_V2\n", expected)));
        assert!(!out.contains("      ; EXTRA_DEFINE'"));
        assert_eq!(out.lines().count(), FIXTURE.lines().count());
    }

    #[test]
    fn second_run_leaves_file_alone() {
        let (_dir, path) = write_fixture(FIXTURE);
        patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap();
        let once = fs::read_to_string(&path).unwrap();
        let patch = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap();
        assert!(!patch.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), once);
    }

    #[test]
    fn dry_run_does_not_write() {
        let (_dir, path) = write_fixture(FIXTURE);
        let patch = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, true).unwrap();
        assert!(patch.change.modifies());
        assert!(!patch.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), FIXTURE);
    }

    #[test]
    fn named_keys_are_patched_in_place() {
        let text = FIXTURE.replace("    1: UNITY_POST_PROCESSING_STACK_V2\n", "    Standalone: FOO\n");
        let (_dir, path) = write_fixture(&text);
        patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("    Standalone: FOO;INTEGRATION_TEST\n"));
    }

    #[test]
    fn missing_group_entry_is_an_error() {
        let (_dir, path) = write_fixture(FIXTURE);
        let err = patch_settings(&path, MARKER, BuildTargetGroup::WebGL, false).unwrap_err();
        assert!(matches!(err, SetupError::MissingField { ref field, .. } if field.ends_with("WebGL")));
    }

    #[test]
    fn empty_defines_mapping_is_missing_field() {
        let text = FIXTURE.replace(
            "  scriptingDefineSymbols:\n    1: UNITY_POST_PROCESSING_STACK_V2\n    7: UNITY_POST_PROCESSING_STACK_V2\n",
            "  scriptingDefineSymbols: {}\n",
        );
        let (_dir, path) = write_fixture(&text);
        let err = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap_err();
        assert!(matches!(err, SetupError::MissingField { .. }));
    }

    #[test]
    fn flow_style_defines_are_rejected() {
        let text = FIXTURE.replace(
            "  scriptingDefineSymbols:\n    1: UNITY_POST_PROCESSING_STACK_V2\n    7: UNITY_POST_PROCESSING_STACK_V2\n",
            "  scriptingDefineSymbols: {1: FOO}\n",
        );
        let (_dir, path) = write_fixture(&text);
        let err = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedLayout { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let text = FIXTURE.replace("  defaultCursor: {fileID: 0}\n", "  defaultCursor: {fileID: 0\n");
        let (_dir, path) = write_fixture(&text);
        let err = patch_settings(&path, MARKER, BuildTargetGroup::Standalone, false).unwrap_err();
        assert!(matches!(err, SetupError::Parse { .. }), "unexpected error: {err}");
    }

    #[test]
    fn missing_file_is_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = patch_settings(&dir.path().join("nope.asset"), MARKER, BuildTargetGroup::Standalone, false)
            .unwrap_err();
        assert!(matches!(err, SetupError::MissingPath { .. }));
    }
}
