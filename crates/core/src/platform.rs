use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_PLATFORMS: &[(&str, &[&str])] = &[
    ("nes", &[".nes", ".unf", ".unif"]),
    ("snes", &[".sfc", ".smc", ".fig"]),
    ("genesis", &[".md", ".gen", ".bin", ".smd"]),
    ("gameboy", &[".gb", ".gbc", ".sgb"]),
    ("gba", &[".gba", ".agb"]),
    ("n64", &[".n64", ".v64", ".z64"]),
    ("atari2600", &[".a26", ".bin"]),
    ("atari7800", &[".a78"]),
    ("mastersystem", &[".sms"]),
    ("gamegear", &[".gg"]),
    ("c64", &[".d64", ".t64", ".prg", ".crt"]),
    ("amiga", &[".adf", ".dms", ".ipf"]),
    ("dos", &[".exe", ".com", ".bat"]),
    ("msx", &[".rom", ".mx1", ".mx2"]),
    ("zxspectrum", &[".tap", ".tzx", ".z80", ".sna"]),
    // MAME romsets
    ("arcade", &[".zip"]),
    ("psx", &[".bin", ".iso", ".img", ".cue"]),
    // PC Engine / TurboGrafx-16
    ("pce", &[".pce", ".sgx"]),
];

static BUILTIN: Lazy<PlatformTable> = Lazy::new(|| {
    let definitions = BUILTIN_PLATFORMS
        .iter()
        .map(|(id, extensions)| PlatformDefinition {
            id: id.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
        })
        .collect();
    PlatformTable::from_normalized(normalize_definitions(definitions))
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformDefinition {
    pub id: String,
    pub extensions: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformTableError {
    #[error("platform table is empty")]
    Empty,
    #[error("platform #{index} has an empty id")]
    EmptyId { index: usize },
    #[error("platform '{id}' is declared more than once")]
    DuplicateId { id: String },
    #[error("platform '{id}' declares no extensions")]
    NoExtensions { id: String },
    #[error("platform '{id}' declares a blank extension")]
    BlankExtension { id: String },
}

/// Immutable mapping from platform id to recognised file extensions.
///
/// When an extension is declared by several platforms the first declaration
/// wins, so `.bin` resolves to `genesis` in the built-in table.
#[derive(Debug, Clone)]
pub struct PlatformTable {
    definitions: Vec<PlatformDefinition>,
    by_extension: HashMap<String, usize>,
    longest_extension_dots: usize,
}

impl PlatformTable {
    pub fn builtin() -> &'static PlatformTable {
        &BUILTIN
    }

    pub fn new(definitions: Vec<PlatformDefinition>) -> Result<Self, PlatformTableError> {
        if definitions.is_empty() {
            return Err(PlatformTableError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, definition) in definitions.iter().enumerate() {
            let id = definition.id.trim();
            if id.is_empty() {
                return Err(PlatformTableError::EmptyId { index });
            }
            if !seen.insert(id.to_lowercase()) {
                return Err(PlatformTableError::DuplicateId { id: id.to_string() });
            }
            if definition.extensions.is_empty() {
                return Err(PlatformTableError::NoExtensions { id: id.to_string() });
            }
            if definition
                .extensions
                .iter()
                .any(|ext| ext.trim().trim_start_matches('.').is_empty())
            {
                return Err(PlatformTableError::BlankExtension { id: id.to_string() });
            }
        }

        Ok(Self::from_normalized(normalize_definitions(definitions)))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read platform table {}", path.display()))?;
        let definitions: Vec<PlatformDefinition> = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse platform table {}", path.display()))?;
        let table = Self::new(definitions)
            .with_context(|| format!("invalid platform table {}", path.display()))?;
        Ok(table)
    }

    fn from_normalized(definitions: Vec<PlatformDefinition>) -> Self {
        let mut by_extension = HashMap::new();
        let mut longest_extension_dots = 1;
        for (index, definition) in definitions.iter().enumerate() {
            for extension in &definition.extensions {
                longest_extension_dots =
                    longest_extension_dots.max(extension.matches('.').count());
                by_extension.entry(extension.clone()).or_insert(index);
            }
        }
        Self {
            definitions,
            by_extension,
            longest_extension_dots,
        }
    }

    /// Returns the platform tag for `path`, matching the longest known
    /// suffix of the file name case-insensitively. Names that are not valid
    /// UTF-8 are matched on their lossy conversion.
    pub fn classify(&self, path: &Path) -> Option<&str> {
        let file_name = path.file_name()?.to_string_lossy().to_lowercase();
        let dots = file_name
            .char_indices()
            .filter(|(index, ch)| *ch == '.' && *index > 0)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        let skip = dots.len().saturating_sub(self.longest_extension_dots);
        dots.iter().skip(skip).find_map(|start| {
            self.by_extension
                .get(&file_name[*start..])
                .map(|index| self.definitions[*index].id.as_str())
        })
    }

    pub fn platforms(&self) -> impl Iterator<Item = &PlatformDefinition> {
        self.definitions.iter()
    }

    pub fn extensions(&self, id: &str) -> Option<&[String]> {
        self.definitions
            .iter()
            .find(|definition| definition.id == id)
            .map(|definition| definition.extensions.as_slice())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn normalize_definitions(definitions: Vec<PlatformDefinition>) -> Vec<PlatformDefinition> {
    definitions
        .into_iter()
        .map(|definition| PlatformDefinition {
            id: definition.id.trim().to_lowercase(),
            extensions: definition
                .extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim().trim_start_matches('.').to_lowercase()))
                .collect(),
        })
        .collect()
}
