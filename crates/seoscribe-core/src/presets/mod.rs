//! Refinement preset library.
//!
//! Provides the built-in refinement instructions a user can pick instead of
//! typing their own. The presets are defined in `refine_presets.toml` and
//! embedded in the binary at compile time.

use serde::{Deserialize, Serialize};

/// A single refinement preset from the embedded library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinePreset {
    /// Stable identifier used by clients (e.g. `shorten`).
    pub name: String,
    /// Short human-readable label.
    pub label: String,
    /// Instruction text sent to the provider.
    pub instruction: String,
}

/// Container for deserializing the embedded TOML file.
#[derive(Debug, Deserialize)]
struct PresetLibrary {
    presets: Vec<RefinePreset>,
}

/// The embedded refinement presets TOML.
static PRESETS_TOML: &str = include_str!("refine_presets.toml");

/// Load all refinement presets from the embedded library.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed. The file is compiled into the
/// binary and covered by tests, so this cannot happen at runtime.
pub fn load_presets() -> Vec<RefinePreset> {
    let lib: PresetLibrary =
        toml::from_str(PRESETS_TOML).expect("embedded refine_presets.toml is invalid");
    lib.presets
}

/// Look up a preset by name.
pub fn find_preset(name: &str) -> Option<RefinePreset> {
    load_presets().into_iter().find(|p| p.name == name)
}

/// What the user asked a refinement to do.
///
/// Serializes as `{"preset": "shorten"}` or `{"custom": "make it punchier"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineInstruction {
    Preset(String),
    Custom(String),
}

impl RefineInstruction {
    /// Build an instruction from user text: a known preset name selects the
    /// preset, anything else is a custom instruction.
    pub fn from_user_text(text: &str) -> Self {
        let text = text.trim();
        match find_preset(text) {
            Some(preset) => Self::Preset(preset.name),
            None => Self::Custom(text.to_string()),
        }
    }

    /// Resolve to the instruction text sent to the provider.
    ///
    /// Fails with a description of the problem for unknown presets and
    /// blank custom instructions.
    pub fn directive(&self) -> Result<String, String> {
        match self {
            Self::Preset(name) => find_preset(name)
                .map(|p| p.instruction)
                .ok_or_else(|| format!("unknown refinement preset {name:?}")),
            Self::Custom(text) if text.trim().is_empty() => {
                Err("custom refinement instruction is empty".to_string())
            }
            Self::Custom(text) => Ok(text.trim().to_string()),
        }
    }
}
