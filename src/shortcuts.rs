use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dtos::ShortcutPreferences;

/// A key press reported by the window layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPress {
    #[serde(default)]
    pub command: bool,
    #[serde(default)]
    pub control: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    pub key: String,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_command(mut self) -> Self {
        self.command = true;
        self
    }

    pub fn with_control(mut self) -> Self {
        self.control = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accelerator {
    primary: bool,
    command: bool,
    control: bool,
    alt: bool,
    shift: bool,
    key: String,
}

impl Accelerator {
    /// Parses accelerator strings such as `CommandOrControl+Shift+K`.
    pub fn parse(value: &str) -> Result<Self, String> {
        let tokens = value
            .split('+')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();
        let Some((key, modifiers)) = tokens.split_last() else {
            return Err("accelerator must include a key.".to_string());
        };

        let mut accelerator = Self {
            primary: false,
            command: false,
            control: false,
            alt: false,
            shift: false,
            key: key.to_uppercase(),
        };
        for modifier in modifiers {
            match modifier.to_lowercase().as_str() {
                "commandorcontrol" | "cmdorctrl" => accelerator.primary = true,
                "command" | "cmd" | "super" | "meta" => accelerator.command = true,
                "control" | "ctrl" => accelerator.control = true,
                "alt" | "option" => accelerator.alt = true,
                "shift" => accelerator.shift = true,
                other => return Err(format!("unsupported accelerator modifier \"{other}\".")),
            }
        }

        Ok(accelerator)
    }

    pub fn matches(&self, press: &KeyPress) -> bool {
        let modifiers_match = if self.primary {
            press.command || press.control
        } else {
            press.command == self.command && press.control == self.control
        };
        modifiers_match
            && press.alt == self.alt
            && press.shift == self.shift
            && press.key.trim().eq_ignore_ascii_case(&self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    ToggleWindow,
    QuickSwitcher,
    NewSpec,
    RefreshProjects,
    OpenProject,
    Find,
    ToggleSidebar,
}

const FIXED_BINDINGS: [(&str, ShortcutAction); 5] = [
    ("CmdOrCtrl+R", ShortcutAction::RefreshProjects),
    ("CmdOrCtrl+O", ShortcutAction::OpenProject),
    ("CmdOrCtrl+F", ShortcutAction::Find),
    ("CmdOrCtrl+B", ShortcutAction::ToggleSidebar),
    ("CmdOrCtrl+N", ShortcutAction::NewSpec),
];

/// In-window shortcut table. Configured bindings are consulted before the
/// fixed menu accelerators.
#[derive(Debug, Clone)]
pub struct ShortcutMap {
    bindings: Vec<(Accelerator, ShortcutAction)>,
}

impl Default for ShortcutMap {
    fn default() -> Self {
        Self::from_preferences(&ShortcutPreferences::default())
    }
}

impl ShortcutMap {
    pub fn from_preferences(preferences: &ShortcutPreferences) -> Self {
        let configured = [
            (preferences.toggle_window.as_str(), ShortcutAction::ToggleWindow),
            (preferences.quick_switcher.as_str(), ShortcutAction::QuickSwitcher),
            (preferences.new_spec.as_str(), ShortcutAction::NewSpec),
        ];

        let mut bindings = Vec::new();
        for (value, action) in configured.into_iter().chain(FIXED_BINDINGS) {
            match Accelerator::parse(value) {
                Ok(accelerator) => bindings.push((accelerator, action)),
                Err(error) => warn!(accelerator = value, %error, "ignoring shortcut binding"),
            }
        }

        Self { bindings }
    }

    pub fn resolve(&self, press: &KeyPress) -> Option<ShortcutAction> {
        self.bindings
            .iter()
            .find(|(accelerator, _)| accelerator.matches(press))
            .map(|(_, action)| *action)
    }
}
