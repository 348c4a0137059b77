//! Model options and their update surface.
//!
//! The option structs derive serde so hosts can keep them in their TOML
//! configuration; [`OptionsUpdate`] is the partial form used both for
//! `update_options` and for deserializing user overrides.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TAB_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextModelOptions {
    pub tab_size: usize,
    pub insert_spaces: bool,
    pub trim_auto_whitespace: bool,
}

impl Default for TextModelOptions {
    fn default() -> Self {
        Self {
            tab_size: DEFAULT_TAB_SIZE,
            insert_spaces: true,
            trim_auto_whitespace: true,
        }
    }
}

/// Partial options; absent keys keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsUpdate {
    pub tab_size: Option<usize>,
    pub insert_spaces: Option<bool>,
    pub trim_auto_whitespace: Option<bool>,
}

/// Which options actually changed in an `update_options` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionsChangedEvent {
    pub tab_size: bool,
    pub insert_spaces: bool,
    pub trim_auto_whitespace: bool,
}

impl TextModelOptions {
    /// Apply a partial update, reporting what changed. `None` when the
    /// update is a no-op.
    pub fn apply(&mut self, update: OptionsUpdate) -> Option<OptionsChangedEvent> {
        let mut event = OptionsChangedEvent {
            tab_size: false,
            insert_spaces: false,
            trim_auto_whitespace: false,
        };
        if let Some(tab_size) = update.tab_size {
            let tab_size = tab_size.max(1);
            if tab_size != self.tab_size {
                self.tab_size = tab_size;
                event.tab_size = true;
            }
        }
        if let Some(insert_spaces) = update.insert_spaces {
            if insert_spaces != self.insert_spaces {
                self.insert_spaces = insert_spaces;
                event.insert_spaces = true;
            }
        }
        if let Some(trim) = update.trim_auto_whitespace {
            if trim != self.trim_auto_whitespace {
                self.trim_auto_whitespace = trim;
                event.trim_auto_whitespace = true;
            }
        }
        if event.tab_size || event.insert_spaces || event.trim_auto_whitespace {
            Some(event)
        } else {
            None
        }
    }
}
