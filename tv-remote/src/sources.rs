//! Source menu navigation
//!
//! The TV's source menu has no queryable cursor, so selecting an entry means
//! driving the cursor past the leftmost entry first and then stepping right
//! a known number of times.

use remote_client::Key;

use crate::config::SourceEntry;
use crate::{ControlError, Result};

/// Extra left presses beyond the rightmost configured entry
const LEFT_OVERSHOOT: u32 = 3;

/// Largest accepted right-click count; real source menus are far shorter
pub const MAX_RIGHT_CLICKS: u32 = 64;

/// Configured sources, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    entries: Vec<SourceEntry>,
}

impl SourceMap {
    pub fn new(entries: Vec<SourceEntry>) -> Result<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if entry.right_clicks == 0 || entry.right_clicks > MAX_RIGHT_CLICKS {
                return Err(ControlError::InvalidConfig(format!(
                    "source {} needs right_clicks within 1..={}, got {}",
                    entry.name, MAX_RIGHT_CLICKS, entry.right_clicks
                )));
            }
            if entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(ControlError::InvalidConfig(format!(
                    "duplicate source {}",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn right_clicks(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.right_clicks)
    }

    /// Rightmost configured position, at least 1
    pub fn max_right_clicks(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.right_clicks)
            .max()
            .unwrap_or(0)
            .max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keys that select `target`, starting from any menu state
///
/// `EXIT, EXIT, SOURCE, LEFT × (max + 3), RIGHT × n, ENTER`
pub fn navigation_keys(sources: &SourceMap, target: &str) -> Result<Vec<Key>> {
    let right = sources
        .right_clicks(target)
        .ok_or_else(|| ControlError::UnknownSource(target.to_string()))?;
    let left = sources.max_right_clicks() + LEFT_OVERSHOOT;

    let mut keys = Vec::with_capacity((left + right) as usize + 4);
    keys.push(Key::Exit);
    keys.push(Key::Exit);
    keys.push(Key::Source);
    keys.extend(std::iter::repeat(Key::Left).take(left as usize));
    keys.extend(std::iter::repeat(Key::Right).take(right as usize));
    keys.push(Key::Enter);
    Ok(keys)
}
