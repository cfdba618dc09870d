//! Content blocks: the independently rendered units of a storefront page.
//!
//! Serialized field names match the wire shape persisted in the external
//! data store (camelCase, `type` tag, optional `vibeCode` source).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BlockId, DeviceClass, UserType};
use crate::validation::ValidationRecord;

/// How a block produces its HTML fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BlockType {
    /// Rendered by the built-in template path from `config` alone.
    #[default]
    #[serde(rename = "template")]
    Template,
    /// Rendered by user-authored vibe code.
    #[serde(rename = "vibe-code")]
    VibeCode,
    /// Visual-editor block with an optional vibe-code override.
    /// Valid vibe code, when present, fully overrides the template path.
    #[serde(rename = "hybrid")]
    Hybrid,
}

/// One addressable unit of page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// User-authored render-function source, for `vibe-code`/`hybrid` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe_code: Option<String>,
    /// Free-form key/value data passed to the render function.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Render order. Values need not be contiguous; ties break by `id`.
    pub position: i64,
    #[serde(default)]
    pub visibility: Visibility,
    /// Monotonically increasing; bumped on every source mutation.
    pub code_version: u64,
    pub last_code_update: DateTime<Utc>,
    /// Declared external dependencies. Must be empty or drawn from an
    /// explicit allow-list; the safe default allow-list is empty.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Validator output for the most recently saved source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validation: Option<ValidationRecord>,
}

impl Block {
    /// The deterministic sort key for page assembly: ascending `position`,
    /// ties broken by `id`.
    #[must_use]
    pub const fn order_key(&self) -> (i64, BlockId) {
        (self.position, self.id)
    }

    /// Whether this block renders through vibe code.
    ///
    /// Hybrid blocks only take the vibe-code path when source is present;
    /// otherwise they fall back to the template path.
    #[must_use]
    pub const fn uses_vibe_code(&self) -> bool {
        match self.block_type {
            BlockType::VibeCode => true,
            BlockType::Hybrid => self.vibe_code.is_some(),
            BlockType::Template => false,
        }
    }

    /// Whether the most recently saved source passed validation at the
    /// current `code_version`. Blocks failing this check are never executed.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.last_validation
            .as_ref()
            .is_some_and(|v| v.code_version == self.code_version && v.result.is_valid)
    }
}

/// Visibility rule set. Empty device/user lists mean "visible to all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    #[serde(default)]
    pub devices: Vec<DeviceClass>,
    #[serde(default)]
    pub user_types: Vec<UserType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl Visibility {
    /// Whether a block with this rule set is shown to the given visitor at
    /// the given instant. Excluded blocks are skipped before execution.
    #[must_use]
    pub fn allows(&self, device: DeviceClass, user_type: UserType, now: DateTime<Utc>) -> bool {
        if !self.devices.is_empty() && !self.devices.contains(&device) {
            return false;
        }
        if !self.user_types.is_empty() && !self.user_types.contains(&user_type) {
            return false;
        }
        if let Some(range) = &self.date_range {
            return range.contains(now);
        }
        true
    }
}

/// Half-open scheduling window for a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Whether `instant` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}
