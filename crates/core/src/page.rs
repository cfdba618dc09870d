//! Pages: ordered block lists addressed by slug within a storefront.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::types::{PageId, StorefrontId};

/// SEO metadata rendered into the page shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeoMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// JSON-LD structured data, emitted verbatim into a script tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<serde_json::Value>,
}

/// A page belonging to exactly one storefront.
///
/// Created in draft, published when the owner confirms. Unpublishing hides
/// it from the renderer immediately; cached responses may serve stale
/// content until invalidation completes (accepted eventual consistency).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub storefront_id: StorefrontId,
    /// Unique within the storefront.
    pub slug: String,
    pub title: String,
    pub blocks: Vec<Block>,
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seo: SeoMeta,
}

impl Page {
    /// Blocks in deterministic render order: ascending `(position, id)`.
    #[must_use]
    pub fn ordered_blocks(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self.blocks.iter().collect();
        blocks.sort_by_key(|b| b.order_key());
        blocks
    }

    /// Find a block by id.
    #[must_use]
    pub fn block(&self, id: crate::types::BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockType, Visibility};
    use crate::types::{BlockId, fixture_uuid};

    fn block_at(position: i64, n: u64) -> Block {
        Block {
            id: BlockId::from_uuid(fixture_uuid(n)),
            block_type: BlockType::Template,
            vibe_code: None,
            config: serde_json::json!({}),
            position,
            visibility: Visibility::default(),
            code_version: 1,
            last_code_update: Utc::now(),
            dependencies: vec![],
            last_validation: None,
        }
    }

    #[test]
    fn test_ordered_blocks_ascending_position() {
        let page = Page {
            id: PageId::from_uuid(fixture_uuid(1)),
            storefront_id: StorefrontId::from_uuid(fixture_uuid(2)),
            slug: "home".to_string(),
            title: "Home".to_string(),
            blocks: vec![block_at(10, 1), block_at(5, 2), block_at(20, 3)],
            published: true,
            published_at: None,
            seo: SeoMeta::default(),
        };
        let positions: Vec<i64> = page.ordered_blocks().iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![5, 10, 20]);
    }
}
