//! Grid item storage trait.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tokengrid_types::{Address, BlockNumber, Network, Timestamp, TokenId};

use crate::StoreError;

/// The mirror of one token, keyed by `(network, token_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridItem {
    /// Assigned by the store on create.
    pub grid_item_id: u64,
    pub network: Network,
    pub token_id: TokenId,
    /// Contract the state was read from.
    pub source: Address,
    /// Chain head observed by the batch scan that last wrote this row.
    pub block_number: Option<BlockNumber>,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    /// `None` until image ingestion for the current `image_url` completes.
    pub resizable_image_url: Option<String>,
    pub content_url: Option<String>,
    pub url: Option<String>,
    pub group_id: Option<TokenId>,
    pub owner_id: Address,
    pub created_date: Timestamp,
    pub updated_date: Timestamp,
}

/// Sort order for list queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridItemOrder {
    #[default]
    TokenIdAsc,
    TokenIdDesc,
    UpdatedDateDesc,
}

impl GridItemOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "tokenId" | "tokenIdAsc" => Some(Self::TokenIdAsc),
            "-tokenId" | "tokenIdDesc" => Some(Self::TokenIdDesc),
            "-updatedDate" | "updatedDateDesc" => Some(Self::UpdatedDateDesc),
            _ => None,
        }
    }

    pub fn compare(&self, a: &GridItem, b: &GridItem) -> Ordering {
        match self {
            Self::TokenIdAsc => a.token_id.cmp(&b.token_id),
            Self::TokenIdDesc => b.token_id.cmp(&a.token_id),
            Self::UpdatedDateDesc => b
                .updated_date
                .cmp(&a.updated_date)
                .then(a.token_id.cmp(&b.token_id)),
        }
    }
}

/// Filter, order and page over one network's items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridItemQuery {
    pub owner_id: Option<Address>,
    pub group_id: Option<TokenId>,
    pub order: GridItemOrder,
    pub offset: u64,
    pub limit: u32,
}

impl Default for GridItemQuery {
    fn default() -> Self {
        Self {
            owner_id: None,
            group_id: None,
            order: GridItemOrder::default(),
            offset: 0,
            limit: 100,
        }
    }
}

impl GridItemQuery {
    pub fn owned_by(mut self, owner: Address) -> Self {
        self.owner_id = Some(owner);
        self
    }

    pub fn in_group(mut self, group_id: TokenId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn ordered(mut self, order: GridItemOrder) -> Self {
        self.order = order;
        self
    }

    pub fn page(mut self, offset: u64, limit: u32) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn matches(&self, item: &GridItem) -> bool {
        self.owner_id.map_or(true, |o| item.owner_id == o)
            && self.group_id.map_or(true, |g| item.group_id == Some(g))
    }

    /// Apply filter, order and page to an unordered candidate set.
    pub fn apply(&self, items: impl IntoIterator<Item = GridItem>) -> Vec<GridItem> {
        let mut matched: Vec<GridItem> = items.into_iter().filter(|i| self.matches(i)).collect();
        matched.sort_by(|a, b| self.order.compare(a, b));
        matched
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// Trait for storing grid items.
///
/// `(network, token_id)` is unique: `create_grid_item` fails with
/// [`StoreError::Duplicate`] when the key already exists, which is how
/// concurrent workers detect that someone else created the row first.
pub trait GridItemStore {
    fn get_grid_item(&self, network: &Network, token_id: TokenId) -> Result<GridItem, StoreError>;

    /// Insert a new item, assigning `grid_item_id`. Returns the stored row.
    fn create_grid_item(&self, item: &GridItem) -> Result<GridItem, StoreError>;

    /// Overwrite an existing item. Fails with `NotFound` if it was never created.
    fn update_grid_item(&self, item: &GridItem) -> Result<(), StoreError>;

    fn query_grid_items(
        &self,
        network: &Network,
        query: &GridItemQuery,
    ) -> Result<Vec<GridItem>, StoreError>;

    fn grid_item_count(&self, network: &Network) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(token_id: TokenId, owner: u8, group: Option<TokenId>, updated: u64) -> GridItem {
        GridItem {
            grid_item_id: token_id,
            network: Network::parse("testnet").unwrap(),
            token_id,
            source: Address::ZERO,
            block_number: None,
            title: String::new(),
            description: String::new(),
            image_url: None,
            resizable_image_url: None,
            content_url: None,
            url: None,
            group_id: group,
            owner_id: Address::new([owner; 20]),
            created_date: Timestamp::new(1),
            updated_date: Timestamp::new(updated),
        }
    }

    #[test]
    fn filter_and_order_compose() {
        let items = vec![
            item(1, 0xaa, Some(1), 10),
            item(2, 0xbb, Some(1), 30),
            item(3, 0xaa, None, 20),
            item(4, 0xaa, Some(1), 40),
        ];
        let query = GridItemQuery::default()
            .owned_by(Address::new([0xaa; 20]))
            .in_group(1)
            .ordered(GridItemOrder::UpdatedDateDesc);
        let ids: Vec<_> = query.apply(items).iter().map(|i| i.token_id).collect();
        assert_eq!(ids, vec![4, 1]);
    }

    #[test]
    fn paging_skips_and_limits() {
        let items = (1..=10).map(|id| item(id, 0, None, id));
        let ids: Vec<_> = GridItemQuery::default()
            .ordered(GridItemOrder::TokenIdDesc)
            .page(2, 3)
            .apply(items)
            .iter()
            .map(|i| i.token_id)
            .collect();
        assert_eq!(ids, vec![8, 7, 6]);
    }

    #[test]
    fn json_uses_camel_case() {
        let json = serde_json::to_value(item(42, 0xbb, None, 5)).unwrap();
        assert_eq!(json["tokenId"], 42);
        assert!(json["resizableImageUrl"].is_null());
        assert!(json.get("ownerId").is_some());
    }

    #[test]
    fn order_parses_query_values() {
        assert_eq!(GridItemOrder::parse("-updatedDate"), Some(GridItemOrder::UpdatedDateDesc));
        assert_eq!(GridItemOrder::parse("sideways"), None);
    }
}
