//! Chain-to-store reconciliation.
//!
//! Every handler re-derives the grid item from chain state, so running one
//! twice (a redelivered message, a lost create race, a re-scanned block
//! range) converges on the same row without extra writes.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::json;
use tokengrid_chain::{decode_log, token_id_from_fields, CanonicalEvent, ContractDescriptor};
use tokengrid_queue::Message;
use tokengrid_store::{GridItem, NetworkUpdate, StoreError};
use tokengrid_types::{Address, BlockNumber, GridError, GridResult, Network, TokenId};

use crate::metadata::{resolve_content_uri, TokenMetadata};
use crate::{Alert, ImagesConfig, SyncConfig, SyncContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Result of one `UPDATE_TOKENS` scan.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: Vec<(TokenId, GridError)>,
    /// Head recorded as the network checkpoint; `None` when any token failed.
    pub checkpoint: Option<BlockNumber>,
}

impl BatchReport {
    fn record(&mut self, outcome: UpdateOutcome) {
        match outcome {
            UpdateOutcome::Created => self.created += 1,
            UpdateOutcome::Updated => self.updated += 1,
            UpdateOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of one `PROCESS_BLOCKS` run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockScan {
    /// No checkpoint existed: the head was recorded and a full scan queued.
    Bootstrapped { head: BlockNumber },
    UpToDate { checkpoint: BlockNumber },
    Scanned {
        from: BlockNumber,
        to: BlockNumber,
        tokens: Vec<TokenId>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageOutcome {
    NoImage,
    AlreadyIngested,
    /// The item's image changed while ingesting; the newer update queued its own upload.
    Superseded,
    Ingested { image_id: String },
}

/// Chain-side view of one token.
struct ObservedToken {
    source: Address,
    owner: Address,
    content_uri: String,
    metadata: TokenMetadata,
}

pub struct SyncEngine {
    ctx: SyncContext,
    config: SyncConfig,
    images_config: ImagesConfig,
}

impl SyncEngine {
    pub fn new(ctx: SyncContext, config: SyncConfig, images_config: ImagesConfig) -> Self {
        Self {
            ctx,
            config,
            images_config,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Reconcile one token with the chain.
    pub async fn update_token(
        &self,
        network: &Network,
        token_id: TokenId,
    ) -> GridResult<UpdateOutcome> {
        let contract = self.ctx.registry.resolve(network)?;
        self.reconcile(&contract, token_id, None).await
    }

    /// Reconcile every token `1..=totalSupply`. Per-token failures are
    /// alerted and collected; the scan always runs to the end.
    pub async fn update_tokens(&self, network: &Network) -> GridResult<BatchReport> {
        let contract = self.ctx.registry.resolve(network)?;
        let head = self.ctx.chain.latest_block_number(network).await?;
        let total = self.ctx.chain.read_total_supply(&contract).await?;
        tracing::info!(%network, total, head, "starting token scan");

        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        for token_id in 1..=total {
            match self.reconcile(&contract, token_id, Some(head)).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    tracing::warn!(%network, token_id, error = %e, "token update failed");
                    let alert = Alert::new(
                        "UPDATE_TOKEN",
                        json!({ "network": network, "tokenId": token_id }),
                        &e,
                    );
                    self.ctx.notifier.notify(&alert).await;
                    report.failed.push((token_id, e));
                }
            }
        }

        if report.is_clean() {
            self.advance_checkpoint(network, head)?;
            report.checkpoint = Some(head);
        }
        tracing::info!(
            %network,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "token scan finished"
        );
        Ok(report)
    }

    /// Scan the logs after the checkpoint and queue one `UPDATE_TOKEN` per
    /// token they mention.
    pub async fn process_blocks(&self, network: &Network) -> GridResult<BlockScan> {
        let contract = self.ctx.registry.resolve(network)?;
        let head = self.ctx.chain.latest_block_number(network).await?;

        let checkpoint = match self.ctx.store.get_network_update(network) {
            Ok(update) => update.block_number,
            Err(e) if e.is_not_found() => {
                self.advance_checkpoint(network, head)?;
                self.ctx
                    .queue
                    .send(&Message::update_tokens(network), 0)
                    .await?;
                tracing::info!(%network, head, "no checkpoint, queued full token scan");
                return Ok(BlockScan::Bootstrapped { head });
            }
            Err(e) => return Err(e.into()),
        };
        if checkpoint >= head {
            return Ok(BlockScan::UpToDate { checkpoint });
        }

        let from = checkpoint + 1;
        let to = head.min(checkpoint.saturating_add(self.config.max_block_range.max(1)));

        let mut tokens = BTreeSet::new();
        for event in [CanonicalEvent::Transfer, CanonicalEvent::ContentUriUpdated] {
            let Some(abi_event) = contract.event(event)? else {
                continue;
            };
            let logs = self.ctx.chain.get_logs(&contract, event, from, to).await?;
            for log in logs {
                let fields = match decode_log(abi_event, &log) {
                    Ok(fields) => fields,
                    Err(e) => {
                        tracing::warn!(%network, block = ?log.block_number, error = %e, "skipping undecodable log");
                        continue;
                    }
                };
                match token_id_from_fields(&fields) {
                    Some(token_id) => {
                        tokens.insert(token_id);
                    }
                    None => {
                        tracing::warn!(%network, block = ?log.block_number, "log carries no token id")
                    }
                }
            }
        }

        for &token_id in &tokens {
            self.ctx
                .queue
                .send(&Message::update_token(network, token_id), 0)
                .await?;
        }
        self.advance_checkpoint(network, to)?;
        tracing::info!(%network, from, to, tokens = tokens.len(), "processed blocks");

        Ok(BlockScan::Scanned {
            from,
            to,
            tokens: tokens.into_iter().collect(),
        })
    }

    /// Hand the item's image to the ingestor and point its resizable URL at
    /// the stored variants.
    pub async fn upload_token_image(
        &self,
        network: &Network,
        token_id: TokenId,
    ) -> GridResult<ImageOutcome> {
        let item = self.ctx.store.get_grid_item(network, token_id)?;
        let Some(source_url) = item.image_url.clone() else {
            return Ok(ImageOutcome::NoImage);
        };
        if item.resizable_image_url.is_some() {
            tracing::debug!(%network, token_id, "image already ingested");
            return Ok(ImageOutcome::AlreadyIngested);
        }

        let fetch_url = resolve_content_uri(&source_url, &self.config.ipfs_gateway);
        let image = self
            .ctx
            .images
            .ingest(&fetch_url)
            .await?
            .into_image(self.ctx.clock.now());
        self.ctx.store.put_image(&image)?;

        let mut latest = self.ctx.store.get_grid_item(network, token_id)?;
        if latest.image_url.as_deref() != Some(source_url.as_str()) {
            tracing::debug!(%network, token_id, "image changed during ingestion");
            return Ok(ImageOutcome::Superseded);
        }
        latest.resizable_image_url = Some(self.images_config.resizable_url(&image.image_id));
        latest.updated_date = self.ctx.clock.now();
        self.ctx.store.update_grid_item(&latest)?;

        tracing::info!(%network, token_id, image_id = %image.image_id, "ingested token image");
        Ok(ImageOutcome::Ingested {
            image_id: image.image_id,
        })
    }

    async fn observe(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
    ) -> GridResult<ObservedToken> {
        let content_uri = self.ctx.chain.read_content_uri(contract, token_id).await?;
        let owner = self.ctx.chain.read_owner(contract, token_id).await?;
        let document = self.ctx.metadata.fetch(&content_uri).await?;
        Ok(ObservedToken {
            source: contract.address,
            owner,
            content_uri,
            metadata: TokenMetadata::from_document(&document)?,
        })
    }

    async fn reconcile(
        &self,
        contract: &ContractDescriptor,
        token_id: TokenId,
        head: Option<BlockNumber>,
    ) -> GridResult<UpdateOutcome> {
        let network = &contract.network;
        let observed = self.observe(contract, token_id).await?;

        let existing = match self.ctx.store.get_grid_item(network, token_id) {
            Ok(item) => Some(item),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let (item, outcome) = match existing {
            Some(current) => self.apply_diff(current, &observed, head)?,
            None => match self.create(network, token_id, &observed, head) {
                Ok(item) => (item, UpdateOutcome::Created),
                Err(StoreError::Duplicate(_)) => {
                    tracing::debug!(%network, token_id, "lost create race, re-reading");
                    let current = self.ctx.store.get_grid_item(network, token_id)?;
                    self.apply_diff(current, &observed, head)?
                }
                Err(e) => return Err(e.into()),
            },
        };

        if item.image_url.is_some() && item.resizable_image_url.is_none() {
            self.ctx
                .queue
                .send(&Message::upload_token_image(network, token_id), 0)
                .await?;
        }
        tracing::debug!(%network, token_id, ?outcome, "reconciled token");
        Ok(outcome)
    }

    fn create(
        &self,
        network: &Network,
        token_id: TokenId,
        observed: &ObservedToken,
        head: Option<BlockNumber>,
    ) -> Result<GridItem, StoreError> {
        let now = self.ctx.clock.now();
        let mut item = GridItem {
            grid_item_id: 0,
            network: network.clone(),
            token_id,
            source: observed.source,
            block_number: head,
            title: String::new(),
            description: String::new(),
            image_url: None,
            resizable_image_url: None,
            content_url: None,
            url: None,
            group_id: None,
            owner_id: observed.owner,
            created_date: now,
            updated_date: now,
        };
        observed.write_into(&mut item);
        self.ctx.store.create_grid_item(&item)
    }

    /// Write `observed` over `current` only when a tracked field differs.
    fn apply_diff(
        &self,
        current: GridItem,
        observed: &ObservedToken,
        head: Option<BlockNumber>,
    ) -> GridResult<(GridItem, UpdateOutcome)> {
        let mut next = current.clone();
        observed.write_into(&mut next);
        if next.image_url != current.image_url {
            next.resizable_image_url = None;
        }
        if next == current {
            return Ok((current, UpdateOutcome::Unchanged));
        }

        next.block_number = head.or(current.block_number);
        next.updated_date = self.ctx.clock.now();
        self.ctx.store.update_grid_item(&next)?;
        Ok((next, UpdateOutcome::Updated))
    }

    /// Move the network checkpoint forward; never backwards.
    fn advance_checkpoint(&self, network: &Network, block_number: BlockNumber) -> GridResult<()> {
        let now = self.ctx.clock.now();
        let update = match self.ctx.store.get_network_update(network) {
            Ok(existing) if existing.block_number >= block_number => return Ok(()),
            Ok(mut existing) => {
                existing.block_number = block_number;
                existing.updated_date = now;
                existing
            }
            Err(e) if e.is_not_found() => NetworkUpdate {
                network: network.clone(),
                block_number,
                created_date: now,
                updated_date: now,
            },
            Err(e) => return Err(e.into()),
        };
        self.ctx.store.put_network_update(&update)?;
        Ok(())
    }
}

impl ObservedToken {
    fn write_into(&self, item: &mut GridItem) {
        item.source = self.source;
        item.owner_id = self.owner;
        item.title = self.metadata.title.clone();
        item.description = self.metadata.description.clone();
        item.image_url = self.metadata.image_url.clone();
        item.url = self.metadata.url.clone();
        item.group_id = self.metadata.group_id;
        item.content_url = Some(self.content_uri.clone()).filter(|uri| !uri.is_empty());
    }
}
