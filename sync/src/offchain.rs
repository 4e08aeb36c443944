//! Off-chain content requests.
//!
//! The owner of a group's anchor token (`token_id == group_id`) signs the
//! compact JSON `{"blockNumber":N,"contentUrls":[...]}` with `personal_sign`.
//! Accepted requests wait as pending rows until their block is confirmed;
//! per group the highest block number wins and every other row is
//! superseded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokengrid_crypto::{recover_personal_signer, RecoverableSignature};
use tokengrid_queue::Message;
use tokengrid_store::{OffchainContent, OffchainPendingContent, PendingStatus, StoreError};
use tokengrid_types::{BlockNumber, GridError, GridResult, Network, TokenId};

use crate::{OffchainConfig, SyncContext};

/// Body of `POST /networks/{network}/groups/{groupId}/content`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub group_id: TokenId,
    pub width: u32,
    pub height: u32,
    pub content_urls: Vec<String>,
    pub block_number: BlockNumber,
    /// 65-byte `r‖s‖v` hex.
    pub signature: String,
}

/// The exact bytes a group owner signs.
pub fn canonical_message(block_number: BlockNumber, content_urls: &[String]) -> String {
    let urls = Value::from(content_urls.to_vec());
    format!(r#"{{"blockNumber":{block_number},"contentUrls":{urls}}}"#)
}

pub struct OffchainContentManager {
    ctx: SyncContext,
    config: OffchainConfig,
}

impl OffchainContentManager {
    pub fn new(ctx: SyncContext, config: OffchainConfig) -> Self {
        Self { ctx, config }
    }

    fn validate_shape(request: &ContentRequest) -> GridResult<()> {
        if request.width == 0 || request.height == 0 {
            return Err(GridError::BadRequest(
                "width and height must be at least 1".into(),
            ));
        }
        let cells = u64::from(request.width) * u64::from(request.height);
        if request.content_urls.len() as u64 != cells {
            return Err(GridError::BadRequest(format!(
                "expected {cells} content URLs for a {}x{} group, got {}",
                request.width,
                request.height,
                request.content_urls.len()
            )));
        }
        Ok(())
    }

    fn is_confirmed(&self, block_number: BlockNumber, head: BlockNumber) -> bool {
        block_number.saturating_add(self.config.confirmations) <= head
    }

    /// Verify and record a content request, then schedule its confirmation.
    pub async fn submit(
        &self,
        network: &Network,
        request: ContentRequest,
    ) -> GridResult<OffchainPendingContent> {
        Self::validate_shape(&request)?;
        let contract = self.ctx.registry.resolve(network)?;
        let group_id = request.group_id;

        match self.ctx.store.get_applied(network, group_id) {
            Ok(applied) if request.block_number <= applied.block_number => {
                return Err(GridError::BadRequest(format!(
                    "block {} is not above the applied content at block {}",
                    request.block_number, applied.block_number
                )));
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let head = self.ctx.chain.latest_block_number(network).await?;
        if request.block_number > head {
            return Err(GridError::BadRequest(format!(
                "block {} is ahead of the chain head {head}",
                request.block_number
            )));
        }

        let signature = RecoverableSignature::from_hex(&request.signature)?;
        let message = canonical_message(request.block_number, &request.content_urls);
        let signer = recover_personal_signer(message.as_bytes(), &signature)?;
        let owner = self.ctx.chain.read_owner(&contract, group_id).await?;
        if signer != owner {
            return Err(GridError::Forbidden(format!(
                "{signer} does not own group {group_id}"
            )));
        }

        let now = self.ctx.clock.now();
        let pending = self.ctx.store.create_pending(&OffchainPendingContent {
            id: 0,
            network: network.clone(),
            group_id,
            width: request.width,
            height: request.height,
            content_urls: request.content_urls,
            block_number: request.block_number,
            signature: request.signature,
            signer,
            status: PendingStatus::Pending,
            created_date: now,
            updated_date: now,
            applied_date: None,
        })?;

        let delay = self
            .config
            .confirmations
            .saturating_mul(self.config.block_time_secs);
        self.ctx
            .queue
            .send(&Message::apply_offchain_content(network), delay)
            .await?;
        tracing::info!(
            %network,
            group_id,
            pending_id = pending.id,
            block_number = pending.block_number,
            "accepted off-chain content request"
        );
        Ok(pending)
    }

    /// Apply the winning pending row of every group whose block is
    /// confirmed. Returns the records applied by this call.
    pub async fn apply_confirmed(&self, network: &Network) -> GridResult<Vec<OffchainContent>> {
        let head = self.ctx.chain.latest_block_number(network).await?;
        let mut groups: BTreeMap<TokenId, Vec<OffchainPendingContent>> = BTreeMap::new();
        for row in self
            .ctx
            .store
            .pending_by_status(network, PendingStatus::Pending)?
        {
            groups.entry(row.group_id).or_default().push(row);
        }

        let now = self.ctx.clock.now();
        let mut applied = Vec::new();
        let mut wait_blocks: Option<u64> = None;

        for (group_id, mut rows) in groups {
            let current = match self.ctx.store.get_applied(network, group_id) {
                Ok(record) => Some(record.block_number),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            };

            // Ties go to the later submission.
            rows.sort_by_key(|r| (r.block_number, r.id));
            let Some(mut winner) = rows.pop() else {
                continue;
            };

            if current.is_some_and(|c| winner.block_number <= c) {
                let stale: Vec<_> = std::iter::once(winner)
                    .chain(rows)
                    .map(|mut row| {
                        row.status = PendingStatus::Superseded;
                        row.updated_date = now;
                        row
                    })
                    .collect();
                if let Err(e) = self.ctx.store.record_application(None, &stale) {
                    self.on_conflict(network, group_id, e, &mut wait_blocks)?;
                    continue;
                }
                tracing::debug!(%network, group_id, rows = stale.len(), "superseded stale requests");
                continue;
            }

            if !self.is_confirmed(winner.block_number, head) {
                let remaining = winner.block_number + self.config.confirmations - head;
                wait_blocks = Some(wait_blocks.map_or(remaining, |w| w.min(remaining)));
                continue;
            }

            winner.status = PendingStatus::Applied;
            winner.applied_date = Some(now);
            winner.updated_date = now;
            let record = OffchainContent::from_pending(&winner, now);

            let mut touched = Vec::with_capacity(rows.len() + 1);
            touched.push(winner);
            touched.extend(rows.into_iter().map(|mut loser| {
                loser.status = PendingStatus::Superseded;
                loser.updated_date = now;
                loser
            }));
            if let Err(e) = self.ctx.store.record_application(Some(&record), &touched) {
                self.on_conflict(network, group_id, e, &mut wait_blocks)?;
                continue;
            }

            tracing::info!(
                %network,
                group_id,
                block_number = record.block_number,
                superseded = touched.len() - 1,
                "applied off-chain content"
            );
            applied.push(record);
        }

        if let Some(blocks) = wait_blocks {
            let delay = blocks.saturating_mul(self.config.block_time_secs);
            self.ctx
                .queue
                .send(&Message::apply_offchain_content(network), delay)
                .await?;
            tracing::debug!(%network, delay, "off-chain content rescheduled");
        }
        Ok(applied)
    }

    /// A group changed under us between the read and the write. Nothing was
    /// written, so re-run the pass right away against fresh state.
    fn on_conflict(
        &self,
        network: &Network,
        group_id: TokenId,
        error: StoreError,
        wait_blocks: &mut Option<u64>,
    ) -> GridResult<()> {
        let StoreError::Duplicate(reason) = error else {
            return Err(error.into());
        };
        tracing::info!(%network, group_id, %reason, "group changed concurrently, retrying");
        *wait_blocks = Some(0);
        Ok(())
    }
}
