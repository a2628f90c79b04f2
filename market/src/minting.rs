use std::str::FromStr;
use std::sync::Arc;

use actix_web::web;
use anyhow::anyhow;
use common::{
    Database, MintJobItem, Minter, NftSpec, STATUS_COMPLETED, STATUS_FAILED, STATUS_PROCESSING,
};
use solana_sdk::pubkey::Pubkey;
use tokio::time::{Duration, sleep};

use crate::state::AppState;

/// Background loop that drains pending mint-job items. One attempt per
/// item; failures are terminal and stay visible through the stored
/// error message.
pub async fn start_mint_worker(data: web::Data<AppState>, minter: Arc<dyn Minter>) {
    let poll = Duration::from_secs(data.settings.worker_poll_secs.max(1));
    loop {
        if let Err(e) =
            process_pending_items(&data.db, minter.as_ref(), data.settings.worker_batch).await
        {
            log::error!("Mint worker pass failed: {:#}", e);
        }
        sleep(poll).await;
    }
}

pub async fn process_pending_items(
    db: &Database,
    minter: &dyn Minter,
    batch: i64,
) -> anyhow::Result<usize> {
    let items = db.get_pending_mint_items(batch).await?;
    for item in &items {
        process_item(db, minter, item).await?;
    }
    Ok(items.len())
}

pub async fn process_item(
    db: &Database,
    minter: &dyn Minter,
    item: &MintJobItem,
) -> anyhow::Result<()> {
    let Some(job) = db.get_mint_job(item.job_id).await? else {
        let error_message = format!("Job {} not found for item {}", item.job_id, item.id);
        log::error!("{}", error_message);
        db.update_mint_item(item.id, STATUS_FAILED, None, Some(error_message))
            .await?;
        return Ok(());
    };

    db.mark_job_processing(job.id).await?;
    db.update_mint_item(item.id, STATUS_PROCESSING, None, None)
        .await?;

    match mint_item(db, minter, job.collection_id, &job.wallet_address, item).await {
        Ok(mint_address) => {
            log::info!(
                "Minted {} for job {} item {}",
                mint_address,
                job.id,
                item.item_index
            );
            db.update_mint_item(item.id, STATUS_COMPLETED, Some(&mint_address), None)
                .await?;
        }
        Err(e) => {
            let error_message = format!(
                "Failed to mint item {} of job {}: {:#}",
                item.item_index, job.id, e
            );
            log::error!("{}", error_message);
            db.update_mint_item(item.id, STATUS_FAILED, None, Some(error_message))
                .await?;
        }
    }

    db.refresh_mint_job_counts(job.id).await?;
    finalize_job(db, job.id).await?;
    Ok(())
}

async fn mint_item(
    db: &Database,
    minter: &dyn Minter,
    collection_id: i64,
    wallet_address: &str,
    item: &MintJobItem,
) -> anyhow::Result<String> {
    let collection = db
        .get_collection(collection_id)
        .await?
        .ok_or_else(|| anyhow!("Collection {} not found", collection_id))?;

    let owner = Pubkey::from_str(wallet_address)
        .map_err(|_| anyhow!("Invalid owner wallet {}", wallet_address))?;

    let spec = NftSpec {
        name: format!("{} #{}", collection.name, item.item_index + 1),
        symbol: collection.symbol.clone(),
        uri: format!(
            "{}/{}.json",
            collection.base_uri.trim_end_matches('/'),
            item.item_index + 1
        ),
    };

    minter.mint_one(&spec, &owner).await
}

/// Settle the job row once every item is terminal: `completed` when all
/// items minted, otherwise `failed` with a summary message.
pub async fn finalize_job(db: &Database, job_id: i64) -> anyhow::Result<()> {
    let Some(job) = db.get_mint_job(job_id).await? else {
        return Ok(());
    };
    if !job.is_settled() {
        return Ok(());
    }

    if job.failed_quantity > 0 {
        let error_message = format!("{} of {} mints failed", job.failed_quantity, job.total_quantity);
        db.update_mint_job_status(job_id, STATUS_FAILED, Some(error_message))
            .await?;
    } else {
        db.update_mint_job_status(job_id, STATUS_COMPLETED, None)
            .await?;
    }
    Ok(())
}
