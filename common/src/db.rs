use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::schema::{
    AdminUser, Collection, Like, MintJob, MintJobItem, Payment, STATUS_PENDING, STATUS_PROCESSING,
    SecurityEvent,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Outcome of recording a verified payment. The UNIQUE index on
/// `tx_signature` makes the insert the atomic replay check.
#[derive(Debug)]
pub enum PaymentInsert {
    Created(i64),
    DuplicateSignature,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Failed to create SQLite connect options")?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    /// In-memory database, mostly for tests and dry runs. A single
    /// connection, otherwise every pooled connection gets its own
    /// empty database.
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Failed to create SQLite connect options")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    pub async fn save_admin_user(&self, user: &AdminUser) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_users (username, email, password_hash, role)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .execute(&self.pool)
        .await
        .context("Failed to save admin user to database")?;

        Ok(())
    }

    pub async fn get_admin_user(&self, username: &str) -> anyhow::Result<Option<AdminUser>> {
        let user = sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT * FROM admin_users WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context(format!("Failed to get admin user {}", username))?;
        Ok(user)
    }

    pub async fn save_collection(&self, collection: &Collection) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO collections (
                name, symbol, treasury_wallet, creator_wallet, mint_price_lamports, base_uri
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&collection.name)
        .bind(&collection.symbol)
        .bind(&collection.treasury_wallet)
        .bind(&collection.creator_wallet)
        .bind(collection.mint_price_lamports)
        .bind(&collection.base_uri)
        .execute(&self.pool)
        .await
        .context("Failed to save collection to database")?;

        Ok(())
    }

    pub async fn get_collections(&self) -> anyhow::Result<Vec<Collection>> {
        let collections = sqlx::query_as::<_, Collection>(
            r#"
            SELECT * FROM collections ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to get all collections from database")?;
        Ok(collections)
    }

    pub async fn get_collection(&self, collection_id: i64) -> anyhow::Result<Option<Collection>> {
        let collection = sqlx::query_as::<_, Collection>(
            r#"
            SELECT * FROM collections WHERE id = ?
            "#,
        )
        .bind(collection_id)
        .fetch_optional(&self.pool)
        .await
        .context(format!(
            "Failed to get collection with id {}",
            collection_id
        ))?;
        Ok(collection)
    }

    /// Record a verified payment. Returns
    /// [`PaymentInsert::DuplicateSignature`] when the signature was
    /// already recorded; the caller treats that as a replay attempt.
    pub async fn save_payment(&self, payment: &Payment) -> anyhow::Result<PaymentInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                tx_signature, wallet_address, payment_type, amount_lamports,
                recipient, collection_id, verified
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.tx_signature)
        .bind(&payment.wallet_address)
        .bind(&payment.payment_type)
        .bind(payment.amount_lamports)
        .bind(&payment.recipient)
        .bind(payment.collection_id)
        .bind(payment.verified)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(PaymentInsert::Created(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(PaymentInsert::DuplicateSignature)
            }
            Err(e) => Err(e).context("Failed to save payment"),
        }
    }

    pub async fn get_payment_by_signature(
        &self,
        tx_signature: &str,
    ) -> anyhow::Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments WHERE tx_signature = ?
            "#,
        )
        .bind(tx_signature)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get payment by signature")?;
        Ok(payment)
    }

    /// Lookup used to gate mint-job creation on a verified mint fee.
    pub async fn get_verified_payment(
        &self,
        tx_signature: &str,
        wallet_address: &str,
        payment_type: &str,
    ) -> anyhow::Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE tx_signature = ? AND wallet_address = ? AND payment_type = ? AND verified = TRUE
            "#,
        )
        .bind(tx_signature)
        .bind(wallet_address)
        .bind(payment_type)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get verified payment")?;
        Ok(payment)
    }

    pub async fn get_all_payments(&self) -> anyhow::Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to get all payments")?;
        Ok(payments)
    }

    pub async fn save_security_event(&self, event: &SecurityEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO security_events (wallet_address, event_type, severity, details)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&event.wallet_address)
        .bind(&event.event_type)
        .bind(&event.severity)
        .bind(&event.details)
        .execute(&self.pool)
        .await
        .context("Failed to save security event")?;

        Ok(())
    }

    pub async fn get_security_events(&self) -> anyhow::Result<Vec<SecurityEvent>> {
        let events = sqlx::query_as::<_, SecurityEvent>(
            r#"
            SELECT * FROM security_events ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to get security events")?;
        Ok(events)
    }

    /// Returns false when the like already exists (idempotent duplicate).
    pub async fn insert_like(
        &self,
        user_wallet: &str,
        target_type: &str,
        target_id: i64,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (user_wallet, target_type, target_id) VALUES (?, ?, ?)
            "#,
        )
        .bind(user_wallet)
        .bind(target_type)
        .bind(target_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(e).context("Failed to insert like"),
        }
    }

    /// Returns false when there was nothing to remove.
    pub async fn delete_like(
        &self,
        user_wallet: &str,
        target_type: &str,
        target_id: i64,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM likes WHERE user_wallet = ? AND target_type = ? AND target_id = ?
            "#,
        )
        .bind(user_wallet)
        .bind(target_type)
        .bind(target_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete like")?;

        Ok(result.rows_affected() > 0)
    }

    /// Everything a wallet has liked, for seeding the client's
    /// confirmed set.
    pub async fn get_likes_by_wallet(&self, user_wallet: &str) -> anyhow::Result<Vec<Like>> {
        let likes = sqlx::query_as::<_, Like>(
            r#"
            SELECT * FROM likes WHERE user_wallet = ? ORDER BY id
            "#,
        )
        .bind(user_wallet)
        .fetch_all(&self.pool)
        .await
        .context(format!("Failed to get likes for wallet {}", user_wallet))?;
        Ok(likes)
    }

    pub async fn count_likes(&self, target_type: &str, target_id: i64) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM likes WHERE target_type = ? AND target_id = ?
            "#,
        )
        .bind(target_type)
        .bind(target_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count likes")?;
        Ok(count)
    }

    /// Insert a job and its per-item rows in one transaction.
    pub async fn create_mint_job(&self, job: &MintJob) -> anyhow::Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin mint job transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO mint_jobs (
                collection_id, wallet_address, payment_signature, total_quantity, status
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.collection_id)
        .bind(&job.wallet_address)
        .bind(&job.payment_signature)
        .bind(job.total_quantity)
        .bind(STATUS_PENDING)
        .execute(&mut *tx)
        .await
        .context("Failed to insert mint job")?;

        let job_id = result.last_insert_rowid();

        for item_index in 0..job.total_quantity {
            sqlx::query(
                r#"
                INSERT INTO mint_job_items (job_id, item_index, status) VALUES (?, ?, ?)
                "#,
            )
            .bind(job_id)
            .bind(item_index)
            .bind(STATUS_PENDING)
            .execute(&mut *tx)
            .await
            .context("Failed to insert mint job item")?;
        }

        tx.commit()
            .await
            .context("Failed to commit mint job transaction")?;
        Ok(job_id)
    }

    /// A mint-fee payment backs at most one job; this is the reuse check.
    pub async fn get_mint_job_by_payment(
        &self,
        payment_signature: &str,
    ) -> anyhow::Result<Option<MintJob>> {
        let job = sqlx::query_as::<_, MintJob>(
            r#"
            SELECT * FROM mint_jobs WHERE payment_signature = ?
            "#,
        )
        .bind(payment_signature)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get mint job by payment signature")?;
        Ok(job)
    }

    pub async fn get_mint_job(&self, job_id: i64) -> anyhow::Result<Option<MintJob>> {
        let job = sqlx::query_as::<_, MintJob>(
            r#"
            SELECT * FROM mint_jobs WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .context(format!("Failed to get mint job with id {}", job_id))?;
        Ok(job)
    }

    pub async fn get_mint_jobs(&self) -> anyhow::Result<Vec<MintJob>> {
        let jobs = sqlx::query_as::<_, MintJob>(
            r#"
            SELECT * FROM mint_jobs ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to get mint jobs")?;
        Ok(jobs)
    }

    pub async fn get_mint_job_items(&self, job_id: i64) -> anyhow::Result<Vec<MintJobItem>> {
        let items = sqlx::query_as::<_, MintJobItem>(
            r#"
            SELECT * FROM mint_job_items WHERE job_id = ? ORDER BY item_index
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .context(format!("Failed to get items for mint job {}", job_id))?;
        Ok(items)
    }

    pub async fn get_pending_mint_items(&self, limit: i64) -> anyhow::Result<Vec<MintJobItem>> {
        let items = sqlx::query_as::<_, MintJobItem>(
            r#"
            SELECT * FROM mint_job_items WHERE status = ? ORDER BY id LIMIT ?
            "#,
        )
        .bind(STATUS_PENDING)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to get pending mint items")?;
        Ok(items)
    }

    pub async fn update_mint_item(
        &self,
        item_id: i64,
        status: &str,
        nft_mint_address: Option<&str>,
        error_message: Option<String>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE mint_job_items
            SET status = ?,
                nft_mint_address = ?,
                error_message = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(nft_mint_address)
        .bind(error_message)
        .bind(item_id)
        .execute(&self.pool)
        .await
        .context(format!("Failed to update mint item {}", item_id))?;

        Ok(())
    }

    pub async fn mark_job_processing(&self, job_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE mint_jobs
            SET status = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(STATUS_PROCESSING)
        .bind(job_id)
        .bind(STATUS_PENDING)
        .execute(&self.pool)
        .await
        .context(format!("Failed to mark job {} processing", job_id))?;

        Ok(())
    }

    /// Recompute job-level counters from the item rows. Keeps the job
    /// row and its items reconciled after every item transition.
    pub async fn refresh_mint_job_counts(&self, job_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE mint_jobs
            SET completed_quantity = (
                    SELECT COUNT(*) FROM mint_job_items
                    WHERE job_id = mint_jobs.id AND status = 'completed'
                ),
                failed_quantity = (
                    SELECT COUNT(*) FROM mint_job_items
                    WHERE job_id = mint_jobs.id AND status = 'failed'
                ),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .context(format!("Failed to refresh counts for job {}", job_id))?;

        Ok(())
    }

    pub async fn update_mint_job_status(
        &self,
        job_id: i64,
        status: &str,
        error_message: Option<String>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE mint_jobs
            SET status = ?, error_message = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(error_message)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .context(format!("Failed to update status for job {}", job_id))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PAYMENT_TYPE_MINT_FEE, STATUS_COMPLETED, STATUS_FAILED, TARGET_NFT};

    fn sample_payment(signature: &str) -> Payment {
        Payment::new(
            signature.to_string(),
            "wallet-1".to_string(),
            PAYMENT_TYPE_MINT_FEE.to_string(),
            1_000_000_000,
            "treasury-1".to_string(),
            Some(1),
        )
    }

    #[tokio::test]
    async fn duplicate_payment_signature_is_detected() {
        let db = Database::open_in_memory().await.unwrap();

        let first = db.save_payment(&sample_payment("abc")).await.unwrap();
        assert!(matches!(first, PaymentInsert::Created(_)));

        let second = db.save_payment(&sample_payment("abc")).await.unwrap();
        assert!(matches!(second, PaymentInsert::DuplicateSignature));

        // A different signature still goes through.
        let third = db.save_payment(&sample_payment("def")).await.unwrap();
        assert!(matches!(third, PaymentInsert::Created(_)));
    }

    #[tokio::test]
    async fn like_insert_and_delete_are_idempotent() {
        let db = Database::open_in_memory().await.unwrap();

        assert!(db.insert_like("w1", TARGET_NFT, 7).await.unwrap());
        assert!(!db.insert_like("w1", TARGET_NFT, 7).await.unwrap());
        assert_eq!(db.count_likes(TARGET_NFT, 7).await.unwrap(), 1);

        // Same id under a different wallet is a separate relation.
        assert!(db.insert_like("w2", TARGET_NFT, 7).await.unwrap());
        assert_eq!(db.count_likes(TARGET_NFT, 7).await.unwrap(), 2);

        assert!(db.delete_like("w1", TARGET_NFT, 7).await.unwrap());
        assert!(!db.delete_like("w1", TARGET_NFT, 7).await.unwrap());
        assert_eq!(db.count_likes(TARGET_NFT, 7).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mint_job_counts_follow_item_transitions() {
        let db = Database::open_in_memory().await.unwrap();

        let job = MintJob::new(1, "wallet-1".to_string(), "sig".to_string(), 3);
        let job_id = db.create_mint_job(&job).await.unwrap();

        let items = db.get_mint_job_items(job_id).await.unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.status == STATUS_PENDING));

        db.update_mint_item(items[0].id, STATUS_COMPLETED, Some("mint-0"), None)
            .await
            .unwrap();
        db.update_mint_item(items[1].id, STATUS_FAILED, None, Some("boom".into()))
            .await
            .unwrap();
        db.refresh_mint_job_counts(job_id).await.unwrap();

        let job = db.get_mint_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.completed_quantity, 1);
        assert_eq!(job.failed_quantity, 1);
        assert!(!job.is_settled());
    }

    #[tokio::test]
    async fn collection_seed_is_idempotent_by_name() {
        let db = Database::open_in_memory().await.unwrap();

        let collection = Collection {
            id: 0,
            name: "Apes".to_string(),
            symbol: "APE".to_string(),
            treasury_wallet: "treasury".to_string(),
            creator_wallet: "creator".to_string(),
            mint_price_lamports: 500,
            base_uri: String::new(),
            created_at: None,
        };
        db.save_collection(&collection).await.unwrap();
        db.save_collection(&collection).await.unwrap();

        assert_eq!(db.get_collections().await.unwrap().len(), 1);
    }
}
