//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use sqlx::{migrate::Migrator, SqliteConnection, SqlitePool};

use super::db::{
    conversations,
    credit_purchases,
    db_url,
    disputes,
    fee_tiers,
    new_pool,
    order_events,
    orders,
    wallets,
};
use crate::{
    db_types::{
        ConversationKind,
        CreditPackage,
        CreditPurchase,
        Dispute,
        FeeTier,
        LedgerEntry,
        Money,
        NewCreditPurchase,
        NewDispute,
        NewFeeTier,
        NewOrder,
        Order,
        OrderEvent,
        OrderId,
        OrderItem,
        Wallet,
        WalletPosting,
        WalletTransaction,
        WalletTransactionType,
        EVENT_DISPUTE_OPENED,
        EVENT_DISPUTE_RESOLVED,
        EVENT_ORDER_CREATED,
        EVENT_STATUS_CHANGED,
        REF_CREDIT_PURCHASE,
    },
    order_objects::{DeletedOrder, OrderQueryFilter, StatusChange},
    traits::{
        ConversationManagement,
        CreditPurchaseManagement,
        FeeTierManagement,
        MarketplaceDatabase,
        MarketplaceError,
        OrderManagement,
        WalletManagement,
    },
};

static MIGRATOR: Migrator = sqlx::migrate!("./src/sqlite/migrations");

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `MKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        MIGRATOR.run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// The guts of a status change. Must be called inside a transaction, since a conflict leaves earlier writes behind
/// for the caller to roll back.
async fn status_change_in_tx(change: StatusChange, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    let order = orders::update_order_status(&change, &mut *conn)
        .await?
        .ok_or(MarketplaceError::TransitionConflict(change.order_id, change.from))?;
    trace!("🗃️ Order {} moved from {} to {}", order.id, change.from, change.to);
    order_events::insert_event(order.id, EVENT_STATUS_CHANGED, change.event_payload, &change.actor, &mut *conn).await?;
    for posting in change.postings {
        let wallet = wallets::fetch_or_create_wallet(&posting.user_id, &mut *conn).await?;
        wallets::apply_ledger_entry(posting.into_entry(wallet.id), &mut *conn).await?;
    }
    Ok(order)
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder, platform_fee: Money, actor: &str) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::insert_order(&order, platform_fee, &mut tx).await?;
        for item in &order.items {
            orders::insert_order_item(result.id, item, &mut tx).await?;
        }
        let payload = serde_json::json!({
            "status": result.status,
            "total_amount": result.total_amount,
            "platform_fee": result.platform_fee,
            "items": order.items.len(),
        });
        order_events::insert_event(result.id, EVENT_ORDER_CREATED, payload, actor, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_order_events(&self, order_id: OrderId) -> Result<Vec<OrderEvent>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let events = order_events::fetch_events(order_id, &mut conn).await?;
        Ok(events)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn apply_status_change(&self, change: StatusChange) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = status_change_in_tx(change, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_order_preference(&self, order_id: OrderId, preference_id: &str) -> Result<Order, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::set_preference_id(order_id, preference_id, &mut conn)
            .await?
            .ok_or(MarketplaceError::OrderNotFound(order_id))
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<DeletedOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let events = order_events::delete_events(order_id, &mut tx).await?;
        let items = orders::delete_order_items(order_id, &mut tx).await?;
        let disputes = disputes::delete_disputes(order_id, &mut tx).await?;
        if !orders::delete_order(order_id, &mut tx).await? {
            // Dropping the transaction rolls back the dependent deletes
            return Err(MarketplaceError::OrderNotFound(order_id));
        }
        tx.commit().await?;
        info!("🗃️ Order {order_id} deleted along with {events} events, {items} items and {disputes} disputes");
        Ok(DeletedOrder { order_id, events, items, disputes })
    }

    async fn fetch_dispute(&self, dispute_id: i64) -> Result<Option<Dispute>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let dispute = disputes::fetch_dispute(dispute_id, &mut conn).await?;
        Ok(dispute)
    }

    async fn fetch_disputes_for_order(&self, order_id: OrderId) -> Result<Vec<Dispute>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let disputes = disputes::fetch_disputes_for_order(order_id, &mut conn).await?;
        Ok(disputes)
    }

    async fn open_dispute(
        &self,
        dispute: NewDispute,
        change: StatusChange,
    ) -> Result<(Dispute, Order), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let dispute = disputes::insert_dispute(&dispute, &mut tx).await?;
        let payload = serde_json::json!({ "dispute_id": dispute.id, "reason": dispute.reason });
        order_events::insert_event(dispute.order_id, EVENT_DISPUTE_OPENED, payload, &dispute.opened_by, &mut tx)
            .await?;
        let order = status_change_in_tx(change, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Dispute {} opened against order {}", dispute.id, order.id);
        Ok((dispute, order))
    }

    async fn resolve_dispute(
        &self,
        dispute_id: i64,
        resolution: &str,
        change: StatusChange,
    ) -> Result<(Dispute, Order), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let dispute = disputes::resolve_dispute(dispute_id, resolution, &mut tx)
            .await?
            .ok_or(MarketplaceError::DisputeAlreadyResolved(dispute_id))?;
        let payload = serde_json::json!({ "dispute_id": dispute.id, "resolution": resolution, "outcome": change.to });
        let actor = change.actor.clone();
        order_events::insert_event(dispute.order_id, EVENT_DISPUTE_RESOLVED, payload, &actor, &mut tx).await?;
        let order = status_change_in_tx(change, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Dispute {} resolved. Order {} is now {}", dispute.id, order.id, order.status);
        Ok((dispute, order))
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_wallet_for_user(&self, user_id: &str) -> Result<Option<Wallet>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet_for_user(user_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet(wallet_id, &mut conn).await?;
        Ok(wallet)
    }

    async fn fetch_or_create_wallet(&self, user_id: &str) -> Result<Wallet, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_or_create_wallet(user_id, &mut conn).await
    }

    async fn apply_ledger_entry(&self, entry: LedgerEntry) -> Result<WalletTransaction, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let result = wallets::apply_ledger_entry(entry, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn post_to_user(&self, posting: WalletPosting) -> Result<WalletTransaction, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::fetch_or_create_wallet(&posting.user_id, &mut tx).await?;
        let result = wallets::apply_ledger_entry(posting.into_entry(wallet.id), &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_wallet_transactions(&self, wallet_id: i64) -> Result<Vec<WalletTransaction>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let txs = wallets::fetch_transactions(wallet_id, &mut conn).await?;
        Ok(txs)
    }
}

impl CreditPurchaseManagement for SqliteDatabase {
    async fn fetch_credit_packages(&self) -> Result<Vec<CreditPackage>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let packages = credit_purchases::fetch_active_packages(&mut conn).await?;
        Ok(packages)
    }

    async fn fetch_credit_package(&self, package_id: i64) -> Result<Option<CreditPackage>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let package = credit_purchases::fetch_package(package_id, &mut conn).await?;
        Ok(package)
    }

    async fn insert_credit_purchase(&self, purchase: NewCreditPurchase) -> Result<CreditPurchase, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let purchase = credit_purchases::insert_purchase(purchase, &mut conn).await?;
        debug!("🗃️ Credit purchase {} created for {}", purchase.id, purchase.user_id);
        Ok(purchase)
    }

    async fn fetch_credit_purchase(&self, purchase_id: i64) -> Result<Option<CreditPurchase>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let purchase = credit_purchases::fetch_purchase(purchase_id, &mut conn).await?;
        Ok(purchase)
    }

    async fn set_credit_purchase_preference(
        &self,
        purchase_id: i64,
        preference_id: &str,
    ) -> Result<CreditPurchase, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        credit_purchases::set_preference_id(purchase_id, preference_id, &mut conn)
            .await?
            .ok_or(MarketplaceError::CreditPurchaseNotFound(purchase_id))
    }

    async fn complete_credit_purchase(
        &self,
        purchase_id: i64,
        payment_id: &str,
    ) -> Result<Option<(CreditPurchase, Vec<WalletTransaction>)>, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let purchase = match credit_purchases::mark_completed(purchase_id, payment_id, &mut tx).await? {
            Some(p) => p,
            None => {
                trace!("🗃️ Credit purchase {purchase_id} is not pending. Nothing to complete.");
                return Ok(None);
            },
        };
        let wallet = wallets::fetch_or_create_wallet(&purchase.user_id, &mut tx).await?;
        let mut entries = vec![LedgerEntry::new(wallet.id, WalletTransactionType::Deposit, purchase.credits)
            .with_reference(REF_CREDIT_PURCHASE, purchase.id)
            .with_description(format!("Credit purchase {}", purchase.id))];
        if purchase.bonus_credits.is_positive() {
            entries.push(
                LedgerEntry::new(wallet.id, WalletTransactionType::BonusCredit, purchase.bonus_credits)
                    .with_reference(REF_CREDIT_PURCHASE, purchase.id)
                    .with_description(format!("Bonus credits for purchase {}", purchase.id)),
            );
        }
        let mut txs = Vec::with_capacity(entries.len());
        for entry in entries {
            txs.push(wallets::apply_ledger_entry(entry, &mut tx).await?);
        }
        tx.commit().await?;
        debug!("🗃️ Credit purchase {purchase_id} completed. {} credits posted to {}", purchase.credits, purchase.user_id);
        Ok(Some((purchase, txs)))
    }

    async fn fail_credit_purchase(
        &self,
        purchase_id: i64,
        payment_id: &str,
    ) -> Result<Option<CreditPurchase>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let purchase = credit_purchases::mark_failed(purchase_id, payment_id, &mut conn).await?;
        Ok(purchase)
    }
}

impl FeeTierManagement for SqliteDatabase {
    async fn fetch_active_fee_tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let tiers = fee_tiers::fetch_active_tiers(&mut conn).await?;
        Ok(tiers)
    }

    async fn fetch_all_fee_tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let tiers = fee_tiers::fetch_all_tiers(&mut conn).await?;
        Ok(tiers)
    }

    async fn insert_fee_tier(&self, tier: NewFeeTier) -> Result<FeeTier, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let tier = fee_tiers::insert_tier(tier, &mut conn).await?;
        info!("🗃️ Fee tier {} ({}%) added", tier.id, tier.fee_percentage);
        Ok(tier)
    }

    async fn set_fee_tier_active(&self, tier_id: i64, active: bool) -> Result<Option<FeeTier>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let tier = fee_tiers::set_active(tier_id, active, &mut conn).await?;
        Ok(tier)
    }
}

impl ConversationManagement for SqliteDatabase {
    async fn conversation_kind(&self, conversation_id: &str) -> Result<Option<ConversationKind>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let kind = conversations::conversation_kind(conversation_id, &mut conn).await?;
        Ok(kind)
    }

    async fn insert_direct_conversation(&self, conversation_id: &str) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        conversations::insert_direct_conversation(conversation_id, &mut conn).await?;
        Ok(())
    }

    async fn insert_order_conversation(&self, conversation_id: &str, order_id: OrderId) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        conversations::insert_order_conversation(conversation_id, order_id, &mut conn).await?;
        Ok(())
    }
}
