use market_engine::{
    db_types::{ConversationKind, FeeTier, LedgerEntry, NewFeeTier, OrderId, Wallet, WalletPosting, WalletTransaction},
    traits::{
        CheckoutRequest,
        CheckoutSession,
        ConversationManagement,
        FeeTierManagement,
        GatewayError,
        GatewayPayment,
        PaymentGateway,
        WalletManagement,
    },
    MarketplaceError,
};
use mockall::mock;

mock! {
    pub WalletStore {}
    impl WalletManagement for WalletStore {
        async fn fetch_wallet_for_user(&self, user_id: &str) -> Result<Option<Wallet>, MarketplaceError>;
        async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, MarketplaceError>;
        async fn fetch_or_create_wallet(&self, user_id: &str) -> Result<Wallet, MarketplaceError>;
        async fn apply_ledger_entry(&self, entry: LedgerEntry) -> Result<WalletTransaction, MarketplaceError>;
        async fn post_to_user(&self, posting: WalletPosting) -> Result<WalletTransaction, MarketplaceError>;
        async fn fetch_wallet_transactions(&self, wallet_id: i64) -> Result<Vec<WalletTransaction>, MarketplaceError>;
    }
}

mock! {
    pub FeeTierStore {}
    impl FeeTierManagement for FeeTierStore {
        async fn fetch_active_fee_tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError>;
        async fn fetch_all_fee_tiers(&self) -> Result<Vec<FeeTier>, MarketplaceError>;
        async fn insert_fee_tier(&self, tier: NewFeeTier) -> Result<FeeTier, MarketplaceError>;
        async fn set_fee_tier_active(&self, tier_id: i64, active: bool) -> Result<Option<FeeTier>, MarketplaceError>;
    }
}

mock! {
    pub ConversationStore {}
    impl ConversationManagement for ConversationStore {
        async fn conversation_kind(&self, conversation_id: &str) -> Result<Option<ConversationKind>, MarketplaceError>;
        async fn insert_direct_conversation(&self, conversation_id: &str) -> Result<(), MarketplaceError>;
        async fn insert_order_conversation(&self, conversation_id: &str, order_id: OrderId) -> Result<(), MarketplaceError>;
    }
}

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
        async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
    }
}
