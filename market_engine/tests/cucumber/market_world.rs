use cucumber::World;
use log::*;
use market_engine::{
    db_types::OrderId,
    events::EventProducers,
    test_utils::{prepare_env::prepare_test_env, StubGateway},
    CheckoutApi,
    OrderFlowApi,
    OrderFlowConfig,
    PaymentReconciler,
    SqliteDatabase,
    WalletApi,
};

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<MarketSystem>,
    /// The order most recently created, so that steps can refer to "the order"
    pub current_order: Option<OrderId>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct MarketSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: StubGateway,
    pub flow: OrderFlowApi<SqliteDatabase>,
    pub checkout: CheckoutApi<SqliteDatabase, StubGateway>,
    pub reconciler: PaymentReconciler<SqliteDatabase, StubGateway>,
    pub wallets: WalletApi<SqliteDatabase>,
}

impl MarketWorld {
    pub fn system(&self) -> &MarketSystem {
        self.system.as_ref().expect("Market system not initialised")
    }

    pub fn order_id(&self) -> OrderId {
        self.current_order.expect("No order has been created yet")
    }
}

impl MarketSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {url}");
        let gateway = StubGateway::default();
        let flow = OrderFlowApi::new(db.clone(), OrderFlowConfig::default(), EventProducers::default());
        let checkout = CheckoutApi::new(flow.clone(), gateway.clone());
        let reconciler = PaymentReconciler::new(flow.clone(), gateway.clone());
        let wallets = WalletApi::new(db.clone());
        Self { db_path: url, db, gateway, flow, checkout, reconciler, wallets }
    }
}
