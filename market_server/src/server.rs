use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use market_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CheckoutApi,
    ConversationApi,
    FeeApi,
    OrderFlowApi,
    PaymentReconciler,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::mercadopago::MercadoPagoGateway,
    middleware::{ApiKeyMiddlewareFactory, SignatureMiddlewareFactory, ADMIN_KEY_HEADER, API_KEY_HEADER},
    routes::{
        health,
        not_found,
        AddFeeTierRoute,
        AdjustBalanceRoute,
        ConversationKindRoute,
        CreateOrderRoute,
        CreditCheckoutRoute,
        CreditPackagesRoute,
        DeactivateFeeTierRoute,
        DeleteOrderRoute,
        FeeQuoteRoute,
        FeeTiersRoute,
        OpenDisputeRoute,
        OrderByIdRoute,
        OrderCheckoutRoute,
        ResolveDisputeRoute,
        SearchOrdersRoute,
        UpdateOrderStatusRoute,
        WalletAuditRoute,
        WalletRoute,
        WalletTransactionsRoute,
        WithdrawRoute,
    },
    webhook_routes::MercadopagoWebhookRoute,
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = MercadoPagoGateway::new(config.mercadopago.api.clone())?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: MercadoPagoGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), config.order_flow_config(), producers.clone());
        let checkout_api = CheckoutApi::new(orders_api.clone(), gateway.clone())
            .with_default_urls(config.default_checkout_urls());
        let reconciler = PaymentReconciler::new(orders_api.clone(), gateway.clone())
            .with_timeout(config.mercadopago.api.timeout);
        let fee_api = FeeApi::new(db.clone(), config.fee_config.clone());
        let wallet_api = WalletApi::new(db.clone());
        let conversation_api = ConversationApi::new(db.clone());
        let admin_scope = web::scope("/api/admin")
            .wrap(ApiKeyMiddlewareFactory::new(ADMIN_KEY_HEADER, config.admin_api_key.clone()))
            .service(DeleteOrderRoute::<SqliteDatabase>::new())
            .service(ResolveDisputeRoute::<SqliteDatabase>::new())
            .service(AdjustBalanceRoute::<SqliteDatabase>::new())
            .service(WithdrawRoute::<SqliteDatabase>::new())
            .service(WalletAuditRoute::<SqliteDatabase>::new())
            .service(FeeTiersRoute::<SqliteDatabase>::new())
            .service(AddFeeTierRoute::<SqliteDatabase>::new())
            .service(DeactivateFeeTierRoute::<SqliteDatabase>::new());
        let api_scope = web::scope("/api")
            .wrap(ApiKeyMiddlewareFactory::new(API_KEY_HEADER, config.api_key.clone()))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(OpenDisputeRoute::<SqliteDatabase>::new())
            .service(OrderCheckoutRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(FeeQuoteRoute::<SqliteDatabase>::new())
            .service(WalletRoute::<SqliteDatabase>::new())
            .service(WalletTransactionsRoute::<SqliteDatabase>::new())
            .service(CreditPackagesRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(CreditCheckoutRoute::<SqliteDatabase, MercadoPagoGateway>::new())
            .service(ConversationKindRoute::<SqliteDatabase>::new());
        let webhook_scope = web::scope("/webhooks")
            .wrap(SignatureMiddlewareFactory::new(
                config.mercadopago.webhook_secret.clone(),
                config.mercadopago.signature_checks,
            ))
            .service(MercadopagoWebhookRoute::<SqliteDatabase, MercadoPagoGateway>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(reconciler))
            .app_data(web::Data::new(fee_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(conversation_api))
            .service(health)
            // The admin scope must be registered before /api, which would otherwise swallow its paths
            .service(admin_scope)
            .service(api_scope)
            .service(webhook_scope)
            .default_service(web::to(not_found))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Subscribers that record every engine event in the log.
pub fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} created by {} for {}", ev.order.id, ev.order.buyer_id, ev.order.total_amount);
            })
        })
        .on_status_changed(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} moved from {} to {} by {}", ev.order.id, ev.old_status, ev.new_status(), ev.actor);
            })
        })
        .on_credits_purchased(|ev| {
            Box::pin(async move {
                info!("📬️ {} received {} credits from purchase {}", ev.purchase.user_id, ev.total_credited, ev.purchase.id);
            })
        });
    hooks
}
