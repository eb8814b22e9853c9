//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they decode the request, call one engine API and encode
//! the result. Anything longer belongs in the engine.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every store and gateway call in here is `async` for that reason.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use market_engine::{
    db_types::{NewFeeTier, NewOrder, OrderId},
    order_objects::{OrderQueryFilter, StatusUpdateRequest},
    traits::{ConversationManagement, FeeTierManagement, MarketplaceDatabase, PaymentGateway, WalletManagement},
    CheckoutApi,
    ConversationApi,
    FeeApi,
    OrderFlowApi,
    WalletApi,
};
use serde_json::json;

use crate::{
    data_objects::{
        AdjustBalanceParams,
        CheckoutParams,
        CreditCheckoutParams,
        FeeQuoteParams,
        JsonResponse,
        OpenDisputeParams,
        OrderSearchParams,
        ResolveDisputeParams,
        WithdrawParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl MarketplaceDatabase);
/// Creates an order on behalf of its buyer. The platform fee is quoted and fixed at this point.
pub async fn create_order<B: MarketplaceDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST new order from {} for listing {}", order.buyer_id, order.listing_id);
    let actor = order.buyer_id.clone();
    let order = api.create_order(order, &actor).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(search_orders => Get "/orders" impl MarketplaceDatabase);
pub async fn search_orders<B: MarketplaceDatabase>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = OrderQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET orders search for [{query}]");
    let orders = api.search_orders(query).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl MarketplaceDatabase);
/// The order with its items, its event log and any disputes.
pub async fn order_by_id<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let result = api.fetch_order(order_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(update_order_status => Post "/orders/{order_id}/status" impl MarketplaceDatabase);
/// Moves an order to a new status.
///
/// If `expected_status` is supplied, the change is only applied if the order is still in that status. A `409` is
/// returned otherwise, and for moves out of a terminal status or moves the status machine forbids.
pub async fn update_order_status<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let StatusUpdateRequest { status, actor, expected_status, payload } = body.into_inner();
    debug!("💻️ POST status change for order {order_id} to {status} by {actor}");
    let order = api.transition(order_id, status, &actor, payload, expected_status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(open_dispute => Post "/orders/{order_id}/dispute" impl MarketplaceDatabase);
pub async fn open_dispute<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    body: web::Json<OpenDisputeParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let OpenDisputeParams { opened_by, reason } = body.into_inner();
    debug!("💻️ POST dispute for order {order_id} by {opened_by}");
    let (dispute, order) = api.open_dispute(order_id, &opened_by, &reason).await?;
    Ok(HttpResponse::Created().json(json!({ "dispute": dispute, "order": order })))
}

route!(order_checkout => Post "/orders/{order_id}/checkout" impl MarketplaceDatabase, PaymentGateway);
/// Starts (or restarts) a gateway checkout for the order. The response carries the URL to send the buyer to.
pub async fn order_checkout<B: MarketplaceDatabase, G: PaymentGateway>(
    path: web::Path<i64>,
    body: Option<web::Json<CheckoutParams>>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let CheckoutParams { payer_email, urls } = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ POST checkout for order {order_id}");
    let checkout = api.start_order_checkout(order_id, payer_email, urls).await?;
    Ok(HttpResponse::Ok().json(checkout))
}

//----------------------------------------------   Fees  ----------------------------------------------------
route!(fee_quote => Post "/fees/quote" impl FeeTierManagement);
/// The fee breakdown for a sale of `amount`, using the currently active tiers.
pub async fn fee_quote<B: FeeTierManagement>(
    body: web::Json<FeeQuoteParams>,
    api: web::Data<FeeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let amount = body.amount;
    trace!("💻️ POST fee quote for {amount}");
    let quote = api.quote(amount).await?;
    Ok(HttpResponse::Ok().json(quote))
}

route!(fee_tiers => Get "/fee_tiers" impl FeeTierManagement);
pub async fn fee_tiers<B: FeeTierManagement>(api: web::Data<FeeApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET fee tiers");
    let tiers = api.all_tiers().await?;
    Ok(HttpResponse::Ok().json(tiers))
}

route!(add_fee_tier => Post "/fee_tiers" impl FeeTierManagement);
pub async fn add_fee_tier<B: FeeTierManagement>(
    body: web::Json<NewFeeTier>,
    api: web::Data<FeeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let tier = body.into_inner();
    info!("💻️ POST new fee tier '{}' at {}%", tier.description, tier.fee_percentage);
    let tier = api.add_tier(tier).await?;
    Ok(HttpResponse::Created().json(tier))
}

route!(deactivate_fee_tier => Post "/fee_tiers/{tier_id}/deactivate" impl FeeTierManagement);
pub async fn deactivate_fee_tier<B: FeeTierManagement>(
    path: web::Path<i64>,
    api: web::Data<FeeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let tier_id = path.into_inner();
    info!("💻️ POST deactivate fee tier {tier_id}");
    let tier = api.deactivate_tier(tier_id).await?;
    Ok(HttpResponse::Ok().json(tier))
}

//----------------------------------------------   Wallets  ----------------------------------------------------
route!(wallet => Get "/wallets/{user_id}" impl WalletManagement);
pub async fn wallet<B: WalletManagement>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET wallet for {user_id}");
    let wallet = api.wallet_for_user(&user_id).await?;
    Ok(HttpResponse::Ok().json(wallet))
}

route!(wallet_transactions => Get "/wallets/{user_id}/transactions" impl WalletManagement);
pub async fn wallet_transactions<B: WalletManagement>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET wallet transactions for {user_id}");
    let transactions = api.transactions_for_user(&user_id).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

route!(adjust_balance => Post "/wallets/{user_id}/adjust" impl WalletManagement);
/// Posts a signed `ADJUSTMENT` to the user's wallet, creating the wallet if necessary.
pub async fn adjust_balance<B: WalletManagement>(
    path: web::Path<String>,
    body: web::Json<AdjustBalanceParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let AdjustBalanceParams { amount, reason, actor } = body.into_inner();
    info!("💻️ POST balance adjustment of {amount} for {user_id} by {actor}");
    let tx = api.adjust_balance(&user_id, amount, &reason, &actor).await?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(withdraw => Post "/wallets/{user_id}/withdraw" impl WalletManagement);
/// Records a payout of `amount` from the user's wallet. The payout reference makes the call safe to retry.
pub async fn withdraw<B: WalletManagement>(
    path: web::Path<String>,
    body: web::Json<WithdrawParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let WithdrawParams { amount, payout_reference } = body.into_inner();
    info!("💻️ POST withdrawal of {amount} for {user_id} ({payout_reference})");
    let tx = api.withdraw(&user_id, amount, &payout_reference).await?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(wallet_audit => Get "/wallets/{user_id}/audit" impl WalletManagement);
/// Replays the wallet's ledger and checks it against the stored balance. A mismatch is reported as a `500`.
pub async fn wallet_audit<B: WalletManagement>(
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET wallet audit for {user_id}");
    let audit = api.audit_wallet(&user_id).await?;
    Ok(HttpResponse::Ok().json(audit))
}

//----------------------------------------------   Credits  ----------------------------------------------------
route!(credit_packages => Get "/credits/packages" impl MarketplaceDatabase, PaymentGateway);
pub async fn credit_packages<B: MarketplaceDatabase, G: PaymentGateway>(
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET credit packages");
    let packages = api.credit_packages().await?;
    Ok(HttpResponse::Ok().json(packages))
}

route!(credit_checkout => Post "/credits/checkout" impl MarketplaceDatabase, PaymentGateway);
/// Starts the purchase of a credit package. Credits land in the wallet once the payment webhook confirms it.
pub async fn credit_checkout<B: MarketplaceDatabase, G: PaymentGateway>(
    body: web::Json<CreditCheckoutParams>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let CreditCheckoutParams { user_id, package_id, payer_email, urls } = body.into_inner();
    debug!("💻️ POST credit checkout of package {package_id} for {user_id}");
    let checkout = api.start_credit_purchase(&user_id, package_id, payer_email, urls).await?;
    Ok(HttpResponse::Ok().json(checkout))
}

//----------------------------------------------   Conversations  ----------------------------------------------
route!(conversation_kind => Get "/conversations/{conversation_id}/kind" impl ConversationManagement);
/// Tells an uploader whether the conversation is a direct chat or an order chat.
pub async fn conversation_kind<B: ConversationManagement>(
    path: web::Path<String>,
    api: web::Data<ConversationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let conversation_id = path.into_inner();
    trace!("💻️ GET conversation kind for {conversation_id}");
    let kind = api.conversation_kind(&conversation_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "conversation_id": conversation_id, "kind": kind })))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(delete_order => Delete "/orders/{order_id}" impl MarketplaceDatabase);
/// Removes an order with its items, events and disputes.
pub async fn delete_order<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    warn!("💻️ DELETE order {order_id}");
    let deleted = api.delete_order(order_id).await?;
    Ok(HttpResponse::Ok().json(deleted))
}

route!(resolve_dispute => Post "/disputes/{dispute_id}/resolve" impl MarketplaceDatabase);
pub async fn resolve_dispute<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    body: web::Json<ResolveDisputeParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let dispute_id = path.into_inner();
    let ResolveDisputeParams { resolution, outcome, actor } = body.into_inner();
    info!("💻️ POST resolve dispute {dispute_id} as {outcome} by {actor}");
    let (dispute, order) = api.resolve_dispute(dispute_id, &resolution, outcome, &actor).await?;
    Ok(HttpResponse::Ok().json(json!({ "dispute": dispute, "order": order })))
}

//----------------------------------------------   Fallback  ----------------------------------------------------
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(JsonResponse::failure("No such route."))
}
