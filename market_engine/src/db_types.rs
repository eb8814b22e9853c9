use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use market_common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<i64>()
            .map(Self)
            .map_err(|e| ConversionError(format!("'{s}' is not a valid order id. {e}")))
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The canonical order states.
///
/// Legacy and alternative spellings are accepted when parsing (see [`OrderStatusType::from_str`]), but only the
/// canonical snake_case names are ever written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum OrderStatusType {
    /// The order has been created. No payment has been attempted yet.
    Pending,
    /// A checkout has been started with the payment gateway.
    PaymentPending,
    /// The gateway has confirmed the payment.
    Paid,
    Processing,
    AwaitingSeller,
    SellerAccepted,
    InDelivery,
    DeliverySubmitted,
    InReview,
    /// The buyer accepted delivery and the seller has been paid out.
    Completed,
    Cancelled,
    Refunded,
    /// A party has opened a dispute against the order.
    Dispute,
    /// The payment failed. The buyer may retry.
    Failed,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 14] = [
        Self::Pending,
        Self::PaymentPending,
        Self::Paid,
        Self::Processing,
        Self::AwaitingSeller,
        Self::SellerAccepted,
        Self::InDelivery,
        Self::DeliverySubmitted,
        Self::InReview,
        Self::Completed,
        Self::Cancelled,
        Self::Refunded,
        Self::Dispute,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaymentPending => "payment_pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::AwaitingSeller => "awaiting_seller",
            Self::SellerAccepted => "seller_accepted",
            Self::InDelivery => "in_delivery",
            Self::DeliverySubmitted => "delivery_submitted",
            Self::InReview => "in_review",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Dispute => "dispute",
            Self::Failed => "failed",
        }
    }

    /// No transition ever leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }

    /// States in which the buyer has not paid yet.
    pub fn is_awaiting_payment(&self) -> bool {
        matches!(self, Self::Pending | Self::PaymentPending)
    }

    /// States an order passes through between payment and completion.
    pub fn is_fulfilment(&self) -> bool {
        matches!(
            self,
            Self::Paid
                | Self::Processing
                | Self::AwaitingSeller
                | Self::SellerAccepted
                | Self::InDelivery
                | Self::DeliverySubmitted
                | Self::InReview
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    /// Case-insensitive. Legacy aliases map onto their canonical state.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let status = match normalized.as_str() {
            "pending" => Self::Pending,
            "payment_pending" | "awaiting_payment" => Self::PaymentPending,
            "paid" | "payment_confirmed" | "confirmed" => Self::Paid,
            "processing" => Self::Processing,
            "awaiting_seller" => Self::AwaitingSeller,
            "seller_accepted" | "accepted" => Self::SellerAccepted,
            "in_delivery" | "shipped" => Self::InDelivery,
            "delivery_submitted" | "delivered" => Self::DeliverySubmitted,
            "in_review" => Self::InReview,
            "completed" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            "dispute" | "disputed" | "in_dispute" => Self::Dispute,
            "failed" => Self::Failed,
            _ => return Err(ConversionError(format!("Invalid order status: {s}"))),
        };
        Ok(status)
    }
}

impl TryFrom<String> for OrderStatusType {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: String,
    pub seller_id: Option<String>,
    pub listing_id: String,
    pub total_amount: Money,
    pub platform_fee: Money,
    pub status: OrderStatusType,
    pub payment_id: Option<String>,
    pub preference_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub paid_out_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn seller_receives(&self) -> Money {
        self.total_amount - self.platform_fee
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub buyer_id: String,
    #[serde(default)]
    pub seller_id: Option<String>,
    pub listing_id: String,
    pub total_amount: Money,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(buyer_id: S, listing_id: S, total_amount: Money) -> Self {
        Self { buyer_id: buyer_id.into(), seller_id: None, listing_id: listing_id.into(), total_amount, items: vec![] }
    }

    pub fn with_seller<S: Into<String>>(mut self, seller_id: S) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub listing_id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub listing_id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(listing_id: S, title: S, quantity: i64, unit_price: Money) -> Self {
        Self { listing_id: listing_id.into(), title: title.into(), quantity, unit_price }
    }
}

//--------------------------------------      OrderEvent       ---------------------------------------------------------
pub const EVENT_ORDER_CREATED: &str = "order_created";
pub const EVENT_STATUS_CHANGED: &str = "status_changed";
pub const EVENT_DISPUTE_OPENED: &str = "dispute_opened";
pub const EVENT_DISPUTE_RESOLVED: &str = "dispute_resolved";

/// An immutable entry in an order's audit trail.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub event_type: String,
    pub payload: Json<Value>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Dispute         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Open,
    InReview,
    Resolved,
}

impl Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::InReview => write!(f, "IN_REVIEW"),
            Self::Resolved => write!(f, "RESOLVED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Dispute {
    pub id: i64,
    pub order_id: OrderId,
    pub opened_by: String,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewDispute {
    pub order_id: OrderId,
    pub opened_by: String,
    pub reason: String,
}

//--------------------------------------        Wallet         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: String,
    pub balance: Money,
    pub total_deposited: Money,
    pub total_earned: Money,
    pub total_spent: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDirection {
    Credit,
    Debit,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionType {
    Deposit,
    Withdrawal,
    SaleCredit,
    PurchaseDebit,
    RefundCredit,
    RefundDebit,
    BonusCredit,
    Adjustment,
    PlatformFee,
}

impl WalletTransactionType {
    pub fn direction(&self) -> EntryDirection {
        use WalletTransactionType::*;
        match self {
            Deposit | SaleCredit | RefundCredit | BonusCredit | PlatformFee => EntryDirection::Credit,
            Withdrawal | PurchaseDebit | RefundDebit => EntryDirection::Debit,
            Adjustment => EntryDirection::Either,
        }
    }

    /// The wallet aggregate column (besides `balance`) that entries of this type accumulate into.
    pub fn aggregate_column(&self) -> Option<&'static str> {
        use WalletTransactionType::*;
        match self {
            Deposit | BonusCredit => Some("total_deposited"),
            SaleCredit | PlatformFee => Some("total_earned"),
            PurchaseDebit | Withdrawal => Some("total_spent"),
            RefundCredit | RefundDebit | Adjustment => None,
        }
    }
}

impl Display for WalletTransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use WalletTransactionType::*;
        let s = match self {
            Deposit => "DEPOSIT",
            Withdrawal => "WITHDRAWAL",
            SaleCredit => "SALE_CREDIT",
            PurchaseDebit => "PURCHASE_DEBIT",
            RefundCredit => "REFUND_CREDIT",
            RefundDebit => "REFUND_DEBIT",
            BonusCredit => "BONUS_CREDIT",
            Adjustment => "ADJUSTMENT",
            PlatformFee => "PLATFORM_FEE",
        };
        f.write_str(s)
    }
}

pub const REF_ORDER: &str = "order";
pub const REF_CREDIT_PURCHASE: &str = "credit_purchase";
pub const REF_ADMIN: &str = "admin";
pub const REF_WITHDRAWAL: &str = "withdrawal";

/// An immutable ledger row. `balance_after` is the wallet balance immediately after this entry was applied.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub wallet_id: i64,
    pub transaction_type: WalletTransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A request to post one signed amount against one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub wallet_id: i64,
    pub transaction_type: WalletTransactionType,
    pub amount: Money,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub description: Option<String>,
}

impl LedgerEntry {
    pub fn new(wallet_id: i64, transaction_type: WalletTransactionType, amount: Money) -> Self {
        Self { wallet_id, transaction_type, amount, reference_type: None, reference_id: None, description: None }
    }

    pub fn with_reference<S: Display>(mut self, reference_type: &str, reference_id: S) -> Self {
        self.reference_type = Some(reference_type.to_string());
        self.reference_id = Some(reference_id.to_string());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks that the sign of the amount agrees with the transaction type.
    pub fn validate(&self) -> Result<(), ConversionError> {
        let ok = match self.transaction_type.direction() {
            EntryDirection::Credit => self.amount.is_positive(),
            EntryDirection::Debit => self.amount.is_negative(),
            EntryDirection::Either => !self.amount.is_zero(),
        };
        if ok {
            Ok(())
        } else {
            Err(ConversionError(format!(
                "A {} entry cannot have an amount of {}",
                self.transaction_type, self.amount
            )))
        }
    }
}

/// A ledger posting addressed to a user rather than a wallet id. The wallet is created on demand when the posting is
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletPosting {
    pub user_id: String,
    pub transaction_type: WalletTransactionType,
    pub amount: Money,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub description: Option<String>,
}

impl WalletPosting {
    pub fn new<S: Into<String>>(user_id: S, transaction_type: WalletTransactionType, amount: Money) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_type,
            amount,
            reference_type: None,
            reference_id: None,
            description: None,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.reference_type = Some(REF_ORDER.to_string());
        self.reference_id = Some(order_id.value().to_string());
        self
    }

    pub fn with_reference<S: Display>(mut self, reference_type: &str, reference_id: S) -> Self {
        self.reference_type = Some(reference_type.to_string());
        self.reference_id = Some(reference_id.to_string());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn into_entry(self, wallet_id: i64) -> LedgerEntry {
        LedgerEntry {
            wallet_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            description: self.description,
        }
    }
}

//--------------------------------------    Credit purchases   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CreditPackage {
    pub id: i64,
    pub name: String,
    pub credits: Money,
    pub bonus_credits: Money,
    pub price: Money,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditPurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for CreditPurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CreditPurchase {
    pub id: i64,
    pub user_id: String,
    pub package_id: Option<i64>,
    pub credits: Money,
    pub bonus_credits: Money,
    pub price: Money,
    pub status: CreditPurchaseStatus,
    pub preference_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCreditPurchase {
    pub user_id: String,
    pub package_id: Option<i64>,
    pub credits: Money,
    pub bonus_credits: Money,
    pub price: Money,
}

impl NewCreditPurchase {
    pub fn for_package<S: Into<String>>(user_id: S, package: &CreditPackage) -> Self {
        Self {
            user_id: user_id.into(),
            package_id: Some(package.id),
            credits: package.credits,
            bonus_credits: package.bonus_credits,
            price: package.price,
        }
    }
}

//--------------------------------------       Fee tiers       ---------------------------------------------------------
/// A band of transaction amounts with its total (platform + processor) fee percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub id: i64,
    pub min_value: Money,
    pub max_value: Option<Money>,
    pub fee_percentage: Decimal,
    pub description: String,
    pub active: bool,
}

impl FeeTier {
    pub fn contains(&self, amount: Money) -> bool {
        self.min_value <= amount && self.max_value.map(|max| amount <= max).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeeTier {
    pub min_value: Money,
    #[serde(default)]
    pub max_value: Option<Money>,
    pub fee_percentage: Decimal,
    pub description: String,
}

//--------------------------------------     Conversations     ---------------------------------------------------------
/// Chat uploads can target either a direct conversation or an order conversation. They live in different tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Order,
}
