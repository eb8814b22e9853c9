use crate::{
    db_types::{ConversationKind, OrderId},
    traits::MarketplaceError,
};

/// Chat attachments are stored per conversation. Direct conversations and order conversations live in different
/// tables, so an upload handler has to find out which kind of conversation an id refers to.
#[allow(async_fn_in_trait)]
pub trait ConversationManagement {
    /// Returns which table holds the conversation, or `None` if neither does.
    async fn conversation_kind(&self, conversation_id: &str) -> Result<Option<ConversationKind>, MarketplaceError>;

    async fn insert_direct_conversation(&self, conversation_id: &str) -> Result<(), MarketplaceError>;

    async fn insert_order_conversation(&self, conversation_id: &str, order_id: OrderId) -> Result<(), MarketplaceError>;
}
