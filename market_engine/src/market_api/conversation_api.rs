use log::*;

use crate::{
    db_types::{ConversationKind, OrderId},
    traits::{ConversationManagement, MarketplaceError},
};

#[derive(Debug, Clone)]
pub struct ConversationApi<B> {
    db: B,
}

impl<B> ConversationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ConversationApi<B>
where B: ConversationManagement
{
    /// Finds out whether an attachment for `conversation_id` belongs under direct or order conversations.
    pub async fn conversation_kind(&self, conversation_id: &str) -> Result<ConversationKind, MarketplaceError> {
        if conversation_id.trim().is_empty() {
            return Err(MarketplaceError::ValidationError("A conversation id is required".to_string()));
        }
        let kind = self
            .db
            .conversation_kind(conversation_id)
            .await?
            .ok_or_else(|| MarketplaceError::ConversationNotFound(conversation_id.to_string()))?;
        trace!("🗃️ Conversation {conversation_id} is a {kind:?} conversation");
        Ok(kind)
    }

    pub async fn register_direct(&self, conversation_id: &str) -> Result<(), MarketplaceError> {
        self.db.insert_direct_conversation(conversation_id).await
    }

    pub async fn register_for_order(&self, conversation_id: &str, order_id: OrderId) -> Result<(), MarketplaceError> {
        self.db.insert_order_conversation(conversation_id, order_id).await
    }
}
