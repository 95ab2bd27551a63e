//! In-memory [`DocumentStore`] for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use civicmap_shared::{
    CivicMapError, Message, MessageId, MessageUpdate, NewMessage, PipelineStage, Result,
};
use tokio::sync::RwLock;

use crate::DocumentStore;

/// Volatile message store; contents are lost when dropped.
#[derive(Default)]
pub struct MemoryStore {
    messages: RwLock<HashMap<MessageId, Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, message: NewMessage) -> Result<MessageId> {
        let id = MessageId::new();
        let now = Utc::now();
        let record = Message {
            id: id.clone(),
            text: message.text,
            source: message.source,
            stage: PipelineStage::Stored,
            addresses: Vec::new(),
            extracted_data: None,
            geo_json: None,
            created_at: now,
            updated_at: now,
        };
        self.messages.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, id: &MessageId, update: MessageUpdate) -> Result<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| CivicMapError::persistence(format!("message {id} not found")))?;

        if let Some(stage) = update.stage {
            message.stage = stage;
        }
        if let Some(data) = update.extracted_data {
            message.extracted_data = Some(data);
        }
        if let Some(addresses) = update.addresses {
            message.addresses = addresses;
        }
        if let Some(geo_json) = update.geo_json {
            message.geo_json = Some(geo_json);
        }
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> Result<Option<Message>> {
        Ok(self.messages.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Message>> {
        let mut all: Vec<Message> = self.messages.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(all)
    }
}
