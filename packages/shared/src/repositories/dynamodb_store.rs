use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{
    AttributeValue, ConditionCheck, Delete, DeleteRequest, Put, TransactWriteItem, Update,
    WriteRequest,
};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_dynamo::{from_item, from_items, to_attribute_value, to_item};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::models::game_session::GameSession;
use crate::models::queue::{CandidateQuery, QueueEntry};
use crate::models::user::User;
use crate::repositories::errors::session_store_errors::SessionStoreError;
use crate::repositories::session_store::{Commit, DocumentKey, Mutation, SessionStore, Write};

const CANDIDATE_INDEX: &str = "time-control-elo-index";
const WHITE_PLAYER_INDEX: &str = "player-white-index";
const BLACK_PLAYER_INDEX: &str = "player-black-index";
const BATCH_WRITE_LIMIT: usize = 25;
const UNMATCHED_FILTER: &str =
    "(attribute_not_exists(matched_session_id) OR attribute_type(matched_session_id, :null_type))";

type Item = HashMap<String, AttributeValue>;

fn key_attribute(key: &DocumentKey) -> &'static str {
    match key {
        DocumentKey::Session(_) => "session_id",
        DocumentKey::User(_) => "id",
        DocumentKey::QueueEntry(_) => "user_id",
    }
}

pub struct DynamoDbSessionStore {
    pub client: Client,
    pub config: StoreConfig,
}

impl DynamoDbSessionStore {
    pub fn new(client: Client, config: StoreConfig) -> Self {
        Self { client, config }
    }

    fn table_and_key(&self, key: &DocumentKey) -> (&str, Item) {
        let (table, id) = match key {
            DocumentKey::Session(id) => (self.config.game_sessions_table.as_str(), id),
            DocumentKey::User(id) => (self.config.users_table.as_str(), id),
            DocumentKey::QueueEntry(id) => (self.config.matchmaking_table.as_str(), id),
        };
        (
            table,
            HashMap::from([(key_attribute(key).to_string(), AttributeValue::S(id.clone()))]),
        )
    }

    async fn get_item(&self, key: DocumentKey) -> Result<Option<Item>, SessionStoreError> {
        let (table, key) = self.table_and_key(&key);
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| SessionStoreError::DynamoDb(e.to_string()))?;
        Ok(output.item)
    }

    async fn query_active_by_player(
        &self,
        index: &str,
        attribute: &str,
        user_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        let output = self
            .client
            .query()
            .table_name(&self.config.game_sessions_table)
            .index_name(index)
            .key_condition_expression(format!("{} = :user_id", attribute))
            .filter_expression("#status IN (:waiting, :inprogress)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
            .expression_attribute_values(":waiting", AttributeValue::S("waiting".to_string()))
            .expression_attribute_values(
                ":inprogress",
                AttributeValue::S("inprogress".to_string()),
            )
            .send()
            .await
            .map_err(|e| SessionStoreError::DynamoDb(e.to_string()))?;

        match output.items.and_then(|items| items.into_iter().next()) {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    fn versioned_item<T: Serialize>(document: &T, version: u64) -> Result<Item, SessionStoreError> {
        let mut item: Item = to_item(document)?;
        item.insert("version".to_string(), AttributeValue::N(version.to_string()));
        Ok(item)
    }

    fn transact_item(&self, write: &Write) -> Result<TransactWriteItem, SessionStoreError> {
        let key = write.mutation.key();
        let (table, key_attributes) = self.table_and_key(&key);
        let condition = VersionCondition::new(write.expected_version, key_attribute(&key));
        let version = write.next_version();

        let item = match &write.mutation {
            Mutation::PutSession(session) => Some(Self::versioned_item(session, version)?),
            Mutation::PutUser(user) => {
                return self.user_update(table, key_attributes, user, condition, version)
            }
            Mutation::PutQueueEntry(entry) => Some(Self::versioned_item(entry, version)?),
            Mutation::DeleteQueueEntry(_) => None,
        };

        match item {
            Some(item) => {
                let put = Put::builder()
                    .table_name(table)
                    .set_item(Some(item))
                    .condition_expression(condition.expression)
                    .expression_attribute_names("#version", "version")
                    .set_expression_attribute_values(condition.values)
                    .build()
                    .map_err(|e| SessionStoreError::DynamoDb(format!("Failed to build put: {:?}", e)))?;
                Ok(TransactWriteItem::builder().put(put).build())
            }
            None => {
                let delete = Delete::builder()
                    .table_name(table)
                    .set_key(Some(key_attributes))
                    .condition_expression(condition.expression)
                    .expression_attribute_names("#version", "version")
                    .set_expression_attribute_values(condition.values)
                    .build()
                    .map_err(|e| {
                        SessionStoreError::DynamoDb(format!("Failed to build delete: {:?}", e))
                    })?;
                Ok(TransactWriteItem::builder().delete(delete).build())
            }
        }
    }

    /// User items belong to the profile system, so only the rating fields are written.
    fn user_update(
        &self,
        table: &str,
        key_attributes: Item,
        user: &User,
        condition: VersionCondition,
        version: u64,
    ) -> Result<TransactWriteItem, SessionStoreError> {
        let mut values = condition.values.unwrap_or_default();
        values.insert(":rating".to_string(), to_attribute_value(&user.rating)?);
        values.insert(":stats".to_string(), to_attribute_value(&user.stats)?);
        values.insert(":next_version".to_string(), AttributeValue::N(version.to_string()));

        let update = Update::builder()
            .table_name(table)
            .set_key(Some(key_attributes))
            .update_expression("SET rating = :rating, stats = :stats, #version = :next_version")
            .condition_expression(condition.expression)
            .expression_attribute_names("#version", "version")
            .set_expression_attribute_values(Some(values))
            .build()
            .map_err(|e| SessionStoreError::DynamoDb(format!("Failed to build update: {:?}", e)))?;
        Ok(TransactWriteItem::builder().update(update).build())
    }

    fn condition_check(
        &self,
        key: &DocumentKey,
        expected_version: Option<u64>,
    ) -> Result<TransactWriteItem, SessionStoreError> {
        let (table, key_attributes) = self.table_and_key(key);
        let condition = VersionCondition::new(expected_version, key_attribute(key));
        let check = ConditionCheck::builder()
            .table_name(table)
            .set_key(Some(key_attributes))
            .condition_expression(condition.expression)
            .expression_attribute_names("#version", "version")
            .set_expression_attribute_values(condition.values)
            .build()
            .map_err(|e| {
                SessionStoreError::DynamoDb(format!("Failed to build condition check: {:?}", e))
            })?;
        Ok(TransactWriteItem::builder().condition_check(check).build())
    }
}

/// Condition on the `version` attribute. Version 0 stands for an item written without one
/// (user profiles are created elsewhere).
struct VersionCondition {
    expression: String,
    values: Option<Item>,
}

impl VersionCondition {
    fn new(expected_version: Option<u64>, key_attribute: &str) -> Self {
        match expected_version {
            Some(0) => VersionCondition {
                expression: format!(
                    "attribute_exists({}) AND (attribute_not_exists(#version) OR #version = :expected_version)",
                    key_attribute
                ),
                values: Some(Self::expected(0)),
            },
            Some(version) => VersionCondition {
                expression: "#version = :expected_version".to_string(),
                values: Some(Self::expected(version)),
            },
            None => VersionCondition {
                expression: format!(
                    "attribute_not_exists({}) AND attribute_not_exists(#version)",
                    key_attribute
                ),
                values: None,
            },
        }
    }

    fn expected(version: u64) -> Item {
        HashMap::from([(
            ":expected_version".to_string(),
            AttributeValue::N(version.to_string()),
        )])
    }
}

#[async_trait]
impl SessionStore for DynamoDbSessionStore {
    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        match self
            .get_item(DocumentKey::Session(session_id.to_string()))
            .await?
        {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, SessionStoreError> {
        match self.get_item(DocumentKey::User(user_id.to_string())).await? {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn get_queue_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<QueueEntry>, SessionStoreError> {
        match self
            .get_item(DocumentKey::QueueEntry(user_id.to_string()))
            .await?
        {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        if let Some(session) = self
            .query_active_by_player(WHITE_PLAYER_INDEX, "player_white_id", user_id)
            .await?
        {
            return Ok(Some(session));
        }
        self.query_active_by_player(BLACK_PLAYER_INDEX, "player_black_id", user_id)
            .await
    }

    async fn find_queue_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<QueueEntry>, SessionStoreError> {
        let items: Vec<Item> = self
            .client
            .query()
            .table_name(&self.config.matchmaking_table)
            .index_name(CANDIDATE_INDEX)
            .key_condition_expression("time_control = :time_control AND elo BETWEEN :min_elo AND :max_elo")
            .filter_expression(UNMATCHED_FILTER)
            .expression_attribute_values(
                ":time_control",
                AttributeValue::N(query.time_control.to_string()),
            )
            .expression_attribute_values(":min_elo", AttributeValue::N(query.min_elo.to_string()))
            .expression_attribute_values(":max_elo", AttributeValue::N(query.max_elo.to_string()))
            .expression_attribute_values(":null_type", AttributeValue::S("NULL".to_string()))
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| SessionStoreError::DynamoDb(e.to_string()))?;

        let mut candidates: Vec<QueueEntry> = from_items(items)?;
        candidates.sort_by(|a, b| (a.elo, a.queued_at).cmp(&(b.elo, b.queued_at)));
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn commit(&self, commit: Commit) -> Result<(), SessionStoreError> {
        if commit.is_empty() {
            return Ok(());
        }

        let mut transact_items = Vec::with_capacity(commit.preconditions.len() + commit.writes.len());
        for precondition in &commit.preconditions {
            transact_items.push(self.condition_check(&precondition.key, precondition.expected_version)?);
        }
        for write in &commit.writes {
            transact_items.push(self.transact_item(write)?);
        }

        match self
            .client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(service_error) = e.as_service_error() {
                    if matches!(
                        service_error,
                        TransactWriteItemsError::TransactionCanceledException(_)
                    ) {
                        debug!("Transaction cancelled by a concurrent write");
                        return Err(SessionStoreError::Conflict);
                    }
                }
                Err(SessionStoreError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn find_stale_queue_entries(
        &self,
        queued_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, SessionStoreError> {
        let mut stale = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.config.matchmaking_table)
                .filter_expression(format!("queued_at < :queued_before AND {}", UNMATCHED_FILTER))
                .expression_attribute_values(
                    ":queued_before",
                    AttributeValue::N(queued_before.timestamp_millis().to_string()),
                )
                .expression_attribute_values(":null_type", AttributeValue::S("NULL".to_string()))
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| SessionStoreError::DynamoDb(e.to_string()))?;

            let entries: Vec<QueueEntry> = from_items(output.items.unwrap_or_default())?;
            stale.extend(entries);

            exclusive_start_key = output.last_evaluated_key;
            if stale.len() >= limit || exclusive_start_key.is_none() {
                break;
            }
        }

        stale.truncate(limit);
        Ok(stale)
    }

    async fn delete_queue_entries(&self, user_ids: &[String]) -> Result<usize, SessionStoreError> {
        let mut deleted = 0;

        for chunk in user_ids.chunks(BATCH_WRITE_LIMIT) {
            let mut requests = Vec::with_capacity(chunk.len());
            for user_id in chunk {
                let delete = DeleteRequest::builder()
                    .key("user_id", AttributeValue::S(user_id.clone()))
                    .build()
                    .map_err(|e| {
                        SessionStoreError::DynamoDb(format!("Failed to build delete: {:?}", e))
                    })?;
                requests.push(WriteRequest::builder().delete_request(delete).build());
            }

            let output = self
                .client
                .batch_write_item()
                .request_items(&self.config.matchmaking_table, requests)
                .send()
                .await
                .map_err(|e| SessionStoreError::DynamoDb(e.to_string()))?;

            let unprocessed = output
                .unprocessed_items
                .as_ref()
                .and_then(|items| items.get(&self.config.matchmaking_table))
                .map_or(0, Vec::len);
            if unprocessed > 0 {
                warn!("{} queue deletes were not processed and will be retried next sweep", unprocessed);
            }
            deleted += chunk.len() - unprocessed;
        }

        Ok(deleted)
    }
}
