//! DynamoDB-backed config lookup and metadata store
//!
//! The config table is keyed by (`service_pk`, `s3_location_path`); the
//! metadata table by `file_name`. Attribute names match the tables the
//! original deployment provisioned (`p_status`, `dest_kds_stream`, ...).

use crate::config::ConfigStore;
use crate::tracker::MetadataStore;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use datapump_common::{ConfigRecord, FileState, FileStatus, PumpError, RecordEncoding, Result};
use std::collections::HashMap;
use tokio::runtime::Handle;
use tracing::debug;

type Item = HashMap<String, AttributeValue>;

fn string_attr(item: &Item, name: &str) -> Result<String> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.clone()),
        _ => Err(PumpError::Parse(format!(
            "missing or non-string attribute '{name}'"
        ))),
    }
}

fn bool_attr(item: &Item, name: &str) -> Result<bool> {
    match item.get(name) {
        Some(AttributeValue::Bool(value)) => Ok(*value),
        Some(AttributeValue::S(value)) => value
            .parse()
            .map_err(|_| PumpError::Parse(format!("attribute '{name}' is not a boolean"))),
        _ => Err(PumpError::Parse(format!(
            "missing or non-boolean attribute '{name}'"
        ))),
    }
}

fn timestamp_attr(item: &Item, name: &str) -> Result<DateTime<Utc>> {
    let raw = string_attr(item, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PumpError::Parse(format!("attribute '{name}' is not a timestamp: {e}")))
}

/// Config lookup against the DynamoDB config table.
pub struct DynamoConfigStore {
    client: Client,
    handle: Handle,
    table: String,
}

impl DynamoConfigStore {
    pub fn new(client: Client, handle: Handle, table: impl Into<String>) -> Self {
        Self {
            client,
            handle,
            table: table.into(),
        }
    }
}

impl ConfigStore for DynamoConfigStore {
    fn fetch(&self, service: &str, path_prefix: &str) -> Result<ConfigRecord> {
        let response = self
            .handle
            .block_on(
                self.client
                    .get_item()
                    .table_name(&self.table)
                    .key("service_pk", AttributeValue::S(service.to_string()))
                    .key("s3_location_path", AttributeValue::S(path_prefix.to_string()))
                    .send(),
            )
            .map_err(|e| PumpError::Database(e.into_service_error().to_string()))?;

        let item = response.item().ok_or_else(|| PumpError::ConfigNotFound {
            service: service.to_string(),
            path_prefix: path_prefix.to_string(),
        })?;
        debug!(service, path_prefix, table = %self.table, "config entry found");

        Ok(ConfigRecord {
            source_data_format: string_attr(item, "source_data_format")?.parse()?,
            header_exist: bool_attr(item, "header_exist")?,
            column_names: string_attr(item, "column_names").unwrap_or_default(),
            is_file_zipped: bool_attr(item, "is_file_zipped")?,
            dest_stream: string_attr(item, "dest_kds_stream")?,
            encoding: match item.get("record_encoding") {
                Some(AttributeValue::S(value)) => value.parse()?,
                _ => RecordEncoding::default(),
            },
        })
    }
}

/// Lifecycle record store against the DynamoDB metadata table.
pub struct DynamoMetadataStore {
    client: Client,
    handle: Handle,
    table: String,
}

impl DynamoMetadataStore {
    pub fn new(client: Client, handle: Handle, table: impl Into<String>) -> Self {
        Self {
            client,
            handle,
            table: table.into(),
        }
    }
}

impl MetadataStore for DynamoMetadataStore {
    fn get(&self, file_name: &str) -> Result<Option<FileState>> {
        let response = self
            .handle
            .block_on(
                self.client
                    .get_item()
                    .table_name(&self.table)
                    .key("file_name", AttributeValue::S(file_name.to_string()))
                    .send(),
            )
            .map_err(|e| PumpError::Database(e.into_service_error().to_string()))?;

        let Some(item) = response.item() else {
            return Ok(None);
        };

        Ok(Some(FileState {
            file_name: file_name.to_string(),
            status: string_attr(item, "p_status")?.parse()?,
            file_format: string_attr(item, "file_format")?.parse()?,
            dest_stream: string_attr(item, "dest_kds_stream")?,
            reason: string_attr(item, "reason").unwrap_or_default(),
            create_timestamp: timestamp_attr(item, "create_timestamp")?,
            updated_timestamp: timestamp_attr(item, "updated_timestamp")
                .or_else(|_| timestamp_attr(item, "create_timestamp"))?,
        }))
    }

    fn put(&self, state: &FileState) -> Result<()> {
        self.handle
            .block_on(
                self.client
                    .put_item()
                    .table_name(&self.table)
                    .item("file_name", AttributeValue::S(state.file_name.clone()))
                    .item("p_status", AttributeValue::S(state.status.as_str().to_string()))
                    .item(
                        "file_format",
                        AttributeValue::S(state.file_format.to_string()),
                    )
                    .item(
                        "dest_kds_stream",
                        AttributeValue::S(state.dest_stream.clone()),
                    )
                    .item("reason", AttributeValue::S(state.reason.clone()))
                    .item(
                        "create_timestamp",
                        AttributeValue::S(state.create_timestamp.to_rfc3339()),
                    )
                    .item(
                        "updated_timestamp",
                        AttributeValue::S(state.updated_timestamp.to_rfc3339()),
                    )
                    .send(),
            )
            .map_err(|e| PumpError::TrackerWrite(e.into_service_error().to_string()))?;
        Ok(())
    }

    fn update(
        &self,
        file_name: &str,
        status: FileStatus,
        reason: &str,
        updated: DateTime<Utc>,
    ) -> Result<()> {
        // The creation branch lives in the tracker; an update against a
        // missing record is a tracker-write failure, not an upsert.
        self.handle
            .block_on(
                self.client
                    .update_item()
                    .table_name(&self.table)
                    .key("file_name", AttributeValue::S(file_name.to_string()))
                    .update_expression("SET p_status = :s, updated_timestamp = :u, reason = :r")
                    .condition_expression("attribute_exists(file_name)")
                    .expression_attribute_values(
                        ":s",
                        AttributeValue::S(status.as_str().to_string()),
                    )
                    .expression_attribute_values(":u", AttributeValue::S(updated.to_rfc3339()))
                    .expression_attribute_values(":r", AttributeValue::S(reason.to_string()))
                    .send(),
            )
            .map_err(|e| PumpError::TrackerWrite(e.into_service_error().to_string()))?;
        Ok(())
    }
}
