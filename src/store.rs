// used for persistence
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{LogsiftError, Result};
use crate::query::CompiledQuery;
use crate::sql::Dialect;

/// A logged call as reported by a client, with its response and tags.
#[derive(Debug, Clone)]
pub struct NewLoggedCall {
    pub id: String,
    pub model: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub response: Option<NewModelResponse>,
    /// A `None` value records the tag without a value.
    pub tags: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModelResponse {
    pub req_payload: Value,
    #[serde(default)]
    pub resp_payload: Option<Value>,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDatasetEntry {
    pub id: String,
    pub dataset_id: String,
    pub messages: Value,
    pub output: Option<Value>,
    pub outdated: bool,
    pub created_at: DateTime<Utc>,
}

// ------------- Persistence -------------
pub struct Store {
    db: Connection,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }
    pub fn new(connection: Connection) -> Result<Self> {
        // LIKE compares case-sensitively, as `=` does
        connection.execute_batch("pragma case_sensitive_like = on;")?;
        connection.execute_batch(
            "
            create table if not exists LoggedCall (
                id text not null,
                projectId text not null,
                model text null,
                requestedAt text not null,
                constraint referenceable_LoggedCall_id primary key (
                    id
                )
            );
            create table if not exists LoggedCallModelResponse (
                id text not null,
                originalLoggedCallId text not null,
                reqPayload text not null,
                respPayload text null,
                statusCode integer null,
                errorMessage text null,
                constraint ModelResponse_of_LoggedCall foreign key (
                    originalLoggedCallId
                ) references LoggedCall(id),
                constraint referenceable_LoggedCallModelResponse_id primary key (
                    id
                ),
                constraint unique_LoggedCallModelResponse unique (
                    originalLoggedCallId
                )
            );
            create table if not exists LoggedCallTag (
                loggedCallId text not null,
                projectId text not null,
                name text not null,
                value text null,
                constraint Tag_of_LoggedCall foreign key (
                    loggedCallId
                ) references LoggedCall(id),
                constraint unique_LoggedCallTag unique (
                    loggedCallId,
                    name
                )
            );
            create index if not exists LoggedCallTag_projectId_name on LoggedCallTag (
                projectId,
                name
            );
            create table if not exists DatasetEntry (
                id text not null,
                datasetId text not null,
                messages text not null,
                output text null,
                outdated integer not null default 0,
                createdAt text not null,
                constraint referenceable_DatasetEntry_id primary key (
                    id
                )
            );
            ",
        )?;
        Ok(Store { db: connection })
    }

    pub fn record_logged_call(&mut self, project_id: &str, call: &NewLoggedCall) -> Result<()> {
        let transaction = self.db.transaction()?;
        let exists = transaction
            .query_row(
                "select 1 from LoggedCall where id = ?1",
                params![&call.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(LogsiftError::Conflict(format!(
                "logged call {} already exists",
                call.id
            )));
        }
        transaction.execute(
            "
            insert into LoggedCall (
                id,
                projectId,
                model,
                requestedAt
            ) values (?1, ?2, ?3, ?4)
            ",
            params![&call.id, project_id, &call.model, &call.requested_at],
        )?;
        if let Some(response) = &call.response {
            transaction.execute(
                "
                insert into LoggedCallModelResponse (
                    id,
                    originalLoggedCallId,
                    reqPayload,
                    respPayload,
                    statusCode,
                    errorMessage
                ) values (?1, ?2, ?3, ?4, ?5, ?6)
                ",
                params![
                    format!("{}:response", call.id),
                    &call.id,
                    response.req_payload.to_string(),
                    response.resp_payload.as_ref().map(Value::to_string),
                    &response.status_code,
                    &response.error_message
                ],
            )?;
        }
        for (name, value) in &call.tags {
            upsert_tag(&transaction, &call.id, name, value.as_deref())?;
        }
        transaction.commit()?;
        Ok(())
    }

    /// Sets one tag on a logged call, replacing any previous value.
    /// Returns false when there is no such call.
    pub fn set_tag(&self, call_id: &str, name: &str, value: Option<&str>) -> Result<bool> {
        upsert_tag(&self.db, call_id, name, value)
    }

    pub fn remove_tag(&self, call_id: &str, name: &str) -> Result<bool> {
        let removed = self.db.execute(
            "delete from LoggedCallTag where loggedCallId = ?1 and name = ?2",
            params![call_id, name],
        )?;
        Ok(removed > 0)
    }

    pub fn tag_value(&self, call_id: &str, name: &str) -> Result<Option<Option<String>>> {
        let value = self
            .db
            .query_row(
                "select value from LoggedCallTag where loggedCallId = ?1 and name = ?2",
                params![call_id, name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Distinct tag names used in a project.
    pub fn tag_names(&self, project_id: &str) -> Result<BTreeSet<String>> {
        let mut statement = self.db.prepare_cached(
            "
            select distinct name
                from LoggedCallTag
                where projectId = ?1
            ",
        )?;
        let names = statement
            .query_map(params![project_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(names)
    }

    pub fn add_dataset_entry(&self, entry: &NewDatasetEntry) -> Result<()> {
        self.db.execute(
            "
            insert into DatasetEntry (
                id,
                datasetId,
                messages,
                output,
                outdated,
                createdAt
            ) values (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                &entry.id,
                &entry.dataset_id,
                entry.messages.to_string(),
                entry.output.as_ref().map(Value::to_string),
                &entry.outdated,
                &entry.created_at
            ],
        )?;
        Ok(())
    }

    /// Runs an id projection and returns the ids in result order.
    pub fn fetch_ids(&self, query: &CompiledQuery) -> Result<Vec<String>> {
        check_dialect(query)?;
        debug!(sql = %query.sql, params = query.params.len(), "fetching ids");
        let mut statement = self.db.prepare(&query.sql)?;
        let ids = statement
            .query_map(params_from_iter(query.params.iter()), |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Runs a count projection.
    pub fn count(&self, query: &CompiledQuery) -> Result<u64> {
        check_dialect(query)?;
        debug!(sql = %query.sql, params = query.params.len(), "counting");
        let count = self.db.query_row(
            &query.sql,
            params_from_iter(query.params.iter()),
            |row| row.get::<_, i64>(0),
        )?;
        u64::try_from(count).map_err(|e| LogsiftError::Execution(e.to_string()))
    }

    /// Applies `tags` to every call selected by `query`, all or nothing.
    /// A `None` value removes the tag. Returns the number of matched calls.
    pub fn update_tags(
        &mut self,
        query: &CompiledQuery,
        tags: &BTreeMap<String, Option<String>>,
    ) -> Result<usize> {
        let ids = self.fetch_ids(query)?;
        let transaction = self.db.transaction()?;
        for id in &ids {
            for (name, value) in tags {
                match value {
                    Some(value) => {
                        upsert_tag(&transaction, id, name, Some(value.as_str()))?;
                    }
                    None => {
                        transaction.execute(
                            "delete from LoggedCallTag where loggedCallId = ?1 and name = ?2",
                            params![id, name],
                        )?;
                    }
                }
            }
        }
        transaction.commit()?;
        debug!(matched = ids.len(), tags = tags.len(), "updated tags");
        Ok(ids.len())
    }
}

fn check_dialect(query: &CompiledQuery) -> Result<()> {
    if query.dialect != Dialect::Sqlite {
        return Err(LogsiftError::Execution(format!(
            "the store executes SQLite queries, got {:?}",
            query.dialect
        )));
    }
    Ok(())
}

// The tag's projectId is always taken from the call it belongs to.
fn upsert_tag(db: &Connection, call_id: &str, name: &str, value: Option<&str>) -> Result<bool> {
    let written = db.execute(
        "
        insert into LoggedCallTag (
            loggedCallId,
            projectId,
            name,
            value
        )
        select id, projectId, ?2, ?3
            from LoggedCall
            where id = ?1
        on conflict (loggedCallId, name) do update set value = excluded.value
        ",
        params![call_id, name, value],
    )?;
    Ok(written > 0)
}
