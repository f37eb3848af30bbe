// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `mysql_async`-backed implementations of the external-service traits.
//!
//! The snapshot side reads through keyset pagination ordered by the split
//! key; the tail side registers as a replica and decodes row events into
//! [`SourceEvent`]s. The upstream must run with `binlog_format = ROW` and
//! `binlog_row_image = FULL`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::StreamExt;
use futures_async_stream::try_stream;
use mysql_async::prelude::*;
use mysql_async::{BinlogStream, BinlogStreamRequest, Conn, Opts, OptsBuilder, Params, Row, Value};
use mysql_common::binlog::events::{EventData, RowsEventData};
use mysql_common::binlog::row::BinlogRow;
use mysql_common::binlog::value::BinlogValue;
use rivercdc_common::catalog::{Field, Schema, TableId};
use rivercdc_common::row::OwnedRow;
use rivercdc_common::types::{DataType, Datum, ScalarImpl};
use rust_decimal::Decimal;
use thiserror_ext::AsReport;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use super::{
    BinlogConnect, BoxSourceEventStream, ExternalTableReader, KeyCursor, SplitKeyStats,
};
use crate::error::{ConnectorError, ConnectorResult};
use crate::source::mysql::config::MySqlSourceConfig;
use crate::source::mysql::event::{ChangeEvent, ChangeOp, SchemaChangeEvent, SourceEvent};
use crate::source::mysql::offset::BinlogOffset;
use crate::source::mysql::split::{SnapshotSplit, SplitKey};

/// Offset of the first event in a binlog file, past the magic header.
const BINLOG_FILE_HEADER_LEN: u64 = 4;

const CONNECT_BASE_DELAY: Duration = Duration::from_millis(500);
const CONNECT_MAX_DELAY: Duration = Duration::from_secs(10);
const CONNECT_MAX_RETRIES: usize = 5;

fn build_opts(config: &MySqlSourceConfig) -> Opts {
    OptsBuilder::default()
        .ip_or_hostname(config.hostname.clone())
        .tcp_port(config.port)
        .user(Some(config.username.clone()))
        .pass(Some(config.password.clone()))
        .db_name(Some(config.database_name.clone()))
        .into()
}

/// Opens a connection with the configured handshake timeout, retrying with
/// exponential backoff and jitter within a bounded budget.
async fn connect(config: &MySqlSourceConfig) -> ConnectorResult<Conn> {
    let opts = build_opts(config);
    let strategy = ExponentialBackoff::from_millis(CONNECT_BASE_DELAY.as_millis() as u64)
        .factor(2)
        .max_delay(CONNECT_MAX_DELAY)
        .map(jitter)
        .take(CONNECT_MAX_RETRIES);
    Retry::spawn(strategy, || async {
        match tokio::time::timeout(config.connect_timeout, Conn::new(opts.clone())).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                tracing::warn!(
                    hostname = config.hostname,
                    port = config.port,
                    error = %e.as_report(),
                    "failed to connect to upstream, will retry",
                );
                Err(ConnectorError::Connection(anyhow!(e)))
            }
            Err(_) => {
                tracing::warn!(
                    hostname = config.hostname,
                    port = config.port,
                    timeout = ?config.connect_timeout,
                    "connect timed out, will retry",
                );
                Err(ConnectorError::Connection(anyhow!(
                    "handshake exceeded {:?}",
                    config.connect_timeout
                )))
            }
        }
    })
    .await
}

pub struct MySqlExternalTable {
    config: Arc<MySqlSourceConfig>,
}

impl MySqlExternalTable {
    pub fn new(config: Arc<MySqlSourceConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ExternalTableReader for MySqlExternalTable {
    async fn discover_schema(&self, table_id: &TableId) -> ConnectorResult<Schema> {
        let mut conn = connect(&self.config).await?;

        let columns: Vec<(String, String)> = conn
            .exec(
                "SELECT COLUMN_NAME, DATA_TYPE FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
                (&table_id.database, &table_id.table),
            )
            .await?;
        if columns.is_empty() {
            return Err(ConnectorError::config(format!(
                "table {table_id} does not exist upstream"
            )));
        }
        let fields = columns
            .into_iter()
            .map(|(name, ty)| Field::new(name, mysql_type_to_data_type(&ty)))
            .collect::<Vec<_>>();

        let pk_columns: Vec<String> = conn
            .exec(
                "SELECT COLUMN_NAME FROM information_schema.KEY_COLUMN_USAGE \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
                 ORDER BY ORDINAL_POSITION",
                (&table_id.database, &table_id.table),
            )
            .await?;
        let pk_indices = pk_columns
            .iter()
            .map(|name| {
                fields
                    .iter()
                    .position(|f| &f.name == name)
                    .ok_or_else(|| {
                        ConnectorError::protocol(format!(
                            "primary-key column {name} missing from columns of {table_id}"
                        ))
                    })
            })
            .collect::<ConnectorResult<Vec<_>>>()?;

        Ok(Schema::new(fields, pk_indices))
    }

    async fn current_binlog_offset(&self) -> ConnectorResult<BinlogOffset> {
        let mut conn = connect(&self.config).await?;
        let row: Row = conn
            .query_first("SHOW MASTER STATUS")
            .await?
            .ok_or_else(|| {
                ConnectorError::protocol("SHOW MASTER STATUS returned nothing; is binlog enabled?")
            })?;
        let filename: String = row
            .get("File")
            .ok_or_else(|| ConnectorError::protocol("SHOW MASTER STATUS misses File"))?;
        let position: u64 = row
            .get("Position")
            .ok_or_else(|| ConnectorError::protocol("SHOW MASTER STATUS misses Position"))?;
        Ok(BinlogOffset::new(filename, position))
    }

    async fn earliest_binlog_offset(&self) -> ConnectorResult<BinlogOffset> {
        let mut conn = connect(&self.config).await?;
        let row: Row = conn
            .query_first("SHOW BINARY LOGS")
            .await?
            .ok_or_else(|| ConnectorError::protocol("no binary logs retained upstream"))?;
        let filename: String = row
            .get("Log_name")
            .ok_or_else(|| ConnectorError::protocol("SHOW BINARY LOGS misses Log_name"))?;
        Ok(BinlogOffset::new(filename, BINLOG_FILE_HEADER_LEN))
    }

    async fn split_key_stats(
        &self,
        table_id: &TableId,
        key_field: &Field,
    ) -> ConnectorResult<SplitKeyStats> {
        let mut conn = connect(&self.config).await?;
        let sql = format!(
            "SELECT MIN(`{key}`), MAX(`{key}`), COUNT(*) FROM {table}",
            key = key_field.name,
            table = table_id.quoted(),
        );
        let row: Row = conn
            .query_first(sql)
            .await?
            .context("statistics query returned nothing")?;
        let (min, max, row_count): (Value, Value, u64) = mysql_async::from_row_opt(row)
            .map_err(|e| ConnectorError::protocol(e.to_string()))?;
        Ok(SplitKeyStats {
            min: from_mysql_value(key_field.data_type, min)?,
            max: from_mysql_value(key_field.data_type, max)?,
            row_count,
        })
    }

    fn key_cursor(&self, table_id: &TableId, key_field: &Field) -> Box<dyn KeyCursor> {
        Box::new(MySqlKeyCursor {
            config: self.config.clone(),
            table_id: table_id.clone(),
            key_field: key_field.clone(),
        })
    }

    async fn snapshot_fetch(
        &self,
        split: &SnapshotSplit,
        after: Option<&SplitKey>,
        limit: u32,
    ) -> ConnectorResult<Vec<OwnedRow>> {
        let schema = split.schema()?;
        let key = &split.split_key_fields[0];

        let column_list = schema
            .fields
            .iter()
            .map(|f| format!("`{}`", f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut conditions = vec!["TRUE".to_owned()];
        let mut params: Vec<Value> = vec![];
        if let Some(start) = &split.split_start {
            conditions.push(format!("`{}` >= ?", key.name));
            params.push(to_mysql_value(&start.0[0]));
        }
        if let Some(end) = &split.split_end {
            conditions.push(format!("`{}` < ?", key.name));
            params.push(to_mysql_value(&end.0[0]));
        }
        if let Some(after) = after {
            conditions.push(format!("`{}` > ?", key.name));
            params.push(to_mysql_value(&after.0[0]));
        }
        let sql = format!(
            "SELECT {column_list} FROM {table} WHERE {cond} ORDER BY `{key}` LIMIT {limit}",
            table = split.table_id.quoted(),
            cond = conditions.join(" AND "),
            key = key.name,
        );

        let mut conn = connect(&self.config).await?;
        let rows: Vec<Row> = conn.exec(sql, Params::Positional(params)).await?;
        rows.into_iter()
            .map(|row| mysql_row_to_owned_row(row, schema))
            .collect()
    }
}

struct MySqlKeyCursor {
    config: Arc<MySqlSourceConfig>,
    table_id: TableId,
    key_field: Field,
}

#[async_trait]
impl KeyCursor for MySqlKeyCursor {
    async fn next_boundary(
        &self,
        last: Option<&SplitKey>,
        step: u64,
    ) -> ConnectorResult<Option<SplitKey>> {
        let mut conn = connect(&self.config).await?;
        let key = &self.key_field.name;
        let table = self.table_id.quoted();
        let offset = step - 1;
        let (sql, params) = match last {
            Some(last) => (
                format!(
                    "SELECT `{key}` FROM {table} WHERE `{key}` > ? \
                     ORDER BY `{key}` LIMIT 1 OFFSET {offset}"
                ),
                Params::Positional(vec![to_mysql_value(&last.0[0])]),
            ),
            None => (
                format!("SELECT `{key}` FROM {table} ORDER BY `{key}` LIMIT 1 OFFSET {offset}"),
                Params::Empty,
            ),
        };
        let value: Option<Value> = conn.exec_first(sql, params).await?;
        match value {
            Some(value) => {
                let datum = from_mysql_value(self.key_field.data_type, value)?;
                Ok(Some(SplitKey::from_datums(vec![datum])?))
            }
            None => Ok(None),
        }
    }
}

/// Registers a replica session and decodes the tail into source events.
pub struct MySqlBinlogConnector {
    config: Arc<MySqlSourceConfig>,
}

impl MySqlBinlogConnector {
    pub fn new(config: Arc<MySqlSourceConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BinlogConnect for MySqlBinlogConnector {
    async fn connect(
        &self,
        server_id: u32,
        start: &BinlogOffset,
    ) -> ConnectorResult<BoxSourceEventStream> {
        let conn = connect(&self.config).await?;
        let mut request = BinlogStreamRequest::new(server_id).with_pos(start.position);
        if !start.filename.is_empty() {
            request = request.with_filename(start.filename.as_bytes());
        }
        let binlog = conn.get_binlog_stream(request).await?;
        tracing::debug!(server_id, start = %start, "binlog session established");
        Ok(into_event_stream(binlog, start.clone()))
    }
}

#[try_stream(boxed, ok = SourceEvent, error = ConnectorError)]
async fn into_event_stream(mut binlog: BinlogStream, start: BinlogOffset) {
    let mut filename = start.filename.clone();

    while let Some(event) = binlog.next().await {
        let event = event?;
        let header = event.header();
        let log_pos = header.log_pos() as u64;
        let source_ts_ms = header.timestamp() as i64 * 1000;

        let Some(data) = event
            .read_data()
            .map_err(|e| ConnectorError::protocol(format!("undecodable binlog event: {e}")))?
        else {
            continue;
        };

        match data {
            EventData::RotateEvent(ev) => {
                filename = ev.name().to_string();
                yield SourceEvent::Heartbeat {
                    offset: BinlogOffset::new(filename.clone(), ev.position()),
                };
            }
            EventData::RowsEvent(rows_data) => {
                let offset = BinlogOffset::new(filename.clone(), log_pos);
                let (op, table_num) = match &rows_data {
                    RowsEventData::WriteRowsEvent(ev) => (ChangeOp::Create, ev.table_id()),
                    RowsEventData::UpdateRowsEvent(ev) => (ChangeOp::Update, ev.table_id()),
                    RowsEventData::DeleteRowsEvent(ev) => (ChangeOp::Delete, ev.table_id()),
                    // pre-5.6 row events are not produced by supported servers
                    _ => {
                        yield SourceEvent::Heartbeat { offset };
                        continue;
                    }
                };
                let tme = binlog.get_tme(table_num).ok_or_else(|| {
                    ConnectorError::protocol(format!(
                        "no table-map event for table id {table_num}"
                    ))
                })?;
                let table_id = TableId::new(tme.database_name(), tme.table_name());
                let mut events = Vec::new();
                let rows = match &rows_data {
                    RowsEventData::WriteRowsEvent(ev) => ev.rows(tme),
                    RowsEventData::UpdateRowsEvent(ev) => ev.rows(tme),
                    RowsEventData::DeleteRowsEvent(ev) => ev.rows(tme),
                    _ => unreachable!("filtered above"),
                };
                for row in rows {
                    let (before, after) = row
                        .map_err(|e| ConnectorError::protocol(format!("undecodable row: {e}")))?;
                    events.push(ChangeEvent {
                        table_id: table_id.clone(),
                        op,
                        before: before.as_ref().map(binlog_row_to_owned_row).transpose()?,
                        after: after.as_ref().map(binlog_row_to_owned_row).transpose()?,
                        offset: offset.clone(),
                        source_ts_ms,
                    });
                }
                for event in events {
                    yield SourceEvent::Data(event);
                }
            }
            EventData::QueryEvent(ev) => {
                let offset = BinlogOffset::new(filename.clone(), log_pos);
                let query = ev.query();
                match parse_ddl_table(ev.schema().as_ref(), query.as_ref()) {
                    Some(table_id) => {
                        yield SourceEvent::SchemaChange(SchemaChangeEvent {
                            table_id,
                            ddl: query.into_owned(),
                            schema: None,
                            offset,
                        });
                    }
                    None => yield SourceEvent::Heartbeat { offset },
                }
            }
            // Position-bearing bookkeeping events (format description, gtid,
            // xid, …) surface as heartbeats so watermark crossings stay
            // observable. Artificial events carry position 0 and are dropped.
            _ => {
                if log_pos != 0 {
                    yield SourceEvent::Heartbeat {
                        offset: BinlogOffset::new(filename.clone(), log_pos),
                    };
                }
            }
        }
    }

    Err(ConnectorError::protocol("binlog stream ended unexpectedly"))?;
}

/// Picks the table a DDL statement targets. Only `CREATE/ALTER/DROP/TRUNCATE
/// TABLE` forms are recognized; anything else is not a schema change the
/// connector tracks.
fn parse_ddl_table(default_db: &str, query: &str) -> Option<TableId> {
    let mut tokens = query
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|t| !t.is_empty());
    let verb = tokens.next()?.to_ascii_uppercase();
    if !matches!(verb.as_str(), "CREATE" | "ALTER" | "DROP" | "TRUNCATE") {
        return None;
    }
    let mut saw_table = false;
    for token in tokens {
        let bare = token.trim_matches('`');
        if saw_table {
            let skip = ["IF", "NOT", "EXISTS"];
            if skip.contains(&bare.to_ascii_uppercase().as_str()) {
                continue;
            }
            return Some(match bare.split_once('.') {
                Some((db, table)) => TableId::new(db.trim_matches('`'), table.trim_matches('`')),
                None => TableId::new(default_db, bare),
            });
        }
        if bare.eq_ignore_ascii_case("TABLE") {
            saw_table = true;
        }
    }
    None
}

fn mysql_type_to_data_type(ty: &str) -> DataType {
    match ty.to_ascii_lowercase().as_str() {
        "tinyint" | "smallint" => DataType::Int16,
        "mediumint" | "int" | "integer" => DataType::Int32,
        "bigint" => DataType::Int64,
        "float" | "double" => DataType::Float64,
        "decimal" | "numeric" => DataType::Decimal,
        "bit" | "boolean" | "bool" => DataType::Boolean,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => DataType::Bytea,
        "datetime" | "timestamp" => DataType::Timestamp,
        // chars, texts, enums, json, temporal leftovers: delivered textually
        _ => DataType::Varchar,
    }
}

fn to_mysql_value(scalar: &ScalarImpl) -> Value {
    match scalar {
        ScalarImpl::Bool(v) => Value::from(*v),
        ScalarImpl::Int16(v) => Value::from(*v),
        ScalarImpl::Int32(v) => Value::from(*v),
        ScalarImpl::Int64(v) => Value::from(*v),
        ScalarImpl::Float64(v) => Value::from(*v),
        ScalarImpl::Decimal(v) => Value::from(v.to_string()),
        ScalarImpl::Utf8(v) => Value::from(v.as_str()),
        ScalarImpl::Bytea(v) => Value::from(v.as_slice()),
        ScalarImpl::Timestamp(v) => Value::from(*v),
    }
}

fn from_mysql_value(data_type: DataType, value: Value) -> ConnectorResult<Datum> {
    if value == Value::NULL {
        return Ok(None);
    }
    let bad = |value: &Value| {
        ConnectorError::protocol(format!("unexpected value {value:?} for {data_type:?} column"))
    };
    let scalar = match data_type {
        DataType::Boolean => ScalarImpl::Bool(
            mysql_async::from_value_opt::<bool>(value.clone()).map_err(|_| bad(&value))?,
        ),
        DataType::Int16 => ScalarImpl::Int16(
            mysql_async::from_value_opt::<i16>(value.clone()).map_err(|_| bad(&value))?,
        ),
        DataType::Int32 => ScalarImpl::Int32(
            mysql_async::from_value_opt::<i32>(value.clone()).map_err(|_| bad(&value))?,
        ),
        DataType::Int64 => ScalarImpl::Int64(
            mysql_async::from_value_opt::<i64>(value.clone()).map_err(|_| bad(&value))?,
        ),
        DataType::Float64 => ScalarImpl::Float64(
            mysql_async::from_value_opt::<f64>(value.clone()).map_err(|_| bad(&value))?,
        ),
        DataType::Decimal => {
            let text =
                mysql_async::from_value_opt::<String>(value.clone()).map_err(|_| bad(&value))?;
            ScalarImpl::Decimal(text.parse::<Decimal>().map_err(|_| bad(&value))?)
        }
        DataType::Varchar => ScalarImpl::Utf8(
            mysql_async::from_value_opt::<String>(value.clone()).map_err(|_| bad(&value))?,
        ),
        DataType::Bytea => ScalarImpl::Bytea(
            mysql_async::from_value_opt::<Vec<u8>>(value.clone()).map_err(|_| bad(&value))?,
        ),
        DataType::Timestamp => ScalarImpl::Timestamp(
            mysql_async::from_value_opt::<NaiveDateTime>(value.clone())
                .map_err(|_| bad(&value))?,
        ),
    };
    Ok(Some(scalar))
}

fn mysql_row_to_owned_row(row: Row, schema: &Schema) -> ConnectorResult<OwnedRow> {
    let mut row = row;
    let mut datums = Vec::with_capacity(schema.fields.len());
    for (idx, field) in schema.fields.iter().enumerate() {
        let value = row
            .take::<Value, _>(idx)
            .ok_or_else(|| ConnectorError::protocol(format!("row misses column {}", field.name)))?;
        datums.push(from_mysql_value(field.data_type, value)?);
    }
    Ok(OwnedRow::new(datums))
}

/// Value-driven conversion for binlog row images: the wire value dictates the
/// scalar, textual payloads arrive as UTF-8.
fn binlog_row_to_owned_row(row: &BinlogRow) -> ConnectorResult<OwnedRow> {
    let mut datums = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        let value = row.as_ref(idx).ok_or_else(|| {
            ConnectorError::protocol(format!("binlog row misses column {idx}"))
        })?;
        let datum = match value {
            BinlogValue::Value(Value::NULL) => None,
            BinlogValue::Value(v) => Some(binlog_value_to_scalar(v)?),
            BinlogValue::Jsonb(v) => {
                let json: serde_json::Value = v.clone().try_into().map_err(|e| {
                    ConnectorError::protocol(format!("undecodable jsonb column: {e}"))
                })?;
                Some(ScalarImpl::Utf8(json.to_string()))
            }
            BinlogValue::JsonDiff(_) => {
                return Err(ConnectorError::protocol(
                    "partial json updates require binlog_row_value_options = ''",
                ));
            }
        };
        datums.push(datum);
    }
    Ok(OwnedRow::new(datums))
}

fn binlog_value_to_scalar(value: &Value) -> ConnectorResult<ScalarImpl> {
    Ok(match value {
        Value::Int(v) => ScalarImpl::Int64(*v),
        Value::UInt(v) => ScalarImpl::Int64(*v as i64),
        Value::Float(v) => ScalarImpl::Float64(*v as f64),
        Value::Double(v) => ScalarImpl::Float64(*v),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => ScalarImpl::Utf8(text.to_owned()),
            Err(_) => ScalarImpl::Bytea(bytes.clone()),
        },
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let datetime = chrono::NaiveDate::from_ymd_opt(*year as i32, *month as u32, *day as u32)
                .and_then(|date| {
                    date.and_hms_micro_opt(*hour as u32, *minute as u32, *second as u32, *micros)
                })
                .ok_or_else(|| {
                    ConnectorError::protocol(format!("out-of-range temporal value {value:?}"))
                })?;
            ScalarImpl::Timestamp(datetime)
        }
        Value::Time(neg, days, hours, minutes, seconds, micros) => {
            let sign = if *neg { "-" } else { "" };
            let hours = *days * 24 + *hours as u32;
            ScalarImpl::Utf8(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"))
        }
        Value::NULL => {
            return Err(ConnectorError::protocol("null handled by caller"));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        assert_eq!(mysql_type_to_data_type("BIGINT"), DataType::Int64);
        assert_eq!(mysql_type_to_data_type("int"), DataType::Int32);
        assert_eq!(mysql_type_to_data_type("varchar"), DataType::Varchar);
        assert_eq!(mysql_type_to_data_type("decimal"), DataType::Decimal);
        assert_eq!(mysql_type_to_data_type("longblob"), DataType::Bytea);
        assert_eq!(mysql_type_to_data_type("json"), DataType::Varchar);
    }

    #[test]
    fn test_value_round_trip() {
        let cases = [
            (DataType::Int64, ScalarImpl::Int64(42)),
            (DataType::Varchar, ScalarImpl::from("hello")),
            (DataType::Boolean, ScalarImpl::Bool(true)),
            (DataType::Decimal, ScalarImpl::Decimal("3.14".parse().unwrap())),
        ];
        for (data_type, scalar) in cases {
            let datum = from_mysql_value(data_type, to_mysql_value(&scalar)).unwrap();
            assert_eq!(datum, Some(scalar));
        }
        assert_eq!(from_mysql_value(DataType::Int64, Value::NULL).unwrap(), None);
    }

    #[test]
    fn test_parse_ddl_table() {
        assert_eq!(
            parse_ddl_table("mydb", "ALTER TABLE orders ADD COLUMN note TEXT"),
            Some(TableId::new("mydb", "orders"))
        );
        assert_eq!(
            parse_ddl_table("mydb", "create table if not exists `other`.`t2` (id int)"),
            Some(TableId::new("other", "t2"))
        );
        assert_eq!(
            parse_ddl_table("mydb", "DROP TABLE `orders`"),
            Some(TableId::new("mydb", "orders"))
        );
        assert_eq!(parse_ddl_table("mydb", "BEGIN"), None);
        assert_eq!(parse_ddl_table("mydb", "CREATE INDEX idx ON orders (id)"), None);
    }
}
