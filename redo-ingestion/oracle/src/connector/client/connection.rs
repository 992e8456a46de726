use std::time::Duration;

use oracle::{Connection, RowValue};
use redo_ingestion_connector::redo_types::{
    chrono::{DateTime, Utc},
    log::{debug, info},
    models::ingestion_types::OracleConfig,
    types::{Scn, TransactionId},
};

use crate::connector::{replicate::log::LogFile, sql, Error, Result};

use super::{ContentsQuery, DatabaseInfo, LogMinerClient, LogMinerContent, RowCursor};

/// `LogMinerClient` backed by a real `oracle::Connection`.
#[derive(Debug)]
pub struct OracleClient {
    user: String,
    password: String,
    connect_string: String,
    fetch_size: u32,
    query_timeout: Duration,
    connection: Option<Connection>,
    info: Option<DatabaseInfo>,
}

impl OracleClient {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            user: config.user.clone(),
            password: config.password.clone(),
            connect_string: config.connect_string(),
            fetch_size: config.log_miner.fetch_size,
            query_timeout: Duration::from_secs(config.log_miner.query_timeout_secs),
            connection: None,
            info: None,
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| Error::Connectivity("not connected".to_string()))
    }

    fn fetch_database_info(connection: &Connection) -> Result<DatabaseInfo> {
        let (version, _) = connection.server_version()?;
        let version = version.major().max(0) as u32;

        debug!("{}", sql::DATABASE_ENCODING);
        let encoding = connection.query_row_as::<String>(sql::DATABASE_ENCODING, &[])?;

        // V$DATABASE.CDB only exists from 12c on.
        let cdb = if version >= 12 {
            debug!("{}", sql::IS_CDB);
            connection.query_row_as::<String>(sql::IS_CDB, &[])? == "YES"
        } else {
            false
        };

        debug!("{}", sql::IS_RAC);
        let rac = connection
            .query_row_as::<String>(sql::IS_RAC, &[])?
            .eq_ignore_ascii_case("TRUE");

        Ok(DatabaseInfo {
            version,
            encoding,
            cdb,
            rac,
        })
    }

    fn is_oracle10(&self) -> bool {
        self.info.as_ref().is_some_and(DatabaseInfo::is_oracle10)
    }

    fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        debug!("{}", sql);
        self.connection()?
            .query_as::<String>(sql, &[])?
            .map(|row| row.map_err(Into::into))
            .collect()
    }
}

impl LogMinerClient for OracleClient {
    fn connect(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                debug!("Failed to close stale connection: {}", e);
            }
        }

        info!("Connecting to {} as {}", self.connect_string, self.user);
        let connection = Connection::connect(&self.user, &self.password, &self.connect_string)?;
        connection.set_call_timeout(Some(self.query_timeout))?;

        debug!("{}", sql::SET_NLS_FORMATS);
        connection.execute(sql::SET_NLS_FORMATS, &[])?;

        let info = Self::fetch_database_info(&connection)?;
        if info.cdb {
            debug!("{}", sql::SWITCH_TO_ROOT_CONTAINER);
            connection.execute(sql::SWITCH_TO_ROOT_CONTAINER, &[])?;
        }
        info!(
            "Connected to Oracle {} (encoding {}, cdb: {}, rac: {})",
            info.version, info.encoding, info.cdb, info.rac
        );

        self.info = Some(info);
        self.connection = Some(connection);
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.ping().is_ok())
    }

    fn database_info(&self) -> Option<&DatabaseInfo> {
        self.info.as_ref()
    }

    fn detached(&self) -> Self {
        Self {
            user: self.user.clone(),
            password: self.password.clone(),
            connect_string: self.connect_string.clone(),
            fetch_size: self.fetch_size,
            query_timeout: self.query_timeout,
            connection: None,
            info: None,
        }
    }

    fn start_log_miner(&self, start: Scn, end: Option<Scn>) -> Result<()> {
        let connection = self.connection()?;
        match end {
            Some(end) => {
                let sql = sql::start_bounded_log_miner(self.is_oracle10());
                debug!("{}, {}, {}", sql, start, end);
                connection.execute_named(&sql, &[("start_scn", &start), ("end_scn", &end)])?;
            }
            None => {
                let sql = sql::start_auto_add_log_miner(self.is_oracle10());
                debug!("{}, {}", sql, start);
                connection.execute_named(&sql, &[("start_scn", &start)])?;
            }
        }
        Ok(())
    }

    fn end_log_miner(&self) -> Result<()> {
        debug!("{}", sql::END_LOG_MINER);
        self.connection()?.execute(sql::END_LOG_MINER, &[])?;
        Ok(())
    }

    fn query_contents(&self, query: &ContentsQuery) -> Result<RowCursor> {
        let connection = self.connection()?;
        let stmt = match query {
            ContentsQuery::Range {
                start,
                end,
                schemas,
                tables,
            } => {
                let sql = sql::range_contents(schemas.len(), tables.len());
                debug!("{}, {}, {}, {:?}, {:?}", sql, start, end, schemas, tables);
                let mut stmt = connection
                    .statement(&sql)
                    .fetch_array_size(self.fetch_size)
                    .build()?;
                stmt.bind("start_scn", start)?;
                stmt.bind("end_scn", end)?;
                for (i, schema) in schemas.iter().enumerate() {
                    stmt.bind(format!("schema{i}").as_str(), &str_to_sql!(schema.as_str()))?;
                }
                for (i, table) in tables.iter().enumerate() {
                    stmt.bind(format!("tbl{i}").as_str(), &str_to_sql!(table.as_str()))?;
                }
                stmt
            }
            ContentsQuery::Transaction {
                xid,
                table,
                start,
                end,
            } => {
                let sql = sql::transaction_contents(table.is_some());
                debug!("{}, {}, {:?}, {}, {}", sql, xid, table, start, end);
                let mut stmt = connection
                    .statement(&sql)
                    .fetch_array_size(self.fetch_size)
                    .build()?;
                stmt.bind("usn", &str_to_sql!(xid.usn.as_str()))?;
                stmt.bind("slot", &str_to_sql!(xid.slot.as_str()))?;
                stmt.bind("sqn", &str_to_sql!(xid.sqn.as_str()))?;
                stmt.bind("start_scn", start)?;
                stmt.bind("end_scn", end)?;
                if let Some(table) = table {
                    stmt.bind("tbl", &str_to_sql!(table.as_str()))?;
                }
                stmt
            }
        };
        let result_set = stmt.into_result_set::<LogMinerContent>(&[])?;
        Ok(Box::new(result_set.map(|row| row.map_err(Into::into))))
    }

    fn list_added_logs(&self) -> Result<Vec<LogFile>> {
        debug!("{}", sql::ADDED_LOGS);
        self.connection()?
            .query_as::<LogFile>(sql::ADDED_LOGS, &[])?
            .map(|row| row.map_err(Into::into))
            .collect()
    }

    fn list_log_files(&self, from: Scn, include_online: bool) -> Result<Vec<LogFile>> {
        let sql = if include_online {
            format!(
                "{} UNION {} ORDER BY FIRST_CHANGE",
                sql::online_logs(self.is_oracle10()),
                sql::ARCHIVED_LOGS
            )
        } else {
            format!("{} ORDER BY FIRST_CHANGE", sql::ARCHIVED_LOGS)
        };
        debug!("{}, {}", sql, from);

        let mut stmt = self.connection()?.statement(&sql).build()?;
        if include_online {
            stmt.bind("online_scn", &from)?;
        }
        stmt.bind("archive_scn", &from)?;
        let files = stmt
            .query_as::<LogFile>(&[])?
            .map(|row| row.map_err(Into::into))
            .collect::<Result<Vec<_>>>()?;
        Ok(files)
    }

    fn current_scn(&self) -> Result<Scn> {
        debug!("{}", sql::CURRENT_SCN);
        Ok(self
            .connection()?
            .query_row_as::<Scn>(sql::CURRENT_SCN, &[])?)
    }

    fn min_scn(&self) -> Result<Scn> {
        debug!("{}", sql::MIN_SCN);
        let scn = self
            .connection()?
            .query_row_as::<Option<Scn>>(sql::MIN_SCN, &[])?;
        Ok(scn.unwrap_or_default())
    }

    fn log_start_scn_by_time(&self, time: DateTime<Utc>) -> Result<Option<Scn>> {
        debug!("{}, {}", sql::LOG_START_SCN_BY_TIME, time);
        Ok(self
            .connection()?
            .query_row_as_named::<Option<Scn>>(sql::LOG_START_SCN_BY_TIME, &[("start_time", &time)])?)
    }

    fn user_roles(&self) -> Result<Vec<String>> {
        self.query_strings(sql::USER_ROLES)
    }

    fn user_privileges(&self) -> Result<Vec<String>> {
        self.query_strings(sql::USER_PRIVILEGES)
    }
}

impl RowValue for LogMinerContent {
    fn get(row: &oracle::Row) -> oracle::Result<Self> {
        Ok(LogMinerContent {
            scn: row.get("SCN")?,
            timestamp: row.get("TIMESTAMP")?,
            operation: row.get("OPERATION")?,
            operation_code: row.get::<_, u8>("OPERATION_CODE")?.into(),
            seg_owner: row.get("SEG_OWNER")?,
            table_name: row.get("TABLE_NAME")?,
            sql_redo: row.get("SQL_REDO")?,
            sql_undo: row.get("SQL_UNDO")?,
            csf: row.get::<_, u8>("CSF")? != 0,
            rollback: row.get::<_, u8>("ROLLBACK")? != 0,
            xid: TransactionId::new(
                row.get::<_, String>("XIDUSN")?,
                row.get::<_, String>("XIDSLT")?,
                row.get::<_, String>("XIDSQN")?,
            ),
            row_id: row.get("ROW_ID")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OracleConfig {
        OracleConfig {
            user: "C##REDO".to_string(),
            password: "redo".to_string(),
            host: "localhost".to_string(),
            port: 1521,
            sid: "ORCLCDB".to_string(),
            schemas: vec![],
            tables: vec![],
            log_miner: Default::default(),
        }
    }

    #[test]
    fn test_unconnected_client_is_invalid() {
        let client = OracleClient::new(&config());
        assert!(!client.is_valid());
        assert!(client.database_info().is_none());
        assert!(matches!(
            client.current_scn(),
            Err(Error::Connectivity(_))
        ));
        assert!(client.detached().connection.is_none());
    }

    #[test]
    #[ignore]
    fn test_live_range_scan() {
        env_logger::init();
        let mut client = OracleClient::new(&config());
        client.connect().unwrap();
        let end = client.current_scn().unwrap();
        let start = end.saturating_sub(1000).max(client.min_scn().unwrap());
        client.start_log_miner(start, Some(end)).unwrap();
        let rows = client
            .query_contents(&ContentsQuery::Range {
                start,
                end,
                schemas: vec![],
                tables: vec![],
            })
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(rows.iter().all(|row| row.scn >= start && row.scn < end));
        client.end_log_miner().unwrap();
    }
}
