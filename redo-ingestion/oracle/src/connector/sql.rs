//! Statement text sent to the database. Only `client::connection` executes these.

pub const SET_NLS_FORMATS: &str = "
ALTER SESSION SET
    NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS'
    NLS_TIMESTAMP_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF6'
    NLS_TIMESTAMP_TZ_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF6 TZH:TZM'";

pub const SWITCH_TO_ROOT_CONTAINER: &str = "ALTER SESSION SET CONTAINER = CDB$ROOT";

pub const DATABASE_ENCODING: &str =
    "SELECT VALUE FROM NLS_DATABASE_PARAMETERS WHERE PARAMETER = 'NLS_CHARACTERSET'";

pub const IS_CDB: &str = "SELECT CDB FROM V$DATABASE";

pub const IS_RAC: &str = "SELECT VALUE FROM V$PARAMETER WHERE NAME = 'cluster_database'";

pub const CURRENT_SCN: &str = "SELECT DBMS_FLASHBACK.GET_SYSTEM_CHANGE_NUMBER() FROM DUAL";

pub const MIN_SCN: &str = "
SELECT MIN(FIRST_CHANGE#) FROM (
    SELECT FIRST_CHANGE# FROM V$LOG WHERE STATUS != 'UNUSED'
    UNION
    SELECT FIRST_CHANGE# FROM V$ARCHIVED_LOG WHERE NAME IS NOT NULL AND STATUS = 'A'
)";

pub const LOG_START_SCN_BY_TIME: &str = "
SELECT MAX(FIRST_CHANGE#) FROM (
    SELECT FIRST_CHANGE#, FIRST_TIME FROM V$LOG WHERE STATUS != 'UNUSED'
    UNION
    SELECT FIRST_CHANGE#, FIRST_TIME FROM V$ARCHIVED_LOG WHERE NAME IS NOT NULL AND STATUS = 'A'
)
WHERE FIRST_TIME <= :start_time";

pub const USER_ROLES: &str = "SELECT GRANTED_ROLE FROM USER_ROLE_PRIVS";

pub const USER_PRIVILEGES: &str = "SELECT PRIVILEGE FROM SESSION_PRIVS";

/// Online logs that are already archived are read from the archive instead.
pub const ONLINE_LOGS: &str = r#"
SELECT
    MIN(F.MEMBER)       AS NAME,
    LOG.FIRST_CHANGE#   AS FIRST_CHANGE,
    LOG.NEXT_CHANGE#    AS NEXT_CHANGE,
    LOG.THREAD#         AS THREAD,
    LOG.BYTES           AS BYTES,
    'ONLINE'            AS TYPE,
    0                   AS STATUS
FROM
    V$LOG LOG
INNER JOIN V$LOGFILE F
    ON LOG.GROUP# = F.GROUP#
LEFT JOIN V$ARCHIVED_LOG ALOG
    ON
        ALOG.FIRST_CHANGE# = LOG.FIRST_CHANGE#
        AND
        ALOG.NEXT_CHANGE# = LOG.NEXT_CHANGE#
WHERE
    LOG.STATUS != 'UNUSED'
    AND
    (LOG.STATUS = 'CURRENT' OR LOG.NEXT_CHANGE# > :online_scn)
    AND
    (ALOG.STATUS <> 'A' OR ALOG.FIRST_CHANGE# IS NULL)
GROUP BY
    LOG.GROUP#, LOG.FIRST_CHANGE#, LOG.NEXT_CHANGE#, LOG.THREAD#, LOG.BYTES
"#;

/// Oracle 10 `V$LOG` has no `NEXT_CHANGE#`. It is the next sequence's first change, or the
/// largest SCN for the current log.
pub const ONLINE_LOGS_10: &str = r#"
SELECT
    MIN(F.MEMBER)       AS NAME,
    LOG.FIRST_CHANGE#   AS FIRST_CHANGE,
    LOG.NEXT_CHANGE     AS NEXT_CHANGE,
    LOG.THREAD#         AS THREAD,
    LOG.BYTES           AS BYTES,
    'ONLINE'            AS TYPE,
    0                   AS STATUS
FROM (
    SELECT
        GROUP#, THREAD#, BYTES, STATUS, FIRST_CHANGE#,
        NVL(
            LEAD(FIRST_CHANGE#) OVER (PARTITION BY THREAD# ORDER BY SEQUENCE#),
            281474976710655
        ) AS NEXT_CHANGE
    FROM V$LOG
    WHERE STATUS != 'UNUSED'
) LOG
INNER JOIN V$LOGFILE F
    ON LOG.GROUP# = F.GROUP#
LEFT JOIN V$ARCHIVED_LOG ALOG
    ON
        ALOG.FIRST_CHANGE# = LOG.FIRST_CHANGE#
        AND
        ALOG.THREAD# = LOG.THREAD#
WHERE
    (LOG.STATUS = 'CURRENT' OR LOG.NEXT_CHANGE > :online_scn)
    AND
    (ALOG.STATUS <> 'A' OR ALOG.FIRST_CHANGE# IS NULL)
GROUP BY
    LOG.GROUP#, LOG.FIRST_CHANGE#, LOG.NEXT_CHANGE, LOG.THREAD#, LOG.BYTES
"#;

pub fn online_logs(oracle10: bool) -> &'static str {
    if oracle10 {
        ONLINE_LOGS_10
    } else {
        ONLINE_LOGS
    }
}

pub const ARCHIVED_LOGS: &str = r"
SELECT
    NAME                    AS NAME,
    FIRST_CHANGE#           AS FIRST_CHANGE,
    NEXT_CHANGE#            AS NEXT_CHANGE,
    THREAD#                 AS THREAD,
    BLOCKS * BLOCK_SIZE     AS BYTES,
    'ARCHIVED'              AS TYPE,
    0                       AS STATUS
FROM
    V$ARCHIVED_LOG
WHERE
    NAME IS NOT NULL
    AND
    STATUS = 'A'
    AND
    STANDBY_DEST = 'NO'
    AND
    NEXT_CHANGE# > :archive_scn
";

pub const ADDED_LOGS: &str = "
SELECT
    FILENAME    AS NAME,
    LOW_SCN     AS FIRST_CHANGE,
    NEXT_SCN    AS NEXT_CHANGE,
    THREAD_ID   AS THREAD,
    FILESIZE    AS BYTES,
    TYPE        AS TYPE,
    STATUS      AS STATUS
FROM V$LOGMNR_LOGS
ORDER BY THREAD_ID, LOW_SCN";

const MINING_OPTIONS: &str = "DBMS_LOGMNR.SKIP_CORRUPTION
                + DBMS_LOGMNR.NO_SQL_DELIMITER
                + DBMS_LOGMNR.NO_ROWID_IN_STMT
                + DBMS_LOGMNR.DICT_FROM_ONLINE_CATALOG";

/// `STRING_LITERALS_IN_STMT` only exists from 11g on.
fn mining_options(oracle10: bool) -> String {
    if oracle10 {
        MINING_OPTIONS.to_string()
    } else {
        format!("{MINING_OPTIONS}\n                + DBMS_LOGMNR.STRING_LITERALS_IN_STMT")
    }
}

/// Adds every log file overlapping `[:start_scn, :end_scn]` and starts mining that range.
pub fn start_bounded_log_miner(oracle10: bool) -> String {
    let options = mining_options(oracle10);
    format!(
        "
DECLARE
    first_file BOOLEAN := TRUE;
BEGIN
    FOR log_file IN (
        SELECT MIN(NAME) AS NAME, FIRST_CHANGE# FROM (
            SELECT F.MEMBER AS NAME, L.FIRST_CHANGE#
            FROM V$LOG L INNER JOIN V$LOGFILE F ON L.GROUP# = F.GROUP#
            WHERE L.STATUS IN ('CURRENT', 'ACTIVE') AND L.FIRST_CHANGE# < :end_scn
            UNION
            SELECT NAME, FIRST_CHANGE#
            FROM V$ARCHIVED_LOG
            WHERE NAME IS NOT NULL AND STANDBY_DEST = 'NO'
                AND FIRST_CHANGE# < :end_scn AND NEXT_CHANGE# > :start_scn
        )
        GROUP BY FIRST_CHANGE#
        ORDER BY FIRST_CHANGE#
    ) LOOP
        IF first_file THEN
            DBMS_LOGMNR.ADD_LOGFILE(LOGFILENAME => log_file.NAME, OPTIONS => DBMS_LOGMNR.NEW);
            first_file := FALSE;
        ELSE
            DBMS_LOGMNR.ADD_LOGFILE(LOGFILENAME => log_file.NAME);
        END IF;
    END LOOP;
    DBMS_LOGMNR.START_LOGMNR(
        STARTSCN => :start_scn,
        ENDSCN => :end_scn,
        OPTIONS => {options}
    );
END;"
    )
}

/// Starts mining from `:start_scn` and lets the database add log files as it goes.
pub fn start_auto_add_log_miner(oracle10: bool) -> String {
    let options = mining_options(oracle10);
    format!(
        "
BEGIN
    DBMS_LOGMNR.START_LOGMNR(
        STARTSCN => :start_scn,
        OPTIONS => {options} + DBMS_LOGMNR.CONTINUOUS_MINE
    );
END;"
    )
}

pub const END_LOG_MINER: &str = "BEGIN DBMS_LOGMNR.END_LOGMNR; END;";

const CONTENTS_COLUMNS: &str = "SCN, TIMESTAMP, OPERATION, OPERATION_CODE, SEG_OWNER, TABLE_NAME, SQL_REDO, SQL_UNDO, CSF, ROLLBACK, XIDUSN, XIDSLT, XIDSQN, ROW_ID";

/// Rows of `[:start_scn, :end_scn)`. Transaction markers carry no owner, so they bypass the owner filter.
pub fn range_contents(schema_count: usize, table_count: usize) -> String {
    let mut sql = format!(
        "SELECT {CONTENTS_COLUMNS} FROM V$LOGMNR_CONTENTS
WHERE SCN >= :start_scn AND SCN < :end_scn AND OPERATION_CODE IN (1, 2, 3, 5, 7, 36)"
    );
    let mut filters = vec![];
    if schema_count > 0 {
        filters.push(format!("SEG_OWNER IN ({})", placeholders("schema", schema_count)));
    }
    if table_count > 0 {
        filters.push(format!(
            "(OPERATION_CODE = 5 OR TABLE_NAME IN ({}))",
            placeholders("tbl", table_count)
        ));
    }
    if !filters.is_empty() {
        sql.push_str(&format!(
            " AND (OPERATION_CODE IN (7, 36) OR ({}))",
            filters.join(" AND ")
        ));
    }
    sql
}

/// Non rollback inserts and updates of one transaction in `[:start_scn, :end_scn]`.
pub fn transaction_contents(with_table: bool) -> String {
    let mut sql = format!(
        "SELECT {CONTENTS_COLUMNS} FROM V$LOGMNR_CONTENTS
WHERE XIDUSN = :usn AND XIDSLT = :slot AND XIDSQN = :sqn
    AND ROLLBACK = 0 AND OPERATION_CODE IN (1, 3)
    AND SCN >= :start_scn AND SCN <= :end_scn"
    );
    if with_table {
        sql.push_str(" AND TABLE_NAME = :tbl");
    }
    sql
}

fn placeholders(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!(":{prefix}{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
