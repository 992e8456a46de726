use redo_ingestion_connector::redo_types::log::info;

use super::{client::LogMinerClient, Error, Result};

const DBA_ROLE: &str = "DBA";
const EXECUTE_CATALOG_ROLE: &str = "EXECUTE_CATALOG_ROLE";
const LOGMINING: &str = "LOGMINING";
const REQUIRED_PRIVILEGES: [&str; 4] = [
    "CREATE SESSION",
    LOGMINING,
    "SELECT ANY TRANSACTION",
    "SELECT ANY DICTIONARY",
];

/// Fails with `Error::Permission` unless `user` may run LogMiner.
///
/// `LOGMINING` only exists from 12c on.
pub fn check_privileges(client: &impl LogMinerClient, user: &str) -> Result<()> {
    let roles = client.user_roles()?;
    if contains(&roles, DBA_ROLE) {
        info!("{} has the {} role", user, DBA_ROLE);
        return Ok(());
    }
    if !contains(&roles, EXECUTE_CATALOG_ROLE) {
        return Err(Error::Permission(format!(
            "GRANT {EXECUTE_CATALOG_ROLE} TO {user}"
        )));
    }

    let needs_logmining = client
        .database_info()
        .map_or(true, |info| info.version > 11);
    let granted = client.user_privileges()?;
    let missing = REQUIRED_PRIVILEGES
        .into_iter()
        .filter(|privilege| needs_logmining || *privilege != LOGMINING)
        .filter(|privilege| !contains(&granted, privilege))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(Error::Permission(format!(
            "GRANT {} TO {user}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn contains(granted: &[String], name: &str) -> bool {
    granted.iter().any(|granted| granted.eq_ignore_ascii_case(name))
}
