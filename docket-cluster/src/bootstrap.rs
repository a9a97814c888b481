//! Primary bootstrap
//!
//! Runs once, on the primary, before any worker starts: creates the super
//! tenant on an empty store, writes the root credential to local disk and
//! merges the built-in schema into every stored tenant.

use docket_core::Token;
use docket_db::{DocketDatabase, TenantService};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{ClusterError, ClusterResult};

/// Outcome of a bootstrap run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Super tenant was created by this run
    pub created_super: bool,
    /// Root credential was written by this run
    pub credential_written: bool,
    /// Tenants the built-in schema was merged into
    pub tenants_merged: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RootCredential<'a> {
    tenant: &'a str,
    token: &'a str,
    auth_level: String,
}

/// Bootstrap the store
///
/// An empty store next to an existing credential file is refused: the new
/// root token could not be written and the old one no longer authorizes.
pub async fn bootstrap_primary(
    database: Arc<DocketDatabase>,
    credential_path: &Path,
) -> ClusterResult<BootstrapReport> {
    if database.tenants.is_empty().await? && tokio::fs::try_exists(credential_path).await? {
        return Err(ClusterError::Config(format!(
            "root credential {} already exists but the store is empty",
            credential_path.display()
        )));
    }

    let tenants = TenantService::new(database);

    let root = tenants.ensure_super_tenant().await?;
    let credential_written = match &root {
        Some(token) => write_credential(credential_path, token).await?,
        None => false,
    };

    let tenants_merged = tenants.merge_builtins_into_all().await?;
    tracing::info!(
        created_super = root.is_some(),
        tenants = tenants_merged,
        "Bootstrap complete"
    );

    Ok(BootstrapReport {
        created_super: root.is_some(),
        credential_written,
        tenants_merged,
    })
}

/// Write the root credential. An existing file is never overwritten.
async fn write_credential(path: &Path, token: &Token) -> ClusterResult<bool> {
    let credential = RootCredential {
        tenant: token.tenant.as_str(),
        token: &token.value,
        auth_level: token.auth_level.to_string(),
    };
    let body = serde_json::to_vec_pretty(&credential).map_err(std::io::Error::from)?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    match options.open(path).await {
        Ok(mut file) => {
            file.write_all(&body).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
            tracing::info!(path = %path.display(), "Root credential written");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(ClusterError::Config(format!(
            "root credential {} appeared during bootstrap",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_db::MemoryStore;
    use serde_json::Value;

    fn database() -> Arc<DocketDatabase> {
        Arc::new(DocketDatabase::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_first_bootstrap_writes_credential_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.json");
        let database = database();

        let report = bootstrap_primary(database.clone(), &path).await.unwrap();
        assert!(report.created_super);
        assert!(report.credential_written);
        assert_eq!(report.tenants_merged, 1);

        let credential: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(credential["tenant"], "root");
        assert_eq!(credential["authLevel"], "SUPER");
        let value = credential["token"].as_str().unwrap();
        assert!(database.tokens.get(value).await.unwrap().is_some());

        let again = bootstrap_primary(database.clone(), &path).await.unwrap();
        assert!(!again.created_super);
        assert!(!again.credential_written);
    }

    #[tokio::test]
    async fn test_stale_credential_on_empty_store_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.json");
        std::fs::write(&path, "keep").unwrap();
        let database = database();

        let result = bootstrap_primary(database.clone(), &path).await;
        assert!(matches!(result, Err(ClusterError::Config(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep");
        assert!(database.tenants.is_empty().await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_credential_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.json");
        bootstrap_primary(database(), &path).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
