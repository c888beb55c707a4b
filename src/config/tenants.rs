//! Tenant lists from a JSON file or the inline `TENANTS` variable.

use crate::error::ConfigError;
use crate::tenant::TenantConfig;
use std::path::Path;

/// Parse a JSON array of tenant configs.
pub fn parse_tenants_json(source: &str) -> Result<Vec<TenantConfig>, serde_json::Error> {
    serde_json::from_str(source)
}

pub async fn read_tenants_file(path: &Path) -> Result<Vec<TenantConfig>, ConfigError> {
    let file_err = |message: String| ConfigError::TenantsFile {
        path: path.display().to_string(),
        message,
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| file_err(e.to_string()))?;
    parse_tenants_json(&raw).map_err(|e| file_err(e.to_string()))
}

/// Parse `acme=postgres://...;beta=postgres://...`. The display name defaults to the subdomain.
pub fn parse_inline_tenants(source: &str) -> Result<Vec<TenantConfig>, ConfigError> {
    source
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (subdomain, uri) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::TenantEntry(format!("expected subdomain=uri, got '{}'", entry)))?;
            let subdomain = subdomain.trim();
            if subdomain.is_empty() {
                return Err(ConfigError::TenantEntry(format!("missing subdomain in '{}'", entry)));
            }
            Ok(TenantConfig::new(subdomain, uri.trim()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_inline_list() {
        let tenants =
            parse_inline_tenants(" acme=postgres://u:p@localhost/acme ; beta=postgres://localhost/beta?sslmode=disable;")
                .unwrap();
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].subdomain, "acme");
        assert_eq!(tenants[0].connection_uri, "postgres://u:p@localhost/acme");
        assert_eq!(tenants[0].display_name, "acme");
        assert_eq!(tenants[1].connection_uri, "postgres://localhost/beta?sslmode=disable");
    }

    #[test]
    fn rejects_malformed_inline_entries() {
        assert!(matches!(parse_inline_tenants("acme"), Err(ConfigError::TenantEntry(_))));
        assert!(matches!(parse_inline_tenants("=postgres://x"), Err(ConfigError::TenantEntry(_))));
        assert!(parse_inline_tenants("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"subdomain":"acme","connectionUri":"postgres://localhost/acme","displayName":"Acme Coffee"}},
                {{"subdomain":"demo","connectionUri":"postgres://localhost/demo","isActive":false}}
            ]"#
        )
        .unwrap();
        let tenants = read_tenants_file(file.path()).await.unwrap();
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].display_name, "Acme Coffee");
        assert!(!tenants[1].is_active);
    }

    #[tokio::test]
    async fn reports_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = read_tenants_file(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::TenantsFile { .. }));

        let missing = read_tenants_file(Path::new("/nonexistent/tenants.json")).await.unwrap_err();
        assert!(matches!(missing, ConfigError::TenantsFile { .. }));
    }
}
