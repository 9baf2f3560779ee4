//! Config lookup for landed files
//!
//! Files are matched to a config entry by their directory prefix: the
//! path truncated just after its last `/`.

use datapump_common::{ConfigRecord, Result};

/// Lookup of per-(service, path prefix) ingestion settings.
pub trait ConfigStore: Send + Sync {
    /// Fetch the config entry, or [`PumpError::ConfigNotFound`] when the
    /// pair has no row.
    ///
    /// [`PumpError::ConfigNotFound`]: datapump_common::PumpError::ConfigNotFound
    fn fetch(&self, service: &str, path_prefix: &str) -> Result<ConfigRecord>;
}

/// Directory prefix used as the config lookup key.
pub fn config_prefix(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..=index],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_prefix_keeps_trailing_slash() {
        assert_eq!(
            config_prefix("s3://bucket/landing/tab/test.tsv"),
            "s3://bucket/landing/tab/"
        );
        assert_eq!(config_prefix("/mnt/nas/data.csv"), "/mnt/nas/");
        assert_eq!(config_prefix("data.csv"), "");
    }
}
