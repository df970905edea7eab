//! Family pipeline registry
//!
//! Maps a configured pipeline kind to a constructor. The mapping is a plain
//! static table: adding a family means adding a line here, and an unknown
//! kind is a configuration error rather than a runtime import failure.

use crate::adapters::postgres::PostgresClient;
use crate::core::family::fastening::FasteningPipeline;
use crate::core::family::riveting::RivetingPipeline;
use crate::core::family::traits::FamilyPipeline;
use crate::domain::ids::Family;
use crate::domain::{AnvilError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Constructor for one pipeline kind.
pub type PipelineCtor = fn(Arc<PostgresClient>, Family) -> Arc<dyn FamilyPipeline>;

/// Explicit kind -> constructor registry.
pub struct FamilyRegistry {
    ctors: BTreeMap<&'static str, PipelineCtor>,
}

impl FamilyRegistry {
    /// Registry with the built-in pipeline kinds.
    pub fn builtin() -> Self {
        let mut registry = Self {
            ctors: BTreeMap::new(),
        };
        registry.register("fastening", make_fastening);
        registry.register("riveting", make_riveting);
        registry
    }

    /// Register a pipeline kind.
    pub fn register(&mut self, kind: &'static str, ctor: PipelineCtor) {
        self.ctors.insert(kind, ctor);
    }

    /// Construct a pipeline for a configured family.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown kind.
    pub fn create(
        &self,
        kind: &str,
        client: Arc<PostgresClient>,
        family: Family,
    ) -> Result<Arc<dyn FamilyPipeline>> {
        let ctor = self.ctors.get(kind).ok_or_else(|| {
            AnvilError::Configuration(format!(
                "Unknown family kind '{kind}'. Known kinds: {}",
                self.kinds().join(", ")
            ))
        })?;
        Ok(ctor(client, family))
    }

    /// Known pipeline kinds, sorted
    pub fn kinds(&self) -> Vec<&'static str> {
        self.ctors.keys().copied().collect()
    }
}

fn make_fastening(client: Arc<PostgresClient>, family: Family) -> Arc<dyn FamilyPipeline> {
    Arc::new(FasteningPipeline::new(client, family))
}

fn make_riveting(client: Arc<PostgresClient>, family: Family) -> Arc<dyn FamilyPipeline> {
    Arc::new(RivetingPipeline::new(client, family))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DatabaseConfig;
    use crate::config::secret_string;
    use std::str::FromStr;

    fn test_client() -> Arc<PostgresClient> {
        Arc::new(
            PostgresClient::new(&DatabaseConfig {
                host: "localhost".into(),
                port: 5432,
                dbname: "equipment".into(),
                user: "anvil".into(),
                password: secret_string("x".into()),
                max_connections: 2,
                connection_timeout_seconds: 1,
                statement_timeout_seconds: 1,
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = FamilyRegistry::builtin();
        assert_eq!(registry.kinds(), vec!["fastening", "riveting"]);
    }

    #[test]
    fn test_create_known_kind() {
        let registry = FamilyRegistry::builtin();
        let pipeline = registry
            .create(
                "fastening",
                test_client(),
                Family::from_str("fastening").unwrap(),
            )
            .unwrap();
        assert_eq!(pipeline.family().as_str(), "fastening");
    }

    #[test]
    fn test_create_unknown_kind() {
        let registry = FamilyRegistry::builtin();
        let result = registry.create(
            "welding",
            test_client(),
            Family::from_str("welding").unwrap(),
        );
        assert!(matches!(result, Err(AnvilError::Configuration(_))));
    }
}
