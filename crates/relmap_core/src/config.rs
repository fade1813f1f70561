//! Factory configuration.

/// What to do about backing tables when a factory starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Create any table the registry maps that the store lacks.
    #[default]
    CreateIfMissing,
    /// Require every mapped table to exist already.
    Validate,
    /// Touch nothing; the caller manages the schema.
    None,
}

/// Configuration for a [`crate::SessionFactory`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the cross-session second-level cache is enabled.
    pub second_level_cache: bool,

    /// Maximum number of cached query result sets. When the cache is
    /// full it is cleared wholesale; entries are invalidated by table
    /// writes long before capacity matters in practice.
    pub query_cache_capacity: usize,

    /// Schema-generation policy applied at factory startup.
    pub schema_policy: SchemaPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            second_level_cache: true,
            query_cache_capacity: 256,
            schema_policy: SchemaPolicy::CreateIfMissing,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the second-level cache.
    #[must_use]
    pub const fn second_level_cache(mut self, enabled: bool) -> Self {
        self.second_level_cache = enabled;
        self
    }

    /// Sets the query result cache capacity. Zero disables result caching
    /// entirely, including for hinted queries.
    #[must_use]
    pub const fn query_cache_capacity(mut self, capacity: usize) -> Self {
        self.query_cache_capacity = capacity;
        self
    }

    /// Sets the schema-generation policy.
    #[must_use]
    pub const fn schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = policy;
        self
    }
}
