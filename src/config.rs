//! Configuration for TetherKV
//!
//! Centralized configuration with sensible defaults.

/// Default number of keys returned by a `list` call when the request does
/// not specify a count.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 256;

/// Configuration for the server-side service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Prefix prepended to every exported method name, allowing multiple
    /// service instances to coexist on one channel.
    pub prefix: String,

    /// Page size used by `list` when the client sends a zero count.
    pub list_page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Create a new service config builder
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

/// Builder for ServiceConfig
#[derive(Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Set the method name prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the default `list` page size
    pub fn list_page_size(mut self, size: usize) -> Self {
        self.config.list_page_size = size;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

/// Configuration for the client stub
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Prefix prepended to every called method name; must match the prefix
    /// the target service was registered with.
    pub prefix: String,
}

impl ClientConfig {
    /// Create a new client config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the method name prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
