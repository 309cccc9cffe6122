use std::time::Duration;

use crate::provider::IsolationLevel;

/// Database engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout applied to opening a physical connection.
    pub connect_timeout: Duration,

    /// Default timeout for a single command; a `DbCommand` timeout overrides
    /// it. `None` means no limit.
    pub command_timeout: Option<Duration>,

    /// Isolation level used when a transaction is opened without one.
    pub default_isolation: IsolationLevel,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            command_timeout: None,
            default_isolation: IsolationLevel::default(),
        }
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Set the default transaction isolation level.
    pub fn default_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.default_isolation = isolation;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be > 0".to_string());
        }

        if matches!(self.command_timeout, Some(t) if t.is_zero()) {
            return Err("command_timeout must be > 0 when set".to_string());
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.command_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::new()
            .connect_timeout(Duration::from_secs(5))
            .command_timeout(Duration::from_secs(10))
            .default_isolation(IsolationLevel::Serializable);

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.default_isolation, IsolationLevel::Serializable);
    }

    #[test]
    fn test_validate() {
        let zero_connect = EngineConfig::new().connect_timeout(Duration::ZERO);
        assert!(zero_connect.validate().is_err());

        let zero_command = EngineConfig::new().command_timeout(Duration::ZERO);
        assert!(zero_command.validate().is_err());
    }
}
