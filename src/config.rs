//! Runtime configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a [`RuntimeContext`](crate::runtime::RuntimeContext)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// First address of the native memory image (default: 0x1000)
    pub memory_base: u64,
    /// Size of the native memory image in bytes (default: 1 MiB)
    pub memory_size: usize,
    /// Stack region handed to each executing thread (default: 64 KiB)
    pub stack_size: u64,
    /// Memoize the taken branch per call site (default: true)
    pub inline_caching: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_base: 0x1000,
            memory_size: 1 << 20,
            stack_size: 64 * 1024,
            inline_caching: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON, filling absent fields with defaults
    ///
    /// # Example
    /// ```
    /// use llir_runtime::RuntimeConfig;
    ///
    /// let config = RuntimeConfig::from_json(r#"{ "memory_size": 4096 }"#).unwrap();
    /// assert_eq!(config.memory_size, 4096);
    /// assert!(config.inline_caching);
    /// ```
    pub fn from_json(source: &str) -> Result<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot back a runtime
    pub fn validate(&self) -> Result<()> {
        if self.memory_size == 0 {
            return Err(Error::Config("memory_size must be non-zero".to_string()));
        }
        if self.stack_size == 0 {
            return Err(Error::Config("stack_size must be non-zero".to_string()));
        }
        if self.memory_base.checked_add(self.memory_size as u64).is_none() {
            return Err(Error::Config(format!(
                "memory image at 0x{:x} overflows the address space",
                self.memory_base
            )));
        }
        Ok(())
    }

    /// Builder-style toggle for call-site caching
    pub fn with_inline_caching(mut self, enabled: bool) -> Self {
        self.inline_caching = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_rejects_zero_memory() {
        let result = RuntimeConfig::from_json(r#"{ "memory_size": 0 }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(RuntimeConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_from_json_overrides() {
        let config =
            RuntimeConfig::from_json(r#"{ "stack_size": 128, "inline_caching": false }"#).unwrap();
        assert_eq!(config.stack_size, 128);
        assert!(!config.inline_caching);
        assert_eq!(config.memory_base, 0x1000);
    }
}
