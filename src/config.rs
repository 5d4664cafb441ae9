//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for Web Vision, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults matching the hosted deployment
//! - Builder pattern for programmatic configuration
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB_VISION_ORACLE_ENDPOINT` | Oracle API endpoint URL | `https://api.anthropic.com/v1/messages` |
//! | `WEB_VISION_ORACLE_MODEL` | Model name for the oracle | `claude-3-5-sonnet-20241022` |
//! | `WEB_VISION_ORACLE_MAX_TOKENS` | Maximum tokens in oracle response | `4096` |
//! | `WEB_VISION_ORACLE_TIMEOUT` | Activity timeout in seconds | `60` |
//! | `WEB_VISION_ORACLE_CONNECT_TIMEOUT` | Connection timeout in seconds | `10` |
//! | `WEB_VISION_API_KEY` | Oracle API key (fallback: `CLAUDE_API_KEY`) | *(empty)* |
//! | `WEB_VISION_STORE_DIR` | Base directory for the run store | `/tmp/web-vision` |
//! | `WEB_VISION_SCREENSHOT_DIR` | Working directory for screenshots | `screenshots` |
//! | `WEB_VISION_HEADLESS` | Launch the browser headless | `true` |
//!
//! The run entry contract (`JOB_NAME`, `TESTSUITE_ID`) is resolved by the
//! CLI layer, not here.

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default oracle API endpoint
pub const DEFAULT_ORACLE_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Default oracle model name
pub const DEFAULT_ORACLE_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default max tokens for oracle responses
pub const DEFAULT_ORACLE_MAX_TOKENS: u32 = 4096;

/// Default oracle connection timeout (seconds)
pub const DEFAULT_ORACLE_CONNECT_TIMEOUT: u64 = 10;

/// Default oracle activity timeout (seconds)
pub const DEFAULT_ORACLE_ACTIVITY_TIMEOUT: u64 = 60;

/// Default run store base directory
pub const DEFAULT_STORE_DIR: &str = "/tmp/web-vision";

/// Default screenshot working directory
pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

/// Default recorded video width (pixels)
pub const DEFAULT_VIDEO_WIDTH: u32 = 1280;

/// Default recorded video height (pixels)
pub const DEFAULT_VIDEO_HEIGHT: u32 = 720;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the oracle endpoint
pub const ENV_ORACLE_ENDPOINT: &str = "WEB_VISION_ORACLE_ENDPOINT";

/// Environment variable for the oracle model
pub const ENV_ORACLE_MODEL: &str = "WEB_VISION_ORACLE_MODEL";

/// Environment variable for oracle max tokens
pub const ENV_ORACLE_MAX_TOKENS: &str = "WEB_VISION_ORACLE_MAX_TOKENS";

/// Environment variable for the oracle connection timeout
pub const ENV_ORACLE_CONNECT_TIMEOUT: &str = "WEB_VISION_ORACLE_CONNECT_TIMEOUT";

/// Environment variable for the oracle activity timeout
pub const ENV_ORACLE_ACTIVITY_TIMEOUT: &str = "WEB_VISION_ORACLE_TIMEOUT";

/// Environment variable for the oracle API key
pub const ENV_API_KEY: &str = "WEB_VISION_API_KEY";

/// Legacy environment variable for the API key (used by the job launcher)
pub const ENV_API_KEY_LEGACY: &str = "CLAUDE_API_KEY";

/// Environment variable for the store directory
pub const ENV_STORE_DIR: &str = "WEB_VISION_STORE_DIR";

/// Environment variable for the screenshot directory
pub const ENV_SCREENSHOT_DIR: &str = "WEB_VISION_SCREENSHOT_DIR";

/// Environment variable for headless browser mode
pub const ENV_HEADLESS: &str = "WEB_VISION_HEADLESS";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Web Vision
#[derive(Debug, Clone)]
pub struct Config {
    /// Oracle configuration
    pub oracle: OracleSettings,
    /// Run store configuration
    pub store: StoreSettings,
    /// Browser configuration
    pub browser: BrowserSettings,
}

/// Oracle-related settings
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// API key sent with each request
    pub api_key: String,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
    /// Activity timeout during streaming (seconds)
    pub activity_timeout: u64,
}

/// Run-store settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Base directory for suite/pod/log/artifact storage
    pub base_dir: String,
}

/// Browser settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Whether to launch the browser headless
    pub headless: bool,
    /// Working directory for screenshots and the recorded video
    pub screenshot_dir: String,
    /// Recorded video width
    pub video_width: u32,
    /// Recorded video height
    pub video_height: u32,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            oracle: OracleSettings::from_env(),
            store: StoreSettings::from_env(),
            browser: BrowserSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            oracle: OracleSettings::defaults(),
            store: StoreSettings::defaults(),
            browser: BrowserSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl OracleSettings {
    /// Create oracle settings from environment variables
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_ORACLE_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_ORACLE_ENDPOINT.to_string()),
            model: env::var(ENV_ORACLE_MODEL).unwrap_or_else(|_| DEFAULT_ORACLE_MODEL.to_string()),
            max_tokens: env::var(ENV_ORACLE_MAX_TOKENS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ORACLE_MAX_TOKENS),
            api_key: env::var(ENV_API_KEY)
                .or_else(|_| env::var(ENV_API_KEY_LEGACY))
                .unwrap_or_default(),
            connect_timeout: env::var(ENV_ORACLE_CONNECT_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ORACLE_CONNECT_TIMEOUT),
            activity_timeout: env::var(ENV_ORACLE_ACTIVITY_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ORACLE_ACTIVITY_TIMEOUT),
        }
    }

    /// Create oracle settings with defaults
    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            max_tokens: DEFAULT_ORACLE_MAX_TOKENS,
            api_key: String::new(),
            connect_timeout: DEFAULT_ORACLE_CONNECT_TIMEOUT,
            activity_timeout: DEFAULT_ORACLE_ACTIVITY_TIMEOUT,
        }
    }
}

impl StoreSettings {
    /// Create store settings from environment variables
    pub fn from_env() -> Self {
        Self {
            base_dir: env::var(ENV_STORE_DIR).unwrap_or_else(|_| DEFAULT_STORE_DIR.to_string()),
        }
    }

    /// Create store settings with defaults
    pub fn defaults() -> Self {
        Self {
            base_dir: DEFAULT_STORE_DIR.to_string(),
        }
    }
}

impl BrowserSettings {
    /// Create browser settings from environment variables
    pub fn from_env() -> Self {
        Self {
            headless: env::var(ENV_HEADLESS)
                .ok()
                .map(|s| !matches!(s.to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
            screenshot_dir: env::var(ENV_SCREENSHOT_DIR)
                .unwrap_or_else(|_| DEFAULT_SCREENSHOT_DIR.to_string()),
            video_width: DEFAULT_VIDEO_WIDTH,
            video_height: DEFAULT_VIDEO_HEIGHT,
        }
    }

    /// Create browser settings with defaults
    pub fn defaults() -> Self {
        Self {
            headless: true,
            screenshot_dir: DEFAULT_SCREENSHOT_DIR.to_string(),
            video_width: DEFAULT_VIDEO_WIDTH,
            video_height: DEFAULT_VIDEO_HEIGHT,
        }
    }
}

/// Get the oracle endpoint from the global configuration (convenience function)
pub fn oracle_endpoint() -> String {
    get().oracle.endpoint.clone()
}

/// Get the store base directory (convenience function)
pub fn store_base_dir() -> String {
    get().store.base_dir.clone()
}
