//! 应用配置
//!
//! 默认值可在构建时通过环境变量覆盖（`option_env!`，在 WASM 中没有运行时环境变量）：
//! - `AGRIWASTE_API_BASE_URL`
//! - `AGRIWASTE_FIREBASE_API_KEY`
//! - `AGRIWASTE_LOG_LEVEL`

use log::LevelFilter;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// 后端 REST 服务地址（不含结尾 `/`）
    pub api_base_url: String,
    /// Firebase Web API Key
    pub firebase_api_key: String,
    /// 普通请求超时
    pub request_timeout: Duration,
    /// 完整分析模式下每个阶段的超时
    pub stage_timeout: Duration,
    /// 仪表盘汇总请求超时
    pub dashboard_timeout: Duration,
    /// 本地会话缓存有效期
    pub session_ttl: Duration,
    /// 内存 API 缓存有效期
    pub api_cache_ttl: Duration,
    /// 启动时既无提供方用户也无缓存时，结束加载前的等待时间
    pub auth_grace_delay: Duration,
    /// 仪表盘最近活动条数
    pub activity_limit: u32,
    pub log_level: LevelFilter,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            firebase_api_key: String::new(),
            request_timeout: Duration::from_secs(5),
            stage_timeout: Duration::from_millis(3_000),
            dashboard_timeout: Duration::from_millis(1_500),
            session_ttl: Duration::from_millis(604_800_000),
            api_cache_ttl: Duration::from_secs(300),
            auth_grace_delay: Duration::from_millis(100),
            activity_limit: 10,
            log_level: LevelFilter::Info,
        }
    }
}

impl AppConfig {
    /// 读取构建时注入的覆盖项
    pub fn from_build_env() -> Self {
        Self::default().with_overrides(
            option_env!("AGRIWASTE_API_BASE_URL"),
            option_env!("AGRIWASTE_FIREBASE_API_KEY"),
            option_env!("AGRIWASTE_LOG_LEVEL"),
        )
    }

    fn with_overrides(
        mut self,
        base_url: Option<&str>,
        api_key: Option<&str>,
        log_level: Option<&str>,
    ) -> Self {
        if let Some(url) = base_url.map(str::trim).filter(|u| !u.is_empty()) {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = api_key {
            self.firebase_api_key = key.to_string();
        }
        if let Some(level) = log_level.and_then(|l| LevelFilter::from_str(l).ok()) {
            self.log_level = level;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.session_ttl, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.stage_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_overrides_trim_and_ignore_garbage() {
        let config = AppConfig::default().with_overrides(
            Some("https://api.agriwaste.in/"),
            Some("key-123"),
            Some("not-a-level"),
        );
        assert_eq!(config.api_base_url, "https://api.agriwaste.in");
        assert_eq!(config.firebase_api_key, "key-123");
        assert_eq!(config.log_level, LevelFilter::Info);

        let config = AppConfig::default().with_overrides(Some("  "), None, Some("debug"));
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.log_level, LevelFilter::Debug);
    }
}
