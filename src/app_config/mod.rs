//! 配置管理模块
//!
//! 进程级配置全部在启动时从环境变量（含 .env）读取，再显式传给各组件。

pub mod env;
pub mod log;

use crate::error::AppError;
use crate::trading::indicator::{BreakGuard, PullbackConfig, DEFAULT_THRESHOLD};

use self::env::{env_f64, env_is_true, env_or_default, env_usize};
use self::log::LogConfig;

/// 应用配置
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub log: LogConfig,
    pub pullback: PullbackConfig,
    pub max_workers: usize,      // 并发检测任务上限
    pub default_asset: String,   // 默认品种
    pub default_interval: String, // 默认周期
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let break_guard = env_or_default("PULLBACK_BREAK_GUARD", "strict")
            .parse::<BreakGuard>()
            .map_err(AppError::Config)?;

        let max_workers = env_usize("MAX_WORKERS", 3);
        if max_workers == 0 {
            return Err(AppError::Config("MAX_WORKERS must be at least 1".to_string()));
        }

        Ok(Self {
            log: LogConfig::from_env(),
            pullback: PullbackConfig {
                threshold: env_f64("PULLBACK_THRESHOLD", DEFAULT_THRESHOLD),
                break_guard,
                mark_pivots: env_is_true("PULLBACK_MARK_PIVOTS", true),
            },
            max_workers,
            default_asset: env_or_default("DEFAULT_ASSET", "GC=F"),
            default_interval: env_or_default("DEFAULT_INTERVAL", "1h"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 只有这一个测试会改动这些变量
    #[test]
    fn test_app_config_from_env() {
        std::env::remove_var("PULLBACK_BREAK_GUARD");
        std::env::remove_var("PULLBACK_THRESHOLD");
        std::env::remove_var("MAX_WORKERS");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.pullback.break_guard, BreakGuard::Strict);
        assert_eq!(config.pullback.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.max_workers, 3);

        std::env::set_var("PULLBACK_BREAK_GUARD", "unguarded");
        std::env::set_var("PULLBACK_THRESHOLD", "2.1");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.pullback.break_guard, BreakGuard::Unguarded);
        assert_eq!(config.pullback.threshold, 2.1);

        std::env::set_var("PULLBACK_BREAK_GUARD", "sometimes");
        assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));

        std::env::set_var("PULLBACK_BREAK_GUARD", "strict");
        std::env::set_var("MAX_WORKERS", "0");
        assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));

        std::env::remove_var("PULLBACK_BREAK_GUARD");
        std::env::remove_var("PULLBACK_THRESHOLD");
        std::env::remove_var("MAX_WORKERS");
    }
}
