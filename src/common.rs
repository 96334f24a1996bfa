use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use silvermoon_config::{AppConfig, LogFormat};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{AppMode, Application};
use crate::shutdown::ShutdownManager;

/// 命令行给出的启动参数，未给出的项使用配置文件中的值
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

/// 初始化日志系统
pub fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        LogFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}

/// 加载应用配置，并用命令行参数覆盖日志设置
pub fn load_config(startup_config: &StartupConfig) -> Result<AppConfig> {
    let mut config = AppConfig::load(startup_config.config_path.as_deref())
        .context("加载配置失败")?;

    if let Some(ref level) = startup_config.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(ref format) = startup_config.log_format {
        config.observability.log_format = format
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }

    Ok(config)
}

/// 启动应用程序的通用函数
pub async fn start_application(startup_config: StartupConfig, app_mode: AppMode) -> Result<()> {
    let config = load_config(&startup_config)?;
    init_logging(
        &config.observability.log_level,
        config.observability.log_format,
    )?;

    info!("启动 Silvermoon {}", app_mode.worker_name());
    if let Some(ref path) = startup_config.config_path {
        info!("配置文件: {}", path);
    }
    info!("运行模式: {:?}", app_mode);

    let app = Arc::new(Application::new(config, app_mode).await?);
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 采集器的数据源可能自行结束，此时不再等待信号
    let finished = tokio::select! {
        result = &mut app_handle => Some(result),
        _ = wait_for_shutdown_signal() => None,
    };

    let result = match finished {
        Some(result) => result.context("应用任务异常退出")?,
        None => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;

            match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
                Ok(result) => result.context("应用任务异常退出")?,
                Err(_) => {
                    warn!("{} 关闭超时，强制退出", app.mode().worker_name());
                    Ok(())
                }
            }
        }
    };

    if let Err(ref e) = result {
        error!("应用运行失败: {e:#}");
    }
    info!("Silvermoon 已退出");
    result
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_overrides_logging_settings() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[observability]\nlog_level = \"warn\"\nlog_format = \"json\"").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let from_file = load_config(&StartupConfig {
            config_path: Some(path.clone()),
            ..StartupConfig::default()
        })
        .unwrap();
        assert_eq!(from_file.observability.log_level, "warn");
        assert_eq!(from_file.observability.log_format, LogFormat::Json);

        let overridden = load_config(&StartupConfig {
            config_path: Some(path),
            log_level: Some("debug".to_string()),
            log_format: Some("pretty".to_string()),
        })
        .unwrap();
        assert_eq!(overridden.observability.log_level, "debug");
        assert_eq!(overridden.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = load_config(&StartupConfig {
            config_path: Some("/nonexistent/silvermoon.toml".to_string()),
            ..StartupConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_format_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[analyser]\ntitle_prefix = \"Summary\"").unwrap();

        let result = load_config(&StartupConfig {
            config_path: Some(file.path().to_string_lossy().into_owned()),
            log_format: Some("xml".to_string()),
            ..StartupConfig::default()
        });
        assert!(result.is_err());
    }
}
