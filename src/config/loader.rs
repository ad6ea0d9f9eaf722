use super::wiring::WiringConfig;
use crate::errors::ConfigError;
use std::{env, fs, path::Path, path::PathBuf};

/// 默认配置文件名
pub const CONFIG_FILE_NAME: &str = "scopewire.toml";

/// 覆盖日志级别的环境变量
pub const LOG_ENV_VAR: &str = "SCOPEWIRE_LOG";

/// 装配配置加载器：从文件读取，再用环境变量覆盖
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// 以当前目录为基准
    pub fn new() -> Self {
        Self { base_path: None }
    }

    /// 以指定目录为基准（测试用）
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
        }
    }

    /// 相对路径相对于基准目录解析
    pub fn resolve_path(&self, file: impl AsRef<Path>) -> PathBuf {
        let file = file.as_ref();
        match &self.base_path {
            Some(base) if file.is_relative() => base.join(file),
            _ => file.to_path_buf(),
        }
    }

    /// 加载指定文件
    pub fn load(&self, file: impl AsRef<Path>) -> Result<WiringConfig, ConfigError> {
        let path = self.resolve_path(file);
        let origin = path.to_string_lossy().to_string();
        let content =
            fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(origin.clone(), e))?;

        let mut config = WiringConfig::parse(&content, &origin)?;
        self.apply_env(&mut config)?;
        tracing::debug!(path = %origin, services = config.services.len(), "装配配置已加载");
        Ok(config)
    }

    /// 加载基准目录下的 `scopewire.toml`；文件不存在时返回 None
    pub fn load_default(&self) -> Result<Option<WiringConfig>, ConfigError> {
        let path = self.resolve_path(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        self.load(path).map(Some)
    }

    fn apply_env(&self, config: &mut WiringConfig) -> Result<(), ConfigError> {
        if let Ok(level) = env::var(LOG_ENV_VAR) {
            config.logging.level = level;
            config.logging.to_logging_config().map_err(|_| {
                ConfigError::Invalid(
                    LOG_ENV_VAR.to_string(),
                    format!("unknown level '{}'", config.logging.level),
                )
            })?;
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
