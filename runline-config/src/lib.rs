use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "RUNLINE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub stations: StationConfig,
    #[serde(default)]
    pub proximity: ProximityConfig,
    #[serde(default)]
    pub offsets: OffsetConfig,
    #[serde(default)]
    pub callouts: CalloutConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `RUNLINE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 命令行显式给出的路径优先，否则走 [`AppConfig::discover`]。
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => Self::discover(),
        }
    }

    /// 检查数值项是否落在可用范围内。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("stations.interval", self.stations.interval),
            ("stations.text_height", self.stations.text_height),
            ("stations.flip_distance", self.stations.flip_distance),
            ("proximity.text_height", self.proximity.text_height),
            ("proximity.tolerance", self.proximity.tolerance),
            ("offsets.narrow_threshold", self.offsets.narrow_threshold),
            ("callouts.matchline_offset", self.callouts.matchline_offset),
            ("callouts.matchline_text_height", self.callouts.matchline_text_height),
            ("callouts.span_text_height", self.callouts.span_text_height),
        ];
        for (key, value) in positives {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("必须为正数，实际为 {value}"),
                });
            }
        }
        let non_negatives = [
            ("stations.label_offset", self.stations.label_offset),
            ("stations.tick_half_length", self.stations.tick_half_length),
            ("proximity.label_offset", self.proximity.label_offset),
        ];
        for (key, value) in non_negatives {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("不能为负数，实际为 {value}"),
                });
            }
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 间距桩号（`station`、`flip_station`）的默认值。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub interval: f64,
    pub prefer_below: bool,
    pub text_height: f64,
    pub label_offset: f64,
    pub tick_half_length: f64,
    pub flip_distance: f64,
    pub text_style: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            interval: 100.0,
            prefer_below: false,
            text_height: 2.2,
            label_offset: 2.0,
            tick_half_length: 1.5,
            flip_distance: 4.2,
            text_style: "ROMANS".to_string(),
        }
    }
}

/// 块参照桩号（`block_station`）的默认值。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    pub fixed_offset: [f64; 2],
    /// 路径正好朝 -X 方向时使用的偏移。
    pub reversed_offset: [f64; 2],
    pub label_offset: f64,
    pub text_height: f64,
    pub layer: String,
    pub tolerance: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            fixed_offset: [-5.0, 5.0],
            reversed_offset: [3.0, 3.0],
            label_offset: 2.0,
            text_height: 2.0,
            layer: "NPLT".to_string(),
            tolerance: 1e-6,
        }
    }
}

/// 线型名中数字的单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthUnitsConfig {
    #[default]
    Inches,
    Units,
}

/// 管线偏移（`offset_utility`）的默认值。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OffsetConfig {
    pub width_units: WidthUnitsConfig,
    pub narrow_threshold: f64,
    pub narrow_line_type: String,
    pub wide_line_type: String,
    pub storm_layer: String,
    pub storm_edge_layer: String,
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            width_units: WidthUnitsConfig::default(),
            narrow_threshold: 1.5,
            narrow_line_type: "CONTINUOUS".to_string(),
            wide_line_type: "BLDG".to_string(),
            storm_layer: "STORM".to_string(),
            storm_edge_layer: "STORM2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalloutConfig {
    pub matchline_offset: f64,
    pub matchline_text_height: f64,
    pub span_layer: String,
    pub span_text_height: f64,
}

impl Default for CalloutConfig {
    fn default() -> Self {
        Self {
            matchline_offset: 3.75,
            matchline_text_height: 5.0,
            span_layer: "D-OH".to_string(),
            span_text_height: 2.2,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置项 {key} 无效: {message}")]
    Invalid { key: &'static str, message: String },
}
