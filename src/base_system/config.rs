//! 配置文件读写与带注释生成。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("serialize error: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];
}

/// 读取配置；文件不存在时写出带注释的默认配置。
/// 字段全部带 serde 默认值，旧配置缺字段会用默认值补齐并回写文件。
pub fn load_or_create<T: ConfigSpec>(config_path: Option<&Path>) -> Result<T, ConfigError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(T::FILE_NAME));
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    if !path.exists() {
        let config = T::default();
        write_with_comments(&config, &path)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config: T = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    if missing_any_field::<T>(&raw) {
        write_with_comments(&config, &path)?;
    }
    Ok(config)
}

pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    let yaml = render_with_comments(config)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// 逐字段输出 `# 描述` + `key: value`。
fn render_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|e| ConfigError::Serialize(e.to_string()))?;
    let serde_yaml::Value::Mapping(mapping) = value else {
        return Err(ConfigError::Serialize(
            "config 必须序列化为映射".to_string(),
        ));
    };

    let mut out = String::new();
    for field in T::fields() {
        out.push_str(&format!("# {}\n", field.description));
        let key = serde_yaml::Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(serde_yaml::Value::Null);
        let line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        out.push_str(line.trim());
        out.push('\n');
    }
    Ok(out)
}

fn missing_any_field<T: ConfigSpec>(raw: &str) -> bool {
    let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str::<serde_yaml::Value>(raw)
    else {
        return true;
    };
    T::fields()
        .iter()
        .any(|f| !map.contains_key(serde_yaml::Value::String(f.name.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::Config;

    #[test]
    fn creates_commented_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");

        let config = load_or_create::<Config>(Some(&path)).unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.preferred_quality, "720p");

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("# 同时下载的集数上限"));
        assert!(raw.contains("max_workers: 2"));
    }

    #[test]
    fn partial_file_is_filled_with_defaults_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "max_workers: 4\n").unwrap();

        let config = load_or_create::<Config>(Some(&path)).unwrap();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.preferred_audio, "sub");

        // 缺字段的旧文件应被补齐
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("max_workers: 4"));
        assert!(raw.contains("preferred_audio: sub"));
    }

    #[test]
    fn reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");

        let first = load_or_create::<Config>(Some(&path)).unwrap();
        let second = load_or_create::<Config>(Some(&path)).unwrap();
        assert_eq!(first.base_url, second.base_url);
        assert_eq!(first.save_path, second.save_path);
    }
}
