//! 全局配置结构（Config）与默认值。
//!
//! 同时提供生成 `config.yml` 注释所需的字段元信息。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 网络配置
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // 下载配置
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_quality")]
    pub preferred_quality: String,
    #[serde(default = "default_audio")]
    pub preferred_audio: String,

    // 路径配置
    #[serde(default)]
    pub save_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            max_workers: default_max_workers(),
            preferred_quality: default_quality(),
            preferred_audio: default_audio(),
            save_path: String::new(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 7] = [
            FieldMeta {
                name: "base_url",
                description: "站点入口地址",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "max_workers",
                description: "同时下载的集数上限",
            },
            FieldMeta {
                name: "preferred_quality",
                description: "优先画质, 如 1080p/720p/480p（缺货时回退第一个可用项）",
            },
            FieldMeta {
                name: "preferred_audio",
                description: "优先音轨, 可选: [sub, dub]",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径（留空表示当前目录）",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn prefer_dub(&self) -> bool {
        self.preferred_audio.eq_ignore_ascii_case("dub")
    }
}

fn default_base_url() -> String {
    "https://animepahe.ru".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36"
        .to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_workers() -> usize {
    2
}

fn default_quality() -> String {
    "720p".to_string()
}

fn default_audio() -> String {
    "sub".to_string()
}

/// 清理出适合当文件/目录名的字符串：替换非法字符、去掉结尾的点和空格、
/// 规避 Windows 保留名、按字符边界截断。
pub fn safe_fs_name(name: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|ch| match ch {
            ':' | '"' | '<' | '>' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 32 => '_',
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }
    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let upper = cleaned.to_uppercase();
    if RESERVED.contains(&upper.as_str()) {
        cleaned = format!("_{cleaned}");
    }

    if cleaned.len() > max_len {
        // 不能在多字节 UTF-8 字符中间截断
        let mut end = max_len;
        while end > 0 && !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_chars_are_replaced() {
        assert_eq!(safe_fs_name("Re:Zero 2nd?", 120), "Re_Zero 2nd_");
        assert_eq!(safe_fs_name("a/b\\c|d", 120), "a_b_c_d");
    }

    #[test]
    fn trailing_dots_and_spaces_are_trimmed() {
        assert_eq!(safe_fs_name("Title... ", 120), "Title");
    }

    #[test]
    fn reserved_names_are_prefixed() {
        assert_eq!(safe_fs_name("CON", 120), "_CON");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let name = safe_fs_name("进击的巨人 最终季", 7);
        assert!(name.len() <= 7);
        assert!(!name.is_empty());
    }

    #[test]
    fn empty_input_gets_placeholder() {
        assert_eq!(safe_fs_name("", 120), "unnamed");
        assert_eq!(safe_fs_name("...", 120), "unnamed");
    }
}
