//! 站点数据模型与接口响应结构。

use serde::Deserialize;

/// 搜索结果里的一部番剧。id 即接口返回的 session 字段，跨会话稳定，
/// 是后续一切查询的主键。
#[derive(Debug, Clone)]
pub struct Anime {
    pub id: String,
    pub title: String,
    pub episode_count: u32,
}

/// 详情页抓取结果。
#[derive(Debug, Clone, Default)]
pub struct AnimeDetails {
    pub title: String,
    pub synopsis: String,
    pub poster_url: Option<String>,
    pub genres: Vec<String>,
    pub release_year: Option<u32>,
    pub airing_status: AiringStatus,
}

/// 播出状态：详情页上有 "Currently Airing" 标记则为连载中；
/// 没有任何集数标记视为未播出；其余为已完结。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiringStatus {
    Ongoing,
    Upcoming,
    #[default]
    Finished,
}

impl AiringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiringStatus::Ongoing => "连载中",
            AiringStatus::Upcoming => "未播出",
            AiringStatus::Finished => "已完结",
        }
    }
}

/// 一集。session 用于拼接播放页 URL，集序号来自列表接口。
/// 解析完成后不再变化。
#[derive(Debug, Clone)]
pub struct Episode {
    pub session: String,
    pub number: u32,
    pub title: Option<String>,
}

// ── 接口响应结构 ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub data: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchEntry {
    pub session: String,
    pub title: String,
    #[serde(default)]
    pub episodes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleasePage {
    #[serde(default)]
    pub data: Vec<ReleaseEntry>,
    /// 为空表示这是最后一页。
    #[serde(default)]
    pub next_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseEntry {
    pub session: String,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

// ── 画质链接表 ──────────────────────────────────────────────────

/// 某一集播放页上的画质标签 → 中间下载页链接。
///
/// 按页面出现顺序保存，同画质同音轨只记首个，这样回退选择
/// “第一个可用项”是确定性的。链接会过期，每集现抓现用，不做缓存。
#[derive(Debug, Clone, Default)]
pub struct QualityLinks {
    entries: Vec<QualityLink>,
}

#[derive(Debug, Clone)]
pub struct QualityLink {
    /// `\d{3,4}p` 形式的画质标签，如 "1080p"。
    pub quality: String,
    /// 链接的完整可见文本，带音轨等附加标记。
    pub label: String,
    pub url: String,
}

impl QualityLink {
    /// 可见文本里带 eng 标记的条目视为英配轨。
    pub fn is_dub(&self) -> bool {
        self.label.to_ascii_lowercase().contains("eng")
    }
}

impl QualityLinks {
    pub fn push(&mut self, quality: String, label: String, url: String) {
        let dub = label.to_ascii_lowercase().contains("eng");
        if self
            .entries
            .iter()
            .any(|e| e.quality == quality && e.is_dub() == dub)
        {
            return;
        }
        self.entries.push(QualityLink {
            quality,
            label,
            url,
        });
    }

    /// 选链接：先按音轨偏好圈定候选（偏好落空时回退全部条目），
    /// 再在候选里找画质精确命中，没有就取第一个候选。
    /// 画质缺货不是错误，调用方可据返回条目的 quality 字段判断是否发生了替换。
    pub fn select(&self, quality: &str, prefer_dub: bool) -> Option<&QualityLink> {
        let preferred: Vec<&QualityLink> =
            self.entries.iter().filter(|e| e.is_dub() == prefer_dub).collect();
        let candidates = if preferred.is_empty() {
            self.entries.iter().collect::<Vec<_>>()
        } else {
            preferred
        };
        candidates
            .iter()
            .find(|e| e.quality == quality)
            .copied()
            .or_else(|| candidates.first().copied())
    }

    pub fn has_dub(&self) -> bool {
        self.entries.iter().any(QualityLink::is_dub)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QualityLink> {
        self.entries.iter()
    }
}
