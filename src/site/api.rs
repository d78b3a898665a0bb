//! 站点 JSON 接口客户端：搜索与分集列表分页。

use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::errors::SiteError;

use super::models::{Anime, Episode, ReleasePage, SearchResponse};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 按关键字搜索番剧。查询串原样传给远端（只做 URL 编码），
    /// 远端返回什么就是什么，包括空结果。
    pub fn search(&self, query: &str) -> Result<Vec<Anime>, SiteError> {
        debug!(target: "site", "搜索: {}", query);
        let text = self
            .client
            .get(format!("{}/api", self.base_url))
            .query(&[("m", "search"), ("q", query)])
            .send()?
            .error_for_status()?
            .text()?;
        parse_search(&text)
    }

    /// 拉取完整分集列表：每次调用都从第 1 页重新翻到没有下一页为止。
    ///
    /// 中途某页请求失败不作为致命错误，已收集到的集数原样返回（尽力而为）。
    /// 顺序保持服务端给出的升序，这里不做重排。
    pub fn list_episodes(&self, title_id: &str) -> Vec<Episode> {
        collect_paged(|page| self.fetch_release_page(title_id, page))
    }

    fn fetch_release_page(&self, title_id: &str, page: u32) -> Result<ReleasePage, SiteError> {
        let page_str = page.to_string();
        let text = self
            .client
            .get(format!("{}/api", self.base_url))
            .query(&[
                ("m", "release"),
                ("id", title_id),
                ("sort", "episode_asc"),
                ("page", page_str.as_str()),
            ])
            .send()?
            .error_for_status()?
            .text()?;
        serde_json::from_str(&text)
            .map_err(|e| SiteError::Protocol(format!("分集列表第 {page} 页解析失败: {e}")))
    }
}

fn parse_search(text: &str) -> Result<Vec<Anime>, SiteError> {
    let resp: SearchResponse = serde_json::from_str(text)
        .map_err(|e| SiteError::Protocol(format!("搜索响应解析失败: {e}")))?;
    Ok(resp
        .data
        .into_iter()
        .map(|entry| Anime {
            id: entry.session,
            title: entry.title,
            episode_count: entry.episodes.unwrap_or(0),
        })
        .collect())
}

/// 分页遍历骨架，独立出来便于离线测试翻页终止条件。
fn collect_paged<F>(mut fetch: F) -> Vec<Episode>
where
    F: FnMut(u32) -> Result<ReleasePage, SiteError>,
{
    let mut episodes = Vec::new();
    let mut page = 1u32;
    loop {
        let resp = match fetch(page) {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    target: "site",
                    "分集列表第 {} 页请求失败，保留已收集的 {} 集: {}",
                    page,
                    episodes.len(),
                    err
                );
                break;
            }
        };
        for entry in resp.data {
            episodes.push(Episode {
                session: entry.session,
                number: entry.episode.unwrap_or(0),
                title: entry.title,
            });
        }
        if resp.next_page_url.is_none() {
            break;
        }
        page += 1;
    }
    episodes
}
