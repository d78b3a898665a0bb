//! 站点 HTML 页面抓取：番剧详情页与播放页的画质链接表。
//!
//! 页面结构靠固定选择器，站点改版时在这里跟进。

use std::sync::OnceLock;

use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};

use crate::errors::SiteError;

use super::models::{AiringStatus, AnimeDetails, QualityLinks};

// 编译一次复用的选择器/正则缓存
fn sel_title() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(".title-wrapper h1").unwrap())
}

fn sel_synopsis() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(".anime-synopsis").unwrap())
}

fn sel_poster_preview() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(".youtube-preview").unwrap())
}

fn sel_poster_image() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(".poster-image").unwrap())
}

fn sel_genre() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(".anime-genre a").unwrap())
}

fn sel_season() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(r#"a[href*="/anime/season/"]"#).unwrap())
}

fn sel_airing() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(r#"[title="Currently Airing"]"#).unwrap())
}

fn sel_episode_number() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(".episode-number").unwrap())
}

fn sel_download_item() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse(r#"a.dropdown-item[target="_blank"]"#).unwrap())
}

fn re_quality() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\b(\d{3,4})p\b").unwrap())
}

pub struct PageClient {
    client: Client,
    base_url: String,
}

impl PageClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 抓取番剧详情页：标题、简介、海报、类型、年份、播出状态。
    pub fn fetch_details(&self, title_id: &str) -> Result<AnimeDetails, SiteError> {
        let url = format!("{}/anime/{}", self.base_url, title_id);
        let html = self.get_text(&url)?;
        Ok(parse_details(&html))
    }

    /// 抓取某一集播放页上的画质链接表。
    pub fn fetch_quality_links(
        &self,
        title_id: &str,
        episode_session: &str,
    ) -> Result<QualityLinks, SiteError> {
        let url = format!("{}/play/{}/{}", self.base_url, title_id, episode_session);
        let html = self.get_text(&url)?;
        Ok(parse_quality_links(&html))
    }

    fn get_text(&self, url: &str) -> Result<String, SiteError> {
        Ok(self.client.get(url).send()?.error_for_status()?.text()?)
    }
}

fn parse_details(html: &str) -> AnimeDetails {
    let doc = Html::parse_document(html);

    let title = doc.select(sel_title()).next().map(element_text).unwrap_or_default();
    let synopsis = doc
        .select(sel_synopsis())
        .next()
        .map(element_text)
        .unwrap_or_default();

    let poster_url = doc
        .select(sel_poster_preview())
        .next()
        .or_else(|| doc.select(sel_poster_image()).next())
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string);

    let genres = doc
        .select(sel_genre())
        .filter_map(|el| el.value().attr("title"))
        .map(str::to_string)
        .collect();

    // 发布季节锚点的 title 形如 "Spring 2023"，年份取末尾一段
    let release_year = doc
        .select(sel_season())
        .next()
        .and_then(|el| el.value().attr("title"))
        .and_then(|t| t.split_whitespace().last())
        .and_then(|y| y.parse().ok());

    let airing_status = if doc.select(sel_airing()).next().is_some() {
        AiringStatus::Ongoing
    } else if doc.select(sel_episode_number()).next().is_none() {
        AiringStatus::Upcoming
    } else {
        AiringStatus::Finished
    };

    AnimeDetails {
        title,
        synopsis,
        poster_url,
        genres,
        release_year,
        airing_status,
    }
}

fn parse_quality_links(html: &str) -> QualityLinks {
    let doc = Html::parse_document(html);
    let mut links = QualityLinks::default();
    for el in doc.select(sel_download_item()) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let label = element_text(el);
        // 文本里没有画质标记的条目直接跳过，不视为错误
        let Some(caps) = re_quality().captures(&label) else {
            continue;
        };
        links.push(caps[0].to_string(), label.clone(), href.to_string());
    }
    links
}

fn element_text(el: ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
