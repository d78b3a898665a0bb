//! 站点接入层。
//!
//! 子模块：
//! - `models`  — 数据模型与接口响应结构
//! - `api`     — JSON 接口（搜索、分集列表分页）
//! - `pages`   — HTML 页面抓取（详情页、播放页画质链接）
//! - `resolve` — 中间下载页直链解析（混淆还原）

pub mod api;
pub mod models;
pub mod pages;
pub mod resolve;

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

use crate::base_system::context::Config;
use crate::errors::SiteError;

/// 普通请求客户端（跟随重定向）。在 main 里构建一次，注入给各组件。
pub fn build_client(config: &Config) -> Result<Client, SiteError> {
    Ok(client_builder(config).build()?)
}

/// 不跟随重定向的客户端，给直链解析的 POST 用：
/// Location 头本身就是要取的结果。
pub fn build_no_redirect_client(config: &Config) -> Result<Client, SiteError> {
    Ok(client_builder(config)
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

fn client_builder(config: &Config) -> reqwest::blocking::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    if let Ok(ua) = HeaderValue::from_str(&config.user_agent) {
        headers.insert(USER_AGENT, ua);
    }
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout))
}
