//! 中间下载页直链解析（混淆还原算法）。
//!
//! 中间页脚本里内嵌一段形如 `("<fullKey>", _, "<alphabet>", v1, v2, _)` 的
//! 六参数调用。fullKey 先按分隔符拆段；每段把字母表字符替换成其下标的
//! 十进制数字串，按 v2 为基数求值，再经字母表前 10 个符号做十进制字形
//! 规范化；减去 v1 得到一个码点。逐段拼接即还原出一段带 form 的 HTML，
//! 对 form 的 action 带 `_token` 发 POST，响应的 Location 头就是最终直链。
//!
//! 该算法与站点的具体混淆版本强绑定，站点改版时需要在这里跟进。

use std::sync::OnceLock;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{LOCATION, REFERER};
use scraper::{Html, Selector};
use tracing::debug;

use crate::errors::SiteError;

/// 单次解析提取出的混淆参数，只在当次解析中使用，不跨集复用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CipherParams {
    pub full_key: String,
    pub alphabet: String,
    pub v1: u64,
    pub v2: u64,
}

fn re_cipher_call() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"\("(\w+)",(\d+),"(\w+)",(\d+),(\d+),(\d+)\)"#).unwrap())
}

fn sel_form() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("form").unwrap())
}

fn sel_input() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("input").unwrap())
}

pub struct LinkResolver {
    client: Client,
    /// POST 专用：不跟随重定向。Location 头本身就是要取的直链，
    /// 跟随过去就变成直接拉流了。
    post_client: Client,
}

impl LinkResolver {
    pub fn new(client: Client, post_client: Client) -> Self {
        Self {
            client,
            post_client,
        }
    }

    /// 把中间下载页解析成最终直链。内部不做重试，网络错误原样抛给调用方。
    pub fn resolve(&self, page_url: &str) -> Result<String, SiteError> {
        // 站点要求 Referer 指向页面自身，缺了会被拒绝
        let page = self
            .client
            .get(page_url)
            .header(REFERER, page_url)
            .send()?
            .error_for_status()?
            .text()?;

        let params = extract_cipher_params(&page)?;
        let fragment = decode_fragment(&params)?;
        let (action, token) = extract_form_target(&fragment)?;
        debug!(target: "resolve", "token 表单目标: {}", action);

        let resp = self
            .post_client
            .post(&action)
            .header(REFERER, page_url)
            .form(&[("_token", token.as_str())])
            .send()?;

        resp.headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                SiteError::Resolution(
                    "POST 响应没有 Location 重定向头（token 失效或方案漂移）".to_string(),
                )
            })
    }
}

// ── 参数提取与纯解码（无 I/O，单独可测） ────────────────────────

pub(crate) fn extract_cipher_params(page: &str) -> Result<CipherParams, SiteError> {
    let caps = re_cipher_call().captures(page).ok_or_else(|| {
        SiteError::Resolution("页面里没有找到混淆参数调用（站点可能已改版）".to_string())
    })?;
    Ok(CipherParams {
        full_key: caps[1].to_string(),
        alphabet: caps[3].to_string(),
        v1: caps[4].parse().unwrap_or(0),
        v2: caps[5].parse().unwrap_or(0),
    })
}

/// 还原被混淆的 HTML 片段。
pub(crate) fn decode_fragment(params: &CipherParams) -> Result<String, SiteError> {
    let alphabet: Vec<char> = params.alphabet.chars().collect();
    if alphabet.len() < 10 || params.v2 == 0 {
        return Err(SiteError::Resolution(format!(
            "混淆参数不合法: 字母表长度 {}，v2 = {}",
            alphabet.len(),
            params.v2
        )));
    }
    let delimiter = alphabet[(params.v2 as usize) % alphabet.len()];

    let mut out = String::new();
    for run in params.full_key.split(delimiter) {
        if run.is_empty() {
            continue;
        }
        let digits = substitute_indices(run, &alphabet);
        let value = normalize_radix(&digits, params.v2, &alphabet[..10]);
        let code = value.checked_sub(params.v1).ok_or_else(|| {
            SiteError::Resolution(format!("解码得到负的码点（v1 = {}）", params.v1))
        })?;
        let ch = u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SiteError::Resolution(format!("解码得到非法码点 {code}")))?;
        out.push(ch);
    }
    Ok(out)
}

/// 把一段密文替换成“字母表下标的十进制数字串”。不在字母表里的字符原样保留。
fn substitute_indices(run: &str, alphabet: &[char]) -> String {
    let mut digits = String::with_capacity(run.len() * 2);
    for ch in run.chars() {
        match alphabet.iter().position(|&c| c == ch) {
            Some(idx) => digits.push_str(&idx.to_string()),
            None => digits.push(ch),
        }
    }
    digits
}

/// 数字串按 base 求值（最右为最低位），再用字母表前 10 个符号当十进制
/// 字形写出、按字形下标读回，得到规范化后的数值。
fn normalize_radix(digits: &str, base: u64, glyphs: &[char]) -> u64 {
    let mut value: u64 = 0;
    for (pos, ch) in digits.chars().rev().enumerate() {
        let digit = ch.to_digit(10).unwrap_or(0) as u64;
        value = value.saturating_add(digit.saturating_mul(base.saturating_pow(pos as u32)));
    }
    if value == 0 {
        return 0;
    }

    let mut rendered = Vec::new();
    let mut rest = value;
    while rest > 0 {
        rendered.push(glyphs[(rest % 10) as usize]);
        rest /= 10;
    }
    rendered.iter().rev().fold(0u64, |acc, ch| {
        let digit = glyphs.iter().position(|g| g == ch).unwrap_or(0) as u64;
        acc * 10 + digit
    })
}

/// 从还原出的 HTML 片段里取表单目标与一次性 token。
pub(crate) fn extract_form_target(fragment: &str) -> Result<(String, String), SiteError> {
    let doc = Html::parse_fragment(fragment);
    let form = doc
        .select(sel_form())
        .next()
        .ok_or_else(|| SiteError::Resolution("还原内容里没有 form 元素".to_string()))?;
    let action = form
        .value()
        .attr("action")
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SiteError::Resolution("form 缺少 action 属性".to_string()))?;
    let input = form
        .select(sel_input())
        .next()
        .ok_or_else(|| SiteError::Resolution("form 里没有 input 元素".to_string()))?;
    let token = input
        .value()
        .attr("value")
        .map(str::to_string)
        .ok_or_else(|| SiteError::Resolution("input 缺少 value 属性".to_string()))?;
    Ok((action, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ+/";

    /// 按文档算法的逆过程正向加密，用于回环测试。
    /// 每个码点加 v1 后转成 v2 进制，每一位用字母表里对应下标的字符表示，
    /// 段与段之间用 alphabet[v2 % len] 分隔。
    fn encode_fragment(plain: &str, alphabet: &str, v1: u64, v2: u64) -> String {
        let chars: Vec<char> = alphabet.chars().collect();
        let delimiter = chars[(v2 as usize) % chars.len()];
        let mut out = String::new();
        for ch in plain.chars() {
            let mut value = ch as u64 + v1;
            let mut digits = Vec::new();
            if value == 0 {
                digits.push(0);
            }
            while value > 0 {
                digits.push((value % v2) as usize);
                value /= v2;
            }
            for &d in digits.iter().rev() {
                out.push(chars[d]);
            }
            out.push(delimiter);
        }
        out
    }

    #[test]
    fn decode_round_trip() {
        let plain = r#"<form action="https://example.net/d/xyz" method="POST"><input type="hidden" name="_token" value="tok-123"/></form>"#;
        let (v1, v2) = (5u64, 8u64);
        let params = CipherParams {
            full_key: encode_fragment(plain, ALPHABET, v1, v2),
            alphabet: ALPHABET.to_string(),
            v1,
            v2,
        };
        assert_eq!(decode_fragment(&params).unwrap(), plain);
    }

    #[test]
    fn decode_round_trip_base_ten() {
        let plain = "Episode 05 direct link";
        let (v1, v2) = (17u64, 10u64);
        let params = CipherParams {
            full_key: encode_fragment(plain, ALPHABET, v1, v2),
            alphabet: ALPHABET.to_string(),
            v1,
            v2,
        };
        assert_eq!(decode_fragment(&params).unwrap(), plain);
    }

    #[test]
    fn decode_rejects_bad_params() {
        let params = CipherParams {
            full_key: "abc".to_string(),
            alphabet: ALPHABET.to_string(),
            v1: 0,
            v2: 0,
        };
        assert!(matches!(
            decode_fragment(&params),
            Err(SiteError::Resolution(_))
        ));
    }

    #[test]
    fn extract_params_from_page_text() {
        let page = r#"<script>eval(function(p,a,c,k,e,d){...}("kz36l2j8",41,"0123456789abcdefghij",13,8,22));</script>"#;
        let params = extract_cipher_params(page).unwrap();
        assert_eq!(params.full_key, "kz36l2j8");
        assert_eq!(params.alphabet, "0123456789abcdefghij");
        assert_eq!(params.v1, 13);
        assert_eq!(params.v2, 8);
    }

    #[test]
    fn extract_params_missing_is_resolution_error() {
        let err = extract_cipher_params("<html>nothing obfuscated here</html>").unwrap_err();
        assert!(matches!(err, SiteError::Resolution(_)));
    }

    #[test]
    fn form_target_extraction() {
        let fragment = r#"<form action="https://example.net/d/abc"><input type="hidden" name="_token" value="one-time"/></form>"#;
        let (action, token) = extract_form_target(fragment).unwrap();
        assert_eq!(action, "https://example.net/d/abc");
        assert_eq!(token, "one-time");
    }

    #[test]
    fn form_target_requires_form_action_and_value() {
        assert!(extract_form_target("<p>no form</p>").is_err());
        assert!(extract_form_target(r#"<form><input value="x"/></form>"#).is_err());
        assert!(extract_form_target(r#"<form action="https://a"><input type="hidden"/></form>"#).is_err());
    }
}
