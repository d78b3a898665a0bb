//! AnimePahe 番剧批量下载器。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/路径等基础设施
//! - `site`：站点接入（搜索、分集列表、页面抓取、直链解析）
//! - `download`：批量下载编排（工作池、流式落盘、进度）

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

mod base_system;
mod download;
mod errors;
mod site;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::LogSystem;
use download::models::{BatchRequest, OutcomeStatus};
use download::orchestrator::{DownloadOrchestrator, ProgressFn};
use download::progress::BatchProgress;
use download::stream::EpisodeDownloader;
use site::api::ApiClient;
use site::pages::PageClient;
use site::resolve::LinkResolver;

#[derive(Debug, Parser)]
#[command(name = "animepahe-downloader")]
#[command(about = "AnimePahe 番剧批量下载器", version)]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 按关键字搜索番剧
    Search { query: String },
    /// 查看番剧详情与分集数量
    Info { title_id: String },
    /// 批量下载指定范围的集
    Download {
        title_id: String,
        /// 起始集（从 1 开始）
        #[arg(long, default_value_t = 1)]
        start: u32,
        /// 结束集（缺省下载到最后一集）
        #[arg(long)]
        end: Option<u32>,
        /// 画质，如 1080p/720p（缺省读配置）
        #[arg(long)]
        quality: Option<String>,
        /// 同时下载的集数上限（缺省读配置）
        #[arg(long)]
        workers: Option<usize>,
        /// 保存目录（缺省读配置）
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log = LogSystem::init(cli.debug).map_err(|e| anyhow!(e))?;
    let config = load_or_create::<Config>(None).map_err(|e| anyhow!(e.to_string()))?;

    match cli.command {
        Commands::Search { query } => cmd_search(&config, &query),
        Commands::Info { title_id } => cmd_info(&config, &title_id),
        Commands::Download {
            title_id,
            start,
            end,
            quality,
            workers,
            out,
        } => cmd_download(&config, title_id, start, end, quality, workers, out),
    }
}

fn cmd_search(config: &Config, query: &str) -> Result<()> {
    let client = site::build_client(config)?;
    let api = ApiClient::new(client, &config.base_url);

    let results = api
        .search(query)
        .with_context(|| format!("搜索失败: {query}"))?;
    if results.is_empty() {
        println!("未搜索到结果");
        return Ok(());
    }

    println!("===== 搜索结果 =====");
    for (idx, anime) in results.iter().enumerate() {
        println!(
            "{}. {} | ID: {} | {} 集",
            idx + 1,
            anime.title,
            anime.id,
            anime.episode_count
        );
    }
    Ok(())
}

fn cmd_info(config: &Config, title_id: &str) -> Result<()> {
    let client = site::build_client(config)?;
    let pages = PageClient::new(client.clone(), &config.base_url);
    let api = ApiClient::new(client, &config.base_url);

    let details = pages
        .fetch_details(title_id)
        .with_context(|| format!("获取详情失败: {title_id}"))?;
    let episodes = api.list_episodes(title_id);

    println!("标题: {}", details.title);
    println!("状态: {}", details.airing_status.as_str());
    if let Some(year) = details.release_year {
        println!("年份: {year}");
    }
    if !details.genres.is_empty() {
        println!("类型: {}", details.genres.join(" / "));
    }
    if let Some(poster) = &details.poster_url {
        println!("海报: {poster}");
    }
    println!("集数: {}", episodes.len());
    if !details.synopsis.is_empty() {
        let mut short: String = details.synopsis.chars().take(120).collect();
        if details.synopsis.chars().count() > 120 {
            short.push_str("...");
        }
        println!("简介: {short}");
    }

    // 英配按第一集播放页上的链接标记判断
    if let Some(first) = episodes.first() {
        match pages.fetch_quality_links(title_id, &first.session) {
            Ok(links) if links.has_dub() => println!("配音: 有英配"),
            Ok(_) => println!("配音: 仅原声"),
            Err(err) => tracing::debug!(target: "info", "配音检测失败: {}", err),
        }
    }
    Ok(())
}

fn cmd_download(
    config: &Config,
    title_id: String,
    start: u32,
    end: Option<u32>,
    quality: Option<String>,
    workers: Option<usize>,
    out: Option<PathBuf>,
) -> Result<()> {
    let request = BatchRequest {
        title_id,
        start,
        end: end.unwrap_or(u32::MAX),
        quality: quality.unwrap_or_else(|| config.preferred_quality.clone()),
        prefer_dub: config.prefer_dub(),
        workers: workers.unwrap_or(config.max_workers).max(1),
        dest_dir: out.unwrap_or_else(|| config.default_save_dir()),
    };

    let client = site::build_client(config)?;
    let orchestrator = DownloadOrchestrator::new(
        ApiClient::new(client.clone(), &config.base_url),
        PageClient::new(client.clone(), &config.base_url),
        LinkResolver::new(client.clone(), site::build_no_redirect_client(config)?),
        EpisodeDownloader::new(client),
    );

    // 第一次 Ctrl-C 置取消标志让在途任务收尾，第二次直接退出
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            if cancel.swap(true, Ordering::SeqCst) {
                std::process::exit(1);
            }
            eprintln!("\n收到中断信号，正在取消，在途的临时文件会被清理…");
        })
        .context("安装 Ctrl-C 处理失败")?;
    }

    let bars = Arc::new(BatchProgress::new());
    let progress: ProgressFn = {
        let bars = Arc::clone(&bars);
        Arc::new(move |event| bars.handle(event))
    };

    let started = Instant::now();
    let outcomes = orchestrator.run(&request, Some(progress), Some(Arc::clone(&cancel)))?;
    bars.finish();

    let mut done = 0usize;
    let mut failed = 0usize;
    let mut canceled = 0usize;
    println!("\n===== 下载结果 =====");
    for outcome in &outcomes {
        match &outcome.status {
            OutcomeStatus::Done { bytes, path } => {
                done += 1;
                println!(
                    "第 {} 集: 完成 {} 字节 -> {}",
                    outcome.episode,
                    bytes,
                    path.display()
                );
            }
            OutcomeStatus::Failed { kind, message } => {
                failed += 1;
                println!("第 {} 集: 失败 [{}] {}", outcome.episode, kind, message);
            }
            OutcomeStatus::Canceled => {
                canceled += 1;
                println!("第 {} 集: 已取消", outcome.episode);
            }
        }
    }
    println!(
        "成功 {} | 失败 {} | 取消 {} | 用时 {:.1} 秒",
        done,
        failed,
        canceled,
        started.elapsed().as_secs_f32()
    );
    Ok(())
}
