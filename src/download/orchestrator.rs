//! 批量下载编排：分集列表 → 画质链接 → 直链解析 → 流式落盘。
//!
//! 单集管线内的错误折叠成该集的失败结果，不取消也不阻塞同批其它集；
//! 只有非法输入或目标目录建不出来会让整个批次中止。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::base_system::episode_paths;
use crate::errors::SiteError;
use crate::site::api::ApiClient;
use crate::site::models::Episode;
use crate::site::pages::PageClient;
use crate::site::resolve::LinkResolver;

use super::models::{
    BatchRequest, DownloadTask, EpisodeOutcome, OutcomeStatus, ProgressEvent, TaskState,
};
use super::pool::run_worker_pool;
use super::stream::EpisodeDownloader;

/// 进度回调。事件会从各 worker 线程并发发出。
pub type ProgressFn = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

pub struct DownloadOrchestrator {
    api: ApiClient,
    pages: PageClient,
    resolver: LinkResolver,
    downloader: EpisodeDownloader,
}

impl DownloadOrchestrator {
    pub fn new(
        api: ApiClient,
        pages: PageClient,
        resolver: LinkResolver,
        downloader: EpisodeDownloader,
    ) -> Self {
        Self {
            api,
            pages,
            resolver,
            downloader,
        }
    }

    /// 执行一个批次，返回每个请求集恰好一条的终态结果，按集序号升序。
    pub fn run(
        &self,
        request: &BatchRequest,
        progress: Option<ProgressFn>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<Vec<EpisodeOutcome>> {
        if let Err(msg) = request.validate() {
            bail!("批次请求不合法: {msg}");
        }

        // 标题只用于目录和文件命名，详情页拿不到就退回 title_id
        let title = match self.pages.fetch_details(&request.title_id) {
            Ok(details) if !details.title.is_empty() => details.title,
            Ok(_) => request.title_id.clone(),
            Err(err) => {
                warn!(target: "batch", "获取详情失败，用 title_id 作为目录名: {}", err);
                request.title_id.clone()
            }
        };

        let episodes = self.api.list_episodes(&request.title_id);
        let selected = select_range(episodes, request.start, request.end);
        if selected.is_empty() {
            bail!("范围 {}~{} 内没有可下载的集", request.start, request.end);
        }

        let anime_dir = episode_paths::anime_dir(&request.dest_dir, &title);
        std::fs::create_dir_all(&anime_dir)
            .with_context(|| format!("创建目录失败: {}", anime_dir.display()))?;

        info!(
            target: "batch",
            "开始下载 {}: {} 集，并发 {}",
            title,
            selected.len(),
            request.workers
        );

        let progress_ref = progress.as_ref();
        let cancel_ref = cancel.as_deref();
        emit(
            progress_ref,
            &ProgressEvent::BatchStarted {
                total: selected.len() as u64,
            },
        );

        let requested: Vec<u32> = selected.iter().map(|e| e.number).collect();
        let tasks: Vec<DownloadTask> = selected
            .into_iter()
            .map(|episode| DownloadTask {
                target: anime_dir.join(episode_paths::episode_file_name(&title, episode.number)),
                episode,
                quality: request.quality.clone(),
                state: TaskState::Pending,
            })
            .collect();

        let outcomes = run_worker_pool(tasks, request.workers, cancel_ref, |task| {
            self.episode_pipeline(request, task, progress_ref, cancel_ref)
        });

        // 取消时还排在队里的集也要有结果，保证一集一条
        let mut outcomes = fill_missing(outcomes, &requested);
        outcomes.sort_by_key(|o| o.episode);

        let done = outcomes.iter().filter(|o| o.status.is_done()).count();
        info!(target: "batch", "批次结束: 成功 {} / 共 {} 集", done, outcomes.len());
        Ok(outcomes)
    }

    fn episode_pipeline(
        &self,
        request: &BatchRequest,
        mut task: DownloadTask,
        progress: Option<&ProgressFn>,
        cancel: Option<&AtomicBool>,
    ) -> EpisodeOutcome {
        let number = task.episode.number;
        task.advance(TaskState::InProgress);
        emit(progress, &ProgressEvent::Started { episode: number });

        let status = match self.run_steps(request, &task, progress, cancel) {
            Ok(bytes) => {
                task.advance(TaskState::Completed);
                info!(target: "batch", "第 {} 集完成: {} 字节", number, bytes);
                OutcomeStatus::Done {
                    bytes,
                    path: task.target.clone(),
                }
            }
            Err(SiteError::Canceled) => {
                task.advance(TaskState::Failed);
                OutcomeStatus::Canceled
            }
            Err(err) => {
                task.advance(TaskState::Failed);
                warn!(target: "batch", "第 {} 集失败: {}", number, err);
                OutcomeStatus::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        };

        emit(
            progress,
            &ProgressEvent::Finished {
                episode: number,
                ok: status.is_done(),
            },
        );
        EpisodeOutcome {
            episode: number,
            status,
        }
    }

    fn run_steps(
        &self,
        request: &BatchRequest,
        task: &DownloadTask,
        progress: Option<&ProgressFn>,
        cancel: Option<&AtomicBool>,
    ) -> Result<u64, SiteError> {
        check_cancel(cancel)?;
        if let Some(episode_title) = &task.episode.title {
            debug!(target: "batch", "第 {} 集: {}", task.episode.number, episode_title);
        }
        let links = self
            .pages
            .fetch_quality_links(&request.title_id, &task.episode.session)?;
        debug!(
            target: "batch",
            "第 {} 集发现 {} 个下载链接",
            task.episode.number,
            links.len()
        );
        let Some(link) = links.select(&task.quality, request.prefer_dub) else {
            return Err(SiteError::Resolution(format!(
                "第 {} 集播放页上没有可用下载链接",
                task.episode.number
            )));
        };
        if link.quality != task.quality {
            // 要的画质缺货时改用第一个可用项，可用性优先于保真
            let available: Vec<&str> = links.iter().map(|l| l.quality.as_str()).collect();
            warn!(
                target: "batch",
                "第 {} 集没有 {}，改用 {}（可用: {}）",
                task.episode.number,
                task.quality,
                link.quality,
                available.join("/")
            );
        }

        check_cancel(cancel)?;
        let direct_url = self.resolver.resolve(&link.url)?;

        check_cancel(cancel)?;
        let number = task.episode.number;
        self.downloader
            .download(&direct_url, &task.target, cancel, |done, total| {
                emit(
                    progress,
                    &ProgressEvent::Bytes {
                        episode: number,
                        done,
                        total,
                    },
                );
            })
    }
}

fn emit(progress: Option<&ProgressFn>, event: &ProgressEvent) {
    if let Some(cb) = progress {
        cb(event);
    }
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<(), SiteError> {
    if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
        return Err(SiteError::Canceled);
    }
    Ok(())
}

/// 按集序号过滤闭区间，保持服务端给出的升序。
fn select_range(episodes: Vec<Episode>, start: u32, end: u32) -> Vec<Episode> {
    episodes
        .into_iter()
        .filter(|e| e.number >= start && e.number <= end)
        .collect()
}

/// 没被 worker 领走的集补上 Canceled 结果。
fn fill_missing(mut outcomes: Vec<EpisodeOutcome>, requested: &[u32]) -> Vec<EpisodeOutcome> {
    for &number in requested {
        if !outcomes.iter().any(|o| o.episode == number) {
            outcomes.push(EpisodeOutcome {
                episode: number,
                status: OutcomeStatus::Canceled,
            });
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episodes(numbers: &[u32]) -> Vec<Episode> {
        numbers
            .iter()
            .map(|&n| Episode {
                session: format!("ep-{n}"),
                number: n,
                title: None,
            })
            .collect()
    }

    #[test]
    fn range_filter_is_inclusive_and_order_preserving() {
        let selected = select_range(episodes(&[1, 2, 3, 4, 5, 6]), 2, 4);
        let numbers: Vec<u32> = selected.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
    }

    #[test]
    fn range_filter_can_be_empty() {
        assert!(select_range(episodes(&[1, 2, 3]), 10, 20).is_empty());
    }

    #[test]
    fn missing_outcomes_become_canceled() {
        let partial = vec![EpisodeOutcome {
            episode: 1,
            status: OutcomeStatus::Done {
                bytes: 100,
                path: std::path::PathBuf::from("/tmp/e1.mp4"),
            },
        }];
        let mut filled = fill_missing(partial, &[1, 2, 3]);
        filled.sort_by_key(|o| o.episode);
        assert_eq!(filled.len(), 3);
        assert!(matches!(filled[1].status, OutcomeStatus::Canceled));
        assert!(matches!(filled[2].status, OutcomeStatus::Canceled));
    }
}
