//! 批量下载的数据模型与任务状态机。

use std::path::PathBuf;

use crate::site::models::Episode;

/// 一次批量下载请求，提交给编排器后不可变。
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub title_id: String,
    /// 起止集序号，闭区间。
    pub start: u32,
    pub end: u32,
    pub quality: String,
    pub prefer_dub: bool,
    pub workers: usize,
    pub dest_dir: PathBuf,
}

impl BatchRequest {
    /// 致命输入校验：不合法的请求在开始任何工作之前拒绝。
    pub fn validate(&self) -> Result<(), String> {
        if self.title_id.trim().is_empty() {
            return Err("title_id 不能为空".to_string());
        }
        if self.start == 0 {
            return Err("集序号从 1 开始".to_string());
        }
        if self.start > self.end {
            return Err(format!("集范围为空: {}~{}", self.start, self.end));
        }
        if self.workers == 0 {
            return Err("并发数必须大于 0".to_string());
        }
        Ok(())
    }
}

/// 任务状态机，只允许单向推进：Pending → InProgress → (Completed | Failed)。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// 一集的下载任务。批次开始时创建，由且仅由领到它的 worker 推进状态，
/// 终态汇报后即丢弃。
#[derive(Debug)]
pub struct DownloadTask {
    pub episode: Episode,
    pub target: PathBuf,
    pub quality: String,
    pub state: TaskState,
}

impl DownloadTask {
    pub fn advance(&mut self, next: TaskState) {
        let legal = matches!(
            (self.state, next),
            (TaskState::Pending, TaskState::InProgress)
                | (TaskState::InProgress, TaskState::Completed)
                | (TaskState::InProgress, TaskState::Failed)
        );
        debug_assert!(legal, "非法状态迁移: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// 进度事件：只发射，不落盘。持久化是表现层自己的事。
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// 分集列表确定后发出一次，带本批次要下载的集数。
    BatchStarted { total: u64 },
    Started { episode: u32 },
    /// total 为 0 表示服务端没声明大小，只能报已完成字节数。
    Bytes { episode: u32, done: u64, total: u64 },
    Finished { episode: u32, ok: bool },
}

/// 一集的终态结果。批次结束时每个请求过的集恰好一条。
#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    pub episode: u32,
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone)]
pub enum OutcomeStatus {
    Done { bytes: u64, path: PathBuf },
    Failed { kind: &'static str, message: String },
    Canceled,
}

impl OutcomeStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, OutcomeStatus::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BatchRequest {
        BatchRequest {
            title_id: "abc-123".to_string(),
            start: 1,
            end: 12,
            quality: "720p".to_string(),
            prefer_dub: false,
            workers: 2,
            dest_dir: PathBuf::from("/tmp/anime"),
        }
    }

    #[test]
    fn validate_accepts_normal_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_input() {
        let mut req = request();
        req.start = 5;
        req.end = 3;
        assert!(req.validate().is_err());

        let mut req = request();
        req.start = 0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.workers = 0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.title_id = "  ".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn task_state_advances() {
        let mut task = DownloadTask {
            episode: crate::site::models::Episode {
                session: "s".to_string(),
                number: 1,
                title: None,
            },
            target: PathBuf::from("/tmp/x.mp4"),
            quality: "720p".to_string(),
            state: TaskState::Pending,
        };
        task.advance(TaskState::InProgress);
        task.advance(TaskState::Completed);
        assert_eq!(task.state, TaskState::Completed);
    }
}
