//! 批次进度汇总与 CLI 进度条。
//!
//! 批次总进度 = 已完结集数 / 请求集数，与单集的字节进度相互独立；
//! 每个进行中的集有自己的一条字节进度。

use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::ProgressEvent;

pub struct BatchProgress {
    mp: MultiProgress,
    overall: ProgressBar,
    bars: Mutex<HashMap<u32, ProgressBar>>,
}

impl BatchProgress {
    pub fn new() -> Self {
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let overall = mp.add(ProgressBar::new(0));
        overall.set_style(overall_style());
        overall.set_prefix("总进度");
        Self {
            mp,
            overall,
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// 作为编排器的进度回调使用；事件可能来自任意 worker 线程。
    pub fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total } => {
                self.overall.set_length(*total);
            }
            ProgressEvent::Started { episode } => {
                let bar = self.mp.add(ProgressBar::new(0));
                bar.set_style(bytes_style());
                bar.set_prefix(format!("第 {episode} 集"));
                if let Ok(mut bars) = self.bars.lock() {
                    bars.insert(*episode, bar);
                }
            }
            ProgressEvent::Bytes {
                episode,
                done,
                total,
            } => {
                if let Ok(bars) = self.bars.lock()
                    && let Some(bar) = bars.get(episode)
                {
                    if *total > 0 && bar.length() != Some(*total) {
                        bar.set_length(*total);
                    }
                    bar.set_position(*done);
                }
            }
            ProgressEvent::Finished { episode, ok: _ } => {
                if let Ok(mut bars) = self.bars.lock()
                    && let Some(bar) = bars.remove(episode)
                {
                    bar.finish_and_clear();
                }
                self.overall.inc(1);
            }
        }
    }

    pub fn finish(&self) {
        self.overall.finish_and_clear();
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {wide_bar} {bytes}/{total_bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}
