//! 固定大小的下载工作线程池。
//!
//! 任务按提交顺序经队列派发，完成顺序不保证。取消标志在领取下一个
//! 任务前检查；正在执行的任务由它自己的检查点负责响应。
//! worker 之间不共享可变状态，队列取任务和结果回传各是一步原子操作。

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel as channel;

pub(crate) fn run_worker_pool<T, R, F>(
    jobs: Vec<T>,
    workers: usize,
    cancel: Option<&AtomicBool>,
    handler: F,
) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let (tx_job, rx_job) = channel::unbounded::<T>();
    for job in jobs {
        let _ = tx_job.send(job);
    }
    drop(tx_job);

    let (tx_out, rx_out) = channel::unbounded::<R>();
    std::thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            let rx_job = rx_job.clone();
            let tx_out = tx_out.clone();
            let handler = &handler;
            scope.spawn(move || {
                while let Ok(job) = rx_job.recv() {
                    if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
                        break;
                    }
                    let _ = tx_out.send(handler(job));
                }
            });
        }
        drop(tx_out);
        drop(rx_job);
    });

    rx_out.iter().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn in_flight_jobs_never_exceed_worker_count() {
        let in_flight = AtomicUsize::new(0);
        let high_water = AtomicUsize::new(0);

        let outs = run_worker_pool((0..10).collect::<Vec<u32>>(), 2, None, |n| {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            high_water.fetch_max(current, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            n
        });

        assert_eq!(outs.len(), 10);
        assert!(high_water.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn one_failing_job_does_not_affect_siblings() {
        let outs = run_worker_pool((1..=5).collect::<Vec<u32>>(), 2, None, |n| {
            if n == 3 {
                Err(format!("episode {n} failed"))
            } else {
                Ok(n)
            }
        });

        assert_eq!(outs.len(), 5);
        assert_eq!(outs.iter().filter(|r| r.is_ok()).count(), 4);
        assert_eq!(outs.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[test]
    fn all_jobs_processed_even_with_more_jobs_than_workers() {
        let mut outs = run_worker_pool((0..100).collect::<Vec<u32>>(), 3, None, |n| n * 2);
        outs.sort_unstable();
        assert_eq!(outs.len(), 100);
        assert_eq!(outs[99], 198);
    }

    #[test]
    fn preset_cancel_flag_skips_all_jobs() {
        let cancel = AtomicBool::new(true);
        let outs = run_worker_pool((0..8).collect::<Vec<u32>>(), 2, Some(&cancel), |n| n);
        assert!(outs.is_empty());
    }
}
