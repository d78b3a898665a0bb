//! 单集流式下载：写 `.tmp` 临时文件，成功后原子改名为目标文件。
//!
//! 改名是提交点。中途崩溃或取消最多留下临时文件，目标路径上
//! 永远不会出现半截文件；干净的失败路径连临时文件也不留。

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::blocking::Client;
use tracing::debug;

use crate::errors::SiteError;

/// 复制块大小。进度回调与取消检查都发生在块边界上。
const CHUNK_SIZE: usize = 8 * 1024;

pub struct EpisodeDownloader {
    client: Client,
}

impl EpisodeDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 把直链内容下载到 dest，返回写入的字节数。
    /// 回调参数是（累计字节，声明总量），总量拿不到时为 0。
    pub fn download<F>(
        &self,
        direct_url: &str,
        dest: &Path,
        cancel: Option<&AtomicBool>,
        on_progress: F,
    ) -> Result<u64, SiteError>
    where
        F: FnMut(u64, u64),
    {
        let resp = self.client.get(direct_url).send()?.error_for_status()?;
        let total = resp.content_length().unwrap_or(0);
        debug!(target: "download", "开始写入 {} (声明大小 {} 字节)", dest.display(), total);
        stream_to_file(resp, total, dest, cancel, on_progress)
    }
}

/// 流式落盘的纯 I/O 部分，和 HTTP 拆开便于离线测试。
pub(crate) fn stream_to_file<R, F>(
    reader: R,
    total: u64,
    dest: &Path,
    cancel: Option<&AtomicBool>,
    on_progress: F,
) -> Result<u64, SiteError>
where
    R: Read,
    F: FnMut(u64, u64),
{
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(dest);
    match copy_chunks(reader, total, &tmp, cancel, on_progress) {
        Ok(bytes) => match fs::rename(&tmp, dest) {
            Ok(()) => Ok(bytes),
            Err(err) => {
                let _ = fs::remove_file(&tmp);
                Err(err.into())
            }
        },
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            Err(err)
        }
    }
}

fn copy_chunks<R, F>(
    mut reader: R,
    total: u64,
    tmp: &Path,
    cancel: Option<&AtomicBool>,
    mut on_progress: F,
) -> Result<u64, SiteError>
where
    R: Read,
    F: FnMut(u64, u64),
{
    let mut writer = BufWriter::new(File::create(tmp)?);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut done: u64 = 0;
    loop {
        if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
            return Err(SiteError::Canceled);
        }
        let n = reader
            .read(&mut buf)
            .map_err(|e| SiteError::Network(format!("下载流中断: {e}")))?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        done += n as u64;
        on_progress(done, total);
    }
    writer.flush()?;
    Ok(done)
}

fn tmp_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::AtomicBool;

    use super::*;

    /// 读到一半报错的流，模拟网络中断。
    struct BrokenReader {
        remaining: usize,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ));
            }
            let n = self.remaining.min(buf.len());
            buf[..n].fill(0xAB);
            self.remaining -= n;
            Ok(n)
        }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn writes_file_and_removes_tmp_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Show_E01.mp4");
        let data = vec![0x5Au8; 20_000];

        let mut reported = Vec::new();
        let bytes = stream_to_file(
            Cursor::new(data.clone()),
            data.len() as u64,
            &dest,
            None,
            |done, total| reported.push((done, total)),
        )
        .unwrap();

        assert_eq!(bytes, 20_000);
        assert_eq!(fs::read(&dest).unwrap(), data);
        assert_eq!(dir_entries(dir.path()), vec!["Show_E01.mp4"]);
        // 进度单调递增，最后一次等于总量
        assert!(reported.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(reported.last().unwrap().0, 20_000);
    }

    #[test]
    fn midstream_failure_leaves_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Show_E02.mp4");

        let err = stream_to_file(
            BrokenReader { remaining: 30_000 },
            100_000,
            &dest,
            None,
            |_, _| {},
        )
        .unwrap_err();

        assert!(matches!(err, SiteError::Network(_)));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn cancellation_cleans_up_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Show_E03.mp4");
        let cancel = AtomicBool::new(true);

        let err = stream_to_file(
            Cursor::new(vec![0u8; 50_000]),
            50_000,
            &dest,
            Some(&cancel),
            |_, _| {},
        )
        .unwrap_err();

        assert!(matches!(err, SiteError::Canceled));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        assert_eq!(
            tmp_path(Path::new("/downloads/A/B_E01.mp4")),
            PathBuf::from("/downloads/A/B_E01.mp4.tmp")
        );
    }
}
