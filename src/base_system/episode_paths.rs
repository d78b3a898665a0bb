//! 下载文件的目录与命名规则。

use std::path::{Path, PathBuf};

use super::context::safe_fs_name;

/// 每部番一个目录：`<保存根>/<净化后的标题>`。
pub fn anime_dir(dest_root: &Path, title: &str) -> PathBuf {
    dest_root.join(safe_fs_name(title, 120))
}

/// 单集文件名：`<标题>_E<NN>.mp4`，集序号补足两位。
pub fn episode_file_name(title: &str, episode: u32) -> String {
    format!("{}_E{:02}.mp4", safe_fs_name(title, 120), episode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_digit_episode_is_zero_padded() {
        assert_eq!(episode_file_name("Demon Slayer", 5), "Demon Slayer_E05.mp4");
        assert_eq!(episode_file_name("Jujutsu Kaisen", 1), "Jujutsu Kaisen_E01.mp4");
    }

    #[test]
    fn double_digit_episode_keeps_width() {
        assert_eq!(
            episode_file_name("Attack on Titan", 15),
            "Attack on Titan_E15.mp4"
        );
        assert_eq!(episode_file_name("One Piece", 1071), "One Piece_E1071.mp4");
    }

    #[test]
    fn title_is_sanitized_in_paths() {
        assert_eq!(
            episode_file_name("Re:Zero", 3),
            "Re_Zero_E03.mp4"
        );
        let dir = anime_dir(Path::new("/downloads"), "Fate/Zero");
        assert_eq!(dir, PathBuf::from("/downloads/Fate_Zero"));
    }
}
