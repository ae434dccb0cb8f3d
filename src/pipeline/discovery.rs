use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::pipeline::PipelineError;

/// Extensions (lowercase, without the dot) treated as videos.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv"];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)))
        .unwrap_or(false)
}

/// Lazily walk `root` and yield every video file below it.
///
/// Entries are sorted by file name within each directory, so an unchanged
/// tree is always visited in the same order.
pub fn video_files(root: &Path) -> impl Iterator<Item = Result<PathBuf, PipelineError>> {
    let root_buf = root.to_path_buf();
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_video_file(entry.path()) {
                    Some(Ok(entry.into_path()))
                } else {
                    None
                }
            }
            Err(source) => Some(Err(PipelineError::Discovery {
                root: root_buf.clone(),
                source,
            })),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"mock content").unwrap();
    }

    fn collect(root: &Path) -> Vec<String> {
        video_files(root)
            .map(|p| {
                p.unwrap()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_is_video_file_case_insensitive() {
        assert!(is_video_file(Path::new("a.mp4")));
        assert!(is_video_file(Path::new("clip.MOV")));
        assert!(is_video_file(Path::new("dir/x.Mkv")));
        assert!(!is_video_file(Path::new("notes.txt")));
        assert!(!is_video_file(Path::new("mp4")));
        assert!(!is_video_file(Path::new("audio.wav")));
    }

    #[test]
    fn test_walk_recurses_and_filters() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("b.mp4"));
        touch(&tmp.path().join("a.AVI"));
        touch(&tmp.path().join("notes.txt"));
        touch(&tmp.path().join("sub/deeper/c.wmv"));
        touch(&tmp.path().join("sub/readme.md"));

        let found = collect(tmp.path());
        assert_eq!(found, vec!["a.AVI", "b.mp4", "sub/deeper/c.wmv"]);
    }

    #[test]
    fn test_walk_order_is_stable() {
        let tmp = TempDir::new().unwrap();
        for name in ["z.mp4", "m/1.mkv", "a.mov", "m/0.mp4"] {
            touch(&tmp.path().join(name));
        }
        assert_eq!(collect(tmp.path()), collect(tmp.path()));
    }

    #[test]
    fn test_directory_named_like_video_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("folder.mp4")).unwrap();
        assert!(collect(tmp.path()).is_empty());
    }

    #[test]
    fn test_missing_root_yields_error() {
        let tmp = TempDir::new().unwrap();
        let mut walk = video_files(&tmp.path().join("missing"));
        assert!(matches!(
            walk.next(),
            Some(Err(PipelineError::Discovery { .. }))
        ));
    }
}
