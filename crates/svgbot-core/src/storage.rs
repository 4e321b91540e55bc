//! Per-conversation working files: `<root>/<chat_id>/<file_name>`.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::SystemTime,
};

use tokio::io::AsyncWriteExt;

use crate::{
    domain::{ChatId, RemoteFileMeta},
    errors::Error,
    messaging::port::FileSource,
    validate::strip_svg_suffix,
    Result,
};

pub const MINIFIED_SUFFIX: &str = "-minified.svg";

#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    in_flight: Mutex<HashSet<PathBuf>>,
}

/// In-flight slot for one (chat, file name); released on drop.
#[derive(Debug)]
pub struct Claim<'a> {
    storage: &'a Storage,
    path: PathBuf,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.storage.in_flight().remove(&self.path);
    }
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn chat_dir(&self, chat_id: ChatId) -> PathBuf {
        self.root.join(chat_id.0.to_string())
    }

    /// Where the upload `file_name` from `chat_id` is stored.
    pub fn original_path(&self, chat_id: ChatId, file_name: &str) -> PathBuf {
        self.chat_dir(chat_id).join(sanitize_filename(file_name))
    }

    /// Reserve (chat, file name) for one conversion. `None` if another is running.
    pub fn claim(&self, chat_id: ChatId, file_name: &str) -> Option<Claim<'_>> {
        let path = self.original_path(chat_id, file_name);
        if !self.in_flight().insert(path.clone()) {
            return None;
        }
        Some(Claim {
            storage: self,
            path,
        })
    }

    /// Download the remote file into the conversation directory.
    pub async fn write_original(
        &self,
        chat_id: ChatId,
        file_name: &str,
        source: &dyn FileSource,
        meta: &RemoteFileMeta,
    ) -> Result<PathBuf> {
        ensure_dir(&self.chat_dir(chat_id)).await?;

        let path = self.original_path(chat_id, file_name);
        let mut dst = tokio::fs::File::create(&path).await?;
        source.download(meta, &mut dst).await?;
        dst.flush().await?;

        tracing::debug!(%chat_id, path = %path.display(), "original written");
        Ok(path)
    }

    /// Write `content` next to `original` as `<stem>-minified.svg`.
    pub async fn write_minified(&self, original: &Path, content: &str) -> Result<PathBuf> {
        let path = minified_path(original)?;
        tokio::fs::write(&path, content).await?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "minified written");
        Ok(path)
    }

    /// Files left under the root by an earlier process, with their mtime.
    pub async fn leftovers(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut out = Vec::new();
        let mut chats = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(Error::Io(e)),
        };

        while let Some(chat) = chats.next_entry().await? {
            if !chat.file_type().await?.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(chat.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let md = file.metadata().await?;
                if md.is_file() {
                    out.push((file.path(), md.modified()?));
                }
            }
        }

        out.sort();
        Ok(out)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Idempotent `mkdir -p`.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// `<dir>/<stem>.svg` -> `<dir>/<stem>-minified.svg`.
pub fn minified_path(original: &Path) -> Result<PathBuf> {
    let name = original
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidPath {
            path: original.to_path_buf(),
            reason: "missing file name".to_string(),
        })?;
    let stem = strip_svg_suffix(name).ok_or_else(|| Error::InvalidPath {
        path: original.to_path_buf(),
        reason: "not an .svg file".to_string(),
    })?;
    Ok(original.with_file_name(format!("{stem}{MINIFIED_SUFFIX}")))
}

/// Keep letters and digits (any script) plus `._-`, replace everything else
/// (path separators included).
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.chars().all(|c| c == '.') {
        format!("document{out}")
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::io::AsyncWrite;

    struct StaticSource(&'static [u8]);

    #[async_trait]
    impl FileSource for StaticSource {
        async fn resolve(&self, file: &crate::domain::RemoteFile) -> Result<RemoteFileMeta> {
            Ok(RemoteFileMeta {
                file_id: file.file_id.clone(),
                path: "documents/file_1.svg".to_string(),
                size: self.0.len() as u64,
            })
        }

        async fn download(
            &self,
            _meta: &RemoteFileMeta,
            dst: &mut (dyn AsyncWrite + Unpin + Send),
        ) -> Result<()> {
            dst.write_all(self.0).await?;
            Ok(())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl FileSource for BrokenSource {
        async fn resolve(&self, _file: &crate::domain::RemoteFile) -> Result<RemoteFileMeta> {
            Err(Error::Transport("no such file".to_string()))
        }

        async fn download(
            &self,
            _meta: &RemoteFileMeta,
            _dst: &mut (dyn AsyncWrite + Unpin + Send),
        ) -> Result<()> {
            Err(Error::Transport("connection reset".to_string()))
        }
    }

    fn meta() -> RemoteFileMeta {
        RemoteFileMeta {
            file_id: "f".to_string(),
            path: "documents/file_1.svg".to_string(),
            size: 6,
        }
    }

    #[test]
    fn minified_path_strips_svg_and_appends_suffix() {
        assert_eq!(
            minified_path(Path::new("svgs/42/icon.svg")).unwrap(),
            PathBuf::from("svgs/42/icon-minified.svg")
        );
        assert_eq!(
            minified_path(Path::new("svgs/42/Logo.v2.SVG")).unwrap(),
            PathBuf::from("svgs/42/Logo.v2-minified.svg")
        );
        // Only the suffix goes, unlike a trailing-character trim.
        assert_eq!(
            minified_path(Path::new("svgs/1/gsv.svg")).unwrap(),
            PathBuf::from("svgs/1/gsv-minified.svg")
        );
        assert!(matches!(
            minified_path(Path::new("svgs/1/photo.png")),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn sanitize_blocks_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd.svg"), ".._.._etc_passwd.svg");
        assert_eq!(sanitize_filename("my icon.svg"), "my_icon.svg");
        assert_eq!(sanitize_filename(".."), "document..");
        assert_eq!(sanitize_filename(""), "document");
    }

    #[test]
    fn sanitize_keeps_non_latin_names_distinct() {
        assert_eq!(sanitize_filename("логотип.svg"), "логотип.svg");
        assert_eq!(sanitize_filename("значок 2.svg"), "значок_2.svg");
        assert_ne!(sanitize_filename("кот.svg"), sanitize_filename("пёс.svg"));

        let storage = Storage::new("svgs");
        let first = storage.claim(ChatId(1), "кот.svg").unwrap();
        assert!(storage.claim(ChatId(1), "пёс.svg").is_some());
        drop(first);
    }

    #[test]
    fn original_path_is_scoped_by_chat() {
        let storage = Storage::new("svgs");
        assert_eq!(
            storage.original_path(ChatId(-100), "a/b.svg"),
            PathBuf::from("svgs/-100/a_b.svg")
        );
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("svgs").join("1");
        ensure_dir(&dir).await.unwrap();
        ensure_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn writes_original_and_minified_side_by_side() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = Storage::new(tmp.path().join("svgs"));

        let original = storage
            .write_original(ChatId(5), "icon.svg", &StaticSource(b"<svg/>"), &meta())
            .await
            .unwrap();
        assert_eq!(original, tmp.path().join("svgs/5/icon.svg"));
        assert_eq!(std::fs::read_to_string(&original).unwrap(), "<svg/>");

        let minified = storage.write_minified(&original, "<svg/>").await.unwrap();
        assert_eq!(minified, tmp.path().join("svgs/5/icon-minified.svg"));
        assert_eq!(std::fs::read_to_string(&minified).unwrap(), "<svg/>");

        let left = storage.leftovers().await.unwrap();
        let paths: Vec<_> = left.into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec![minified, original]);
    }

    #[tokio::test]
    async fn download_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = Storage::new(tmp.path());
        let err = storage
            .write_original(ChatId(5), "icon.svg", &BrokenSource, &meta())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn leftovers_of_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = Storage::new(tmp.path().join("nope"));
        assert!(storage.leftovers().await.unwrap().is_empty());
    }

    #[test]
    fn claims_are_exclusive_until_dropped() {
        let storage = Storage::new("svgs");
        let first = storage.claim(ChatId(1), "a.svg").unwrap();
        assert!(storage.claim(ChatId(1), "a.svg").is_none());
        assert!(storage.claim(ChatId(2), "a.svg").is_some());
        drop(first);
        assert!(storage.claim(ChatId(1), "a.svg").is_some());
    }
}
