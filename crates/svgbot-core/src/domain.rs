/// Telegram chat id (numeric). The unit of addressing for every notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file announced by the transport but not fetched yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFile {
    pub file_id: String,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

/// A remote file after resolving it with the transport (`getFile`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFileMeta {
    pub file_id: String,
    /// Transport-side download path.
    pub path: String,
    pub size: u64,
}
