//! Request dispatcher: routes each inbound event to the markup or file pipeline.
//!
//! Every sub-flow ends in exactly one user-visible message: the result, or the
//! rendered error of the first step that failed. Nothing propagates further.

use std::{path::PathBuf, sync::Arc, time::SystemTime};

use crate::{
    cleanup::CleanupScheduler,
    config::Config,
    domain::{ChatId, RemoteFile},
    errors::ValidationError,
    formatting::inline_code,
    messaging::{
        port::{FileSource, MessagingPort},
        types::{InboundEvent, OutgoingDocument},
    },
    notifier::Notifier,
    optimizer::SvgOptimizer,
    storage::{minified_path, Storage},
    validate::{is_svg_file, is_svg_markup},
    Result,
};

const INLINE_RESULT_FILE_NAME: &str = "minified.svg";

/// Progress of one uploaded file through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionStage {
    Resolving,
    OriginalWritten,
    Optimized,
    MinifiedWritten,
    Delivered,
}

#[derive(Clone, Debug)]
pub struct ConversionRequest {
    pub chat_id: ChatId,
    pub file_name: String,
    pub original_path: PathBuf,
    pub minified_path: PathBuf,
    pub stage: ConversionStage,
}

impl ConversionRequest {
    fn advance(&mut self, stage: ConversionStage) {
        tracing::debug!(
            chat_id = %self.chat_id,
            file = %self.file_name,
            from = ?self.stage,
            to = ?stage,
            "conversion stage"
        );
        self.stage = stage;
    }

    /// Paths that exist on disk right now and therefore need cleanup.
    async fn existing_paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for path in [&self.original_path, &self.minified_path] {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                out.push(path.clone());
            }
        }
        out
    }
}

/// Transport-side collaborators the dispatcher talks to.
#[derive(Clone)]
pub struct DispatcherPorts {
    pub messenger: Arc<dyn MessagingPort>,
    pub files: Arc<dyn FileSource>,
    pub optimizer: Arc<dyn SvgOptimizer>,
}

pub struct RequestDispatcher {
    cfg: Arc<Config>,
    notifier: Notifier,
    files: Arc<dyn FileSource>,
    optimizer: Arc<dyn SvgOptimizer>,
    storage: Storage,
    cleanup: CleanupScheduler,
}

impl RequestDispatcher {
    pub fn new(cfg: Arc<Config>, ports: DispatcherPorts) -> Self {
        Self {
            storage: Storage::new(cfg.storage_dir.clone()),
            cfg,
            notifier: Notifier::new(ports.messenger),
            files: ports.files,
            optimizer: ports.optimizer,
            cleanup: CleanupScheduler::new(),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn cleanup(&self) -> &CleanupScheduler {
        &self.cleanup
    }

    pub async fn handle(&self, event: InboundEvent) {
        tracing::info!(chat_id = %event.chat_id(), kind = event.kind(), "inbound event");

        match event {
            InboundEvent::Start { chat_id } => {
                self.notifier.notify(chat_id, &self.cfg.welcome_message).await;
            }
            InboundEvent::Markup { chat_id, text } => self.handle_markup(chat_id, &text).await,
            InboundEvent::Document { chat_id, file } => self.handle_document(chat_id, &file).await,
            InboundEvent::MarkupWithDocument {
                chat_id,
                text,
                file,
            } => {
                tokio::join!(
                    self.handle_markup(chat_id, &text),
                    self.handle_document(chat_id, &file)
                );
            }
            InboundEvent::Ignored { chat_id } => {
                tracing::debug!(%chat_id, "nothing to minify");
            }
        }
    }

    async fn handle_markup(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.minify_markup(chat_id, text).await {
            self.notifier.report(chat_id, &e).await;
        }
    }

    async fn handle_document(&self, chat_id: ChatId, file: &RemoteFile) {
        if let Err(e) = self.minify_document(chat_id, file).await {
            self.notifier.report(chat_id, &e).await;
        }
    }

    async fn minify_markup(&self, chat_id: ChatId, text: &str) -> Result<()> {
        if !is_svg_markup(text) {
            return Err(ValidationError::NotSvgMarkup.into());
        }

        let minified = self.optimizer.optimize(text.to_string()).await?;

        // Telegram counts the limit on the parsed text, i.e. without the <code> tags.
        if minified.chars().count() > self.notifier.capabilities().max_message_len {
            self.notifier
                .send_document(
                    chat_id,
                    OutgoingDocument::Memory {
                        file_name: INLINE_RESULT_FILE_NAME.to_string(),
                        bytes: minified.into_bytes(),
                    },
                )
                .await?;
        } else {
            self.notifier
                .send_text(chat_id, &inline_code(&minified))
                .await?;
        }

        tracing::info!(%chat_id, "minified svg markup sent");
        Ok(())
    }

    async fn minify_document(&self, chat_id: ChatId, file: &RemoteFile) -> Result<()> {
        let file_name = file
            .file_name
            .clone()
            .unwrap_or_else(|| "document".to_string());
        if !is_svg_file(&file_name) {
            return Err(ValidationError::NotSvgFile(file_name).into());
        }
        if let Some(size) = file.size.filter(|s| *s > self.cfg.max_file_size) {
            return Err(ValidationError::TooLarge {
                size,
                limit: self.cfg.max_file_size,
            }
            .into());
        }

        let Some(_claim) = self.storage.claim(chat_id, &file_name) else {
            return Err(ValidationError::Busy(file_name).into());
        };

        let original_path = self.storage.original_path(chat_id, &file_name);
        let minified_path = minified_path(&original_path)?;

        // A deletion left over from an earlier upload of the same name must not
        // fire while this run rewrites the files.
        self.cleanup.cancel(&original_path);
        self.cleanup.cancel(&minified_path);

        let mut req = ConversionRequest {
            chat_id,
            minified_path,
            original_path,
            file_name,
            stage: ConversionStage::Resolving,
        };

        let result = self.run_conversion(&mut req, file).await;

        // No rollback: whatever made it to disk is reclaimed after the retention window.
        let written = req.existing_paths().await;
        if !written.is_empty() {
            self.cleanup.schedule(written, self.cfg.cleanup_delay);
        }

        result
    }

    async fn run_conversion(&self, req: &mut ConversionRequest, file: &RemoteFile) -> Result<()> {
        let meta = self.files.resolve(file).await?;
        if meta.size > self.cfg.max_file_size {
            return Err(ValidationError::TooLarge {
                size: meta.size,
                limit: self.cfg.max_file_size,
            }
            .into());
        }

        let original = self
            .storage
            .write_original(req.chat_id, &req.file_name, self.files.as_ref(), &meta)
            .await?;
        req.advance(ConversionStage::OriginalWritten);

        let source = tokio::fs::read_to_string(&original).await?;
        let minified = self.optimizer.optimize(source).await?;
        req.advance(ConversionStage::Optimized);

        req.minified_path = self.storage.write_minified(&original, &minified).await?;
        req.advance(ConversionStage::MinifiedWritten);

        self.notifier
            .send_document(req.chat_id, OutgoingDocument::Path(req.minified_path.clone()))
            .await?;
        req.advance(ConversionStage::Delivered);

        tracing::info!(
            chat_id = %req.chat_id,
            path = %req.minified_path.display(),
            "minified svg file sent"
        );
        Ok(())
    }

    /// Schedule deletion of files a previous process left behind, keeping the
    /// retention window relative to each file's mtime.
    pub async fn sweep_leftovers(&self) -> Result<usize> {
        let leftovers = self.storage.leftovers().await?;
        let now = SystemTime::now();
        let count = leftovers.len();

        for (path, modified) in leftovers {
            let age = now.duration_since(modified).unwrap_or_default();
            let delay = self.cfg.cleanup_delay.saturating_sub(age);
            self.cleanup.schedule(std::iter::once(path), delay);
        }

        if count > 0 {
            tracing::info!(count, "scheduled cleanup for leftover files");
        }
        Ok(count)
    }
}
