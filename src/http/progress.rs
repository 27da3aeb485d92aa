use std::path::Path;

/// Callbacks fired while a data source downloads its files
pub trait DownloadProgress {
    fn on_start(&mut self, current: usize, total: usize, target: &Path);
    fn on_complete(&mut self, current: usize, total: usize, target: &Path);
    fn on_skipped(&mut self, current: usize, total: usize, target: &Path, reason: &str);
}

/// Reports progress through the `log` facade
#[derive(Debug, Default)]
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_start(&mut self, current: usize, total: usize, target: &Path) {
        log::debug!("[{}/{}] Downloading {}...", current, total, target.display());
    }

    fn on_complete(&mut self, current: usize, total: usize, target: &Path) {
        log::info!("[{}/{}] Downloaded {}", current, total, target.display());
    }

    fn on_skipped(&mut self, current: usize, total: usize, target: &Path, reason: &str) {
        log::debug!("[{}/{}] Skipped {}: {}", current, total, target.display(), reason);
    }
}

// For reporting to another thread
pub struct ChannelProgress {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    Started { current: usize, total: usize },
    Completed { current: usize, total: usize },
    Skipped { current: usize, total: usize, reason: String },
}

impl ChannelProgress {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl DownloadProgress for ChannelProgress {
    fn on_start(&mut self, current: usize, total: usize, _target: &Path) {
        let _ = self.sender.send(ProgressMessage::Started { current, total });
    }

    fn on_complete(&mut self, current: usize, total: usize, _target: &Path) {
        let _ = self.sender.send(ProgressMessage::Completed { current, total });
    }

    fn on_skipped(&mut self, current: usize, total: usize, _target: &Path, reason: &str) {
        let _ = self.sender.send(ProgressMessage::Skipped {
            current,
            total,
            reason: reason.to_string(),
        });
    }
}
