mod client;
mod progress;

pub use client::{Fetch, HttpClient};
pub use progress::{ChannelProgress, DownloadProgress, LogProgress, ProgressMessage};
