mod archive;
mod engine;

pub use archive::{ArchiveExtractor, ArchiveStream, InProcessTarExtractor, TarCommandExtractor};
pub use engine::{
    ConcurrentArtifactDownloader, DownloadResult, DEFAULT_DOWNLOAD_CONCURRENCY,
    DEFAULT_DOWNLOAD_TIMEOUT,
};
