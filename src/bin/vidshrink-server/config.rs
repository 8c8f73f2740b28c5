use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ffmpeg_transcode::TranscodeConfig;

pub struct ServerConfig {
    bind: String,
    upload_dir: PathBuf,
    processed_dir: PathBuf,
    transcode: TranscodeConfig,
}

impl ServerConfig {
    fn from_env() -> Self {
        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
        Self {
            bind: var("VIDSHRINK_BIND", "localhost:8999"),
            upload_dir: PathBuf::from(var("VIDSHRINK_UPLOAD_DIR", "uploads")),
            processed_dir: PathBuf::from(var("VIDSHRINK_PROCESSED_DIR", "processed")),
            transcode: TranscodeConfig::default().with_env_target(),
        }
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn transcode(&self) -> &TranscodeConfig {
        &self.transcode
    }
}

pub fn config() -> &'static ServerConfig {
    static CONFIG: LazyLock<ServerConfig> = LazyLock::new(ServerConfig::from_env);
    &CONFIG
}
