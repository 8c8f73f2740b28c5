use std::path::{Path, PathBuf};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart},
    http::StatusCode,
    routing::post,
};
use ffmpeg_transcode::Transcoder;
use tokio::{io::AsyncWriteExt as _, net::TcpListener};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use crate::config::config;

pub(crate) fn start_api_server(cancel: CancellationToken) {
    tokio::spawn(async move {
        let bind = config().bind();
        let listener = match TcpListener::bind(bind).await {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("could not bind {}: {}", bind, e);
                cancel.cancel();
                return;
            }
        };
        log::info!("API server started on {}", bind);
        if let Err(e) = axum::serve(listener, router())
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
        {
            log::error!("Error starting API server: {}", e);
        }
    });
}

fn router() -> Router {
    Router::new()
        .route("/process", post(process_video))
        .layer(DefaultBodyLimit::disable())
        .nest_service("/processed", ServeDir::new(config().processed_dir()))
}

async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
    log::info!("Shutting down API server...");
}

async fn process_video(mut multipart: Multipart) -> (StatusCode, String) {
    let config = config();
    let upload = match save_upload(&mut multipart, config.upload_dir()).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, "No video file uploaded".to_string());
        }
        Err(e) => {
            log::error!("upload failed: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing video".to_string(),
            );
        }
    };

    let output = config.processed_dir().join(processed_name(&upload));
    let result = transcode(upload.clone(), output.clone()).await;

    if let Err(e) = tokio::fs::remove_file(&upload).await {
        log::warn!("could not remove upload {}: {}", upload.display(), e);
    }

    match result {
        Ok(()) => (
            StatusCode::OK,
            format!("Video processed successfully. Output: {}", output.display()),
        ),
        Err(e) => {
            log::error!("{}: {:#}", upload.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing video".to_string(),
            )
        }
    }
}

/// Runs one job on a blocking worker with its own transcoder.
async fn transcode(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    if let Some(dir) = output.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let transcode_config = config().transcode().clone();
    let outcome = tokio::task::spawn_blocking(move || {
        Transcoder::new(transcode_config).process(&input, &output)
    })
    .await?;
    if !outcome.success {
        anyhow::bail!(outcome.message);
    }
    if let Some(stats) = outcome.stats {
        log::info!("stats: {}", serde_json::to_string(&stats)?);
    }
    Ok(())
}

/// Streams the `video` field to the upload directory. `None` when the form
/// has no such field.
async fn save_upload(multipart: &mut Multipart, dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("video") {
            continue;
        }
        let file_name = field
            .file_name()
            .and_then(upload_file_name)
            .unwrap_or_else(|| "upload".to_string());
        let file_name = job_file_name(&uuid::Uuid::new_v4().simple().to_string(), &file_name);

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(file_name);
        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        log::info!("saved upload {}", path.display());
        return Ok(Some(path));
    }
    Ok(None)
}

/// Final path component of a client-supplied name.
fn upload_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Per-request name so concurrent uploads of the same file never share an
/// upload or output path.
fn job_file_name(id: &str, file_name: &str) -> String {
    format!("{}_{}", id, file_name)
}

fn processed_name(upload: &Path) -> String {
    let stem = upload
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    format!("{}_processed.mp4", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_names_lose_their_directories() {
        assert_eq!(upload_file_name("clip.mov").as_deref(), Some("clip.mov"));
        assert_eq!(
            upload_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(upload_file_name("/"), None);
        assert_eq!(upload_file_name(""), None);
    }

    #[test]
    fn same_upload_name_gets_distinct_job_paths() {
        let first = job_file_name(&uuid::Uuid::new_v4().simple().to_string(), "clip.mov");
        let second = job_file_name(&uuid::Uuid::new_v4().simple().to_string(), "clip.mov");
        assert_ne!(first, second);
        assert!(first.ends_with("_clip.mov"));
        assert_ne!(
            processed_name(Path::new(&first)),
            processed_name(Path::new(&second))
        );
        assert_eq!(
            processed_name(Path::new(&job_file_name("0a1b", "clip.mov"))),
            "0a1b_clip_processed.mp4"
        );
    }

    #[test]
    fn processed_files_are_mp4() {
        assert_eq!(
            processed_name(Path::new("uploads/holiday.mov")),
            "holiday_processed.mp4"
        );
        assert_eq!(
            processed_name(Path::new("uploads/archive.tar.gz")),
            "archive.tar_processed.mp4"
        );
    }
}
