use std::path::Path;
use std::process::ExitCode;

use ffmpeg_transcode::{TranscodeConfig, Transcoder};

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("vidshrink", log::LevelFilter::Info)
        .filter_module("ffmpeg_transcode", log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        let program = args.first().map(String::as_str).unwrap_or("vidshrink");
        eprintln!("Usage: {} <input_file> <output_file>", program);
        return ExitCode::FAILURE;
    }

    if let Err(e) = ffmpeg_transcode::init() {
        log::error!("{:#}", e);
        println!("Error processing video");
        return ExitCode::FAILURE;
    }

    let mut transcoder = Transcoder::new(TranscodeConfig::default().with_env_target());
    let outcome = transcoder.process(Path::new(&args[1]), Path::new(&args[2]));
    if !outcome.success {
        log::error!("{}", outcome.message);
        println!("Error processing video");
        return ExitCode::FAILURE;
    }

    if let Some(stats) = &outcome.stats {
        match serde_json::to_string(stats) {
            Ok(json) => log::info!("stats: {}", json),
            Err(e) => log::warn!("could not serialize stats: {}", e),
        }
    }
    if log::log_enabled!(log::Level::Debug) {
        match ffmpeg_transcode::probe(Path::new(&args[2])) {
            Ok(info) => log::debug!("output:\n{}", info),
            Err(e) => log::debug!("could not probe output: {:#}", e),
        }
    }
    println!("Video processed successfully");
    ExitCode::SUCCESS
}
