use std::{
    pin::Pin,
    process::Stdio,
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, ReadBuf},
    process::{ChildStdout, Command},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, warn};

use super::{StreamSource, TranscodeOptions, TranscodedStream, Transcoder, TranscoderError, skip_pcm};
use crate::audio::constants::{CHANNELS, SAMPLE_RATE};

/// Spawns one ffmpeg process per stream, decoding anything to
/// s16le / 48 kHz / stereo on stdout.
pub struct FfmpegTranscoder {
    path: String,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn build_args(input: &str, options: &TranscodeOptions) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        if input.starts_with("http://") || input.starts_with("https://") {
            args.extend(
                ["-reconnect", "1", "-reconnect_streamed", "1", "-reconnect_delay_max", "5"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }
        args.extend(["-analyzeduration", "0", "-loglevel", "0"].iter().map(|s| s.to_string()));
        if options.seek_ms > 0 {
            args.push("-ss".into());
            args.push(format!("{:.3}", options.seek_ms as f64 / 1000.0));
        }
        args.push("-i".into());
        args.push(input.to_string());
        if !options.filters.is_empty() {
            args.push("-af".into());
            args.push(options.filters.clone());
        }
        args.extend(
            [
                "-f".to_string(),
                "s16le".to_string(),
                "-ar".to_string(),
                SAMPLE_RATE.to_string(),
                "-ac".to_string(),
                CHANNELS.to_string(),
                "pipe:1".to_string(),
            ]
            .into_iter(),
        );
        args
    }
}

/// ffmpeg stdout. Dropping it stops the process.
struct ProcessStream {
    stdout: ChildStdout,
    _guard: DropGuard,
}

impl AsyncRead for ProcessStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_read(cx, buf)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(
        &self,
        source: StreamSource,
        options: &TranscodeOptions,
    ) -> Result<TranscodedStream, TranscoderError> {
        let (input, mut feed) = match source {
            StreamSource::Pcm(mut stream) => {
                if !options.filters.is_empty() {
                    warn!("PCM source bypasses the transcoder, ignoring filters '{}'", options.filters);
                }
                skip_pcm(&mut stream, options.seek_ms).await?;
                return Ok(TranscodedStream::quiet(stream));
            }
            StreamSource::Url(url) => (url, None),
            StreamSource::Bytes(reader) => ("pipe:0".to_string(), Some(reader)),
        };

        let args = Self::build_args(&input, options);
        debug!("Spawning {} {}", self.path, args.join(" "));

        let mut child = Command::new(&self.path)
            .args(&args)
            .stdin(if feed.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscoderError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TranscoderError::Spawn("stdout was not captured".into()))?;
        let (tx, errors) = flume::unbounded();
        let closed = CancellationToken::new();

        if let (Some(mut reader), Some(mut stdin)) = (feed.take(), child.stdin.take()) {
            let tx = tx.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = closed.cancelled() => {}
                    res = tokio::io::copy(&mut reader, &mut stdin) => {
                        if let Err(e) = res {
                            let _ = tx.send(TranscoderError::from_io(&e));
                        }
                    }
                }
            });
        }

        let watch = closed.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watch.cancelled() => {
                    trace!("PCM consumer went away, stopping ffmpeg");
                    let _ = child.kill().await;
                    let _ = tx.send(TranscoderError::PrematureClose);
                }
                status = child.wait() => match status {
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        let _ = tx.send(TranscoderError::Exit(status.to_string()));
                    }
                    Err(e) => {
                        let _ = tx.send(TranscoderError::Io(e.to_string()));
                    }
                },
            }
        });

        Ok(TranscodedStream {
            stream: Box::new(ProcessStream {
                stdout,
                _guard: closed.drop_guard(),
            }),
            errors,
        })
    }
}
