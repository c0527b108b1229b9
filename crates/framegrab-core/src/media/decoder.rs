use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{bail, Context, Result};
use image::{DynamicImage, RgbImage};
use tracing::{debug, error, info, warn};

use super::frame::Frame;
use super::MediaSource;
use crate::error::SourceError;
use crate::timeline::{ConstantRateTimeline, Timeline};

/// Video metadata obtained as reported by ffprobe.
#[derive(Debug, PartialEq)]
struct StreamInfo {
    width: u32,
    height: u32,
    fps: f64,
    frame_count: Option<u32>,
}

fn run_ffprobe(path: &Path, extra_args: &[&str], entries: &str) -> Result<String> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(extra_args)
        .args(["-show_entries", entries, "-of", "default=noprint_wrappers=1"])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("failed to run ffprobe, is ffmpeg installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        bail!("ffprobe failed: {stderr}");
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn read_stream_info(path: &Path) -> Result<StreamInfo> {
    info!(?path, "reading video metadata with ffprobe");

    let stdout = run_ffprobe(path, &[], "stream=width,height,r_frame_rate,nb_frames")?;
    let mut result = parse_stream_info(&stdout)?;

    if result.frame_count.is_none() {
        // Some containers (e.g. MKV, WebM) don't store a frame count. Counting
        // packets demuxes the whole file but doesn't decode it.
        warn!(?path, "container has no frame count, counting packets");
        let stdout = run_ffprobe(path, &["-count_packets"], "stream=nb_read_packets")?;
        result.frame_count = find_field(&stdout, "nb_read_packets")
            .and_then(|v| v.parse().ok());
    }

    info!(
        width = result.width,
        height = result.height,
        fps = result.fps,
        frame_count = ?result.frame_count,
        "video metadata read"
    );
    Ok(result)
}

/// Parse `key=value` lines printed by ffprobe's default writer.
fn parse_stream_info(stdout: &str) -> Result<StreamInfo> {
    let field = |key: &str| {
        find_field(stdout, key).with_context(|| format!("ffprobe output has no {key}: {stdout}"))
    };

    let width: u32 = field("width")?.parse().context("failed to parse width")?;
    let height: u32 = field("height")?.parse().context("failed to parse height")?;
    let fps = parse_frame_rate(field("r_frame_rate")?)?;
    let frame_count = find_field(stdout, "nb_frames").and_then(|v| v.parse().ok());

    Ok(StreamInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

fn find_field<'a>(stdout: &'a str, key: &str) -> Option<&'a str> {
    stdout
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .filter(|v| *v != "N/A")
}

/// Parse a rate like `30000/1001` or `25`. A zero denominator yields 0.0.
fn parse_frame_rate(raw: &str) -> Result<f64> {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.parse().context("failed to parse fps numerator")?;
        let den: f64 = den.parse().context("failed to parse fps denominator")?;
        Ok(if den > 0.0 { num / den } else { 0.0 })
    } else {
        raw.parse().context("failed to parse fps")
    }
}

/// Decodes video frames by piping raw RGB24 data from the ffmpeg CLI.
///
/// Sequential reads share one long-lived ffmpeg process. Random access
/// spawns a short-lived process per seek so the sequential stream is never
/// disturbed.
pub struct VideoDecoder {
    path: PathBuf,
    stream: Option<Child>,
    width: u32,
    height: u32,
    fps: f64,
    timeline: Timeline,
    frames_read: u32,
    frame_bytes: usize,
}

impl VideoDecoder {
    /// Open a video file for decoding. Fails if ffprobe can't provide a
    /// positive frame rate and frame count.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let info =
            read_stream_info(path).map_err(|e| SourceError::open(path, format!("{e:#}")))?;
        if info.width == 0 || info.height == 0 {
            return Err(SourceError::open(
                path,
                format!("invalid video dimensions: {}x{}", info.width, info.height),
            ));
        }

        let frame_count = info.frame_count.ok_or_else(|| {
            SourceError::InvalidTimeline("frame count not available from container".to_string())
        })?;
        let timeline = ConstantRateTimeline::new(info.fps, frame_count)?.into();

        let frame_bytes = (info.width as usize) * (info.height as usize) * 3;

        info!(
            ?path,
            width = info.width,
            height = info.height,
            fps = info.fps,
            frame_count,
            frame_bytes,
            "video decoder opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            stream: None,
            width: info.width,
            height: info.height,
            fps: info.fps,
            timeline,
            frames_read: 0,
            frame_bytes,
        })
    }

    fn spawn_ffmpeg(&self, seek_seconds: Option<f64>, single_frame: bool) -> Result<Child> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin"]);
        if let Some(seconds) = seek_seconds {
            // Input-side seek is frame-accurate when decoding.
            cmd.args(["-ss", &format!("{seconds:.6}")]);
        }
        cmd.arg("-i").arg(&self.path);
        if single_frame {
            cmd.args(["-frames:v", "1"]);
        }
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        cmd.spawn()
            .context("failed to spawn ffmpeg, is ffmpeg installed?")
    }

    /// Spawn a one-shot ffmpeg that decodes only the frame at `index`.
    fn read_single(&self, index: u32) -> Result<Option<RgbImage>> {
        // Aim half a frame early so rounding in the container's timestamps
        // can't land the seek on the following frame.
        let seek = ((index as f64 - 0.5) / self.fps).max(0.0);
        debug!(index, seek, "seeking video");

        let mut child = self.spawn_ffmpeg(Some(seek), true)?;
        let result = match child.stdout.as_mut() {
            Some(stdout) => read_raw_frame(stdout, self.frame_bytes, self.width, self.height),
            None => Err(anyhow::anyhow!("ffmpeg stdout not available")),
        };
        let _ = child.kill();
        let _ = child.wait();
        result
    }

    fn stream_stdout(&mut self) -> Result<&mut ChildStdout> {
        if self.stream.is_none() {
            info!(path = ?self.path, "spawning ffmpeg decoder process");
            self.stream = Some(self.spawn_ffmpeg(None, false)?);
        }
        self.stream
            .as_mut()
            .and_then(|child| child.stdout.as_mut())
            .context("ffmpeg stdout not available")
    }
}

/// Read exactly one raw RGB24 frame, or `None` if the stream is already finished.
fn read_raw_frame(
    stdout: &mut impl Read,
    frame_bytes: usize,
    width: u32,
    height: u32,
) -> Result<Option<RgbImage>> {
    let mut buf = vec![0u8; frame_bytes];
    let mut read = 0;

    while read < frame_bytes {
        match stdout.read(&mut buf[read..]) {
            Ok(0) => {
                if read == 0 {
                    return Ok(None);
                }
                bail!("ffmpeg stream ended mid-frame (read {read}/{frame_bytes} bytes)");
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("failed to read from ffmpeg pipe"),
        }
    }

    let image = RgbImage::from_raw(width, height, buf)
        .context("failed to create RgbImage from raw frame data")?;
    Ok(Some(image))
}

impl MediaSource for VideoDecoder {
    fn frame_count(&self) -> Option<u32> {
        Some(self.timeline.frame_count())
    }

    fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn frame_at(&mut self, index: u32) -> Result<Frame, SourceError> {
        match self.read_single(index) {
            Ok(Some(image)) => Ok(Frame {
                image: DynamicImage::ImageRgb8(image),
                frame_number: index,
                timestamp_seconds: self.timeline.timestamp_of(index),
            }),
            Ok(None) => Err(SourceError::read(index, "no frame decoded at seek target")),
            Err(e) => Err(SourceError::read(index, format!("{e:#}"))),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let index = self.frames_read;
        let (frame_bytes, width, height) = (self.frame_bytes, self.width, self.height);

        let image = self
            .stream_stdout()
            .and_then(|stdout| read_raw_frame(stdout, frame_bytes, width, height))
            .map_err(|e| {
                error!(frame = index, error = ?e, "failed to read from ffmpeg");
                SourceError::read(index, format!("{e:#}"))
            });

        // A failed read still uses up its position in the stream.
        let image = match image {
            Ok(image) => image,
            Err(e) => {
                self.frames_read += 1;
                return Err(e);
            }
        };

        let Some(image) = image else {
            info!(total_frames = self.frames_read, "video stream ended");
            return Ok(None);
        };

        self.frames_read += 1;
        let timestamp_seconds = self.timeline.timestamp_of(index);
        debug!(frame_number = index, timestamp_seconds, "decoded frame");

        Ok(Some(Frame {
            image: DynamicImage::ImageRgb8(image),
            frame_number: index,
            timestamp_seconds,
        }))
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        info!(total_frames = self.frames_read, "closing video decoder");
        if let Some(mut child) = self.stream.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn parses_stream_info() {
        let out = "width=1920\nheight=1080\nr_frame_rate=30000/1001\nnb_frames=900\n";
        let info = parse_stream_info(out).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.fps - 29.97002997).abs() < 1e-6);
        assert_eq!(info.frame_count, Some(900));
    }

    #[test]
    fn missing_frame_count_is_none() {
        let out = "width=640\nheight=360\nr_frame_rate=25/1\nnb_frames=N/A\n";
        let info = parse_stream_info(out).unwrap();
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn missing_dimensions_fail() {
        assert!(parse_stream_info("r_frame_rate=25/1\n").is_err());
    }

    #[test]
    fn parses_frame_rates() {
        assert_eq!(parse_frame_rate("25/1").unwrap(), 25.0);
        assert_eq!(parse_frame_rate("60").unwrap(), 60.0);
        assert_eq!(parse_frame_rate("0/0").unwrap(), 0.0);
        assert!(parse_frame_rate("abc").is_err());
    }

    #[test]
    fn reads_whole_frames_then_end() {
        let data = vec![7u8; 2 * 2 * 3 * 2];
        let mut cursor = Cursor::new(data);
        assert!(read_raw_frame(&mut cursor, 12, 2, 2).unwrap().is_some());
        assert!(read_raw_frame(&mut cursor, 12, 2, 2).unwrap().is_some());
        assert!(read_raw_frame(&mut cursor, 12, 2, 2).unwrap().is_none());
    }

    /// Decoder over a 2x2 video whose "ffmpeg" is any process writing to stdout.
    #[cfg(unix)]
    fn decoder_reading(shell: &str) -> VideoDecoder {
        let child = Command::new("sh")
            .args(["-c", shell])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        VideoDecoder {
            path: PathBuf::from("fake.mp4"),
            stream: Some(child),
            width: 2,
            height: 2,
            fps: 30.0,
            timeline: ConstantRateTimeline::new(30.0, 10).unwrap().into(),
            frames_read: 0,
            frame_bytes: 12,
        }
    }

    #[cfg(unix)]
    #[test]
    fn sequential_reads_number_frames_from_zero() {
        let mut decoder = decoder_reading("printf 'aaaabbbbccccddddeeeeffff'");
        let first = decoder.next_frame().unwrap().unwrap();
        let second = decoder.next_frame().unwrap().unwrap();
        assert_eq!((first.frame_number, second.frame_number), (0, 1));
        assert!((second.timestamp_seconds - 1.0 / 30.0).abs() < 1e-12);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn failed_read_still_advances_the_frame_position() {
        let mut decoder = decoder_reading("printf 'abcde'");
        let err = decoder.next_frame().unwrap_err();
        assert!(matches!(err, SourceError::Read { index: 0, .. }));
        assert_eq!(decoder.frames_read, 1);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut cursor = Cursor::new(vec![0u8; 5]);
        assert!(read_raw_frame(&mut cursor, 12, 2, 2).is_err());
    }
}
