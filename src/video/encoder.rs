use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::video::errors::VideoError;

#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Encode the frames in `dir` matching the printf-style `pattern`.
    async fn encode(&self, dir: &Path, pattern: &str, out: &Path) -> Result<(), VideoError>;

    /// Compose `left` and `right` side by side into `out`.
    async fn side_by_side(&self, left: &Path, right: &Path, out: &Path) -> Result<(), VideoError>;
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: String,
    fps: u32,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            fps: 15,
        }
    }
}

impl Ffmpeg {
    pub fn new(program: impl Into<String>, fps: u32) -> Self {
        Self {
            program: program.into(),
            fps,
        }
    }

    fn encode_args(&self, dir: &Path, pattern: &str, out: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-framerate".into(),
            self.fps.to_string().into(),
            "-i".into(),
            dir.join(pattern).into_os_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            out.as_os_str().to_owned(),
        ]
    }

    fn compose_args(left: &Path, right: &Path, out: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            left.as_os_str().to_owned(),
            "-i".into(),
            right.as_os_str().to_owned(),
            "-filter_complex".into(),
            "[0:v]pad=iw*2:ih[int];[int][1:v]overlay=W/2:0[vid]".into(),
            "-map".into(),
            "[vid]".into(),
            "-c:v".into(),
            "libx264".into(),
            "-crf".into(),
            "23".into(),
            "-preset".into(),
            "veryfast".into(),
            out.as_os_str().to_owned(),
        ]
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), VideoError> {
        debug!(program = %self.program, ?args, "spawning");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| VideoError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(VideoError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VideoEncoder for Ffmpeg {
    async fn encode(&self, dir: &Path, pattern: &str, out: &Path) -> Result<(), VideoError> {
        self.run(self.encode_args(dir, pattern, out)).await
    }

    async fn side_by_side(&self, left: &Path, right: &Path, out: &Path) -> Result<(), VideoError> {
        self.run(Self::compose_args(left, right, out)).await
    }
}

/// Encode the RGB and annotated frame sequences concurrently, then put them
/// side by side in `out`. Returns the composed video path.
pub async fn assemble<V>(
    encoder: &V,
    images: &Path,
    annotated: &Path,
    out: &Path,
) -> Result<PathBuf, VideoError>
where
    V: VideoEncoder + ?Sized,
{
    let rgb = images.join("out.mp4");
    let overlay = annotated.join("out.mp4");
    futures::try_join!(
        encoder.encode(images, "%06d_rgb.png", &rgb),
        encoder.encode(annotated, "%06d_annotated.png", &overlay),
    )?;
    encoder.side_by_side(&rgb, &overlay, out).await?;
    info!(path = %out.display(), "video written");
    Ok(out.to_path_buf())
}
