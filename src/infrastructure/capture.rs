//! 画面采集 - 基础设施层
//!
//! 采集设备由采样器独占；`CaptureGuard` 保证设备在停用、出错或
//! 任务被取消时都会被释放。

use crate::error::CaptureError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

/// 采集源（摄像头等）
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// 获取设备流
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// 已获取的设备流
#[async_trait]
pub trait CaptureStream: Send {
    /// 抓取当前画面，返回 JPEG 编码的数据
    async fn grab_frame(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// 释放设备
    fn release(&mut self) -> Result<(), CaptureError>;
}

/// 设备流的作用域守卫
pub struct CaptureGuard {
    stream: Option<Box<dyn CaptureStream>>,
}

impl CaptureGuard {
    /// 从采集源获取设备
    pub async fn acquire(source: &dyn CaptureSource) -> Result<Self, CaptureError> {
        let stream = source.acquire().await?;
        debug!("📷 采集设备已获取");
        Ok(Self {
            stream: Some(stream),
        })
    }

    pub async fn grab_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
        match self.stream.as_mut() {
            Some(stream) => stream.grab_frame().await,
            None => Err(CaptureError::FrameFailed {
                reason: "设备已释放".to_string(),
            }),
        }
    }

    /// 主动释放设备
    pub fn release(mut self) -> Result<(), CaptureError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), CaptureError> {
        match self.stream.take() {
            Some(mut stream) => {
                debug!("📷 释放采集设备");
                stream.release()
            }
            None => Ok(()),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!("释放采集设备失败: {}", e);
        }
    }
}

/// 没有摄像头时使用的采集源，每次获取都失败
pub struct NoCamera;

#[async_trait]
impl CaptureSource for NoCamera {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        Err(CaptureError::DeviceUnavailable {
            reason: "未配置采集设备".to_string(),
        })
    }
}

/// 从目录中循环读取 JPEG 画面，代替摄像头
pub struct DirectoryCapture {
    dir: PathBuf,
}

impl DirectoryCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn list_frames(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                CaptureError::PermissionDenied
            } else {
                CaptureError::DeviceUnavailable {
                    reason: format!("{}: {}", self.dir.display(), e),
                }
            }
        })?;

        let mut frames = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_jpeg = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
                .unwrap_or(false);
            if is_jpeg {
                frames.push(path);
            }
        }
        frames.sort();
        Ok(frames)
    }
}

#[async_trait]
impl CaptureSource for DirectoryCapture {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let frames = self.list_frames().await?;
        if frames.is_empty() {
            return Err(CaptureError::DeviceUnavailable {
                reason: format!("{} 中没有 JPEG 画面", self.dir.display()),
            });
        }
        Ok(Box::new(DirectoryStream {
            frames,
            next: 0,
            open: true,
        }))
    }
}

struct DirectoryStream {
    frames: Vec<PathBuf>,
    next: usize,
    open: bool,
}

#[async_trait]
impl CaptureStream for DirectoryStream {
    async fn grab_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
        if !self.open || self.frames.is_empty() {
            return Err(CaptureError::FrameFailed {
                reason: "设备未打开".to_string(),
            });
        }
        let path = &self.frames[self.next % self.frames.len()];
        self.next = self.next.wrapping_add(1);
        fs::read(path).await.map_err(|e| CaptureError::FrameFailed {
            reason: format!("{}: {}", path.display(), e),
        })
    }

    fn release(&mut self) -> Result<(), CaptureError> {
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStream {
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CaptureStream for CountingStream {
        async fn grab_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
            Ok(vec![0xFF, 0xD8])
        }

        fn release(&mut self) -> Result<(), CaptureError> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingSource {
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CaptureSource for CountingSource {
        async fn acquire(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
            Ok(Box::new(CountingStream {
                released: self.released.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_guard_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            released: released.clone(),
        };

        let mut guard = CaptureGuard::acquire(&source).await.unwrap();
        assert_eq!(guard.grab_frame().await.unwrap(), vec![0xFF, 0xD8]);
        guard.release().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        {
            let _guard = CaptureGuard::acquire(&source).await.unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_camera_is_unavailable() {
        let err = CaptureGuard::acquire(&NoCamera).await.err().unwrap();
        assert!(err.is_acquisition());
    }

    #[tokio::test]
    async fn test_directory_capture_cycles_frames() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"first").unwrap();
        std::fs::write(dir.path().join("b.JPEG"), b"second").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let source = DirectoryCapture::new(dir.path());
        let mut guard = CaptureGuard::acquire(&source).await.unwrap();
        assert_eq!(guard.grab_frame().await.unwrap(), b"first");
        assert_eq!(guard.grab_frame().await.unwrap(), b"second");
        assert_eq!(guard.grab_frame().await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_directory_capture_empty_or_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = CaptureGuard::acquire(&DirectoryCapture::new(dir.path()))
            .await
            .err()
            .unwrap();
        assert!(err.is_acquisition());

        let err = CaptureGuard::acquire(&DirectoryCapture::new("/nonexistent/frames"))
            .await
            .err()
            .unwrap();
        assert!(err.is_acquisition());
    }
}
