use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Unpin + Sync + Send>>>;

/// Sink for everything the launcher prints: the banner, notices and relayed lines
pub struct LauncherStdOut(SharedWriter);

impl Clone for LauncherStdOut {
    fn clone(&self) -> Self {
        LauncherStdOut(self.0.clone())
    }
}

impl LauncherStdOut {
    pub fn new(t: Box<dyn AsyncWrite + Unpin + Sync + Send>) -> LauncherStdOut {
        LauncherStdOut(Arc::new(Mutex::new(t)))
    }

    /// The process's own standard output
    pub fn stdout() -> LauncherStdOut {
        Self::new(Box::new(tokio::io::stdout()))
    }

    pub fn inner(&self) -> SharedWriter {
        self.0.clone()
    }

    /// Write `line` followed by a newline and flush before returning
    pub async fn print_line(&self, line: &str) -> std::io::Result<()> {
        let mut lock = self.0.lock().await;
        lock.write_all(line.as_bytes()).await?;
        lock.write_all(b"\n").await?;
        lock.flush().await
    }
}

/// In-memory writer whose contents can be inspected while the launcher still holds it
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> LauncherStdOut {
        LauncherStdOut::new(Box::new(self.clone()))
    }

    pub fn contents(&self) -> String {
        let bytes = match self.0.lock() {
            Ok(bytes) => bytes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl AsyncWrite for CapturedOutput {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let mut bytes = self
            .0
            .lock()
            .map_err(|_| std::io::Error::other("captured output lock poisoned"))?;
        bytes.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_print_line_appends_newline() {
        let captured = CapturedOutput::new();
        let out = captured.sink();

        out.print_line("hello").await.unwrap();
        out.clone().print_line("").await.unwrap();

        assert_eq!(captured.contents(), "hello\n\n");
        assert_eq!(captured.lines(), vec!["hello", ""]);
    }
}
