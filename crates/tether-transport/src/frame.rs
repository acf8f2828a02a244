//! Length-prefixed framing over a byte stream.
//!
//! Wire format: `[length:3 BE][payload:length]`. The connection header is
//! written once, in front of the first outgoing frame. Frames are plaintext
//! here; [`NoiseSocket`](crate::socket::NoiseSocket) seals them after the
//! handshake.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::{Result, TransportError};

/// Width of the big-endian length header.
pub const FRAME_LENGTH_SIZE: usize = 3;

/// Largest payload a 3-byte length can describe.
pub const FRAME_MAX_SIZE: usize = (1 << 24) - 1;

/// Default connection header: magic `WA`, protocol 6, dictionary 3.
pub const CONN_HEADER: [u8; 4] = [b'W', b'A', 6, 3];

/// Both halves of a framed stream, used during the handshake.
pub struct FrameSocket<S> {
    reader: FrameReader<S>,
    writer: FrameWriter<S>,
    header: Vec<u8>,
}

/// Receiving half of a framed stream.
pub struct FrameReader<S> {
    inner: ReadHalf<S>,
    max_frame_size: usize,
}

/// Sending half of a framed stream.
pub struct FrameWriter<S> {
    inner: WriteHalf<S>,
    pending_header: Option<Vec<u8>>,
    max_frame_size: usize,
}

impl<S: AsyncRead + AsyncWrite> FrameSocket<S> {
    /// Wrap `stream`; `header` is sent before the first frame (may be empty).
    pub fn new(stream: S, header: &[u8]) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FrameReader {
                inner: read,
                max_frame_size: FRAME_MAX_SIZE,
            },
            writer: FrameWriter {
                inner: write,
                pending_header: (!header.is_empty()).then(|| header.to_vec()),
                max_frame_size: FRAME_MAX_SIZE,
            },
            header: header.to_vec(),
        }
    }

    /// Lower the frame size limit for both directions.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        let max = max.min(FRAME_MAX_SIZE);
        self.reader.max_frame_size = max;
        self.writer.max_frame_size = max;
        self
    }

    /// The connection header, which also serves as the handshake prologue.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Write one frame.
    pub async fn send_frame(&mut self, data: &[u8]) -> Result<()> {
        self.writer.send_frame(data).await
    }

    /// Read one frame.
    pub async fn receive_frame(&mut self) -> Result<Vec<u8>> {
        self.reader.read_frame().await
    }

    /// Send a frame and wait for the next incoming one, bounded by `timeout`.
    pub async fn send_and_receive(&mut self, data: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        self.send_frame(data).await?;
        tokio::time::timeout(timeout, self.reader.read_frame())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    /// Consume and check the peer's connection header (responder side).
    pub async fn read_header(&mut self, expected: &[u8]) -> Result<()> {
        let mut received = vec![0u8; expected.len()];
        self.reader
            .inner
            .read_exact(&mut received)
            .await
            .map_err(|e| eof_as(e, "header"))?;
        if received != expected {
            return Err(TransportError::ProtocolViolation(
                "unexpected connection header".to_string(),
            ));
        }
        Ok(())
    }

    /// Split into independently owned halves.
    pub fn into_split(self) -> (FrameReader<S>, FrameWriter<S>) {
        (self.reader, self.writer)
    }
}

impl<S: AsyncRead> FrameReader<S> {
    /// Read one frame. Oversized lengths are rejected before the payload is read.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; FRAME_LENGTH_SIZE];
        let first = self.inner.read(&mut len_buf[..1]).await?;
        if first == 0 {
            return Err(TransportError::Closed);
        }
        self.inner
            .read_exact(&mut len_buf[1..])
            .await
            .map_err(|e| eof_as(e, "length header"))?;

        let len = (usize::from(len_buf[0]) << 16)
            | (usize::from(len_buf[1]) << 8)
            | usize::from(len_buf[2]);
        if len > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(|e| eof_as(e, "payload"))?;
        tracing::trace!(len, "frame received");
        Ok(payload)
    }
}

impl<S: AsyncWrite> FrameWriter<S> {
    /// Write one frame, prefixed by the connection header if not yet sent.
    pub async fn send_frame(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: data.len(),
                max: self.max_frame_size,
            });
        }

        let header = self.pending_header.take().unwrap_or_default();
        let mut buf = Vec::with_capacity(header.len() + FRAME_LENGTH_SIZE + data.len());
        buf.extend_from_slice(&header);
        let len = data.len() as u32;
        buf.extend_from_slice(&len.to_be_bytes()[1..]);
        buf.extend_from_slice(data);

        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        tracing::trace!(len = data.len(), "frame sent");
        Ok(())
    }

    /// Largest payload this writer accepts.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Shut down the write direction.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

fn eof_as(err: std::io::Error, part: &'static str) -> TransportError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::Truncated(part)
    } else {
        TransportError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_roundtrip_with_header() {
        let (a, b) = tokio::io::duplex(1024);
        let mut client = FrameSocket::new(a, &CONN_HEADER);
        let mut server = FrameSocket::new(b, &[]);

        client.send_frame(b"hello").await.expect("send");
        client.send_frame(b"again").await.expect("send");

        server.read_header(&CONN_HEADER).await.expect("header");
        assert_eq!(server.receive_frame().await.expect("recv"), b"hello");
        // Header is sent only once.
        assert_eq!(server.receive_frame().await.expect("recv"), b"again");
    }

    #[tokio::test]
    async fn test_length_prefix_layout() {
        let (a, mut b) = tokio::io::duplex(1024);
        let mut client = FrameSocket::new(a, &[]);
        client.send_frame(&[0xAB; 258]).await.expect("send");

        let mut raw = [0u8; 3];
        b.read_exact(&mut raw).await.expect("read");
        assert_eq!(raw, [0x00, 0x01, 0x02]);
    }

    #[tokio::test]
    async fn test_oversized_outbound_rejected() {
        let (a, _b) = tokio::io::duplex(64);
        let mut client = FrameSocket::new(a, &[]).with_max_frame_size(16);
        let result = client.send_frame(&[0u8; 17]).await;
        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge { size: 17, max: 16 })
        ));
    }

    #[tokio::test]
    async fn test_oversized_inbound_rejected_before_payload() {
        let (a, mut b) = tokio::io::duplex(64);
        let mut server = FrameSocket::new(a, &[]).with_max_frame_size(16);
        // Announce 1000 bytes but send none of them.
        b.write_all(&[0x00, 0x03, 0xE8]).await.expect("write");
        let result = server.receive_frame().await;
        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge { size: 1000, max: 16 })
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let (a, mut b) = tokio::io::duplex(64);
        let mut server = FrameSocket::new(a, &[]);
        b.write_all(&[0x00, 0x00, 0x05, 1, 2]).await.expect("write");
        drop(b);
        assert!(matches!(
            server.receive_frame().await,
            Err(TransportError::Truncated("payload"))
        ));
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let (a, mut b) = tokio::io::duplex(64);
        let mut server = FrameSocket::new(a, &[]);
        b.write_all(&[0x00]).await.expect("write");
        drop(b);
        assert!(matches!(
            server.receive_frame().await,
            Err(TransportError::Truncated("length header"))
        ));
    }

    #[tokio::test]
    async fn test_clean_close() {
        let (a, b) = tokio::io::duplex(64);
        let mut server = FrameSocket::new(a, &[]);
        drop(b);
        assert!(matches!(
            server.receive_frame().await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_and_receive_times_out() {
        let (a, _b) = tokio::io::duplex(1024);
        let mut client = FrameSocket::new(a, &[]);
        let result = client
            .send_and_receive(b"ping", Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_wrong_header_rejected() {
        let (a, b) = tokio::io::duplex(64);
        let mut client = FrameSocket::new(a, b"XX\x01\x01");
        let mut server = FrameSocket::new(b, &[]);
        client.send_frame(b"x").await.expect("send");
        assert!(matches!(
            server.read_header(&CONN_HEADER).await,
            Err(TransportError::ProtocolViolation(_))
        ));
    }
}
