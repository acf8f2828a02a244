//! Encrypted frame transport used after the handshake.
//!
//! A single reader task opens incoming frames strictly in order and hands
//! them to the consumer over a channel. The first failure (bad tag, skipped
//! nonce, truncated or oversized frame, closed stream) is delivered once and
//! ends the loop; the connection is unusable afterwards. Outgoing frames are
//! sealed and written under one lock so nonce order matches wire order.

use std::sync::Arc;

use tether_crypto::aead::{CipherState, TAG_SIZE};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::frame::{FrameReader, FrameSocket, FrameWriter};
use crate::noise::TransportKeys;
use crate::{Result, TransportError};

const INCOMING_BUFFER: usize = 64;

/// An authenticated, encrypted framed connection.
pub struct NoiseSocket<S> {
    writer: NoiseWriter<S>,
    incoming: mpsc::Receiver<Result<Vec<u8>>>,
    reader_task: JoinHandle<()>,
}

/// Cloneable sending handle of a [`NoiseSocket`].
pub struct NoiseWriter<S> {
    inner: Arc<Mutex<SealedWriter<S>>>,
}

struct SealedWriter<S> {
    frames: FrameWriter<S>,
    cipher: CipherState,
}

impl<S> Clone for NoiseWriter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> NoiseSocket<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Switch `frames` into encrypted mode. Must be called within a tokio runtime.
    pub fn new(frames: FrameSocket<S>, keys: &TransportKeys) -> Self {
        let (reader, writer) = frames.into_split();
        let (tx, rx) = mpsc::channel(INCOMING_BUFFER);
        let read_cipher = CipherState::new(keys.read_key());
        let reader_task = tokio::spawn(read_loop(reader, read_cipher, tx));

        Self {
            writer: NoiseWriter {
                inner: Arc::new(Mutex::new(SealedWriter {
                    frames: writer,
                    cipher: CipherState::new(keys.write_key()),
                })),
            },
            incoming: rx,
            reader_task,
        }
    }

    /// Seal and send one frame.
    pub async fn send_frame(&self, plaintext: &[u8]) -> Result<()> {
        self.writer.send_frame(plaintext).await
    }

    /// Next decrypted frame. After an error has been delivered, returns `Closed`.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        match self.incoming.recv().await {
            Some(frame) => frame,
            None => Err(TransportError::Closed),
        }
    }

    /// A handle that can send from other tasks.
    pub fn writer(&self) -> NoiseWriter<S> {
        self.writer.clone()
    }

    /// Shut down the write direction and stop reading.
    pub async fn close(&self) -> Result<()> {
        self.reader_task.abort();
        self.writer.inner.lock().await.frames.shutdown().await
    }
}

impl<S> NoiseWriter<S>
where
    S: AsyncWrite,
{
    /// Seal and send one frame. Oversized frames are rejected before a nonce is used.
    pub async fn send_frame(&self, plaintext: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let size = plaintext.len() + TAG_SIZE;
        let max = guard.frames.max_frame_size();
        if size > max {
            return Err(TransportError::FrameTooLarge { size, max });
        }
        let sealed = guard.cipher.encrypt(plaintext, &[])?;
        guard.frames.send_frame(&sealed).await
    }
}

impl<S> Drop for NoiseSocket<S> {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop<S: AsyncRead>(
    mut reader: FrameReader<S>,
    mut cipher: CipherState,
    tx: mpsc::Sender<Result<Vec<u8>>>,
) {
    loop {
        let opened = match reader.read_frame().await {
            Ok(frame) => cipher.decrypt(&frame, &[]).map_err(TransportError::from),
            Err(e) => Err(e),
        };
        let failed = opened.is_err();
        if let Err(e) = &opened {
            tracing::debug!(
                error = %e,
                counter = cipher.counter(),
                "noise socket read loop ending"
            );
        }
        if tx.send(opened).await.is_err() || failed {
            break;
        }
    }
}
