use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Largest frame a peer may announce (100 MiB)
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Write one frame: a 4-byte big-endian length prefix followed by the payload
pub async fn write_frame<W>(writer: &mut W, bytes: &[u8], timeout: Option<Duration>) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    if bytes.len() > MAX_FRAME_LEN {
        return Err(Error::InvalidFrame(format!(
            "Message too large: {} bytes",
            bytes.len()
        )));
    }

    let send_op = async {
        writer.write_u32(bytes.len() as u32).await?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok::<(), Error>(())
    };

    with_timeout(timeout, send_op, "Send timeout exceeded").await
}

/// Read one length-prefixed frame
pub async fn read_frame<R>(reader: &mut R, timeout: Option<Duration>) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let receive_op = async {
        let len = reader.read_u32().await.map_err(eof_to_closed)? as usize;

        if len > MAX_FRAME_LEN {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await.map_err(eof_to_closed)?;

        Ok::<Vec<u8>, Error>(buf)
    };

    with_timeout(timeout, receive_op, "Receive timeout exceeded").await
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    op: impl Future<Output = Result<T>>,
    message: &str,
) -> Result<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| Error::Custom(message.to_string()))?,
        None => op.await,
    }
}

fn eof_to_closed(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}
