//! Shared frame read/write helpers: a `u32` little-endian length prefix
//! followed by that many payload bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{error::TransportError, MAX_SEND_DATA};

/// Write `data` as one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), TransportError> {
    if data.len() > MAX_SEND_DATA {
        return Err(TransportError::MessageTooLarge { len: data.len(), max: MAX_SEND_DATA });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame, or [`TransportError::Closed`] if the peer
/// closed the connection before (or while) sending one.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::Closed);
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_SEND_DATA {
        return Err(TransportError::MessageTooLarge { len, max: MAX_SEND_DATA });
    }
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Closed
        } else {
            TransportError::Io(e)
        }
    })?;
    Ok(data)
}
