use std::time::Duration;

use gnut_api::{
    codec::{BlockDecoder, HeaderBlock},
    error::{HandshakeError, HandshakeResult},
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

const READ_CHUNK: usize = 2048;

/// Reads until `decoder` yields a whole header block.
///
/// Bytes already buffered by an earlier call are decoded first, so a peer that
/// pipelines its next block is never read twice. Each socket read is bounded by
/// `timeout`; a zero-length read means the peer hung up mid-block.
pub async fn read_block<S>(
    stream: &mut S,
    decoder: &mut BlockDecoder,
    timeout: Duration,
) -> HandshakeResult<HeaderBlock>
where
    S: AsyncRead + Unpin,
{
    let mut tmp = [0u8; READ_CHUNK];
    loop {
        if let Some(block) = decoder.next_block()? {
            trace!(target: "gnutd", start_line = %block.start_line, headers = block.headers.len(), "read header block");
            return Ok(block);
        }
        let n = tokio::time::timeout(timeout, stream.read(&mut tmp))
            .await
            .map_err(|_| HandshakeError::Timeout(timeout))??;
        if n == 0 {
            return Err(HandshakeError::Closed);
        }
        decoder.extend(&tmp[..n]);
    }
}

/// Writes an encoded block and flushes it, bounded by `timeout`.
pub async fn write_block<S>(stream: &mut S, bytes: &[u8], timeout: Duration) -> HandshakeResult<()>
where
    S: AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, async {
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok::<_, std::io::Error>(())
    })
    .await
    .map_err(|_| HandshakeError::Timeout(timeout))??;
    trace!(target: "gnutd", bytes = bytes.len(), "wrote header block");
    Ok(())
}
