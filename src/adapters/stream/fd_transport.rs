use std::io::{BufReader, Read, Write};

use crate::core::errors::{LayerlockError, Result};

/// File descriptor the payload envelope arrives on, by convention
/// pre-arranged with the invoking process.
pub const PAYLOAD_FD: i32 = 3;

/// Chunk size of the plaintext copy loop.
pub const COPY_CHUNK: usize = 10 * 1024;

/// Read one serialized payload envelope from an already-open file
/// descriptor. The descriptor is consumed: closed once the stream ends.
#[cfg(unix)]
pub fn read_payload(fd: i32) -> Result<Vec<u8>> {
    use std::os::fd::FromRawFd;

    if fd < 0 {
        return Err(LayerlockError::Transport {
            fd,
            detail: "negative file descriptor".to_string(),
        });
    }

    let file = unsafe { std::fs::File::from_raw_fd(fd) };
    let mut data = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut data)
        .map_err(|e| LayerlockError::Transport {
            fd,
            detail: format!("could not read payload: {e}"),
        })?;

    Ok(data)
}

/// Copy `reader` to `writer` in fixed-size chunks until end-of-stream.
/// Clean end-of-stream terminates the loop; any other error propagates.
pub fn copy_chunks(mut reader: impl Read, mut writer: impl Write) -> Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total: u64 = 0;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    writer.flush()?;
    Ok(total)
}
