/* src/mover/verify.rs */

use crate::error::{TransferError, VerifyFailure};
use crate::setup::config::VerifyMode;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Decides whether the destination copy can replace the source.
/// NOTE: This is a BLOCKING function and should be run via `tokio::task::spawn_blocking`.
pub fn verify_copy_blocking(
    src: &Path,
    src_len: u64,
    dst: &Path,
    mode: VerifyMode,
) -> Result<(), TransferError> {
    let fail = |reason| TransferError::Verify {
        dst: dst.to_path_buf(),
        reason,
    };

    let dst_len = match fs::metadata(dst) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return Err(fail(VerifyFailure::Missing)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(fail(VerifyFailure::Missing));
        }
        Err(source) => {
            return Err(TransferError::Metadata {
                path: dst.to_path_buf(),
                source,
            });
        }
    };
    if dst_len == 0 {
        return Err(fail(VerifyFailure::Empty));
    }
    if dst_len != src_len {
        return Err(fail(VerifyFailure::SizeMismatch {
            expected: src_len,
            actual: dst_len,
        }));
    }

    if mode == VerifyMode::Checksum {
        let expected = sha256_file(src)?;
        let actual = sha256_file(dst)?;
        if expected != actual {
            return Err(fail(VerifyFailure::ChecksumMismatch { expected, actual }));
        }
    }
    Ok(())
}

/// Hex encoded SHA-256 of a file, streamed in 8 KiB blocks.
pub fn sha256_file(path: &Path) -> Result<String, TransferError> {
    let hash_err = |source| TransferError::Hash {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = fs::File::open(path).map_err(hash_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(hash_err(e)),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}
