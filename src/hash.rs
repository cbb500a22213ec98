//! Streaming SHA-256 of file contents.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

/// Read buffer size. Only affects throughput, never the digest.
const CHUNK_SIZE: usize = 64 * 1024;

/// Hash the contents of `path` and return the 64-character lowercase hex
/// digest.
///
/// Any open or read failure (permission denied, file vanished mid-read,
/// device error) yields `None`; hashing never aborts the enclosing scan.
pub fn hash_file(path: &Path) -> Option<String> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot open for hashing");
            return None;
        }
    };

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "read failed while hashing");
                return None;
            }
        }
    }

    let digest = hasher.finalize();
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}
