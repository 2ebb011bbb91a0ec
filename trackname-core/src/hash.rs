use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{EditError, IoContext};

pub fn sha256_file_hex(path: impl AsRef<Path>) -> Result<String, EditError> {
    let path = path.as_ref();
    let mut file = File::open(path).io_context(|| format!("Failed to open {}", path.display()))?;
    sha256_reader_hex(&mut file).io_context(|| format!("Failed to hash {}", path.display()))
}

pub fn sha256_reader_hex<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut h = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(hex::encode(h.finalize()))
}
