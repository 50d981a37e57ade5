// src/hash.rs
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Вычисляет SHA256 хэш файла потоково, с постоянным расходом памяти
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;

    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_digest_known_value() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "abc").unwrap();

        assert_eq!(
            file_digest(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_detects_change() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a.bin");
        fs::write(&path, vec![0u8; 100_000]).unwrap();
        let before = file_digest(&path).unwrap();

        let mut data = vec![0u8; 100_000];
        data[50_000] = 1;
        fs::write(&path, data).unwrap();

        assert_ne!(before, file_digest(&path).unwrap());
    }
}
