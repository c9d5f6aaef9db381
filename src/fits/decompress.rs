//! Decompression shim: turns a path into container bytes, transparently
//! unwrapping a gzip envelope.
//!
//! Uncompressed files are memory-mapped so array views never copy. Gzip input
//! is inflated once into an owned buffer which then becomes the container's
//! storage; nothing is written to disk.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::debug;

use super::storage::Storage;
use crate::error::{FitsError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The first card of every primary header starts with this keyword.
const SIMPLE_KEYWORD: &[u8] = b"SIMPLE  =";

/// Compression envelope around the container bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    Plain,
    Gzip,
}

/// Decide the envelope from the leading bytes; the extension only matters
/// when it claims gzip and the content disagrees.
fn detect_envelope(path: &Path, head: &[u8]) -> Result<Envelope> {
    if head.starts_with(&GZIP_MAGIC) {
        return Ok(Envelope::Gzip);
    }
    if has_gz_extension(path) {
        return Err(FitsError::CorruptArchive {
            path: path.to_path_buf(),
            reason: "file has a .gz extension but no gzip header".into(),
        });
    }
    Ok(Envelope::Plain)
}

pub(crate) fn has_gz_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

fn read_head(file: &mut File, path: &Path, n: u64) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(n as usize);
    file.by_ref()
        .take(n)
        .read_to_end(&mut head)
        .map_err(|e| FitsError::io(path, e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| FitsError::io(path, e))?;
    Ok(head)
}

/// Open `path` and return the decoded container bytes.
pub fn open(path: &Path) -> Result<Storage> {
    let mut file = File::open(path).map_err(|e| FitsError::io(path, e))?;
    let head = read_head(&mut file, path, GZIP_MAGIC.len() as u64)?;

    match detect_envelope(path, &head)? {
        Envelope::Plain => {
            drop(file);
            Storage::map_file(path)
        }
        Envelope::Gzip => {
            let compressed = file.metadata().map(|m| m.len()).unwrap_or(0);
            let mut decoder = MultiGzDecoder::new(BufReader::new(file));
            let mut bytes = Vec::new();
            decoder
                .read_to_end(&mut bytes)
                .map_err(|e| FitsError::CorruptArchive {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            debug!(
                "inflated {} ({} -> {} bytes)",
                path.display(),
                compressed,
                bytes.len()
            );
            Ok(Storage::from_vec(bytes))
        }
    }
}

/// Content sniffing for format dispatchers: true when the (possibly
/// gzip-wrapped) file starts with a primary header. Only the first card is
/// decoded.
pub fn is_fits(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| FitsError::io(path, e))?;
    let head = read_head(&mut file, path, GZIP_MAGIC.len() as u64)?;

    let mut card = Vec::with_capacity(80);
    let read = if head.starts_with(&GZIP_MAGIC) {
        MultiGzDecoder::new(BufReader::new(file))
            .take(80)
            .read_to_end(&mut card)
    } else {
        file.take(80).read_to_end(&mut card)
    };
    if read.is_err() || card.len() < 80 {
        return Ok(false);
    }
    let value = String::from_utf8_lossy(&card[10..30]);
    Ok(card.starts_with(SIMPLE_KEYWORD) && value.trim() == "T")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::fixture::{FitsBuilder, ImageSpec};
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(bytes).unwrap();
        path
    }

    fn container_bytes() -> Vec<u8> {
        FitsBuilder::new()
            .primary(ImageSpec::new(vec![2, 2], vec![0.0; 4]))
            .to_bytes()
    }

    #[test]
    fn plain_files_are_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "plain.fits", &container_bytes());
        let storage = open(&path).unwrap();
        assert!(storage.is_mapped());
        assert_eq!(storage.bytes(), container_bytes().as_slice());
    }

    #[test]
    fn gzip_is_inflated_by_magic_not_extension() {
        let dir = tempfile::tempdir().unwrap();
        let gz = FitsBuilder::gzip(&container_bytes()).unwrap();
        let path = write(&dir, "disguised.fits", &gz);
        let storage = open(&path).unwrap();
        assert!(!storage.is_mapped());
        assert_eq!(storage.bytes(), container_bytes().as_slice());
    }

    #[test]
    fn truncated_gzip_is_a_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let gz = FitsBuilder::gzip(&container_bytes()).unwrap();
        let path = write(&dir, "cut.fits.gz", &gz[..gz.len() / 2]);
        assert!(matches!(
            open(&path),
            Err(FitsError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn gz_extension_without_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "fake.fits.gz", &container_bytes());
        assert!(matches!(
            open(&path),
            Err(FitsError::CorruptArchive { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = open(Path::new("/definitely/not/here.fits")).unwrap_err();
        assert!(matches!(err, FitsError::Io { .. }));
    }

    #[test]
    fn sniffs_plain_and_compressed_containers() {
        let dir = tempfile::tempdir().unwrap();
        let plain = write(&dir, "a.dat", &container_bytes());
        let gz = write(&dir, "b.bin", &FitsBuilder::gzip(&container_bytes()).unwrap());
        let text = write(&dir, "c.fits", b"not a fits file at all");
        assert!(is_fits(&plain).unwrap());
        assert!(is_fits(&gz).unwrap());
        assert!(!is_fits(&text).unwrap());
    }
}
