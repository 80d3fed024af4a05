//! Energy Record File
//!
//! Append-only file of serialized reports. Each frame is a 4-byte
//! big-endian length followed by exactly that many payload bytes. The
//! file is truncated when opened.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Write one length-prefixed frame.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame exceeds 4 GiB"))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)
}

/// Read one length-prefixed frame. `Ok(None)` on a clean end of stream.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut len = [0u8; 4];
    let mut filled = 0;
    while filled < len.len() {
        match reader.read(&mut len[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    // buffer grows with the bytes actually present, not the declared length
    let len = u64::from(u32::from_be_bytes(len));
    let mut payload = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut payload)?;
    if (payload.len() as u64) < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("frame truncated: {} of {} bytes", payload.len(), len),
        ));
    }
    Ok(Some(payload))
}

/// Writes report frames to disk, flushing after each one.
#[derive(Debug)]
pub struct EnergyRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
}

impl EnergyRecorder {
    /// Create or truncate the record file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        tracing::info!(path = %path.display(), "energy recorder opened");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            frames: 0,
        })
    }

    pub fn record(&mut self, payload: &[u8]) -> io::Result<()> {
        write_frame(&mut self.writer, payload)?;
        self.writer.flush()?;
        self.frames += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written since the file was opened.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Iterates the frames of a record file.
#[derive(Debug)]
pub struct EnergyRecordReader<R> {
    reader: R,
}

impl EnergyRecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> EnergyRecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> Iterator for EnergyRecordReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        read_frame(&mut self.reader).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_layout() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 3, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_partial_length_is_error() {
        let mut cursor = Cursor::new(vec![0u8, 0]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_short_payload_is_error() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0, 8, 1, 2]);
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn test_corrupt_length_header_is_error() {
        let mut cursor = Cursor::new(vec![0xFFu8, 0xFF, 0xFF, 0xFF, 1, 2, 3]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("3 of 4294967295"));
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("energy.rec");

        let mut recorder = EnergyRecorder::create(&path).unwrap();
        recorder.record(b"first").unwrap();
        recorder.record(b"").unwrap();
        recorder.record(b"third frame").unwrap();
        assert_eq!(recorder.frames(), 3);

        let frames: Vec<Vec<u8>> = EnergyRecordReader::open(&path)
            .unwrap()
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(frames, vec![b"first".to_vec(), Vec::new(), b"third frame".to_vec()]);
    }

    #[test]
    fn test_create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("energy.rec");
        std::fs::write(&path, b"stale contents").unwrap();

        let mut recorder = EnergyRecorder::create(&path).unwrap();
        recorder.record(b"new").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![0, 0, 0, 3, b'n', b'e', b'w']);
    }
}
