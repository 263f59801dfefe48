//! In-memory storage backed by a `Vec<u8>`.
//!
//! Used for ephemeral tables and throughout the test suite. Unlike the
//! file backend it can lend slices directly out of its buffer, so reads
//! through [`Storage::try_direct_read`] are copy-free.

use eyre::Result;

use super::Storage;

/// Growable in-memory byte storage.
#[derive(Debug, Default)]
pub struct MemStorage {
    data: Vec<u8>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Storage for MemStorage {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&mut self, offset: u64, out: &mut [u8]) -> Result<()> {
        let len = self.data.len() as u64;
        let start = offset.min(len) as usize;
        let avail = (len as usize) - start;
        let copied = avail.min(out.len());
        out[..copied].copy_from_slice(&self.data[start..start + copied]);
        out[copied..].fill(0);
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset as usize + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, new_len: u64) -> Result<()> {
        self.data.resize(new_len as usize, 0);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn try_direct_read(&mut self, offset: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(len)?;
        self.data.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_past_end_zero_fills() {
        let mut storage = MemStorage::from_bytes(vec![1, 2, 3]);
        let mut out = [0xFFu8; 6];
        storage.read(1, &mut out).unwrap();
        assert_eq!(out, [2, 3, 0, 0, 0, 0]);
    }

    #[test]
    fn write_extends_with_zero_gap() {
        let mut storage = MemStorage::new();
        storage.write(4, &[9, 9]).unwrap();
        assert_eq!(storage.as_bytes(), &[0, 0, 0, 0, 9, 9]);
        assert_eq!(storage.len(), 6);
    }

    #[test]
    fn direct_read_bounds() {
        let mut storage = MemStorage::from_bytes(vec![5; 8]);
        assert_eq!(storage.try_direct_read(2, 4), Some(&[5u8; 4][..]));
        assert_eq!(storage.try_direct_read(6, 4), None);
    }
}
