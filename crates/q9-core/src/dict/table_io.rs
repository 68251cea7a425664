use std::fs::{self, File};
use std::path::Path;

use memmap2::Mmap;
use tracing::warn;

use super::table::{TableBody, TableDictionary};
use super::DictError;

const MAGIC: &[u8; 4] = b"Q9DX";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 4 + 1 + 4; // magic + version + body_len = 9

impl TableDictionary {
    pub fn to_bytes(&self) -> Result<Vec<u8>, DictError> {
        let body = bincode::serialize(&self.to_body()).map_err(DictError::Serialize)?;
        let body_len: u32 = body
            .len()
            .try_into()
            .map_err(|_| DictError::Parse("body exceeds u32::MAX".to_string()))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DictError> {
        if data.len() < 5 {
            return Err(DictError::InvalidHeader);
        }
        if &data[..4] != MAGIC {
            return Err(DictError::InvalidMagic);
        }
        if data[4] != VERSION {
            return Err(DictError::UnsupportedVersion(data[4]));
        }
        if data.len() < HEADER_SIZE {
            return Err(DictError::InvalidHeader);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[5..9]);
        let body_len = u32::from_le_bytes(len_bytes) as usize;
        if data.len() < HEADER_SIZE + body_len {
            return Err(DictError::InvalidHeader);
        }

        let body: TableBody = bincode::deserialize(&data[HEADER_SIZE..HEADER_SIZE + body_len])
            .map_err(DictError::Deserialize)?;
        Ok(Self::from_body(body))
    }

    /// Open a dictionary file. The mapping is dropped once the tables are
    /// deserialized.
    pub fn open(path: &Path) -> Result<Self, DictError> {
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and the mapping is immutable.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    /// Open a dictionary file, or start with an empty one when it is missing
    /// or unreadable. Every lookup misses until a valid file is provided.
    pub fn open_or_empty(path: &Path) -> Self {
        Self::open(path).unwrap_or_else(|e| {
            warn!(
                path = %path.display(),
                error = %e,
                "dictionary unavailable, using an empty one"
            );
            Self::new()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), DictError> {
        Ok(fs::write(path, self.to_bytes()?)?)
    }
}
