//! Binary file format for compiled programs (`.ysbc` files).
//!
//! # File Format
//!
//! ```text
//! +--------------------+
//! | Magic (4 bytes)    |  "YSBC"
//! +--------------------+
//! | Version (4 bytes)  |  u32 format version
//! +--------------------+
//! | Flags (4 bytes)    |  u32 feature flags
//! +--------------------+
//! | Length (4 bytes)   |  u32 length of the payload
//! +--------------------+
//! | Payload (N bytes)  |  bincode-serialized program and debug info
//! +--------------------+
//! | Checksum (32 b)    |  SHA-256 of the payload
//! +--------------------+
//! ```
//!
//! All integers are little-endian. Debug info is only present when the
//! `has_debug_info` flag is set; otherwise the payload carries an empty map.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::debug_info::NodeDebugInfo;
use crate::program::Program;

/// Magic bytes identifying a compiled dialogue program.
pub const MAGIC: &[u8; 4] = b"YSBC";

/// Current format version.
pub const VERSION: u32 = 1;

const CHECKSUM_LEN: usize = 32;

#[derive(Debug)]
pub enum BytecodeError {
    Io(std::io::Error),
    /// Not a compiled program.
    InvalidMagic,
    UnsupportedVersion(u32),
    Deserialize(String),
    Serialize(String),
    /// The payload does not match its stored checksum.
    ChecksumMismatch,
}

impl std::fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BytecodeError::Io(e) => write!(f, "I/O error: {}", e),
            BytecodeError::InvalidMagic => {
                write!(f, "Invalid magic bytes - not a compiled dialogue program")
            }
            BytecodeError::UnsupportedVersion(v) => write!(
                f,
                "Unsupported program format version: {} (current: {})",
                v, VERSION
            ),
            BytecodeError::Deserialize(e) => write!(f, "Failed to deserialize: {}", e),
            BytecodeError::Serialize(e) => write!(f, "Failed to serialize: {}", e),
            BytecodeError::ChecksumMismatch => write!(f, "Program checksum does not match"),
        }
    }
}

impl std::error::Error for BytecodeError {}

impl From<std::io::Error> for BytecodeError {
    fn from(e: std::io::Error) -> Self {
        BytecodeError::Io(e)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BytecodeFlags {
    pub has_debug_info: bool,
}

impl BytecodeFlags {
    fn to_u32(self) -> u32 {
        let mut flags = 0;
        if self.has_debug_info {
            flags |= 1 << 0;
        }
        flags
    }

    fn from_u32(value: u32) -> Self {
        Self {
            has_debug_info: value & (1 << 0) != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytecodeHeader {
    pub version: u32,
    pub flags: BytecodeFlags,
    /// Length of the serialized payload.
    pub payload_length: u32,
}

/// Everything read back from a compiled program file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProgram {
    pub header: BytecodeHeader,
    pub program: Program,
    /// Empty unless the file was saved with debug info.
    pub debug_info: IndexMap<String, NodeDebugInfo>,
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    program: &'a Program,
    debug_info: &'a IndexMap<String, NodeDebugInfo>,
}

#[derive(Deserialize)]
struct Payload {
    program: Program,
    debug_info: IndexMap<String, NodeDebugInfo>,
}

fn encode(
    program: &Program,
    debug_info: Option<&IndexMap<String, NodeDebugInfo>>,
) -> Result<Vec<u8>, BytecodeError> {
    let empty = IndexMap::new();
    let flags = BytecodeFlags {
        has_debug_info: debug_info.is_some(),
    };
    let payload = bincode::serialize(&PayloadRef {
        program,
        debug_info: debug_info.unwrap_or(&empty),
    })
    .map_err(|e| BytecodeError::Serialize(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| BytecodeError::Serialize("program is too large".to_string()))?;
    let checksum = Sha256::digest(&payload);

    let mut result = Vec::with_capacity(16 + payload.len() + CHECKSUM_LEN);
    result.extend_from_slice(MAGIC);
    result.extend_from_slice(&VERSION.to_le_bytes());
    result.extend_from_slice(&flags.to_u32().to_le_bytes());
    result.extend_from_slice(&length.to_le_bytes());
    result.extend_from_slice(&payload);
    result.extend_from_slice(checksum.as_slice());
    Ok(result)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, BytecodeError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn decode<R: Read>(reader: &mut R) -> Result<LoadedProgram, BytecodeError> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| BytecodeError::InvalidMagic)?;
    if &magic != MAGIC {
        return Err(BytecodeError::InvalidMagic);
    }

    let version = read_u32(reader)?;
    if version > VERSION {
        return Err(BytecodeError::UnsupportedVersion(version));
    }
    let flags = BytecodeFlags::from_u32(read_u32(reader)?);
    let payload_length = read_u32(reader)?;

    let mut payload = vec![0u8; payload_length as usize];
    reader.read_exact(&mut payload)?;
    let mut checksum = [0u8; CHECKSUM_LEN];
    reader.read_exact(&mut checksum)?;
    if Sha256::digest(&payload).as_slice() != checksum {
        return Err(BytecodeError::ChecksumMismatch);
    }

    let Payload {
        program,
        debug_info,
    } = bincode::deserialize(&payload).map_err(|e| BytecodeError::Deserialize(e.to_string()))?;

    Ok(LoadedProgram {
        header: BytecodeHeader {
            version,
            flags,
            payload_length,
        },
        program,
        debug_info,
    })
}

/// Save `program` without debug info.
pub fn save<P: AsRef<Path>>(program: &Program, path: P) -> Result<(), BytecodeError> {
    write_file(&encode(program, None)?, path.as_ref())
}

/// Save `program` together with the debug info of its nodes.
pub fn save_with_debug_info<P: AsRef<Path>>(
    program: &Program,
    debug_info: &IndexMap<String, NodeDebugInfo>,
    path: P,
) -> Result<(), BytecodeError> {
    write_file(&encode(program, Some(debug_info))?, path.as_ref())
}

fn write_file(bytes: &[u8], path: &Path) -> Result<(), BytecodeError> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "program saved");
    Ok(())
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Program, BytecodeError> {
    Ok(load_with_header(path)?.program)
}

/// Load a program file along with its header and any debug info.
pub fn load_with_header<P: AsRef<Path>>(path: P) -> Result<LoadedProgram, BytecodeError> {
    let mut reader = BufReader::new(File::open(path)?);
    decode(&mut reader)
}

/// Serialize a program to bytes (for in-memory use).
pub fn save_to_bytes(program: &Program) -> Result<Vec<u8>, BytecodeError> {
    encode(program, None)
}

pub fn load_from_bytes(mut data: &[u8]) -> Result<Program, BytecodeError> {
    Ok(decode(&mut data)?.program)
}
