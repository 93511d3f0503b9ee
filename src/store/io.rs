//! Framed blob I/O for persisted collections.
//!
//! Both blobs share one frame: a magic word, a little-endian body, and
//! a trailing crc32 over the body. The vector body stores raw `f32` bit
//! patterns so reloads are bit-for-bit; the metadata body is bincode.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{QuarryError, Result};
use crate::metadata::{ChunkMetadata, MetadataStore};
use crate::storage::Storage;
use crate::vector::FlatVectorIndex;

/// "QVEC"
const VECTORS_MAGIC: u32 = 0x5156_4543;
/// "QMET"
const METADATA_MAGIC: u32 = 0x514d_4554;

const BLOB_VERSION: u32 = 1;

/// Magic plus crc.
const FRAME_OVERHEAD: usize = 8;

pub fn write_vectors_blob(
    storage: &dyn Storage,
    name: &str,
    index: &FlatVectorIndex,
) -> Result<()> {
    let data = index.as_slice();
    let mut body = Vec::with_capacity(12 + data.len() * 4);
    body.write_u32::<LittleEndian>(BLOB_VERSION)?;
    body.write_u32::<LittleEndian>(index.dimension() as u32)?;
    body.write_u32::<LittleEndian>(index.len() as u32)?;
    for value in data {
        body.write_f32::<LittleEndian>(*value)?;
    }
    write_frame(storage, name, VECTORS_MAGIC, &body)
}

pub fn read_vectors_blob(storage: &dyn Storage, name: &str) -> Result<FlatVectorIndex> {
    let body = read_frame(storage, name, VECTORS_MAGIC)?;
    let mut cursor = body.as_slice();

    let version = cursor.read_u32::<LittleEndian>().map_err(|_| short_blob(name))?;
    if version != BLOB_VERSION {
        return Err(QuarryError::corrupt_collection(format!(
            "unknown blob version {version} in '{name}'"
        )));
    }
    let dimension = cursor.read_u32::<LittleEndian>().map_err(|_| short_blob(name))? as usize;
    let count = cursor.read_u32::<LittleEndian>().map_err(|_| short_blob(name))? as usize;

    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| short_blob(name))?;
    if cursor.len() != expected {
        return Err(QuarryError::corrupt_collection(format!(
            "vector blob '{name}' holds {} body bytes, expected {expected}",
            cursor.len()
        )));
    }

    let mut data = Vec::with_capacity(count * dimension);
    for _ in 0..count * dimension {
        data.push(cursor.read_f32::<LittleEndian>().map_err(|_| short_blob(name))?);
    }
    FlatVectorIndex::from_raw(dimension, data)
}

pub fn write_metadata_blob(
    storage: &dyn Storage,
    name: &str,
    metadata: &MetadataStore,
) -> Result<()> {
    let records = bincode::serialize(metadata.records())?;
    let mut body = Vec::with_capacity(4 + records.len());
    body.write_u32::<LittleEndian>(BLOB_VERSION)?;
    body.extend_from_slice(&records);
    write_frame(storage, name, METADATA_MAGIC, &body)
}

pub fn read_metadata_blob(storage: &dyn Storage, name: &str) -> Result<MetadataStore> {
    let body = read_frame(storage, name, METADATA_MAGIC)?;
    let mut cursor = body.as_slice();

    let version = cursor.read_u32::<LittleEndian>().map_err(|_| short_blob(name))?;
    if version != BLOB_VERSION {
        return Err(QuarryError::corrupt_collection(format!(
            "unknown blob version {version} in '{name}'"
        )));
    }

    let records: Vec<ChunkMetadata> = bincode::deserialize(cursor).map_err(|e| {
        QuarryError::corrupt_collection(format!("undecodable metadata blob '{name}': {e}"))
    })?;
    Ok(MetadataStore::from_records(records))
}

fn write_frame(storage: &dyn Storage, name: &str, magic: u32, body: &[u8]) -> Result<()> {
    let mut output = storage.create_output(name)?;
    output.write_u32::<LittleEndian>(magic)?;
    output.write_all(body)?;
    output.write_u32::<LittleEndian>(crc32fast::hash(body))?;
    output.flush_and_sync()?;
    output.close()?;
    Ok(())
}

fn read_frame(storage: &dyn Storage, name: &str, magic: u32) -> Result<Vec<u8>> {
    if !storage.file_exists(name) {
        return Err(QuarryError::corrupt_collection(format!(
            "blob '{name}' is missing"
        )));
    }

    let mut input = storage.open_input(name)?;
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    input.close()?;

    if bytes.len() < FRAME_OVERHEAD {
        return Err(short_blob(name));
    }

    let found_magic = (&bytes[..4]).read_u32::<LittleEndian>()?;
    if found_magic != magic {
        return Err(QuarryError::corrupt_collection(format!(
            "bad magic {found_magic:#010x} in blob '{name}'"
        )));
    }

    let crc_offset = bytes.len() - 4;
    let body = &bytes[4..crc_offset];
    let stored_crc = (&bytes[crc_offset..]).read_u32::<LittleEndian>()?;
    let actual_crc = crc32fast::hash(body);
    if stored_crc != actual_crc {
        return Err(QuarryError::corrupt_collection(format!(
            "checksum mismatch in blob '{name}': stored {stored_crc:#010x}, computed {actual_crc:#010x}"
        )));
    }

    Ok(body.to_vec())
}

fn short_blob(name: &str) -> QuarryError {
    QuarryError::corrupt_collection(format!("truncated blob '{name}'"))
}
