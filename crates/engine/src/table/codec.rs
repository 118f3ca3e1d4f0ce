//! Table Serialization
//!
//! ## Format (Version 0x01)
//!
//! ```text
//! [Version: u8]
//! [Dimension: u32 LE]                      0 = no dimension established yet
//! [Slot Count: u32 LE]
//! [Slots: f32 LE * slot count]             packed records, tombstones included
//! [Record Count: u32 LE]
//! [Liveness: u8 * record count]            1 = live, 0 = tombstoned
//! [Position Count: u32 LE]
//! For each document (ascending id):
//!   [DocId: u32 LE] [Offset: u32 LE]
//! [List Count: u32 LE]
//! For each neighbor list (ascending id):
//!   [DocId: u32 LE] [Neighbor Count: u32 LE]
//!   For each neighbor (list order):
//!     [Neighbor DocId: u32 LE] [Score: f32 LE]
//! [Threshold Count: u32 LE]
//! For each threshold (ascending id):
//!   [DocId: u32 LE] [Threshold: f32 LE]
//! ```
//!
//! ## Design Notes
//!
//! 1. **Deterministic Output**: every map is written in ascending id order,
//!    so equal tables produce byte-identical output.
//!
//! 2. **Reverse index is derived**: it is rebuilt from the neighbor lists on
//!    decode rather than stored, so cascading deletes keep working after a
//!    reload.
//!
//! 3. **Thresholds are stored** so admission resumes where it left off.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use simdb_core::{DocId, Neighbor, SimError, SimResult, TableConfig};

use crate::table::neighbors::NeighborIndex;
use crate::table::scan::ScanFactory;
use crate::table::store::PackedStore;
use crate::table::SimTable;

/// Table format version
pub const TABLE_FORMAT_VERSION: u8 = 0x01;

fn len_u32(len: usize, what: &str) -> SimResult<u32> {
    u32::try_from(len).map_err(|_| {
        SimError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} count {} exceeds u32", what, len),
        ))
    })
}

impl SimTable {
    /// Serialize the table into a new byte vector
    pub fn serialize(&self) -> SimResult<Vec<u8>> {
        let mut buffer = Vec::with_capacity(16 + self.store.slot_len() * 4);
        self.serialize_into(&mut buffer)?;
        Ok(buffer)
    }

    /// Serialize the table into a writer
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> SimResult<()> {
        writer.write_u8(TABLE_FORMAT_VERSION)?;
        writer.write_u32::<LittleEndian>(len_u32(
            self.store.dimension().unwrap_or(0),
            "dimension",
        )?)?;

        // Packed buffer
        let data = self.store.raw_data();
        writer.write_u32::<LittleEndian>(len_u32(data.len(), "slot")?)?;
        for &slot in data {
            writer.write_f32::<LittleEndian>(slot)?;
        }

        // Liveness
        let live = self.store.liveness();
        writer.write_u32::<LittleEndian>(len_u32(live.len(), "record")?)?;
        for &flag in live {
            writer.write_u8(u8::from(flag))?;
        }

        // Position index
        let positions = self.store.positions();
        writer.write_u32::<LittleEndian>(len_u32(positions.len(), "position")?)?;
        for (id, &offset) in positions {
            writer.write_u32::<LittleEndian>(id.as_u32())?;
            writer.write_u32::<LittleEndian>(len_u32(offset, "offset")?)?;
        }

        // Neighbor lists
        let lists = self.neighbors.lists();
        writer.write_u32::<LittleEndian>(len_u32(lists.len(), "list")?)?;
        for (id, list) in lists {
            writer.write_u32::<LittleEndian>(id.as_u32())?;
            writer.write_u32::<LittleEndian>(len_u32(list.len(), "neighbor")?)?;
            for neighbor in list {
                writer.write_u32::<LittleEndian>(neighbor.id.as_u32())?;
                writer.write_f32::<LittleEndian>(neighbor.score)?;
            }
        }

        // Admission thresholds
        let thresholds = self.neighbors.thresholds();
        writer.write_u32::<LittleEndian>(len_u32(thresholds.len(), "threshold")?)?;
        for (id, &water) in thresholds {
            writer.write_u32::<LittleEndian>(id.as_u32())?;
            writer.write_f32::<LittleEndian>(water)?;
        }

        Ok(())
    }

    /// Deserialize a table from bytes, rejecting trailing garbage
    ///
    /// # Errors
    /// `CorruptPersistedState` if the bytes don't decode into a consistent
    /// table; `Configuration` if `config` is invalid.
    pub fn deserialize(config: TableConfig, bytes: &[u8]) -> SimResult<SimTable> {
        let mut cursor = Cursor::new(bytes);
        let table = Self::deserialize_from(config, &mut cursor)?;
        let consumed = cursor.position() as usize;
        if consumed != bytes.len() {
            return Err(SimError::corrupt(format!(
                "{} trailing bytes after table",
                bytes.len() - consumed
            )));
        }
        Ok(table)
    }

    /// Deserialize a table from a reader
    pub fn deserialize_from<R: Read>(config: TableConfig, reader: &mut R) -> SimResult<SimTable> {
        config.validate()?;

        let version = read_u8(reader, "version")?;
        if version != TABLE_FORMAT_VERSION {
            return Err(SimError::corrupt(format!(
                "Unsupported table format version: {}",
                version
            )));
        }

        let dimension = match read_u32(reader, "dimension")? {
            0 => None,
            d => Some(d as usize),
        };

        let slot_count = read_u32(reader, "slot count")? as usize;
        let mut data = Vec::with_capacity(slot_count.min(1 << 20));
        for _ in 0..slot_count {
            data.push(read_f32(reader, "slot")?);
        }

        let record_count = read_u32(reader, "record count")? as usize;
        let mut live = Vec::with_capacity(record_count.min(1 << 20));
        for _ in 0..record_count {
            live.push(match read_u8(reader, "liveness flag")? {
                0 => false,
                1 => true,
                other => {
                    return Err(SimError::corrupt(format!(
                        "invalid liveness flag {}",
                        other
                    )))
                }
            });
        }

        let position_count = read_u32(reader, "position count")?;
        let mut positions = BTreeMap::new();
        for _ in 0..position_count {
            let id = read_doc_id(reader)?;
            let offset = read_u32(reader, "offset")? as usize;
            if positions.insert(id, offset).is_some() {
                return Err(SimError::corrupt(format!("duplicate position for {}", id)));
            }
        }

        let store = PackedStore::from_parts(dimension, data, live, positions)?;

        let list_count = read_u32(reader, "list count")?;
        let mut lists = BTreeMap::new();
        for _ in 0..list_count {
            let id = read_doc_id(reader)?;
            let neighbor_count = read_u32(reader, "neighbor count")? as usize;
            let mut list = Vec::with_capacity(neighbor_count.min(config.max_neighbors + 1));
            for _ in 0..neighbor_count {
                let neighbor = read_doc_id(reader)?;
                let score = read_f32(reader, "score")?;
                list.push(Neighbor::new(neighbor, score));
            }
            if lists.insert(id, list).is_some() {
                return Err(SimError::corrupt(format!("duplicate neighbor list for {}", id)));
            }
        }

        let threshold_count = read_u32(reader, "threshold count")?;
        let mut thresholds = BTreeMap::new();
        for _ in 0..threshold_count {
            let id = read_doc_id(reader)?;
            let water = read_f32(reader, "threshold")?;
            thresholds.insert(id, water);
        }

        let neighbors = NeighborIndex::from_parts(config.max_neighbors, lists, thresholds);
        Ok(SimTable::from_parts(
            config,
            ScanFactory::default(),
            store,
            neighbors,
        ))
    }
}

fn truncated(what: &str, e: std::io::Error) -> SimError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        SimError::corrupt(format!("truncated while reading {}", what))
    } else {
        SimError::Io(e)
    }
}

fn read_u8<R: Read>(reader: &mut R, what: &str) -> SimResult<u8> {
    reader.read_u8().map_err(|e| truncated(what, e))
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> SimResult<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| truncated(what, e))
}

fn read_f32<R: Read>(reader: &mut R, what: &str) -> SimResult<f32> {
    reader
        .read_f32::<LittleEndian>()
        .map_err(|e| truncated(what, e))
}

fn read_doc_id<R: Read>(reader: &mut R) -> SimResult<DocId> {
    let raw = read_u32(reader, "document id")?;
    DocId::new(raw).map_err(|_| SimError::corrupt(format!("document id {} out of range", raw)))
}
