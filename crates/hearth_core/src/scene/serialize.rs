//! # World Snapshots
//!
//! A [`WorldSnapshot`] is the serde-serializable image of a world: objects in
//! depth-first pre-order (a parent always precedes its children) and, per
//! component type, the raw bytes each component wrote through its
//! [`ComponentWriter`].
//!
//! Object references inside component data are written as indices into the
//! snapshot's object list so they survive a reload into fresh handles.

use std::collections::HashMap;

use bytemuck::Pod;
use hearth_shared::Transform;
use serde::{Deserialize, Serialize};

use super::handle::GameObjectHandle;
use crate::error::{WorldError, WorldResult};

/// Marker written for an object reference that is not part of the snapshot.
const NO_OBJECT: u32 = u32::MAX;

/// One serialized game object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Name.
    pub name: String,
    /// Index of the parent in the snapshot's object list.
    pub parent: Option<u32>,
    /// Transform relative to the parent.
    pub local_transform: Transform,
    /// Own active flag.
    pub active: bool,
    /// Team id.
    pub team_id: u16,
    /// User flag bits (24..32) and notification flags.
    pub user_flags: u32,
}

/// One serialized component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Index of the owner in the snapshot's object list.
    pub owner: u32,
    /// Own active flag.
    pub active: bool,
    /// Bytes written by the component.
    pub data: Vec<u8>,
}

/// All serialized components of one type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentTypeRecord {
    /// Stable type name, matched on load.
    pub type_name: String,
    /// Layout version the data was written with.
    pub version: u32,
    /// The components.
    pub components: Vec<ComponentRecord>,
}

/// Serializable image of a world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Objects, parents first.
    pub objects: Vec<ObjectRecord>,
    /// Components grouped by type.
    pub component_types: Vec<ComponentTypeRecord>,
}

impl WorldSnapshot {
    /// Total number of components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.component_types.iter().map(|t| t.components.len()).sum()
    }
}

/// Byte sink handed to [`Component::serialize`](super::Component::serialize).
pub struct ComponentWriter<'a> {
    bytes: Vec<u8>,
    object_indices: &'a HashMap<GameObjectHandle, u32>,
}

impl<'a> ComponentWriter<'a> {
    pub(crate) fn new(object_indices: &'a HashMap<GameObjectHandle, u32>) -> Self {
        Self {
            bytes: Vec::new(),
            object_indices,
        }
    }

    /// Writes a plain-old-data value.
    pub fn write_pod<T: Pod>(&mut self, value: T) {
        self.bytes.extend_from_slice(bytemuck::bytes_of(&value));
    }

    /// Writes a length-prefixed string.
    pub fn write_str(&mut self, value: &str) {
        self.write_pod(value.len() as u32);
        self.bytes.extend_from_slice(value.as_bytes());
    }

    /// Writes a reference to another object. Objects outside the snapshot
    /// read back as the invalidated handle.
    pub fn write_object_ref(&mut self, object: GameObjectHandle) {
        let index = self.object_indices.get(&object).copied().unwrap_or(NO_OBJECT);
        self.write_pod(index);
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Byte source handed to [`Component::deserialize`](super::Component::deserialize).
pub struct ComponentReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    objects: &'a [GameObjectHandle],
}

impl<'a> ComponentReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], objects: &'a [GameObjectHandle]) -> Self {
        Self {
            bytes,
            cursor: 0,
            objects,
        }
    }

    /// Bytes not read yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    fn take(&mut self, len: usize) -> WorldResult<&'a [u8]> {
        let end = self.cursor.checked_add(len).filter(|end| *end <= self.bytes.len());
        let Some(end) = end else {
            return Err(WorldError::MalformedData {
                reason: format!("needed {len} bytes at offset {}, {} left", self.cursor, self.remaining()),
            });
        };
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    /// Reads a plain-old-data value.
    ///
    /// # Errors
    ///
    /// [`WorldError::MalformedData`] if the data ends early.
    pub fn read_pod<T: Pod>(&mut self) -> WorldResult<T> {
        let bytes = self.take(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Reads a string written by [`ComponentWriter::write_str`].
    ///
    /// # Errors
    ///
    /// [`WorldError::MalformedData`] on truncated or non-UTF-8 data.
    pub fn read_str(&mut self) -> WorldResult<String> {
        let len = self.read_pod::<u32>()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| WorldError::MalformedData { reason: e.to_string() })
    }

    /// Reads an object reference, mapped to the handle of the reloaded
    /// object.
    ///
    /// # Errors
    ///
    /// [`WorldError::MalformedData`] if the data ends early or the index is
    /// outside the snapshot.
    pub fn read_object_ref(&mut self) -> WorldResult<GameObjectHandle> {
        let index = self.read_pod::<u32>()?;
        if index == NO_OBJECT {
            return Ok(GameObjectHandle::INVALID);
        }
        self.objects
            .get(index as usize)
            .copied()
            .ok_or_else(|| WorldError::MalformedData {
                reason: format!("object reference {index} out of range"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_reader_fields() {
        let a = GameObjectHandle::new(7, 1, 0);
        let stranger = GameObjectHandle::new(9, 0, 0);
        let indices = HashMap::from([(a, 0u32)]);

        let mut writer = ComponentWriter::new(&indices);
        writer.write_pod(42u32);
        writer.write_pod(1.5f32);
        writer.write_str("hearth");
        writer.write_object_ref(a);
        writer.write_object_ref(stranger);
        let bytes = writer.into_bytes();

        let reloaded = [GameObjectHandle::new(3, 0, 0)];
        let mut reader = ComponentReader::new(&bytes, &reloaded);
        assert_eq!(reader.read_pod::<u32>().unwrap(), 42);
        assert!((reader.read_pod::<f32>().unwrap() - 1.5).abs() < f32::EPSILON);
        assert_eq!(reader.read_str().unwrap(), "hearth");
        assert_eq!(reader.read_object_ref().unwrap(), reloaded[0]);
        assert!(reader.read_object_ref().unwrap().is_invalidated());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_data_is_malformed() {
        let bytes = [1u8, 2];
        let mut reader = ComponentReader::new(&bytes, &[]);
        assert!(matches!(reader.read_pod::<u32>(), Err(WorldError::MalformedData { .. })));
    }

    #[test]
    fn test_object_ref_out_of_range() {
        let bytes = 5u32.to_ne_bytes();
        let mut reader = ComponentReader::new(&bytes, &[]);
        assert!(reader.read_object_ref().is_err());
    }

    #[test]
    fn test_snapshot_component_count() {
        let snapshot = WorldSnapshot {
            objects: vec![ObjectRecord {
                name: "root".into(),
                parent: None,
                local_transform: Transform::IDENTITY,
                active: true,
                team_id: 2,
                user_flags: 0,
            }],
            component_types: Vec::new(),
        };
        assert_eq!(snapshot.component_count(), 0);
        let cloned = snapshot.clone();
        assert_eq!(cloned, snapshot);
    }
}
