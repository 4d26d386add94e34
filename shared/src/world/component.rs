use std::collections::BTreeMap;

use tessera_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

/// Identifies a component kind within the replicated schema
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u16);

impl Serde for ComponentId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(u16::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        16
    }
}

/// Changed fields of one component, keyed by field id
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentUpdate {
    pub component_id: ComponentId,
    pub fields: BTreeMap<u8, Vec<u8>>,
}

impl ComponentUpdate {
    pub fn new(component_id: ComponentId) -> Self {
        Self {
            component_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: u8, value: impl Into<Vec<u8>>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Folds in a more recent update: its fields replace ours
    pub fn merge_newer(&mut self, newer: ComponentUpdate) {
        debug_assert_eq!(self.component_id, newer.component_id);
        self.fields.extend(newer.fields);
    }

    /// Folds in an older update: only fields we don't carry are taken
    pub fn merge_older(&mut self, older: ComponentUpdate) {
        debug_assert_eq!(self.component_id, older.component_id);
        for (field, value) in older.fields {
            self.fields.entry(field).or_insert(value);
        }
    }
}

/// Encodes and decodes component payloads. Implemented by the game's schema layer.
pub trait ComponentSerializer {
    fn write_update(&self, update: &ComponentUpdate, writer: &mut dyn BitWrite);

    fn read_update(
        &self,
        component_id: ComponentId,
        reader: &mut BitReader,
    ) -> Result<ComponentUpdate, SerdeErr>;
}

/// Schema-less serializer: every field is an opaque, length-prefixed octet string.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesComponentSerializer;

impl ComponentSerializer for BytesComponentSerializer {
    fn write_update(&self, update: &ComponentUpdate, writer: &mut dyn BitWrite) {
        UnsignedVariableInteger::<3>::new(update.fields.len() as u64).ser(writer);
        for (field, value) in &update.fields {
            field.ser(writer);
            UnsignedVariableInteger::<7>::new(value.len() as u64).ser(writer);
            writer.write_bytes_unaligned(value);
        }
    }

    fn read_update(
        &self,
        component_id: ComponentId,
        reader: &mut BitReader,
    ) -> Result<ComponentUpdate, SerdeErr> {
        let field_count = UnsignedVariableInteger::<3>::de(reader)?.get();
        let mut update = ComponentUpdate::new(component_id);
        for _ in 0..field_count {
            let field = u8::de(reader)?;
            let len = UnsignedVariableInteger::<7>::de(reader)?.get();
            let len = usize::try_from(len).map_err(|_| SerdeErr)?;
            if len > (reader.remaining_bits() / 8) as usize {
                return Err(SerdeErr);
            }
            update.fields.insert(field, reader.read_bytes_unaligned(len)?);
        }
        Ok(update)
    }
}
