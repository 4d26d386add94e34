use tessera_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr, UnsignedVariableInteger};

use crate::{
    channels::{
        change_buffer::{ChangeKind, EntityChange},
        channel::{ChannelMessage, MessageKind},
    },
    world::{
        component::{ComponentId, ComponentSerializer, ComponentUpdate},
        entity::Entity,
    },
    MessageIndex,
};

/// One end-of-section bit for each of the existence, message and update sections
pub const END_MARKER_BITS: u32 = 3;
/// Largest channel header: the optional simulation frame and floating origin
pub const CHANNEL_HEADER_BITS: u32 = 1 + 64 + 1 + 3 * 64;

/// Outcome of writing one item optimistically
#[derive(Debug, PartialEq, Eq)]
pub enum ItemFit {
    Written,
    /// Didn't fit this packet, rewound
    NoSpace,
    /// Wouldn't fit even an empty packet, rewound
    TooLarge { bits: u32 },
}

/// Writes one item, rewinding if it leaves less than `reserved_bits` free
pub fn write_item(
    writer: &mut BitWriter,
    reserved_bits: u32,
    write: impl FnOnce(&mut BitWriter),
) -> ItemFit {
    let before = writer.bits_written();
    write(writer);
    let after = writer.bits_written();
    if u64::from(after) + u64::from(reserved_bits) <= u64::from(writer.max_bits()) {
        return ItemFit::Written;
    }

    writer.truncate(before);
    let bits = after - before;
    if u64::from(bits) + u64::from(END_MARKER_BITS + CHANNEL_HEADER_BITS) > u64::from(writer.max_bits()) {
        ItemFit::TooLarge { bits }
    } else {
        ItemFit::NoSpace
    }
}

pub fn write_component_list(
    writer: &mut dyn BitWrite,
    change: &EntityChange,
    serializer: &dyn ComponentSerializer,
) {
    let count = change.updates.len() + change.removals.len();
    UnsignedVariableInteger::<4>::new(count as u64).ser(writer);
    for (component_id, update) in &change.updates {
        component_id.ser(writer);
        false.ser(writer);
        serializer.write_update(update, writer);
    }
    for component_id in &change.removals {
        component_id.ser(writer);
        true.ser(writer);
    }
}

pub fn read_component_list(
    reader: &mut BitReader,
    serializer: &dyn ComponentSerializer,
) -> Result<(Vec<ComponentUpdate>, Vec<ComponentId>), SerdeErr> {
    let count = UnsignedVariableInteger::<4>::de(reader)?.get();
    let mut updates = Vec::new();
    let mut removals = Vec::new();
    for _ in 0..count {
        let component_id = ComponentId::de(reader)?;
        if bool::de(reader)? {
            removals.push(component_id);
        } else {
            updates.push(serializer.read_update(component_id, reader)?);
        }
    }
    Ok((updates, removals))
}

/// `[1][entity][0 = create, 1 = destroy]{create: component list}`
pub fn write_existence(
    writer: &mut dyn BitWrite,
    change: &EntityChange,
    serializer: &dyn ComponentSerializer,
) {
    true.ser(writer);
    change.entity.ser(writer);
    let is_destroy = change.kind == ChangeKind::Destroy;
    is_destroy.ser(writer);
    if !is_destroy {
        write_component_list(writer, change, serializer);
    }
}

pub enum ExistenceItem {
    Create {
        entity: Entity,
        components: Vec<ComponentUpdate>,
        removals: Vec<ComponentId>,
    },
    Destroy(Entity),
}

/// Reads the item following a set continue bit
pub fn read_existence(
    reader: &mut BitReader,
    serializer: &dyn ComponentSerializer,
) -> Result<ExistenceItem, SerdeErr> {
    let entity = Entity::de(reader)?;
    if bool::de(reader)? {
        return Ok(ExistenceItem::Destroy(entity));
    }
    let (components, removals) = read_component_list(reader, serializer)?;
    Ok(ExistenceItem::Create {
        entity,
        components,
        removals,
    })
}

/// `[1][entity][component list]`
pub fn write_update(
    writer: &mut dyn BitWrite,
    change: &EntityChange,
    serializer: &dyn ComponentSerializer,
) {
    true.ser(writer);
    change.entity.ser(writer);
    write_component_list(writer, change, serializer);
}

/// `[1][kind][index if ordered][target][len][octets]`
pub fn write_message(writer: &mut dyn BitWrite, message: &ChannelMessage, ordered: bool) {
    true.ser(writer);
    (message.kind == MessageKind::Input).ser(writer);
    if ordered {
        message.index.unwrap_or_default().ser(writer);
    }
    message.target.ser(writer);
    UnsignedVariableInteger::<7>::new(message.payload.len() as u64).ser(writer);
    writer.write_bytes_unaligned(&message.payload);
}

/// Reads the message following a set continue bit
pub fn read_message(reader: &mut BitReader, ordered: bool) -> Result<ChannelMessage, SerdeErr> {
    let kind = if bool::de(reader)? {
        MessageKind::Input
    } else {
        MessageKind::Command
    };
    let index = if ordered {
        Some(MessageIndex::de(reader)?)
    } else {
        None
    };
    let target = Entity::de(reader)?;
    let len = UnsignedVariableInteger::<7>::de(reader)?.get();
    let len = usize::try_from(len).map_err(|_| SerdeErr)?;
    if len > (reader.remaining_bits() / 8) as usize {
        return Err(SerdeErr);
    }
    let payload = reader.read_bytes_unaligned(len)?;
    Ok(ChannelMessage {
        kind,
        target,
        payload,
        index,
    })
}
