use tessera_serde::{
    bits_required, BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr,
    UnsignedVariableInteger,
};

use crate::{
    fragments::{channel_packet_id::ChannelPacketId, fragment_map::{FragmentMap, FragmentSection}},
    FloatingOrigin, FragmentationConfig, SimulationFrame,
};

type FragmentVarint = UnsignedVariableInteger<7>;

/// Header of one run of consecutive fragments of a channel packet
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentHeader {
    pub channel_packet_id: ChannelPacketId,
    pub fragment_index: u32,
    pub fragment_count: u32,
    /// The run ends with the channel packet's final fragment
    pub is_last: bool,
    /// Octets carried by the final fragment, when `is_last`
    pub last_fragment_size: u16,
    pub simulation_frame: Option<SimulationFrame>,
    pub floating_origin: Option<FloatingOrigin>,
}

impl FragmentHeader {
    /// Octets of payload following this header
    pub fn payload_bytes(&self, fragment_size_in_bytes: u16) -> usize {
        let size = usize::from(fragment_size_in_bytes);
        let count = self.fragment_count as usize;
        if self.is_last {
            (count - 1) * size + usize::from(self.last_fragment_size)
        } else {
            count * size
        }
    }

    /// Total channel packet length, known once the final fragment has been seen
    pub fn channel_packet_len(&self, fragment_size_in_bytes: u16) -> Option<usize> {
        if !self.is_last {
            return None;
        }
        Some(self.fragment_index as usize * usize::from(fragment_size_in_bytes) + self.payload_bytes(fragment_size_in_bytes))
    }
}

/// Splits channel packets into fragment runs, and reads them back.
///
/// Wire layout of a run:
/// `[id][index varint][count varint][is_last]{last_size - 1}{index == 0: sim frame?, floating origin?}[octets]`
#[derive(Clone, Debug)]
pub struct FragmentationSerializer {
    fragment_size_in_bytes: u16,
    channel_packet_id_bits: u8,
}

impl FragmentationSerializer {
    pub fn new(config: &FragmentationConfig) -> Self {
        assert!(
            config.fragment_size_in_bytes > 0,
            "fragment size must be at least one byte"
        );
        Self {
            fragment_size_in_bytes: config.fragment_size_in_bytes,
            channel_packet_id_bits: config.channel_packet_id_bits,
        }
    }

    pub fn fragment_size_in_bytes(&self) -> u16 {
        self.fragment_size_in_bytes
    }

    pub fn channel_packet_id_bits(&self) -> u8 {
        self.channel_packet_id_bits
    }

    /// Fragments needed to carry `len` octets
    pub fn number_of_fragments(&self, len: usize) -> u64 {
        (len as u64).div_ceil(u64::from(self.fragment_size_in_bytes))
    }

    fn last_fragment_size_bits(&self) -> u8 {
        if self.fragment_size_in_bytes > 1 {
            bits_required(u32::from(self.fragment_size_in_bytes))
        } else {
            0
        }
    }

    /// Exact bit cost of a run header, matching `write_header` bit for bit
    pub fn header_size_in_bits(
        &self,
        fragment_index: u32,
        fragment_count: u32,
        includes_last: bool,
        includes_simulation_frame: bool,
        includes_floating_origin: bool,
    ) -> u32 {
        let mut output = u32::from(self.channel_packet_id_bits);
        output += FragmentVarint::new(fragment_index).bit_length();
        output += FragmentVarint::new(fragment_count).bit_length();
        output += 1;
        if includes_last {
            output += u32::from(self.last_fragment_size_bits());
        }
        if fragment_index == 0 {
            output += 1;
            if includes_simulation_frame {
                output += u64::const_bit_length();
            }
            output += 1;
            if includes_floating_origin {
                output += FloatingOrigin::const_bit_length();
            }
        }
        output
    }

    /// Octets covered by fragments `[index, index + count)` of a `data_len` channel packet
    fn payload_bytes(&self, data_len: usize, index: u32, count: u32) -> usize {
        let size = usize::from(self.fragment_size_in_bytes);
        let start = index as usize * size;
        let end = ((index + count) as usize * size).min(data_len);
        end.saturating_sub(start)
    }

    /// Largest run starting at `index` (at most `max_count` fragments) whose header
    /// and payload fit into `available_bits`
    pub fn number_of_fragments_to_fit(
        &self,
        available_bits: u32,
        index: u32,
        max_count: u32,
        data_len: usize,
        includes_simulation_frame: bool,
        includes_floating_origin: bool,
    ) -> u32 {
        let total_fragments = self.number_of_fragments(data_len);
        let fragment_bits = u32::from(self.fragment_size_in_bytes) * 8;
        let min_header = self.header_size_in_bits(
            index,
            1,
            false,
            includes_simulation_frame,
            includes_floating_origin,
        );
        if available_bits <= min_header {
            return 0;
        }

        let estimate = (available_bits - min_header) / fragment_bits + 1;
        let mut count = estimate.min(max_count);
        while count > 0 {
            let includes_last = u64::from(index) + u64::from(count) == total_fragments;
            let header = self.header_size_in_bits(
                index,
                count,
                includes_last,
                includes_simulation_frame,
                includes_floating_origin,
            );
            let payload = self.payload_bytes(data_len, index, count) as u64 * 8;
            if u64::from(header) + payload <= u64::from(available_bits) {
                return count;
            }
            count -= 1;
        }
        0
    }

    /// Writes as many pending fragments of one channel packet as fit, leaving
    /// `reserved_bits` free at the end of `writer`.
    ///
    /// Every emitted run is appended to `serialized_sections`. Returns false as
    /// soon as a run had to be cut short (or nothing fit), meaning the packet is full.
    #[allow(clippy::too_many_arguments)]
    pub fn serialize_channel_packet_fragments(
        &self,
        writer: &mut BitWriter,
        reserved_bits: u32,
        simulation_frame: Option<SimulationFrame>,
        floating_origin: Option<FloatingOrigin>,
        channel_packet_id: ChannelPacketId,
        channel_packet: &[u8],
        pending_fragments: &FragmentMap,
        serialized_sections: &mut Vec<(ChannelPacketId, FragmentSection)>,
    ) -> bool {
        let total_fragments = self.number_of_fragments(channel_packet.len());

        for section in pending_fragments.sections() {
            let available_bits = writer.bits_free().saturating_sub(reserved_bits);
            let count = self.number_of_fragments_to_fit(
                available_bits,
                section.index,
                section.count,
                channel_packet.len(),
                simulation_frame.is_some(),
                floating_origin.is_some(),
            );
            if count == 0 {
                return false;
            }

            let is_last = u64::from(section.index) + u64::from(count) == total_fragments;
            let last_fragment_size = if is_last {
                let size = usize::from(self.fragment_size_in_bytes);
                (channel_packet.len() - (total_fragments as usize - 1) * size) as u16
            } else {
                0
            };
            let header = FragmentHeader {
                channel_packet_id,
                fragment_index: section.index,
                fragment_count: count,
                is_last,
                last_fragment_size,
                simulation_frame: simulation_frame.filter(|_| section.index == 0),
                floating_origin: floating_origin.filter(|_| section.index == 0),
            };
            self.write_header(writer, &header);

            let start = section.index as usize * usize::from(self.fragment_size_in_bytes);
            let len = self.payload_bytes(channel_packet.len(), section.index, count);
            writer.write_bytes_unaligned(&channel_packet[start..start + len]);

            serialized_sections.push((channel_packet_id, FragmentSection::new(section.index, count)));

            if count < section.count {
                return false;
            }
        }

        true
    }

    pub fn write_header(&self, writer: &mut dyn BitWrite, header: &FragmentHeader) {
        header.channel_packet_id.ser(writer);
        FragmentVarint::new(header.fragment_index).ser(writer);
        FragmentVarint::new(header.fragment_count).ser(writer);
        header.is_last.ser(writer);
        if header.is_last {
            let bits = self.last_fragment_size_bits();
            if bits > 0 {
                writer.write_bits(u64::from(header.last_fragment_size - 1), bits);
            }
        }
        if header.fragment_index == 0 {
            header.simulation_frame.ser(writer);
            header.floating_origin.ser(writer);
        }
    }

    /// Reads one run header whose channel packet id has already been consumed
    pub fn read_header(
        &self,
        reader: &mut BitReader,
        channel_packet_id: ChannelPacketId,
    ) -> Result<FragmentHeader, SerdeErr> {
        let fragment_index: u32 = read_varint(reader)?;
        let fragment_count: u32 = read_varint(reader)?;
        if fragment_count == 0 || fragment_index.checked_add(fragment_count).is_none() {
            return Err(SerdeErr);
        }
        let is_last = bool::de(reader)?;
        let last_fragment_size = if is_last {
            let bits = self.last_fragment_size_bits();
            if bits > 0 {
                let encoded = reader.read_bits(bits)?;
                let size = u16::try_from(encoded + 1).map_err(|_| SerdeErr)?;
                if size > self.fragment_size_in_bytes {
                    return Err(SerdeErr);
                }
                size
            } else {
                self.fragment_size_in_bytes
            }
        } else {
            0
        };
        let (simulation_frame, floating_origin) = if fragment_index == 0 {
            (Option::<u64>::de(reader)?, Option::<FloatingOrigin>::de(reader)?)
        } else {
            (None, None)
        };

        Ok(FragmentHeader {
            channel_packet_id,
            fragment_index,
            fragment_count,
            is_last,
            last_fragment_size,
            simulation_frame,
            floating_origin,
        })
    }

    /// Reads a run (header and octets) whose channel packet id has already been
    /// consumed. The octets land at `fragment_index * fragment_size` in
    /// `destination`; with no destination (stale channel packet) they are skipped
    /// so the reader stays in sync.
    pub fn deserialize_channel_packet_fragments(
        &self,
        reader: &mut BitReader,
        channel_packet_id: ChannelPacketId,
        destination: Option<&mut Vec<u8>>,
    ) -> Result<FragmentHeader, SerdeErr> {
        let header = self.read_header(reader, channel_packet_id)?;
        self.read_payload(reader, &header, destination)?;
        Ok(header)
    }

    /// Reads the octets following `header`
    pub fn read_payload(
        &self,
        reader: &mut BitReader,
        header: &FragmentHeader,
        destination: Option<&mut Vec<u8>>,
    ) -> Result<(), SerdeErr> {
        let len = header.payload_bytes(self.fragment_size_in_bytes);

        match destination {
            Some(buffer) => {
                let start = header.fragment_index as usize * usize::from(self.fragment_size_in_bytes);
                let end = start + len;
                if buffer.len() < end {
                    buffer.resize(end, 0);
                }
                for byte in &mut buffer[start..end] {
                    *byte = reader.read_byte()?;
                }
            }
            None => reader.skip_bytes(len)?,
        }

        Ok(())
    }
}

fn read_varint(reader: &mut BitReader) -> Result<u32, SerdeErr> {
    let value = FragmentVarint::de(reader)?.get();
    u32::try_from(value).map_err(|_| SerdeErr)
}
