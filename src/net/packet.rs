//! Little-endian field codec shared by every wire message.

#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let value = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(value)
    }

    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|value| value != 0)
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        let bytes = self.read_bytes(2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&mut self) -> Option<u32> {
        let bytes = self.read_bytes(4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32_le(&mut self) -> Option<i32> {
        self.read_u32_le().map(|value| value as i32)
    }

    /// u16 length followed by UTF-8 bytes; invalid sequences are replaced.
    pub fn read_string(&mut self, max_len: usize) -> Option<String> {
        let len = self.read_u16_le()? as usize;
        if len > max_len {
            return None;
        }
        let bytes = self.read_bytes(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let start = self.pos;
        self.pos += len;
        Some(&self.data[start..start + len])
    }
}

#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    data: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Strings longer than `u16::MAX` bytes are cut at a char boundary.
    pub fn write_string(&mut self, value: &str) {
        let mut end = value.len().min(u16::MAX as usize);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.write_u16_le(end as u16);
        self.data.extend_from_slice(&value.as_bytes()[..end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_fields_read_back_in_order() {
        let mut writer = PacketWriter::new();
        writer.write_u8(7);
        writer.write_i32_le(-42);
        writer.write_string("héllo");
        writer.write_bool(true);
        writer.write_u16_le(0xbeef);
        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(reader.read_u8(), Some(7));
        assert_eq!(reader.read_i32_le(), Some(-42));
        assert_eq!(reader.read_string(64).as_deref(), Some("héllo"));
        assert_eq!(reader.read_bool(), Some(true));
        assert_eq!(reader.read_u16_le(), Some(0xbeef));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncated_reads_return_none() {
        let mut reader = PacketReader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(reader.read_u32_le(), None);
        assert_eq!(reader.read_u16_le(), Some(0x0201));
        assert_eq!(reader.read_u16_le(), None);
    }

    #[test]
    fn string_over_limit_is_rejected() {
        let mut writer = PacketWriter::new();
        writer.write_string("abcdefghij");
        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(reader.read_string(4), None);
    }

    #[test]
    fn oversized_string_is_cut_on_a_char_boundary() {
        let long = "é".repeat(40_000);
        let mut writer = PacketWriter::new();
        writer.write_string(&long);
        let mut reader = PacketReader::new(writer.as_slice());
        let decoded = reader.read_string(usize::MAX).expect("string");
        assert_eq!(decoded.len(), 65_534);
        assert!(decoded.chars().all(|ch| ch == 'é'));
    }
}
