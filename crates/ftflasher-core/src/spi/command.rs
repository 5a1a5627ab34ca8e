//! SPI command structure

use super::AddressWidth;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Data to write after opcode/address
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a read command with an address
    pub fn read(opcode: u8, width: AddressWidth, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write command with an address (e.g., PP)
    pub fn write(opcode: u8, width: AddressWidth, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an erase command with an address
    pub fn erase(opcode: u8, width: AddressWidth, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Number of bytes in the opcode + address header
    pub fn header_len(&self) -> usize {
        1 + if self.address.is_some() {
            self.address_width.bytes() as usize
        } else {
            0
        }
    }

    /// Encode opcode and address into the start of `buf`
    ///
    /// `buf` must be at least [`header_len`](Self::header_len) bytes long.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[1..]);
        }
    }

    /// Opcode, address and write data as one outgoing byte stream
    pub fn outgoing_bytes(&self) -> Vec<u8> {
        let header_len = self.header_len();
        let mut out = vec![0u8; header_len + self.write_data.len()];
        self.encode_header(&mut out);
        out[header_len..].copy_from_slice(self.write_data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    #[test]
    fn test_outgoing_bytes_3b_program() {
        let data = [0xAA, 0x55];
        let cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 0x012345, &data);
        assert_eq!(cmd.header_len(), 4);
        assert_eq!(cmd.outgoing_bytes(), vec![0x02, 0x01, 0x23, 0x45, 0xAA, 0x55]);
    }

    #[test]
    fn test_outgoing_bytes_4b_read() {
        let mut buf = [0u8; 8];
        let cmd = SpiCommand::read(opcodes::READ_4B, AddressWidth::FourByte, 0x0100_0000, &mut buf);
        assert_eq!(cmd.outgoing_bytes(), vec![0x13, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_simple_command_has_no_address() {
        let cmd = SpiCommand::simple(opcodes::WREN);
        assert_eq!(cmd.header_len(), 1);
        assert_eq!(cmd.outgoing_bytes(), vec![opcodes::WREN]);
    }
}
