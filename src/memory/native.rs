//! The interpreter's own native memory image
//!
//! A flat little-endian byte space starting at a configurable base address.
//! Reads take a shared lock, so any number of threads may load concurrently.

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::ir::{var_bit_byte_size, ADDRESS_SIZE_IN_BYTES, FLOAT80_SIZE_IN_BYTES};
use crate::runtime::{Float80, IVarBit};

/// Flat native memory with a bump allocator
#[derive(Debug)]
pub struct NativeMemory {
    base: u64,
    bytes: RwLock<Vec<u8>>,
    /// Next unallocated address
    next_free: Mutex<u64>,
}

impl NativeMemory {
    /// Map `size` zeroed bytes at `base`
    pub fn new(base: u64, size: usize) -> Self {
        NativeMemory {
            base,
            bytes: RwLock::new(vec![0; size]),
            next_free: Mutex::new(base),
        }
    }

    /// First mapped address
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of mapped bytes
    pub fn size(&self) -> usize {
        self.bytes.read().len()
    }

    /// True if `[address, address + len)` lies inside the image
    pub fn contains(&self, address: u64, len: usize) -> bool {
        self.index(address, len).is_ok()
    }

    fn index(&self, address: u64, len: usize) -> Result<usize> {
        let fault = || Error::MemoryFault { address, size: len };
        let offset = address.checked_sub(self.base).ok_or_else(fault)?;
        let end = offset.checked_add(len as u64).ok_or_else(fault)?;
        if end > self.bytes.read().len() as u64 {
            return Err(fault());
        }
        Ok(offset as usize)
    }

    /// Reserve `size` bytes aligned to `align` and return their address
    pub fn allocate(&self, size: usize, align: usize) -> Result<u64> {
        let align = align.max(1) as u64;
        let mut next_free = self.next_free.lock();
        let start = (*next_free + align - 1) / align * align;
        self.index(start, size)?;
        *next_free = start + size as u64;
        Ok(start)
    }

    /// Copy `buf.len()` bytes starting at `address` into `buf`
    pub fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let offset = self.index(address, buf.len())?;
        let bytes = self.bytes.read();
        buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
        Ok(())
    }

    /// Read `len` bytes starting at `address`
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    /// Write `data` starting at `address`
    pub fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        let offset = self.index(address, data.len())?;
        let mut bytes = self.bytes.write();
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    /// Read an `i1` stored as one byte
    pub fn get_i1(&self, address: u64) -> Result<bool> {
        Ok(self.read_array::<1>(address)?[0] & 1 != 0)
    }

    /// Read an `i8`
    pub fn get_i8(&self, address: u64) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array(address)?))
    }

    /// Read an `i16`
    pub fn get_i16(&self, address: u64) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array(address)?))
    }

    /// Read an `i32`
    pub fn get_i32(&self, address: u64) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array(address)?))
    }

    /// Read an `i64`
    pub fn get_i64(&self, address: u64) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array(address)?))
    }

    /// Read a `float`
    pub fn get_f32(&self, address: u64) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array(address)?))
    }

    /// Read a `double`
    pub fn get_f64(&self, address: u64) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array(address)?))
    }

    /// Read an integer of `bits` width from `ceil(bits / 8)` bytes
    pub fn get_ivarbit(&self, address: u64, bits: u32) -> Result<IVarBit> {
        let bytes = self.read_bytes(address, var_bit_byte_size(bits))?;
        Ok(IVarBit::from_le_bytes(bits, &bytes))
    }

    /// Read an 80-bit extended float
    pub fn get_f80(&self, address: u64) -> Result<Float80> {
        Ok(Float80::from_le_bytes(
            self.read_array::<FLOAT80_SIZE_IN_BYTES>(address)?,
        ))
    }

    /// Read a pointer-sized address
    pub fn get_address(&self, address: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(
            self.read_array::<ADDRESS_SIZE_IN_BYTES>(address)?,
        ))
    }

    /// Read a function pointer
    pub fn get_function_pointer(&self, address: u64) -> Result<u64> {
        self.get_address(address)
    }

    /// Write an `i1` as one byte
    pub fn put_i1(&self, address: u64, value: bool) -> Result<()> {
        self.write_bytes(address, &[value as u8])
    }

    /// Write an `i8`
    pub fn put_i8(&self, address: u64, value: i8) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write an `i16`
    pub fn put_i16(&self, address: u64, value: i16) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write an `i32`
    pub fn put_i32(&self, address: u64, value: i32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write an `i64`
    pub fn put_i64(&self, address: u64, value: i64) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write a `float`
    pub fn put_f32(&self, address: u64, value: f32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write a `double`
    pub fn put_f64(&self, address: u64, value: f64) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write the storage bytes of an arbitrary-width integer
    pub fn put_ivarbit(&self, address: u64, value: &IVarBit) -> Result<()> {
        self.write_bytes(address, value.as_le_bytes())
    }

    /// Write an 80-bit extended float
    pub fn put_f80(&self, address: u64, value: Float80) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Write a pointer-sized address
    pub fn put_address(&self, address: u64, value: u64) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }
}
