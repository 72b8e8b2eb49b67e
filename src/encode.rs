//! The `encode` module provides the canonical wire encoding for protocol values.
//!
//! The encoding is consensus-critical: two semantically equal values must
//! produce byte-identical output. Integers are little-endian, container
//! lengths and operation tags are 7-bit varints, and maps encode their
//! entries in ascending key order.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Write};

/// Longest varint accepted on decode, enough for any `u64`.
const MAX_VARINT_BYTES: usize = 10;

pub fn encode_len<W: Write>(writer: &mut W, len: u64) -> io::Result<()> {
    let mut rem_len = len;
    loop {
        let mut elem = (rem_len & 0x7f) as u8;
        rem_len >>= 7;
        if rem_len == 0 {
            writer.write_u8(elem)?;
            break;
        } else {
            elem |= 0x80;
            writer.write_u8(elem)?;
        }
    }
    Ok(())
}

pub fn decode_len<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut len: u64 = 0;
    let mut size: usize = 0;
    loop {
        let elem = reader.read_u8()?;
        len |= u64::from(elem & 0x7f) << (size * 7);
        size += 1;
        if elem & 0x80 == 0 {
            break;
        }
        // Reject before the next shift would pass bit 63.
        if size == MAX_VARINT_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint is too long",
            ));
        }
    }
    Ok(len)
}

/// Canonical serialization of a protocol value.
pub trait Pack {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn packed_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        self.pack(&mut buf).expect("pack to Vec");
        buf
    }

    fn packed_size(&self) -> u64 {
        self.packed_bytes().len() as u64
    }
}

/// Canonical deserialization, the inverse of [`Pack`].
pub trait Unpack: Sized {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self>;

    fn unpack_from_slice(data: &[u8]) -> io::Result<Self> {
        let mut reader = Cursor::new(data);
        let value = Self::unpack(&mut reader)?;
        if reader.position() != data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "trailing bytes after value",
            ));
        }
        Ok(value)
    }
}

impl Pack for u8 {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(*self)
    }
}

impl Unpack for u8 {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u8()
    }
}

impl Pack for u16 {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(*self)
    }
}

impl Unpack for u16 {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u16::<LittleEndian>()
    }
}

impl Pack for u32 {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }
}

impl Unpack for u32 {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u32::<LittleEndian>()
    }
}

impl Pack for u64 {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(*self)
    }
}

impl Unpack for u64 {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u64::<LittleEndian>()
    }
}

impl<T: Pack> Pack for Vec<T> {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        encode_len(writer, self.len() as u64)?;
        for elem in self {
            elem.pack(writer)?;
        }
        Ok(())
    }
}

impl<T: Unpack> Unpack for Vec<T> {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        let len = decode_len(reader)?;
        let mut vec = Vec::with_capacity(len.min(4096) as usize);
        for _ in 0..len {
            vec.push(T::unpack(reader)?);
        }
        Ok(vec)
    }
}

impl<T: Pack> Pack for BTreeSet<T> {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        encode_len(writer, self.len() as u64)?;
        for elem in self {
            elem.pack(writer)?;
        }
        Ok(())
    }
}

impl<T: Unpack + Ord> Unpack for BTreeSet<T> {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        let len = decode_len(reader)?;
        let mut set = BTreeSet::new();
        for _ in 0..len {
            set.insert(T::unpack(reader)?);
        }
        Ok(set)
    }
}

impl<K: Pack, V: Pack> Pack for BTreeMap<K, V> {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        encode_len(writer, self.len() as u64)?;
        for (key, value) in self {
            key.pack(writer)?;
            value.pack(writer)?;
        }
        Ok(())
    }
}

impl<K: Unpack + Ord, V: Unpack> Unpack for BTreeMap<K, V> {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        let len = decode_len(reader)?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let key = K::unpack(reader)?;
            let value = V::unpack(reader)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}
