//! Binary little-endian persistence primitives (spec §6 "Persistence
//! format").
//!
//! The format is raw fixed-width fields, little-endian, load-equals-save
//! byte for byte. It is intentionally not a portable, self-describing
//! format (no magic number, no versioning) — see spec §9 "Binary format
//! portability": this matches the upstream format's design rather than
//! inventing a new one, and is documented as a known limitation instead of
//! silently pretending otherwise.

use std::io::{Read, Write};

use crate::errors::{XcsfError, XcsfResult};

pub fn write_i32<W: Write>(w: &mut W, v: i32) -> XcsfResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_i32<R: Read>(r: &mut R) -> XcsfResult<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            XcsfError::ShortRead { expected: 4, found: 0 }
        } else {
            XcsfError::Io(e)
        }
    })?;
    Ok(i32::from_le_bytes(buf))
}

pub fn write_f64<W: Write>(w: &mut W, v: f64) -> XcsfResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_f64<R: Read>(r: &mut R) -> XcsfResult<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            XcsfError::ShortRead { expected: 8, found: 0 }
        } else {
            XcsfError::Io(e)
        }
    })?;
    Ok(f64::from_le_bytes(buf))
}

pub fn write_bool<W: Write>(w: &mut W, v: bool) -> XcsfResult<()> {
    w.write_all(&[v as u8])?;
    Ok(())
}

pub fn read_bool<R: Read>(r: &mut R) -> XcsfResult<bool> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            XcsfError::ShortRead { expected: 1, found: 0 }
        } else {
            XcsfError::Io(e)
        }
    })?;
    Ok(buf[0] != 0)
}

pub fn write_f64_vec<W: Write>(w: &mut W, v: &[f64]) -> XcsfResult<()> {
    write_i32(w, v.len() as i32)?;
    for &x in v {
        write_f64(w, x)?;
    }
    Ok(())
}

pub fn read_f64_vec<R: Read>(r: &mut R) -> XcsfResult<Vec<f64>> {
    let len = read_i32(r)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_f64(r)?);
    }
    Ok(out)
}

pub fn write_i32_vec<W: Write>(w: &mut W, v: &[i32]) -> XcsfResult<()> {
    write_i32(w, v.len() as i32)?;
    for &x in v {
        write_i32(w, x)?;
    }
    Ok(())
}

pub fn read_i32_vec<R: Read>(r: &mut R) -> XcsfResult<Vec<i32>> {
    let len = read_i32(r)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_i32(r)?);
    }
    Ok(out)
}
