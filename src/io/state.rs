//! Binary aux-state encoding for checkpoint and rollback
//!
//! All values are little-endian. A contact point is its world position
//! (3 × f64), a u32 vertex count, then a (u32 index, f64 weight) pair per
//! vertex. A constraint is point 0, point 1, the normal (3 × f64), distance
//! (f64), impulse (f64) and the identification mode (u8).

use crate::body::BodyId;
use crate::contact::types::{ContactConstraint, ContactPoint};
use crate::error::{ContactError, Result};
use crate::mesh::types::{Point, Vec3};
use std::path::Path;

/// Growable byte buffer with a read cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBuffer {
    data: Vec<u8>,
    offset: usize,
}

impl StateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer positioned at the start of `data`
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Move the read cursor back to the start
    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    pub fn put_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.offset + N;
        let bytes = self.data.get(self.offset..end).ok_or_else(|| {
            ContactError::StateError(format!(
                "Unexpected end of state data at byte {} (need {} more, have {})",
                self.offset,
                N,
                self.remaining()
            ))
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.offset = end;
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    /// Read a count field as usize
    pub fn get_count(&mut self) -> Result<usize> {
        Ok(self.get_u32()? as usize)
    }

    /// Write the buffer contents to a file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Read a buffer from a file, positioned at the start
    pub fn read_file(path: &Path) -> Result<Self> {
        Ok(Self::from_bytes(std::fs::read(path)?))
    }
}

fn put_count(buf: &mut StateBuffer, count: usize) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| {
        ContactError::StateError(format!("Count {} does not fit in the state format", count))
    })?;
    buf.put_u32(count);
    Ok(())
}

fn put_vec3(buf: &mut StateBuffer, v: &Vec3) {
    buf.put_f64(v.x);
    buf.put_f64(v.y);
    buf.put_f64(v.z);
}

fn get_vec3(buf: &mut StateBuffer) -> Result<Vec3> {
    Ok(Vec3::new(buf.get_f64()?, buf.get_f64()?, buf.get_f64()?))
}

pub fn write_point(buf: &mut StateBuffer, point: &ContactPoint) -> Result<()> {
    put_vec3(buf, &point.position.coords);
    put_count(buf, point.vertices().len())?;
    for (&v, &w) in point.vertices().iter().zip(point.weights()) {
        put_count(buf, v)?;
        buf.put_f64(w);
    }
    Ok(())
}

pub fn read_point(buf: &mut StateBuffer, body: BodyId) -> Result<ContactPoint> {
    let position = Point::from(get_vec3(buf)?);
    let count = buf.get_count()?;
    let mut vertices = Vec::with_capacity(count.min(3));
    let mut weights = Vec::with_capacity(count.min(3));
    for _ in 0..count {
        vertices.push(buf.get_count()?);
        weights.push(buf.get_f64()?);
    }
    ContactPoint::from_parts(position, body, vertices, weights)
}

pub fn skip_point(buf: &mut StateBuffer) -> Result<()> {
    get_vec3(buf)?;
    let count = buf.get_count()?;
    for _ in 0..count {
        buf.get_u32()?;
        buf.get_f64()?;
    }
    Ok(())
}

pub fn write_constraint(buf: &mut StateBuffer, cons: &ContactConstraint) -> Result<()> {
    write_point(buf, cons.point0())?;
    write_point(buf, cons.point1())?;
    put_vec3(buf, cons.normal());
    buf.put_f64(cons.distance());
    buf.put_f64(cons.impulse());
    buf.put_u8(u8::from(cons.identify_by_point1()));
    Ok(())
}

/// Decode a constraint whose points belong to `body0` and `body1`
///
/// Masters are not assigned and the constraint is inactive.
pub fn read_constraint(buf: &mut StateBuffer, body0: BodyId, body1: BodyId) -> Result<ContactConstraint> {
    let cpnt0 = read_point(buf, body0)?;
    let cpnt1 = read_point(buf, body1)?;
    let normal = get_vec3(buf)?;
    let distance = buf.get_f64()?;
    let impulse = buf.get_f64()?;
    let identify_by_point1 = match buf.get_u8()? {
        0 => false,
        1 => true,
        other => {
            return Err(ContactError::StateError(format!(
                "Invalid identification flag {}",
                other
            )))
        }
    };

    let mut cons = ContactConstraint::new(cpnt0, cpnt1, identify_by_point1);
    cons.set_normal(normal);
    cons.set_distance(distance);
    cons.set_impulse(impulse);
    Ok(cons)
}

pub fn skip_constraint(buf: &mut StateBuffer) -> Result<()> {
    skip_point(buf)?;
    skip_point(buf)?;
    get_vec3(buf)?;
    buf.get_f64()?;
    buf.get_f64()?;
    buf.get_u8()?;
    Ok(())
}

/// Counts at the head of an aux-state record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub bilaterals0: usize,
    pub bilaterals1: usize,
    pub unilaterals: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.bilaterals0 + self.bilaterals1 + self.unilaterals
    }

    pub fn write(&self, buf: &mut StateBuffer) -> Result<()> {
        put_count(buf, self.bilaterals0)?;
        put_count(buf, self.bilaterals1)?;
        put_count(buf, self.unilaterals)
    }

    pub fn read(buf: &mut StateBuffer) -> Result<Self> {
        Ok(Self {
            bilaterals0: buf.get_count()?,
            bilaterals1: buf.get_count()?,
            unilaterals: buf.get_count()?,
        })
    }
}
