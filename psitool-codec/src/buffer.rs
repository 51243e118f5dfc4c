//! Bit-granular PSI buffer.
//!
//! A [`PsiBuffer`] is created for one serialize or deserialize call and
//! dropped at its end. Reads and writes are MSB-first and may cross byte
//! boundaries. Out-of-bounds accesses never panic: they set a sticky error
//! flag and become no-ops (writes) or return zero (reads).
//!
//! # Regions
//!
//! Length-prefixed structures are handled with a small stack of regions:
//!
//! ```text
//! read:   push_read_region(12)   -> consume a 12-bit length, clamp reads to it
//!         while buf.can_read() { ... }
//!         pop_region()           -> restore the outer limit, skip to region end
//!
//! write:  push_write_region(8)   -> reserve an 8-bit length field
//!         ... write the body ...
//!         pop_region()           -> patch the field with the body size in bytes
//! ```
//!
//! Regions nest and must be popped in LIFO order.

use bytes::Bytes;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike};

/// Size in bytes of a full MJD date + BCD time field.
pub const MJD_SIZE: usize = 5;
/// Size in bytes of a date-only MJD field.
pub const MJD_MIN_SIZE: usize = 2;

const REGION_STACK_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    kind: RegionKind,
    /// Read: bit offset of the region end. Write: bit offset of the length field.
    anchor: usize,
    /// Width of the length field in bits.
    width: usize,
    /// Write: bit offset of the first body bit.
    body_start: usize,
    /// Read limit in effect before the push.
    saved_limit: Option<usize>,
    /// Write: the length field was actually reserved in the buffer.
    reserved: bool,
}

/// A byte buffer with independent bit-level read and write cursors.
#[derive(Debug, Clone)]
pub struct PsiBuffer {
    data: Vec<u8>,
    /// Maximum size in bytes.
    capacity: usize,
    rbit: usize,
    wbit: usize,
    /// Effective read limit in bits, narrowed by read regions.
    read_limit: Option<usize>,
    error: bool,
    regions: Vec<Region>,
}

impl PsiBuffer {
    /// An empty buffer for writing up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        PsiBuffer {
            data: Vec::with_capacity(capacity),
            capacity,
            rbit: 0,
            wbit: 0,
            read_limit: None,
            error: false,
            regions: Vec::with_capacity(REGION_STACK_CAPACITY),
        }
    }

    /// A buffer for reading `data`. The write cursor sits at the end.
    pub fn from_bytes(data: &[u8]) -> Self {
        PsiBuffer {
            data: data.to_vec(),
            capacity: data.len(),
            rbit: 0,
            wbit: data.len() * 8,
            read_limit: None,
            error: false,
            regions: Vec::with_capacity(REGION_STACK_CAPACITY),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ------------------------------------------------------------------
    // Error state
    // ------------------------------------------------------------------

    /// True once any operation failed. Never cleared.
    pub fn has_error(&self) -> bool {
        self.error
    }

    /// Flag the content as invalid, e.g. a value exceeding its field width.
    pub fn set_user_error(&mut self) {
        self.error = true;
    }

    // ------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------

    fn read_end(&self) -> usize {
        match self.read_limit {
            Some(limit) => limit.min(self.wbit),
            None => self.wbit,
        }
    }

    pub fn read_bit_position(&self) -> usize {
        self.rbit
    }

    pub fn write_bit_position(&self) -> usize {
        self.wbit
    }

    pub fn read_is_byte_aligned(&self) -> bool {
        self.rbit % 8 == 0
    }

    pub fn write_is_byte_aligned(&self) -> bool {
        self.wbit % 8 == 0
    }

    /// True if at least one bit can be read inside the current limit.
    pub fn can_read(&self) -> bool {
        !self.error && self.rbit < self.read_end()
    }

    pub fn can_read_bits(&self, n: usize) -> bool {
        !self.error && self.rbit + n <= self.read_end()
    }

    pub fn can_read_bytes(&self, n: usize) -> bool {
        self.can_read_bits(n.saturating_mul(8))
    }

    pub fn remaining_read_bits(&self) -> usize {
        self.read_end().saturating_sub(self.rbit)
    }

    pub fn remaining_read_bytes(&self) -> usize {
        self.remaining_read_bits() / 8
    }

    pub fn remaining_write_bits(&self) -> usize {
        (self.capacity * 8).saturating_sub(self.wbit)
    }

    pub fn remaining_write_bytes(&self) -> usize {
        self.remaining_write_bits() / 8
    }

    /// Number of bytes written so far, counting a partial last byte.
    pub fn written_size(&self) -> usize {
        self.wbit.div_ceil(8)
    }

    pub fn as_written(&self) -> &[u8] {
        &self.data[..self.written_size()]
    }

    pub fn into_bytes(mut self) -> Bytes {
        let size = self.written_size();
        self.data.truncate(size);
        Bytes::from(self.data)
    }

    // ------------------------------------------------------------------
    // Bits
    // ------------------------------------------------------------------

    /// Read an unsigned field of `n` bits (at most 64).
    pub fn get_bits(&mut self, n: usize) -> u64 {
        if n == 0 {
            return 0;
        }
        if n > 64 || !self.can_read_bits(n) {
            self.error = true;
            return 0;
        }
        let mut value = 0u64;
        let mut remaining = n;
        while remaining > 0 {
            let offset = self.rbit % 8;
            let avail = 8 - offset;
            let take = avail.min(remaining);
            let bits = (self.data[self.rbit / 8] >> (avail - take)) & mask(take);
            value = (value << take) | u64::from(bits);
            self.rbit += take;
            remaining -= take;
        }
        value
    }

    /// Write the `n` low-order bits of `value` (at most 64).
    pub fn put_bits(&mut self, value: u64, n: usize) {
        if n == 0 {
            return;
        }
        if self.error || n > 64 || n > self.remaining_write_bits() {
            self.error = true;
            return;
        }
        self.write_bits_at(self.wbit, value, n);
        self.wbit += n;
    }

    fn write_bits_at(&mut self, mut pos: usize, value: u64, n: usize) {
        let end = (pos + n).div_ceil(8);
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        let mut remaining = n;
        while remaining > 0 {
            let avail = 8 - pos % 8;
            let take = avail.min(remaining);
            let shift = avail - take;
            let bits = (value >> (remaining - take)) as u8 & mask(take);
            let byte = &mut self.data[pos / 8];
            *byte = (*byte & !(mask(take) << shift)) | (bits << shift);
            pos += take;
            remaining -= take;
        }
    }

    pub fn get_bit(&mut self) -> bool {
        self.get_bits(1) != 0
    }

    pub fn put_bit(&mut self, bit: bool) {
        self.put_bits(u64::from(bit), 1);
    }

    pub fn skip_bits(&mut self, n: usize) {
        if !self.can_read_bits(n) {
            self.error = true;
        } else {
            self.rbit += n;
        }
    }

    pub fn skip_bytes(&mut self, n: usize) {
        self.skip_bits(n.saturating_mul(8));
    }

    /// Write `n` reserved bits, all set to 1.
    pub fn put_reserved(&mut self, n: usize) {
        let mut left = n;
        while left > 0 {
            let chunk = left.min(64);
            self.put_bits(u64::MAX, chunk);
            left -= chunk;
        }
    }

    /// Write `n` reserved bits, all set to 0.
    pub fn put_reserved_zero(&mut self, n: usize) {
        let mut left = n;
        while left > 0 {
            let chunk = left.min(64);
            self.put_bits(0, chunk);
            left -= chunk;
        }
    }

    /// Write `value` in `n` bits, flagging an error if it does not fit.
    pub fn put_bits_checked(&mut self, value: u64, n: usize) {
        if n < 64 && value >> n != 0 {
            self.error = true;
            return;
        }
        self.put_bits(value, n);
    }

    // ------------------------------------------------------------------
    // Fixed-width integers
    // ------------------------------------------------------------------

    pub fn get_u8(&mut self) -> u8 {
        self.get_bits(8) as u8
    }

    pub fn get_u16(&mut self) -> u16 {
        self.get_bits(16) as u16
    }

    pub fn get_u24(&mut self) -> u32 {
        self.get_bits(24) as u32
    }

    pub fn get_u32(&mut self) -> u32 {
        self.get_bits(32) as u32
    }

    pub fn get_u40(&mut self) -> u64 {
        self.get_bits(40)
    }

    pub fn get_u48(&mut self) -> u64 {
        self.get_bits(48)
    }

    pub fn get_u64(&mut self) -> u64 {
        self.get_bits(64)
    }

    pub fn get_i8(&mut self) -> i8 {
        self.get_u8() as i8
    }

    pub fn get_i16(&mut self) -> i16 {
        self.get_u16() as i16
    }

    pub fn get_i32(&mut self) -> i32 {
        self.get_u32() as i32
    }

    pub fn get_i64(&mut self) -> i64 {
        self.get_u64() as i64
    }

    pub fn put_u8(&mut self, value: u8) {
        self.put_bits(u64::from(value), 8);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.put_bits(u64::from(value), 16);
    }

    pub fn put_u24(&mut self, value: u32) {
        self.put_bits_checked(u64::from(value), 24);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put_bits(u64::from(value), 32);
    }

    pub fn put_u40(&mut self, value: u64) {
        self.put_bits_checked(value, 40);
    }

    pub fn put_u48(&mut self, value: u64) {
        self.put_bits_checked(value, 48);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.put_bits(value, 64);
    }

    pub fn put_i8(&mut self, value: i8) {
        self.put_u8(value as u8);
    }

    pub fn put_i16(&mut self, value: i16) {
        self.put_u16(value as u16);
    }

    pub fn put_i32(&mut self, value: i32) {
        self.put_u32(value as u32);
    }

    pub fn put_i64(&mut self, value: i64) {
        self.put_u64(value as u64);
    }

    // ------------------------------------------------------------------
    // BCD
    // ------------------------------------------------------------------

    /// Read `digits` 4-bit BCD digits.
    pub fn get_bcd(&mut self, digits: usize) -> u32 {
        let mut value = 0u32;
        for _ in 0..digits {
            let digit = self.get_bits(4) as u32;
            if digit > 9 {
                self.error = true;
            }
            value = value.wrapping_mul(10).wrapping_add(digit);
        }
        value
    }

    /// Write `value` as `digits` BCD digits.
    pub fn put_bcd(&mut self, value: u32, digits: usize) {
        if digits > 9 || u64::from(value) >= 10u64.pow(digits as u32) {
            self.error = true;
            return;
        }
        let mut divisor = 10u32.pow(digits as u32);
        for _ in 0..digits {
            divisor /= 10;
            self.put_bits(u64::from(value / divisor % 10), 4);
        }
    }

    /// Read a `hh:mm:ss` BCD duration, in seconds.
    pub fn get_seconds_bcd(&mut self) -> u32 {
        let hours = self.get_bcd(2);
        let minutes = self.get_bcd(2);
        let seconds = self.get_bcd(2);
        hours * 3600 + minutes * 60 + seconds
    }

    pub fn put_seconds_bcd(&mut self, seconds: u32) {
        self.put_bcd(seconds / 3600, 2);
        self.put_bcd(seconds / 60 % 60, 2);
        self.put_bcd(seconds % 60, 2);
    }

    /// Read a `hh:mm` BCD duration, in minutes.
    pub fn get_minutes_bcd(&mut self) -> u32 {
        let hours = self.get_bcd(2);
        let minutes = self.get_bcd(2);
        hours * 60 + minutes
    }

    pub fn put_minutes_bcd(&mut self, minutes: u32) {
        self.put_bcd(minutes / 60, 2);
        self.put_bcd(minutes % 60, 2);
    }

    // ------------------------------------------------------------------
    // Byte strings
    // ------------------------------------------------------------------

    /// Read `n` bytes. On underflow, flags an error and returns nothing.
    pub fn get_bytes(&mut self, n: usize) -> Vec<u8> {
        if !self.can_read_bytes(n) {
            self.error = true;
            return Vec::new();
        }
        if self.read_is_byte_aligned() {
            let start = self.rbit / 8;
            self.rbit += n * 8;
            self.data[start..start + n].to_vec()
        } else {
            (0..n).map(|_| self.get_u8()).collect()
        }
    }

    pub fn get_remaining_bytes(&mut self) -> Vec<u8> {
        let n = self.remaining_read_bytes();
        self.get_bytes(n)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        if self.error || bytes.len() > self.remaining_write_bytes() {
            self.error = true;
            return;
        }
        if self.write_is_byte_aligned() {
            let start = self.wbit / 8;
            if self.data.len() < start + bytes.len() {
                self.data.resize(start + bytes.len(), 0);
            }
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
            self.wbit += bytes.len() * 8;
        } else {
            for &b in bytes {
                self.put_u8(b);
            }
        }
    }

    /// Read `n` bytes as text. No character set is interpreted beyond UTF-8.
    pub fn get_utf8(&mut self, n: usize) -> String {
        String::from_utf8_lossy(&self.get_bytes(n)).into_owned()
    }

    pub fn put_utf8(&mut self, text: &str) {
        self.put_bytes(text.as_bytes());
    }

    /// Read a string preceded by its 8-bit length.
    pub fn get_utf8_with_length(&mut self) -> String {
        let len = self.get_u8() as usize;
        self.get_utf8(len)
    }

    /// Write a string preceded by its 8-bit length.
    pub fn put_utf8_with_length(&mut self, text: &str) {
        let bytes = text.as_bytes();
        if bytes.len() > 0xFF || bytes.len() + 1 > self.remaining_write_bytes() {
            self.error = true;
            return;
        }
        self.put_u8(bytes.len() as u8);
        self.put_bytes(bytes);
    }

    /// Read a 3-character ISO 639 language code.
    pub fn get_language_code(&mut self) -> String {
        self.get_utf8(3)
    }

    pub fn put_language_code(&mut self, code: &str) {
        if code.len() != 3 || !code.is_ascii() {
            self.error = true;
            return;
        }
        self.put_bytes(code.as_bytes());
    }

    // ------------------------------------------------------------------
    // Domain helpers
    // ------------------------------------------------------------------

    /// Read a 13-bit PID preceded by 3 reserved bits.
    pub fn get_pid(&mut self) -> u16 {
        self.skip_bits(3);
        self.get_bits(13) as u16
    }

    /// Write 3 reserved bits then a 13-bit PID.
    pub fn put_pid(&mut self, pid: u16) {
        self.put_reserved(3);
        self.put_bits_checked(u64::from(pid), 13);
    }

    /// Read an MJD date, optionally followed by BCD `hh`, `mm`, `ss` bytes.
    ///
    /// Invalid dates decode as the Unix epoch instead of failing, because
    /// broadcast streams carry plenty of them.
    pub fn get_mjd(&mut self, size: usize) -> NaiveDateTime {
        if !(MJD_MIN_SIZE..=MJD_SIZE).contains(&size)
            || !self.read_is_byte_aligned()
            || !self.can_read_bytes(size)
        {
            self.error = true;
            return NaiveDateTime::default();
        }
        let mjd = self.get_u16();
        let mut hms = [0u32; 3];
        for field in hms.iter_mut().take(size - MJD_MIN_SIZE) {
            let b = self.get_u8();
            *field = u32::from(b >> 4) * 10 + u32::from(b & 0x0F);
        }
        mjd_origin()
            .and_then(|origin| origin.checked_add_days(Days::new(u64::from(mjd))))
            .and_then(|date| date.and_hms_opt(hms[0], hms[1], hms[2]))
            .unwrap_or_default()
    }

    /// Write an MJD date on `size` bytes (2 to 5).
    pub fn put_mjd(&mut self, time: &NaiveDateTime, size: usize) {
        let days = mjd_origin().map(|origin| time.date().signed_duration_since(origin).num_days());
        match days {
            Some(days)
                if (MJD_MIN_SIZE..=MJD_SIZE).contains(&size)
                    && (0..=0xFFFF).contains(&days)
                    && self.write_is_byte_aligned()
                    && self.remaining_write_bytes() >= size =>
            {
                self.put_u16(days as u16);
                let hms = [time.hour(), time.minute(), time.second()];
                for field in hms.iter().take(size - MJD_MIN_SIZE) {
                    self.put_bcd(*field, 2);
                }
            }
            _ => self.error = true,
        }
    }

    /// Read a `vluimsbf5` variable-length integer.
    pub fn get_vluimsbf5(&mut self) -> u64 {
        let mut nibbles = 1;
        while !self.error && self.get_bit() {
            nibbles += 1;
        }
        self.get_bits(4 * nibbles)
    }

    pub fn put_vluimsbf5(&mut self, value: u64) {
        let mut nibbles = 1;
        let mut tmp = value;
        while tmp > 0x0F {
            nibbles += 1;
            tmp >>= 4;
        }
        self.put_reserved(nibbles - 1);
        self.put_bit(false);
        self.put_bits(value, 4 * nibbles);
    }

    // ------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------

    /// Number of regions currently open.
    pub fn region_depth(&self) -> usize {
        self.regions.len()
    }

    /// Read a `length_bits` length field and clamp subsequent reads to that
    /// many bytes.
    ///
    /// A length larger than the data left in the enclosing limit is clamped
    /// to it and flags an error.
    pub fn push_read_region(&mut self, length_bits: usize) {
        let length = self.get_bits(length_bits) as usize;
        let start = self.rbit;
        let outer = self.read_end();
        let mut end = start.saturating_add(length.saturating_mul(8));
        if end > outer {
            self.error = true;
            end = outer.max(start);
        }
        self.regions.push(Region {
            kind: RegionKind::Read,
            anchor: end,
            width: length_bits,
            body_start: start,
            saved_limit: self.read_limit,
            reserved: false,
        });
        self.read_limit = Some(end);
    }

    /// Reserve a `length_bits` length field, patched by the matching
    /// [`pop_region`](Self::pop_region). The body must start byte-aligned.
    pub fn push_write_region(&mut self, length_bits: usize) {
        debug_assert!((1..=32).contains(&length_bits), "invalid length field width");
        let anchor = self.wbit;
        let aligned = (anchor + length_bits) % 8 == 0;
        debug_assert!(aligned, "write region body must start on a byte boundary");
        self.put_bits(0, length_bits);
        let reserved = self.wbit == anchor + length_bits;
        if !aligned {
            self.error = true;
        }
        self.regions.push(Region {
            kind: RegionKind::Write,
            anchor,
            width: length_bits,
            body_start: self.wbit,
            saved_limit: self.read_limit,
            reserved,
        });
    }

    /// Close the innermost region, whatever its kind.
    ///
    /// Read: restores the enclosing limit and moves the read cursor to the
    /// region end. Write: patches the length field with the body size.
    pub fn pop_region(&mut self) {
        self.close_region(None);
    }

    /// Close the innermost region, which must be a read region.
    pub fn pop_read_region(&mut self) {
        self.close_region(Some(RegionKind::Read));
    }

    /// Close the innermost region, which must be a write region.
    pub fn pop_write_region(&mut self) {
        self.close_region(Some(RegionKind::Write));
    }

    fn close_region(&mut self, expected: Option<RegionKind>) {
        let Some(region) = self.regions.pop() else {
            debug_assert!(false, "pop_region without a matching push");
            self.error = true;
            return;
        };
        if let Some(kind) = expected {
            debug_assert_eq!(region.kind, kind, "region closed with the wrong kind");
            if region.kind != kind {
                self.error = true;
            }
        }
        match region.kind {
            RegionKind::Read => {
                self.read_limit = region.saved_limit;
                self.rbit = self.rbit.max(region.anchor);
            }
            RegionKind::Write => {
                let body_bits = self.wbit - region.body_start;
                let size = (body_bits / 8) as u64;
                if body_bits % 8 != 0 || (region.width < 64 && size >> region.width != 0) {
                    self.error = true;
                } else if region.reserved {
                    self.write_bits_at(region.anchor, size, region.width);
                }
            }
        }
    }
}

fn mask(bits: usize) -> u8 {
    if bits >= 8 {
        0xFF
    } else {
        (1u8 << bits) - 1
    }
}

/// Day zero of the Modified Julian Date.
fn mjd_origin() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1858, 11, 17)
}

/// MJD day number of a date, if representable on 16 bits.
pub fn date_to_mjd(date: &NaiveDate) -> Option<u16> {
    let origin = mjd_origin()?;
    u16::try_from(date.signed_duration_since(origin).num_days()).ok()
}

/// Year, month and day of an MJD day number.
pub fn mjd_to_ymd(mjd: u16) -> Option<(i32, u32, u32)> {
    let date = mjd_origin()?.checked_add_days(Days::new(u64::from(mjd)))?;
    Some((date.year(), date.month(), date.day()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_across_bytes() {
        let mut buf = PsiBuffer::from_bytes(&[0b1011_0011, 0b1100_0101]);
        assert_eq!(buf.get_bits(3), 0b101);
        assert_eq!(buf.get_bits(7), 0b1_0011_11);
        assert_eq!(buf.get_bits(6), 0b00_0101);
        assert!(!buf.can_read());
        assert!(!buf.has_error());
    }

    #[test]
    fn test_put_bits_across_bytes() {
        let mut buf = PsiBuffer::new(2);
        buf.put_bits(0b101, 3);
        buf.put_bits(0b1_0011_11, 7);
        buf.put_bits(0b00_0101, 6);
        assert_eq!(buf.as_written(), &[0b1011_0011, 0b1100_0101]);
    }

    #[test]
    fn test_read_past_limit() {
        let mut buf = PsiBuffer::from_bytes(&[0xAB]);
        assert_eq!(buf.get_u16(), 0);
        assert!(buf.has_error());
        // Sticky: further reads fail even if in bounds.
        assert_eq!(buf.get_u8(), 0);
        assert!(!buf.can_read());
    }

    #[test]
    fn test_write_past_capacity() {
        let mut buf = PsiBuffer::new(2);
        buf.put_u8(0x47);
        buf.put_u16(0x1234);
        assert!(buf.has_error());
        assert_eq!(buf.as_written(), &[0x47]);
    }

    #[test]
    fn test_put_bits_checked_overflow() {
        let mut buf = PsiBuffer::new(4);
        buf.put_bits_checked(0x20, 5);
        assert!(buf.has_error());
        assert_eq!(buf.written_size(), 0);
    }

    #[test]
    fn test_read_region_clamps_inner_loop() {
        // length=2, two inner bytes, then a sibling byte.
        let mut buf = PsiBuffer::from_bytes(&[0x02, 0x11, 0x22, 0x33]);
        buf.push_read_region(8);
        let mut inner = Vec::new();
        while buf.can_read() {
            inner.push(buf.get_u8());
        }
        buf.pop_region();
        assert_eq!(inner, vec![0x11, 0x22]);
        assert_eq!(buf.get_u8(), 0x33);
        assert!(!buf.has_error());
    }

    #[test]
    fn test_read_region_pop_skips_unread() {
        let mut buf = PsiBuffer::from_bytes(&[0xF0, 0x03, 0xAA, 0xBB, 0xCC, 0xDD]);
        buf.skip_bits(4);
        buf.push_read_region(12);
        assert_eq!(buf.get_u8(), 0xAA);
        buf.pop_region();
        assert_eq!(buf.get_u8(), 0xDD);
    }

    #[test]
    fn test_read_region_oversized_length() {
        let mut buf = PsiBuffer::from_bytes(&[0x05, 0x01, 0x02]);
        buf.push_read_region(8);
        assert!(buf.has_error());
        assert_eq!(buf.remaining_read_bytes(), 2);
        buf.pop_region();
        assert_eq!(buf.region_depth(), 0);
    }

    #[test]
    fn test_nested_write_regions() {
        let mut buf = PsiBuffer::new(16);
        buf.put_reserved(4);
        buf.push_write_region(12);
        buf.put_u8(0x0A);
        buf.push_write_region(8);
        buf.put_bytes(&[1, 2, 3]);
        buf.pop_write_region();
        buf.pop_write_region();
        assert!(!buf.has_error());
        assert_eq!(buf.as_written(), &[0xF0, 0x05, 0x0A, 0x03, 1, 2, 3]);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "region closed with the wrong kind"))]
    fn test_region_kind_mismatch() {
        let mut buf = PsiBuffer::from_bytes(&[0x01, 0xAA]);
        buf.push_read_region(8);
        buf.pop_write_region();
        assert!(buf.has_error());
        assert_eq!(buf.region_depth(), 0);
    }

    #[test]
    fn test_write_region_without_room_for_field() {
        let mut buf = PsiBuffer::new(1);
        buf.put_u8(0xFF);
        buf.push_write_region(8);
        buf.pop_region();
        assert!(buf.has_error());
        assert_eq!(buf.as_written(), &[0xFF]);
    }

    #[test]
    fn test_write_region_too_long_for_field() {
        let mut buf = PsiBuffer::new(300);
        buf.push_write_region(8);
        buf.put_bytes(&[0u8; 256]);
        buf.pop_region();
        assert!(buf.has_error());
    }

    #[test]
    fn test_bcd() {
        let mut buf = PsiBuffer::new(4);
        buf.put_bcd(1234, 4);
        buf.put_bcd(7, 2);
        assert_eq!(buf.as_written(), &[0x12, 0x34, 0x07]);
        let mut rd = PsiBuffer::from_bytes(buf.as_written());
        assert_eq!(rd.get_bcd(4), 1234);
        assert_eq!(rd.get_bcd(2), 7);

        let mut bad = PsiBuffer::from_bytes(&[0x1A]);
        bad.get_bcd(2);
        assert!(bad.has_error());

        let mut over = PsiBuffer::new(4);
        over.put_bcd(100, 2);
        assert!(over.has_error());
    }

    #[test]
    fn test_mjd_reference_date() {
        // EN 300 468 annex C example: 93/10/13 12:45:00
        let mut buf = PsiBuffer::from_bytes(&[0xC0, 0x79, 0x12, 0x45, 0x00]);
        let t = buf.get_mjd(MJD_SIZE);
        assert_eq!(t.to_string(), "1993-10-13 12:45:00");

        let mut out = PsiBuffer::new(5);
        out.put_mjd(&t, MJD_SIZE);
        assert_eq!(out.as_written(), &[0xC0, 0x79, 0x12, 0x45, 0x00]);
    }

    #[test]
    fn test_mjd_date_only() {
        let mut buf = PsiBuffer::from_bytes(&[0xC0, 0x79]);
        let t = buf.get_mjd(MJD_MIN_SIZE);
        assert_eq!(t.to_string(), "1993-10-13 00:00:00");
        assert_eq!(mjd_to_ymd(0xC079), Some((1993, 10, 13)));
    }

    #[test]
    fn test_mjd_invalid_time_is_epoch() {
        let mut buf = PsiBuffer::from_bytes(&[0xC0, 0x79, 0x99, 0x99, 0x99]);
        let t = buf.get_mjd(MJD_SIZE);
        assert_eq!(t, NaiveDateTime::default());
        assert!(!buf.has_error());
    }

    #[test]
    fn test_pid() {
        let mut buf = PsiBuffer::new(2);
        buf.put_pid(0x0100);
        assert_eq!(buf.as_written(), &[0xE1, 0x00]);
        let mut rd = PsiBuffer::from_bytes(&[0xE1, 0x00]);
        assert_eq!(rd.get_pid(), 0x0100);
    }

    #[test]
    fn test_vluimsbf5() {
        let mut buf = PsiBuffer::new(8);
        buf.put_vluimsbf5(0x123);
        // two leading ones, a zero, then three nibbles
        let mut rd = PsiBuffer::from_bytes(buf.as_written());
        assert_eq!(rd.get_bits(3), 0b110);
        let mut rd = PsiBuffer::from_bytes(buf.as_written());
        assert_eq!(rd.get_vluimsbf5(), 0x123);
    }

    #[test]
    fn test_strings() {
        let mut buf = PsiBuffer::new(16);
        buf.put_utf8_with_length("NHK");
        buf.put_language_code("jpn");
        buf.put_language_code("japanese");
        assert!(buf.has_error());
        let mut rd = PsiBuffer::from_bytes(buf.as_written());
        assert_eq!(rd.get_utf8_with_length(), "NHK");
        assert_eq!(rd.get_language_code(), "jpn");
    }

    #[test]
    fn test_signed_integers() {
        let mut buf = PsiBuffer::new(8);
        buf.put_i16(-2);
        buf.put_i8(-128);
        let mut rd = PsiBuffer::from_bytes(buf.as_written());
        assert_eq!(rd.get_i16(), -2);
        assert_eq!(rd.get_i8(), -128);
    }
}
