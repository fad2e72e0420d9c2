//! Stable device fingerprint
//!
//! Device-scope experiments bucket by an MD5 digest of the client address
//! concatenated with the user agent. The first four digest bytes, read
//! big-endian, give a base bucket in `0..100`; each experiment then rotates
//! that base by its numeric offset so device experiments do not correlate.

use std::fmt;

/// 128-bit digest of a device's address and user agent
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceFingerprint([u8; 16]);

impl DeviceFingerprint {
    /// Fingerprint an address / user-agent pair
    #[must_use]
    pub fn compute(remote_address: &str, user_agent: &str) -> Self {
        let mut input = String::with_capacity(remote_address.len() + user_agent.len());
        input.push_str(remote_address);
        input.push_str(user_agent);
        Self(md5::compute(input.as_bytes()).0)
    }

    /// Bucket in `0..100` before any experiment offset
    #[inline]
    #[must_use]
    pub fn base_bucket(&self) -> u32 {
        let head = [self.0[0], self.0[1], self.0[2], self.0[3]];
        u32::from_be_bytes(head) % 100
    }

    /// Bucket in `0..100` for an experiment with the given offset
    #[inline]
    #[must_use]
    pub fn bucket(&self, numeric_offset: u8) -> u32 {
        (self.base_bucket() + u32::from(numeric_offset)) % 100
    }
}

impl fmt::Debug for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceFingerprint({self})")
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
