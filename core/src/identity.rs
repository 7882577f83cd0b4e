//! Record identity allocation.
//!
//! Records without an explicit `recordId` get an opaque token from an
//! [`IdentityAllocator`]. The production allocator draws 16 bytes from a
//! single process-wide generator that is seeded from the OS on first use.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fmt::Write as _;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Produces statistically unique identities without coordination.
pub trait IdentityAllocator: Send + Sync {
    /// Return a fresh identity.
    fn allocate(&self) -> String;
}

static GENERATOR: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn generator() -> &'static Mutex<StdRng> {
    GENERATOR.get_or_init(|| Mutex::new(StdRng::from_entropy()))
}

/// Random GUIDs in `8-4-4-4-12` hex groups.
///
/// Each byte is written low nibble first, so the bytes `0x1f 0x2e` render as
/// `f1e2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuidAllocator;

impl GuidAllocator {
    /// Render 16 bytes in the GUID layout.
    #[must_use]
    pub fn format(bytes: &[u8; 16]) -> String {
        const GROUPS: [usize; 5] = [4, 2, 2, 2, 6];
        let mut out = String::with_capacity(36);
        let mut offset = 0;
        for (index, len) in GROUPS.into_iter().enumerate() {
            if index > 0 {
                out.push('-');
            }
            for byte in &bytes[offset..offset + len] {
                let _ = write!(out, "{:x}{:x}", byte & 0x0f, byte >> 4);
            }
            offset += len;
        }
        out
    }
}

impl IdentityAllocator for GuidAllocator {
    fn allocate(&self) -> String {
        let mut bytes = [0u8; 16];
        generator()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill_bytes(&mut bytes);
        Self::format(&bytes)
    }
}
