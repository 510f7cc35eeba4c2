//! Orchestrator-supported compute sizes
//!
//! Tasks are scheduled onto fixed (CPU, memory) combinations. Anything else
//! is rejected at compile time instead of at submission.

use crate::spec::ComputeSizing;
use crate::{Error, Result};

/// Memory values a CPU tier can be paired with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryOptions {
    /// An explicit list, MiB
    Fixed(&'static [u32]),
    /// `min..=max` in increments of `step`, MiB
    Stepped {
        /// Smallest memory
        min: u32,
        /// Largest memory
        max: u32,
        /// Increment
        step: u32,
    },
}

impl MemoryOptions {
    /// Whether `memory_mib` is one of the options
    pub fn accepts(&self, memory_mib: u32) -> bool {
        match *self {
            Self::Fixed(values) => values.contains(&memory_mib),
            Self::Stepped { min, max, step } => {
                (min..=max).contains(&memory_mib) && (memory_mib - min) % step == 0
            }
        }
    }
}

/// Supported (CPU units, memory) tiers, ascending by CPU
pub const SIZING_TIERS: &[(u32, MemoryOptions)] = &[
    (256, MemoryOptions::Fixed(&[512, 1024, 2048])),
    (
        512,
        MemoryOptions::Stepped {
            min: 1024,
            max: 4096,
            step: 1024,
        },
    ),
    (
        1024,
        MemoryOptions::Stepped {
            min: 2048,
            max: 8192,
            step: 1024,
        },
    ),
    (
        2048,
        MemoryOptions::Stepped {
            min: 4096,
            max: 16384,
            step: 1024,
        },
    ),
    (
        4096,
        MemoryOptions::Stepped {
            min: 8192,
            max: 30720,
            step: 1024,
        },
    ),
];

/// Whether the orchestrator can schedule `sizing`
pub fn is_supported(sizing: ComputeSizing) -> bool {
    SIZING_TIERS
        .iter()
        .any(|(cpu, memory)| *cpu == sizing.cpu && memory.accepts(sizing.memory_mib))
}

/// Reject sizes the orchestrator cannot schedule
pub fn ensure_supported(service_name: &str, sizing: ComputeSizing) -> Result<()> {
    if is_supported(sizing) {
        Ok(())
    } else {
        Err(Error::UnsupportedSizing {
            service: service_name.to_string(),
            cpu: sizing.cpu,
            memory_mib: sizing.memory_mib,
        })
    }
}
