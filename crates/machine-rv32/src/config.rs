//! Machine configuration.

/// Default RAM size in bytes.
pub const DEFAULT_MEM_SIZE: usize = 500_000;

/// Build-time parameters of the machine.
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    /// RAM size in bytes.
    pub mem_size: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            mem_size: DEFAULT_MEM_SIZE,
        }
    }
}
