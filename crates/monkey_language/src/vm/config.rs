//! Resource bounds for the VM.

/// Bounds enforced by the VM while it runs.
///
/// Exceeding the operand stack or frame depth aborts the run with a fatal
/// `StackOverflow`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Operand stack slots.
    pub stack_size: usize,
    /// Maximum call depth, the top-level program included.
    pub max_frames: usize,
    /// Maximum number of global slots.
    pub globals_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_size: 2048,
            max_frames: 1024,
            globals_size: 65536,
        }
    }
}

impl VmConfig {
    /// Builder method to set the operand stack size.
    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Builder method to set the maximum call depth.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Builder method to set the maximum number of globals.
    #[must_use]
    pub fn with_globals_size(mut self, globals_size: usize) -> Self {
        self.globals_size = globals_size;
        self
    }
}
