//! Call frames.

use std::rc::Rc;

use crate::code::Instructions;
use crate::object::Closure;

/// One active call.
#[derive(Clone, Debug)]
pub struct Frame {
    /// The closure being executed.
    pub closure: Rc<Closure>,
    /// Offset of the next byte to fetch.
    pub ip: usize,
    /// Stack index of the first local slot.
    pub base_pointer: usize,
}

impl Frame {
    /// Creates a frame positioned at the start of `closure`.
    #[must_use]
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    /// The instructions this frame executes.
    #[must_use]
    pub fn instructions(&self) -> &Instructions {
        &self.closure.function.instructions
    }
}
