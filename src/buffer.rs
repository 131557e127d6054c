//! The per-request scratch buffer shared by all compilation stages.

use bumpalo::Bump;

/// Reusable scratch storage owned by one compilation request and lent
/// mutably to one stage at a time. Stages allocate transient working data
/// here instead of hitting the global allocator per state; nothing
/// allocated in the buffer may outlive the stage that allocated it.
#[derive(Default)]
pub struct CompilationBuffer {
    /// Arena for transient allocations with stage lifetime.
    bump: Bump,

    /// Scratch for NFA state sets during subset construction.
    state_set_a: Vec<u32>,
    state_set_b: Vec<u32>,
}

impl CompilationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the arena. The caller must not keep references past its
    /// stage; the coordinator resets the arena between stages.
    pub fn bump(&self) -> &Bump {
        &self.bump
    }

    /// Borrow the arena and both scratch vectors at once, for stages that
    /// need independent working sets.
    pub fn parts(&mut self) -> (&Bump, &mut Vec<u32>, &mut Vec<u32>) {
        self.state_set_a.clear();
        self.state_set_b.clear();
        (&self.bump, &mut self.state_set_a, &mut self.state_set_b)
    }

    /// Drop all arena allocations, keeping the backing memory for the
    /// next stage.
    pub fn reset(&mut self) {
        self.bump.reset();
    }
}

impl std::fmt::Debug for CompilationBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CompilationBuffer")
            .field("allocated", &self.bump.allocated_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_sets_come_back_cleared() {
        let mut buffer = CompilationBuffer::new();
        {
            let (_, a, b) = buffer.parts();
            a.extend([1, 2, 3]);
            b.push(7);
        }
        let (_, a, b) = buffer.parts();
        assert!(a.is_empty() && b.is_empty());
    }

    #[test]
    fn reset_keeps_buffer_usable() {
        let mut buffer = CompilationBuffer::new();
        let text = bumpalo::collections::String::from_str_in("scratch", buffer.bump());
        assert_eq!(text.as_str(), "scratch");
        drop(text);
        buffer.reset();
        let next = bumpalo::collections::String::from_str_in("again", buffer.bump());
        assert_eq!(next.as_str(), "again");
    }
}
