/// Reports the memory footprint fed into admission control.
pub trait ResourceProbe: Send + Sync {
    fn memory_mb(&self) -> u64;
}

/// Probe that always reports a fixed figure. `FixedProbe(0)` is the default
/// for the sequential run loop, which has nothing to measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedProbe(pub u64);

impl ResourceProbe for FixedProbe {
    fn memory_mb(&self) -> u64 {
        self.0
    }
}
