/// Bounds the number of model-decision rounds in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    limit: u32,
    used: u32,
}

impl StepBudget {
    pub const DEFAULT_LIMIT: u32 = 20;

    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Take one round. Returns `false` once the budget is spent.
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl Default for StepBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}
