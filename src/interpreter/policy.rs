//! Step policies: how the step loop treats errors and halts

use tracing::debug;

/// An override of the default step behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Offer command errors to the enclosing try blocks instead of failing
    RouteErrors,
    /// Stop the run before the next command, then remove itself
    HaltOnce,
}

/// Stack of installed policies. The innermost policy wins.
#[derive(Debug, Clone, Default)]
pub struct PolicyStack {
    stack: Vec<StepPolicy>,
}

impl PolicyStack {
    pub fn push(&mut self, policy: StepPolicy) {
        debug!(?policy, depth = self.stack.len() + 1, "install step policy");
        self.stack.push(policy);
    }

    /// Remove the innermost occurrence of `policy`
    pub fn remove(&mut self, policy: StepPolicy) {
        if let Some(pos) = self.stack.iter().rposition(|p| *p == policy) {
            self.stack.remove(pos);
            debug!(?policy, depth = self.stack.len(), "remove step policy");
        }
    }

    /// Consume a pending one-shot halt
    pub fn take_halt(&mut self) -> bool {
        if self.stack.last() == Some(&StepPolicy::HaltOnce) {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    pub fn routes_errors(&self) -> bool {
        self.stack.contains(&StepPolicy::RouteErrors)
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.stack.is_empty() {
            debug!(remaining = self.stack.len(), "release step policies");
        }
        self.stack.clear();
    }
}
