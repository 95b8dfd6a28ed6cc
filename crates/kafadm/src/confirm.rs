// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Operator confirmation capability.
//!
//! Modeled as a pure question -> bool capability so the reconciler and
//! relay state machines stay testable without interactive input. The CLI
//! supplies an interactive implementation; `--no-verify` swaps in
//! [`AutoApprove`].

/// Ask the operator a yes/no question.
pub trait Confirm {
    fn ask(&self, question: &str) -> bool;
}

/// Approves everything without prompting (no-verify mode).
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Confirm for AutoApprove {
    fn ask(&self, _question: &str) -> bool {
        true
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_approve() {
        assert!(AutoApprove.ask("Apply changes?"));
    }
}
