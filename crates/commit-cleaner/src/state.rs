use crate::scheduler::TimerToken;

/// Coarse progress of one dialog, derived from [`DialogState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogPhase {
    Idle,
    SquashConfirmed,
    Cleaned,
    Success,
}

/// Per-dialog progress record.
///
/// Every flag is monotonic: once set it stays set for the lifetime of the
/// entry. The flags are advisory; passes are re-runnable regardless.
#[derive(Debug, Default)]
pub struct DialogState {
    customize_ensured: bool,
    cleaned_once: bool,
    squash_detected: bool,
    success: bool,
    debounce: Option<TimerToken>,
}

impl DialogState {
    pub fn customize_ensured(&self) -> bool {
        self.customize_ensured
    }

    pub fn cleaned_once(&self) -> bool {
        self.cleaned_once
    }

    pub fn squash_detected(&self) -> bool {
        self.squash_detected
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn note_cleaned(&mut self, changed: bool) {
        self.cleaned_once |= changed;
    }

    /// Returns `true` only on the first confirmation.
    pub fn confirm_squash(&mut self) -> bool {
        let first = !self.squash_detected;
        self.squash_detected = true;
        first
    }

    pub fn mark_customize_ensured(&mut self) {
        self.customize_ensured = true;
    }

    pub fn settle_success(&mut self) {
        self.success |= self.cleaned_once || self.squash_detected;
    }

    /// Slot holding the pending debounced pass, if any.
    pub fn debounce_slot(&mut self) -> &mut Option<TimerToken> {
        &mut self.debounce
    }

    pub fn debounce_handle(&self) -> Option<TimerToken> {
        self.debounce
    }

    pub fn phase(&self) -> DialogPhase {
        if self.success {
            DialogPhase::Success
        } else if self.cleaned_once {
            DialogPhase::Cleaned
        } else if self.squash_detected {
            DialogPhase::SquashConfirmed
        } else {
            DialogPhase::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_never_revert() {
        let mut state = DialogState::default();
        assert_eq!(state.phase(), DialogPhase::Idle);

        assert!(state.confirm_squash());
        assert!(!state.confirm_squash());
        assert_eq!(state.phase(), DialogPhase::SquashConfirmed);

        state.note_cleaned(true);
        state.note_cleaned(false);
        assert!(state.cleaned_once());
        assert_eq!(state.phase(), DialogPhase::Cleaned);

        state.settle_success();
        assert!(state.success());
        assert_eq!(state.phase(), DialogPhase::Success);
    }

    #[test]
    fn success_needs_progress() {
        let mut state = DialogState::default();
        state.settle_success();
        assert!(!state.success());
        state.mark_customize_ensured();
        state.settle_success();
        assert!(!state.success());
        assert!(state.customize_ensured());
    }

    #[test]
    fn cleaning_alone_reaches_success() {
        let mut state = DialogState::default();
        state.note_cleaned(true);
        assert_eq!(state.phase(), DialogPhase::Cleaned);
        state.settle_success();
        assert!(!state.squash_detected());
        assert_eq!(state.phase(), DialogPhase::Success);
    }
}
