/// Two-step save/confirm flow
///
/// Create and edit forms submit twice: the first valid "save" stages the
/// entered values and renders a read-only confirm page; the second "save"
/// commits them. The staged snapshot lives in the caller's session, one
/// `ConfirmFlow` per resource type, so the flow survives across the two
/// request/response cycles and across server processes.
///
/// # State Machine
///
/// ```text
/// Empty  → (valid save)   → Staged
/// Staged → (second save)  → Empty   (snapshot handed to the commit)
/// Staged → (cancel)       → Empty   (snapshot and staged image discarded)
/// Staged → (valid save)   → Staged  (snapshot fully replaced)
/// ```
///
/// An invalid save always lands in `Empty`; a staged snapshot never coexists
/// with invalid input.

use serde::{Deserialize, Serialize};

/// Session-held state of one create/edit flow
///
/// `Staged` carries the validated field values verbatim plus the filename of
/// an image written to temporary storage, if the form uploaded one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfirmFlow<T> {
    /// No pending edit
    Empty,

    /// A snapshot awaits its confirming second save
    Staged {
        /// Validated field values, echoed read-only on the confirm page
        draft: T,

        /// Filename staged in temporary storage, promoted on commit
        staged_image: Option<String>,
    },
}

// Manual impl: the derive would require `T: Default`.
impl<T> Default for ConfirmFlow<T> {
    fn default() -> Self {
        ConfirmFlow::Empty
    }
}

impl<T> ConfirmFlow<T> {
    /// Whether a snapshot is staged (the confirm page should be shown)
    pub fn is_staged(&self) -> bool {
        matches!(self, ConfirmFlow::Staged { .. })
    }

    /// Stages a snapshot, fully replacing any previous one
    ///
    /// Partial edits are never merged across stages; the latest staged
    /// values are the only ones a commit can see.
    pub fn stage(&mut self, draft: T, staged_image: Option<String>) {
        *self = ConfirmFlow::Staged {
            draft,
            staged_image,
        };
    }

    /// Cancels the flow, returning any staged image filename for discard
    pub fn cancel(&mut self) -> Option<String> {
        match std::mem::take(self) {
            ConfirmFlow::Empty => None,
            ConfirmFlow::Staged { staged_image, .. } => staged_image,
        }
    }

    /// Takes the staged snapshot for committing, leaving the flow empty
    ///
    /// Returns `None` when nothing is staged — the caller must then treat
    /// the submission as a fresh stage, never as a commit.
    pub fn take_staged(&mut self) -> Option<(T, Option<String>)> {
        match std::mem::take(self) {
            ConfirmFlow::Empty => None,
            ConfirmFlow::Staged {
                draft,
                staged_image,
            } => Some((draft, staged_image)),
        }
    }

    /// Borrows the staged snapshot, if any
    pub fn staged(&self) -> Option<&T> {
        match self {
            ConfirmFlow::Empty => None,
            ConfirmFlow::Staged { draft, .. } => Some(draft),
        }
    }

    /// Borrows the staged image filename, if any
    pub fn staged_image(&self) -> Option<&str> {
        match self {
            ConfirmFlow::Empty => None,
            ConfirmFlow::Staged { staged_image, .. } => staged_image.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let flow: ConfirmFlow<String> = ConfirmFlow::default();
        assert!(!flow.is_staged());
        assert!(flow.staged().is_none());
    }

    #[test]
    fn test_stage_replaces_previous_snapshot() {
        let mut flow = ConfirmFlow::Empty;
        flow.stage("first".to_string(), None);
        flow.stage("second".to_string(), Some("pic.png".to_string()));

        assert_eq!(flow.staged(), Some(&"second".to_string()));
        assert_eq!(flow.staged_image(), Some("pic.png"));

        let (draft, image) = flow.take_staged().expect("snapshot staged");
        assert_eq!(draft, "second");
        assert_eq!(image.as_deref(), Some("pic.png"));
    }

    #[test]
    fn test_take_staged_clears_the_flow() {
        let mut flow = ConfirmFlow::Empty;
        flow.stage(42u32, None);

        assert!(flow.take_staged().is_some());
        assert!(!flow.is_staged());
        assert!(flow.take_staged().is_none());
    }

    #[test]
    fn test_commit_without_stage_yields_nothing() {
        let mut flow: ConfirmFlow<u32> = ConfirmFlow::Empty;
        assert!(flow.take_staged().is_none());
    }

    #[test]
    fn test_cancel_returns_staged_image() {
        let mut flow = ConfirmFlow::Empty;
        flow.stage("draft".to_string(), Some("avatar.jpg".to_string()));

        assert_eq!(flow.cancel().as_deref(), Some("avatar.jpg"));
        assert!(!flow.is_staged());
        assert!(flow.cancel().is_none());
    }

    #[test]
    fn test_session_roundtrip_preserves_snapshot() {
        let mut flow = ConfirmFlow::Empty;
        flow.stage("hello".to_string(), None);

        let json = serde_json::to_string(&flow).unwrap();
        let restored: ConfirmFlow<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, flow);
    }
}
