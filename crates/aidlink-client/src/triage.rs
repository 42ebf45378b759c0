//! Scripted first-aid triage dialogue: a fixed decision tree walked by
//! a small state machine with back/restart navigation. The tree is
//! pure data — changing the questions or advice touches nothing in the
//! navigation engine.

/// Dialogue states. `EmergencyInterrupt` is terminal and cannot be
/// dismissed: the only advice at that point is to call emergency
/// services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageState {
    Start,
    CheckConscious,
    CheckBreathing,
    AdviceCpr,
    AdviceBleeding,
    AdviceBurn,
    AdviceWait,
    EmergencyInterrupt,
}

/// User input for the current node. `Pick` selects a menu option by
/// index; the rest answer a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    NotSure,
    Pick(usize),
}

/// What a state shows. All content is 'static data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Menu {
        prompt: &'static str,
        hint: &'static str,
        options: &'static [(&'static str, TriageState)],
    },
    Question {
        text: &'static str,
        subtext: &'static str,
        yes: TriageState,
        no: TriageState,
        not_sure: TriageState,
    },
    Advice {
        title: &'static str,
        steps: &'static [&'static str],
        emergency: bool,
    },
    Emergency {
        message: &'static str,
    },
}

impl TriageState {
    pub fn node(self) -> Node {
        match self {
            TriageState::Start => Node::Menu {
                prompt: "What seems to be the main issue?",
                hint: "Select the best match.",
                options: &[
                    ("Unconscious / Not responding", TriageState::CheckConscious),
                    ("Heavy Bleeding", TriageState::AdviceBleeding),
                    ("Burn or Scald", TriageState::AdviceBurn),
                    ("Chest Pain / Heart Issue", TriageState::EmergencyInterrupt),
                    ("Something else / Not Sure", TriageState::CheckConscious),
                ],
            },
            TriageState::CheckConscious => Node::Question {
                text: "Is the person responding to you?",
                subtext: "Tap their shoulder and ask 'Can you hear me?' loudly.",
                yes: TriageState::CheckBreathing,
                no: TriageState::EmergencyInterrupt,
                not_sure: TriageState::CheckBreathing,
            },
            TriageState::CheckBreathing => Node::Question {
                text: "Are they breathing normally?",
                subtext: "Look for their chest rising and falling regularly.",
                yes: TriageState::AdviceWait,
                no: TriageState::AdviceCpr,
                // Safer to assume CPR is needed if unsure.
                not_sure: TriageState::AdviceCpr,
            },
            TriageState::AdviceCpr => Node::Advice {
                title: "Start CPR Immediately",
                steps: &[
                    "Call 000 immediately (Speaker mode).",
                    "Place heel of hand on center of chest.",
                    "Push hard and fast (2 pushes per second).",
                    "Use body weight. Don't stop until help arrives.",
                ],
                emergency: true,
            },
            TriageState::AdviceBleeding => Node::Advice {
                title: "Control the Bleeding",
                steps: &[
                    "Apply firm direct pressure with a clean cloth.",
                    "Keep pressure on constantly.",
                    "Elevate the injury above heart level if possible.",
                    "If blood soaks through, add another layer (do not remove).",
                ],
                emergency: false,
            },
            TriageState::AdviceBurn => Node::Advice {
                title: "Treating a Burn",
                steps: &[
                    "Cool under cool running water for 20 minutes.",
                    "Remove jewelry near the burn before it swells.",
                    "Do not use ice, creams, or butter.",
                    "Cover loosely with cling wrap or clean cloth.",
                ],
                emergency: false,
            },
            TriageState::AdviceWait => Node::Advice {
                title: "Monitor and Wait",
                steps: &[
                    "Keep them comfortable and warm.",
                    "Do not give them food or drink.",
                    "Stay with them and keep talking.",
                    "If their condition changes, call 000.",
                ],
                emergency: false,
            },
            TriageState::EmergencyInterrupt => Node::Emergency {
                message: "This requires emergency help. Call 000 immediately.",
            },
        }
    }
}

/// Transition table keyed on (state, answer). `None` means the answer
/// does not apply to the current node.
fn transition(state: TriageState, answer: Answer) -> Option<TriageState> {
    match (state.node(), answer) {
        (Node::Menu { options, .. }, Answer::Pick(i)) => options.get(i).map(|&(_, next)| next),
        (Node::Question { yes, .. }, Answer::Yes) => Some(yes),
        (Node::Question { no, .. }, Answer::No) => Some(no),
        (Node::Question { not_sure, .. }, Answer::NotSure) => Some(not_sure),
        _ => None,
    }
}

/// One walk through the tree, with an undo stack of visited states.
#[derive(Debug, Clone)]
pub struct TriageSession {
    current: TriageState,
    history: Vec<TriageState>,
}

impl TriageSession {
    pub fn new() -> Self {
        Self {
            current: TriageState::Start,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> TriageState {
        self.current
    }

    pub fn node(&self) -> Node {
        self.current.node()
    }

    /// Advance on an answer. Returns the new state, or `None` (state
    /// unchanged) when the answer is invalid for the current node.
    pub fn choose(&mut self, answer: Answer) -> Option<TriageState> {
        let next = transition(self.current, answer)?;
        self.history.push(self.current);
        self.current = next;
        Some(next)
    }

    /// Step back to the previously visited state. Unavailable at the
    /// root and on the emergency screen.
    pub fn back(&mut self) -> Option<TriageState> {
        if self.current == TriageState::EmergencyInterrupt {
            return None;
        }
        let previous = self.history.pop()?;
        self.current = previous;
        Some(previous)
    }

    /// Start over. The emergency screen stays put — it cannot be
    /// dismissed.
    pub fn restart(&mut self) {
        if self.current == TriageState::EmergencyInterrupt {
            return;
        }
        self.history.clear();
        self.current = TriageState::Start;
    }

    pub fn can_go_back(&self) -> bool {
        self.current != TriageState::EmergencyInterrupt && !self.history.is_empty()
    }
}

impl Default for TriageSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconscious_not_breathing_leads_to_cpr() {
        let mut session = TriageSession::new();
        assert_eq!(session.choose(Answer::Pick(0)), Some(TriageState::CheckConscious));
        assert_eq!(session.choose(Answer::Yes), Some(TriageState::CheckBreathing));
        assert_eq!(session.choose(Answer::No), Some(TriageState::AdviceCpr));

        match session.node() {
            Node::Advice { emergency, .. } => assert!(emergency),
            other => panic!("expected advice node, got {other:?}"),
        }
    }

    #[test]
    fn unsure_breathing_assumes_cpr() {
        let mut session = TriageSession::new();
        session.choose(Answer::Pick(0));
        session.choose(Answer::Yes);
        assert_eq!(session.choose(Answer::NotSure), Some(TriageState::AdviceCpr));
    }

    #[test]
    fn chest_pain_interrupts_to_emergency() {
        let mut session = TriageSession::new();
        assert_eq!(
            session.choose(Answer::Pick(3)),
            Some(TriageState::EmergencyInterrupt)
        );
    }

    #[test]
    fn invalid_answers_leave_state_unchanged() {
        let mut session = TriageSession::new();
        // Yes/no answers don't apply to the start menu.
        assert_eq!(session.choose(Answer::Yes), None);
        assert_eq!(session.current(), TriageState::Start);
        // Out-of-range menu pick.
        assert_eq!(session.choose(Answer::Pick(99)), None);
        assert_eq!(session.current(), TriageState::Start);

        // Advice screens take no answers at all.
        session.choose(Answer::Pick(1));
        assert_eq!(session.current(), TriageState::AdviceBleeding);
        assert_eq!(session.choose(Answer::Yes), None);
    }

    #[test]
    fn back_retraces_the_history_stack() {
        let mut session = TriageSession::new();
        session.choose(Answer::Pick(0));
        session.choose(Answer::Yes);
        assert_eq!(session.current(), TriageState::CheckBreathing);

        assert_eq!(session.back(), Some(TriageState::CheckConscious));
        assert_eq!(session.back(), Some(TriageState::Start));
        assert_eq!(session.back(), None, "nothing left to undo at the root");
    }

    #[test]
    fn restart_clears_history() {
        let mut session = TriageSession::new();
        session.choose(Answer::Pick(0));
        session.choose(Answer::Yes);
        session.restart();
        assert_eq!(session.current(), TriageState::Start);
        assert!(!session.can_go_back());
    }

    #[test]
    fn emergency_screen_cannot_be_dismissed() {
        let mut session = TriageSession::new();
        session.choose(Answer::Pick(3));
        assert_eq!(session.current(), TriageState::EmergencyInterrupt);

        assert_eq!(session.back(), None);
        session.restart();
        assert_eq!(session.current(), TriageState::EmergencyInterrupt);
        assert!(!session.can_go_back());
    }
}
