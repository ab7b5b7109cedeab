use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Stopped,
    Downloading,
    Paused,
    Completed,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event {
    Start,
    Pause,
    Resume,
    Stop,
    /// Every piece is in and the settings ask to stop.
    Complete,
}

impl State {
    /// Next state after `event`, or `None` when the pair is not a legal
    /// transition. `Completed` has no way out.
    pub fn transition(self, event: Event) -> Option<State> {
        match (self, event) {
            (State::Stopped, Event::Start) => Some(State::Downloading),
            (State::Downloading, Event::Pause) => Some(State::Paused),
            (State::Downloading, Event::Stop) => Some(State::Stopped),
            (State::Downloading, Event::Complete) => Some(State::Completed),
            (State::Paused, Event::Resume) => Some(State::Downloading),
            (State::Paused, Event::Stop) => Some(State::Stopped),
            _ => None,
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            State::Stopped => "stopped",
            State::Downloading => "downloading",
            State::Paused => "paused",
            State::Completed => "completed",
        };
        write!(f, "{}", name)
    }
}
