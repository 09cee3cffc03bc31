//! Operator control events.
//!
//! Keys: `n` or `]` next camera, `p` or `[` previous, a number selects that camera
//! id, `q` quits. Events only touch the selector (or request shutdown); they never
//! reach a capture worker.

use crate::error::InvalidCamera;
use crate::frame::CameraId;
use crate::selector::CameraSelector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    Next,
    Previous,
    Select(CameraId),
    Quit,
}

/// What the control loop does after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

impl ControlEvent {
    /// Parse one line of operator input. Unrecognised input yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "n" | "]" | "next" => Some(ControlEvent::Next),
            "p" | "[" | "prev" | "previous" => Some(ControlEvent::Previous),
            "q" | "quit" | "exit" => Some(ControlEvent::Quit),
            other => other.parse::<CameraId>().ok().map(ControlEvent::Select),
        }
    }

    /// Apply to `selector`. An invalid selection is reported and the current
    /// camera is kept.
    pub fn apply(self, selector: &CameraSelector) -> Result<Flow, InvalidCamera> {
        match self {
            ControlEvent::Next => {
                selector.next();
            }
            ControlEvent::Previous => {
                selector.previous();
            }
            ControlEvent::Select(camera) => selector.switch_to(camera)?,
            ControlEvent::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> CameraSelector {
        CameraSelector::new(&[CameraId(0), CameraId(1), CameraId(2)], CameraId(0)).unwrap()
    }

    #[test]
    fn parses_keys() {
        assert_eq!(ControlEvent::parse("n"), Some(ControlEvent::Next));
        assert_eq!(ControlEvent::parse(" ]\n"), Some(ControlEvent::Next));
        assert_eq!(ControlEvent::parse("["), Some(ControlEvent::Previous));
        assert_eq!(ControlEvent::parse("Q"), Some(ControlEvent::Quit));
        assert_eq!(
            ControlEvent::parse("2"),
            Some(ControlEvent::Select(CameraId(2)))
        );
        assert_eq!(ControlEvent::parse("zoom"), None);
        assert_eq!(ControlEvent::parse("  "), None);
    }

    #[test]
    fn next_and_previous_wrap() {
        let selector = selector();
        assert_eq!(ControlEvent::Previous.apply(&selector), Ok(Flow::Continue));
        assert_eq!(selector.current(), CameraId(2));
        ControlEvent::Next.apply(&selector).unwrap();
        assert_eq!(selector.current(), CameraId(0));
    }

    #[test]
    fn invalid_select_keeps_current() {
        let selector = selector();
        ControlEvent::Select(CameraId(1)).apply(&selector).unwrap();
        assert_eq!(
            ControlEvent::Select(CameraId(7)).apply(&selector),
            Err(InvalidCamera(CameraId(7)))
        );
        assert_eq!(selector.current(), CameraId(1));
    }

    #[test]
    fn quit_does_not_touch_selection() {
        let selector = selector();
        assert_eq!(ControlEvent::Quit.apply(&selector), Ok(Flow::Quit));
        assert_eq!(selector.current(), CameraId(0));
    }
}
