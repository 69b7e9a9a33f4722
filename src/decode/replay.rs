//! Scripted decoder. Replays a fixed sequence of code values on a
//! schedule, ignoring frame content. Drives demos and session tests
//! without a camera or printed labels.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::capture::LumaFrame;
use crate::decode::{DecodeStrategy, DecoderKind, ScanEvent};

#[derive(Debug, Clone)]
pub struct ReplayStep {
    pub value: String,
    /// Delay since the previous emit (or since construction for the
    /// first step) before this value fires.
    pub after: Duration,
}

pub struct ReplayDecoder {
    steps: VecDeque<ReplayStep>,
    epoch: Instant,
}

impl ReplayDecoder {
    pub fn new(steps: Vec<ReplayStep>) -> Self {
        Self {
            steps: steps.into(),
            epoch: Instant::now(),
        }
    }

    /// Script that fires each value `gap` apart.
    pub fn with_gap<I, S>(values: I, gap: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = values
            .into_iter()
            .map(|value| ReplayStep {
                value: value.into(),
                after: gap,
            })
            .collect();
        Self::new(steps)
    }

    /// A decoder that never fires. Useful when only manual entry should
    /// drive a session.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl DecodeStrategy for ReplayDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Replay
    }

    fn decode(&mut self, _frame: &LumaFrame) -> Option<ScanEvent> {
        let due = {
            let step = self.steps.front()?;
            self.epoch.elapsed() >= step.after
        };
        if !due {
            return None;
        }
        let step = self.steps.pop_front()?;
        self.epoch = Instant::now();
        Some(ScanEvent::new(step.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_emits_in_order() {
        let mut dec = ReplayDecoder::with_gap(["A", "B"], Duration::ZERO);
        let frame = LumaFrame::new(2, 2, vec![0; 4]);
        assert_eq!(dec.decode(&frame).unwrap().value, "A");
        assert_eq!(dec.decode(&frame).unwrap().value, "B");
        assert!(dec.decode(&frame).is_none());
    }

    #[test]
    fn test_replay_waits_for_gap() {
        let mut dec = ReplayDecoder::with_gap(["A"], Duration::from_millis(80));
        let frame = LumaFrame::new(2, 2, vec![0; 4]);
        assert!(dec.decode(&frame).is_none());
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(dec.decode(&frame).unwrap().value, "A");
    }
}
