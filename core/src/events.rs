//! Hendelser ut av pipelinen, levert i rekkefølge gjennom en `EventSink`.

use std::ops::Range;
use std::sync::mpsc;

use serde::Serialize;

use crate::segmenter::MovementState;
use crate::types::{ExerciseSet, Location, PlanItem};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    MovementChanged {
        location: Location,
        from: MovementState,
        to: MovementState,
        at: f64,
    },
    ExerciseBlockStarted {
        location: Location,
        at: f64,
    },
    ExerciseBlockEnded {
        location: Location,
        at: f64,
    },
    ClassificationProvisional {
        location: Location,
        set: ExerciseSet,
    },
    ClassificationFinal {
        location: Location,
        set: ExerciseSet,
        source_windows: Vec<Range<u64>>,
    },
    RepetitionsEstimated {
        location: Location,
        count: u32,
    },
    PlanItemChanged {
        current: Option<PlanItem>,
        previous: Option<PlanItem>,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

/// Samler alt (nyttig i tester og batch-kjøringer).
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

/// Sender videre til en annen tråd. En lukket mottaker ignoreres.
impl EventSink for mpsc::Sender<Event> {
    fn emit(&mut self, event: Event) {
        let _ = self.send(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: Event) {
        (**self).emit(event);
    }
}

/// Forkaster alle hendelser.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: Event) {}
}
