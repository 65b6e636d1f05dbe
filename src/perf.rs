//! Timing marks for instance init and template compilation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub name: String,
    pub duration: Duration,
}

#[derive(Debug, Default)]
pub struct Perf {
    enabled: bool,
    marks: RefCell<HashMap<String, Instant>>,
    measures: RefCell<Vec<Measure>>,
}

impl Perf {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Default::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn mark(&self, tag: &str) {
        if self.enabled {
            self.marks.borrow_mut().insert(tag.to_string(), Instant::now());
        }
    }

    /// Records the time elapsed between two marks under `name` and clears them.
    pub fn measure(&self, name: &str, start_tag: &str, end_tag: &str) {
        if !self.enabled {
            return;
        }
        let mut marks = self.marks.borrow_mut();
        let (Some(start), Some(end)) = (marks.remove(start_tag), marks.remove(end_tag)) else {
            return;
        };
        let duration = end.saturating_duration_since(start);
        log::debug!("{}: {:?}", name, duration);
        self.measures.borrow_mut().push(Measure {
            name: name.to_string(),
            duration,
        });
    }

    pub fn measures(&self) -> Vec<Measure> {
        self.measures.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_perf_records_nothing() {
        let perf = Perf::new(false);
        perf.mark("a");
        perf.mark("b");
        perf.measure("x", "a", "b");
        assert!(perf.measures().is_empty());
    }

    #[test]
    fn test_measure_consumes_marks() {
        let perf = Perf::new(true);
        perf.mark("start");
        perf.mark("end");
        perf.measure("<Root> init", "start", "end");
        perf.measure("<Root> init", "start", "end");
        let measures = perf.measures();
        assert_eq!(measures.len(), 1);
        assert_eq!(measures[0].name, "<Root> init");
    }
}
