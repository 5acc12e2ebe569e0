//! 1-D breakpoint curve with linear interpolation.
//!
//! Value curve of `SequenceFloat` objects and of timeline parameters.
//! Points are kept sorted by time; writing a point at an existing time
//! replaces it.

use serde::{Deserialize, Serialize};

/// Single breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub time: f64,
    pub value: f64,
}

/// Sorted breakpoint curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline1d {
    points: Vec<TimelinePoint>,
}

impl Timeline1d {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Build from unordered points. Points are sorted; later duplicates of
    /// the same time win.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut tl = Self::new();
        for (time, value) in points {
            tl.set(time, value);
        }
        tl
    }

    /// Insert or replace the breakpoint at `time`.
    pub fn set(&mut self, time: f64, value: f64) {
        match self
            .points
            .binary_search_by(|p| p.time.partial_cmp(&time).unwrap_or(std::cmp::Ordering::Less))
        {
            Ok(i) => self.points[i].value = value,
            Err(i) => self.points.insert(i, TimelinePoint { time, value }),
        }
    }

    /// Remove the breakpoint at `time`, if any.
    pub fn remove(&mut self, time: f64) -> bool {
        if let Some(i) = self.points.iter().position(|p| p.time == time) {
            self.points.remove(i);
            true
        } else {
            false
        }
    }

    /// Sample the curve. Clamps to the first/last value outside the
    /// covered range; an empty curve reads as 0.
    pub fn value(&self, time: f64) -> f64 {
        let pts = &self.points;
        if pts.is_empty() {
            return 0.0;
        }
        if time <= pts[0].time {
            return pts[0].value;
        }
        if time >= pts[pts.len() - 1].time {
            return pts[pts.len() - 1].value;
        }
        // first point past `time`; bounds guaranteed by the checks above
        let hi = pts.partition_point(|p| p.time <= time);
        let a = pts[hi - 1];
        let b = pts[hi];
        let span = b.time - a.time;
        if span <= 0.0 {
            return a.value;
        }
        let t = (time - a.time) / span;
        a.value + (b.value - a.value) * t
    }

    pub fn points(&self) -> &[TimelinePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_reads_zero() {
        let tl = Timeline1d::new();
        assert_eq!(tl.value(0.0), 0.0);
        assert_eq!(tl.value(100.0), 0.0);
    }

    #[test]
    fn test_interpolation() {
        let tl = Timeline1d::from_points([(0.0, 0.0), (2.0, 1.0)]);
        assert_eq!(tl.value(0.0), 0.0);
        assert_eq!(tl.value(1.0), 0.5);
        assert_eq!(tl.value(2.0), 1.0);
    }

    #[test]
    fn test_clamped_ends() {
        let tl = Timeline1d::from_points([(1.0, 3.0), (2.0, 5.0)]);
        assert_eq!(tl.value(-10.0), 3.0);
        assert_eq!(tl.value(10.0), 5.0);
    }

    #[test]
    fn test_set_replaces_same_time() {
        let mut tl = Timeline1d::from_points([(0.0, 1.0), (1.0, 2.0)]);
        tl.set(1.0, 7.0);
        assert_eq!(tl.len(), 2);
        assert_eq!(tl.value(1.0), 7.0);
    }

    #[test]
    fn test_unsorted_input() {
        let tl = Timeline1d::from_points([(3.0, 3.0), (1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(tl.value(1.5), 1.5);
        assert_eq!(tl.value(2.5), 2.5);
    }
}
