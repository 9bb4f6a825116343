use std::collections::{HashMap, VecDeque};

use super::{JointName, Point, SmoothedJoints};

/// Moving-average filter over the last `window` points of each joint.
///
/// One instance belongs to one exercise session and is dropped with it.
#[derive(Debug, Clone)]
pub struct JointSmoother {
    history: HashMap<JointName, VecDeque<Point>>,
    window: usize,
}

impl JointSmoother {
    pub fn new(window: usize) -> Self {
        Self {
            history: HashMap::new(),
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Push every observed joint into its history and return the mean of the
    /// retained points. Joints absent from `joints` are absent from the output.
    pub fn smooth(&mut self, joints: &SmoothedJoints) -> SmoothedJoints {
        let window = self.window;
        let mut smoothed = HashMap::with_capacity(joints.len());

        for (&joint, &point) in joints {
            let history = self
                .history
                .entry(joint)
                .or_insert_with(|| VecDeque::with_capacity(window + 1));
            history.push_back(point);
            while history.len() > window {
                history.pop_front();
            }
            smoothed.insert(joint, mean(history));
        }

        smoothed
    }

    pub fn history_len(&self, joint: JointName) -> usize {
        self.history.get(&joint).map_or(0, VecDeque::len)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

fn mean(points: &VecDeque<Point>) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let count = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Point::new(sum_x / count, sum_y / count)
}
