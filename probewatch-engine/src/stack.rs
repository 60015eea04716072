//! Stacked series composition.
//!
//! Probes drawn on the same stacked chart share a scale: what matters when
//! picking the representative sample of a bucket is the height of the whole
//! stack at that instant, not the probe's own value. Each member is therefore
//! walked at full resolution, the other members' values at the same instant
//! are added (interpolating between their neighbouring points), and the
//! bucket keeps the member's own sample where the stacked total is extreme.

use std::collections::{BTreeMap, HashMap};

use probewatch_types::{AggregateMode, AggregatedSeries, Millis, Point};
use tracing::warn;

/// One member of a stack: its unaggregated series and the bucket size it
/// should be reduced to.
#[derive(Debug, Clone)]
pub struct StackMember {
    pub series: AggregatedSeries,
    pub level: u32,
    pub step: Millis,
}

/// Reduce every member of a stack to its own aggregation level.
pub fn aggregate_stack(
    stack: &BTreeMap<String, StackMember>,
    mode: AggregateMode,
) -> BTreeMap<String, AggregatedSeries> {
    stack
        .iter()
        .map(|(name, member)| (name.clone(), aggregate_member(name, member, stack, mode)))
        .collect()
}

fn aggregate_member(
    name: &str,
    member: &StackMember,
    stack: &BTreeMap<String, StackMember>,
    mode: AggregateMode,
) -> AggregatedSeries {
    let level = member.level.max(1) as usize;
    let values = &member.series.values;
    let shift = level as i64 * member.step / 2;

    let mut cursors: HashMap<&str, usize> = HashMap::new();
    let mut points = Vec::new();
    let mut dropped = 0;

    for (i, bucket) in values.chunks(level).enumerate() {
        let mut extreme: Option<f64> = None;
        let mut y = 0.0;

        for (j, point) in bucket.iter().enumerate() {
            let mut total = point.y;
            for (other_name, other) in stack {
                if other_name == name {
                    continue;
                }
                let cursor = cursors.entry(other_name.as_str()).or_insert(0);
                total += value_at(&other.series.values, point.x, cursor);
            }

            match mode {
                AggregateMode::Max => {
                    if extreme.map_or(true, |e| e <= total) {
                        extreme = Some(total);
                        y = point.y;
                    }
                }
                AggregateMode::Min => {
                    if extreme.map_or(true, |e| e > total) {
                        extreme = Some(total);
                        y = point.y;
                    }
                }
                AggregateMode::Avg => {
                    y += (point.y - y) / (j + 1) as f64;
                }
            }
        }

        if y.is_nan() {
            warn!(probe = name, "NaN spotted on stacked probe, bucket dropped");
            dropped += 1;
            continue;
        }

        points.push(Point::new(values[i * level].x + shift, y, false));
    }

    AggregatedSeries {
        values: points,
        start: member.series.start,
        end: member.series.end,
        range: member.series.range,
        dropped: member.series.dropped + dropped,
    }
}

/// Value of `points` at `x`, scanning forward from `cursor`.
///
/// Exact matches return the point's value; otherwise the value is linearly
/// interpolated from the preceding point, or 0 when there is none. The
/// cursor is left on the point found so later lookups resume from there.
fn value_at(points: &[Point], x: Millis, cursor: &mut usize) -> f64 {
    for k in *cursor..points.len() {
        let candidate = &points[k];
        if candidate.x < x {
            continue;
        }
        *cursor = k;
        if candidate.x == x {
            return candidate.y;
        }
        return match k.checked_sub(1).map(|p| &points[p]) {
            Some(previous) => interpolate(x, previous, candidate),
            None => 0.0,
        };
    }
    0.0
}

fn interpolate(x: Millis, previous: &Point, next: &Point) -> f64 {
    let span = (next.x - previous.x) as f64;
    if span == 0.0 {
        return previous.y;
    }
    previous.y + (x - previous.x) as f64 / span * (next.y - previous.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(Millis, f64)]) -> AggregatedSeries {
        AggregatedSeries {
            values: points.iter().map(|(x, y)| Point::new(*x, *y, false)).collect(),
            start: Some(0),
            end: Some(1_000),
            range: (0.0, 0.0),
            dropped: 0,
        }
    }

    fn member(points: &[(Millis, f64)], level: u32) -> StackMember {
        StackMember {
            series: series(points),
            level,
            step: 100,
        }
    }

    fn ys(series: &AggregatedSeries) -> Vec<f64> {
        series.values.iter().map(|p| p.y).collect()
    }

    fn two_members(a: StackMember, b: StackMember) -> BTreeMap<String, StackMember> {
        BTreeMap::from([("a".to_string(), a), ("b".to_string(), b)])
    }

    #[test]
    fn test_aligned_members() {
        let stack = two_members(
            member(&[(0, 1.0), (100, 2.0), (200, 3.0), (300, 4.0)], 2),
            member(&[(0, 10.0), (100, 20.0), (200, 30.0), (300, 40.0)], 2),
        );

        let max = aggregate_stack(&stack, AggregateMode::Max);
        assert_eq!(ys(&max["a"]), vec![2.0, 4.0]);
        assert_eq!(ys(&max["b"]), vec![20.0, 40.0]);

        let min = aggregate_stack(&stack, AggregateMode::Min);
        assert_eq!(ys(&min["a"]), vec![1.0, 3.0]);

        let avg = aggregate_stack(&stack, AggregateMode::Avg);
        assert_eq!(ys(&avg["a"]), vec![1.5, 3.5]);
    }

    #[test]
    fn test_points_are_shifted_to_bucket_centre() {
        let stack = BTreeMap::from([(
            "a".to_string(),
            member(&[(0, 1.0), (100, 2.0), (200, 3.0), (300, 4.0)], 2),
        )]);
        let result = aggregate_stack(&stack, AggregateMode::Max);
        let xs: Vec<Millis> = result["a"].values.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![100, 300]);
        assert!(result["a"].values.iter().all(|p| !p.start));
    }

    #[test]
    fn test_stack_total_decides_the_sample() {
        // b peaks between a's two samples: at x=50 the stack is higher
        // even though a's own value is lower there.
        let stack = two_members(
            member(&[(50, 1.0), (150, 2.0)], 2),
            member(&[(0, 0.0), (100, 40.0), (160, 0.0)], 1),
        );

        let max = aggregate_stack(&stack, AggregateMode::Max);
        assert_eq!(ys(&max["a"]), vec![1.0]);

        let min = aggregate_stack(&stack, AggregateMode::Min);
        assert_eq!(ys(&min["a"]), vec![2.0]);
    }

    #[test]
    fn test_value_at_interpolates() {
        let points = series(&[(0, 0.0), (100, 10.0)]).values;
        let mut cursor = 0;
        assert_eq!(value_at(&points, 25, &mut cursor), 2.5);
        assert_eq!(cursor, 1);
        assert_eq!(value_at(&points, 100, &mut cursor), 10.0);
    }

    #[test]
    fn test_value_at_without_preceding_point() {
        let points = series(&[(100, 10.0)]).values;
        let mut cursor = 0;
        assert_eq!(value_at(&points, 50, &mut cursor), 0.0);
        assert_eq!(value_at(&points, 500, &mut cursor), 0.0);
    }

    #[test]
    fn test_interpolate_same_x() {
        let p = Point::new(10, 3.0, false);
        assert_eq!(interpolate(10, &p, &p), 3.0);
    }

    #[test]
    fn test_nan_bucket_is_dropped() {
        let stack = BTreeMap::from([(
            "a".to_string(),
            member(&[(0, f64::NAN), (100, 2.0)], 1),
        )]);
        let result = aggregate_stack(&stack, AggregateMode::Avg);
        assert_eq!(ys(&result["a"]), vec![2.0]);
        assert_eq!(result["a"].dropped, 1);
    }

    #[test]
    fn test_keeps_window_and_range() {
        let mut a = member(&[(0, 1.0)], 1);
        a.series.range = (1.0, 9.0);
        let stack = BTreeMap::from([("a".to_string(), a)]);
        let result = aggregate_stack(&stack, AggregateMode::Max);
        assert_eq!(result["a"].range, (1.0, 9.0));
        assert_eq!(result["a"].start, Some(0));
        assert_eq!(result["a"].end, Some(1_000));
    }
}
