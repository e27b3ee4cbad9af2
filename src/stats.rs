use crate::model::{ClassKey, Gender, Roster};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMark {
    pub score: f64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub class_key: ClassKey,
    pub student_count: usize,
    pub male_count: usize,
    pub female_count: usize,
    /// Rounded to 2 decimals; `None` for an empty class.
    pub mean_score: Option<f64>,
    pub max: Option<ScoreMark>,
    pub min: Option<ScoreMark>,
    /// Index `i` counts students whose previous class was `i + 1`.
    pub prev_class_counts: Vec<usize>,
    /// Bucket holding the single highest count, if not tied.
    pub busiest_prev_class: Option<usize>,
    /// Bucket holding the single lowest count, if not tied.
    pub quietest_prev_class: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    /// Number of previous-class buckets, shared by every row (at least 1).
    pub prev_class_width: usize,
    pub rows: Vec<ClassStats>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Index of the value that is strictly the extreme, `None` on ties.
fn unique_extreme(counts: &[usize], want_max: bool) -> Option<usize> {
    let target = if want_max {
        counts.iter().max()?
    } else {
        counts.iter().min()?
    };
    let mut hits = counts.iter().enumerate().filter(|(_, c)| *c == target);
    let (idx, _) = hits.next()?;
    hits.next().is_none().then_some(idx)
}

pub fn summarize(roster: &Roster) -> RosterStats {
    let width = roster
        .students()
        .filter_map(|(_, s)| s.prev_class_number())
        .max()
        .unwrap_or(0)
        .max(1) as usize;

    let rows = roster
        .classes()
        .map(|(key, students)| {
            let mut total = 0.0;
            let mut max: Option<ScoreMark> = None;
            let mut min: Option<ScoreMark> = None;
            let mut counts = vec![0usize; width];
            let mut male_count = 0;
            let mut female_count = 0;

            for s in students {
                let score = s.score_value();
                total += score;
                if max.as_ref().map_or(true, |m| score > m.score) {
                    max = Some(ScoreMark {
                        score,
                        name: s.name.clone(),
                    });
                }
                if min.as_ref().map_or(true, |m| score < m.score) {
                    min = Some(ScoreMark {
                        score,
                        name: s.name.clone(),
                    });
                }
                match s.gender {
                    Gender::Male => male_count += 1,
                    Gender::Female => female_count += 1,
                }
                if let Some(pc) = s.prev_class_number() {
                    if (1..=width as u32).contains(&pc) {
                        counts[pc as usize - 1] += 1;
                    }
                }
            }

            let mean_score =
                (!students.is_empty()).then(|| round2(total / students.len() as f64));

            ClassStats {
                class_key: *key,
                student_count: students.len(),
                male_count,
                female_count,
                mean_score,
                max,
                min,
                busiest_prev_class: unique_extreme(&counts, true),
                quietest_prev_class: unique_extreme(&counts, false),
                prev_class_counts: counts,
            }
        })
        .collect();

    RosterStats {
        prev_class_width: width,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use crate::parser::parse;

    const TEXT: &str = "3 1 1 가온 2011.01.01 남 80.5 2 1 1 \
                        3 1 2 나래 2011.01.02 여 90 2 3 2 \
                        3 1 3 다현 2011.01.03 여 90 2 3 3 \
                        3 2 1 라온 2011.01.04 남 70.34 2 1 4 \
                        3 2 2 마루 2011.01.05 남 10 전입";

    #[test]
    fn per_class_summary() {
        let stats = summarize(&parse(TEXT));
        assert_eq!(stats.prev_class_width, 3);
        let c1 = &stats.rows[0];
        assert_eq!(c1.class_key, ClassKey::new(3, 1));
        assert_eq!(c1.student_count, 3);
        assert_eq!((c1.male_count, c1.female_count), (1, 2));
        assert_eq!(c1.mean_score, Some(86.83));
        assert_eq!(c1.max.as_ref().map(|m| m.name.as_str()), Some("나래"));
        assert_eq!(c1.min.as_ref().map(|m| m.name.as_str()), Some("가온"));
        assert_eq!(c1.prev_class_counts, vec![1, 0, 2]);
        assert_eq!(c1.busiest_prev_class, Some(2));
        assert_eq!(c1.quietest_prev_class, Some(1));

        let c2 = &stats.rows[1];
        // The transfer-in student has previous class 0 and is not bucketed.
        assert_eq!(c2.prev_class_counts, vec![1, 0, 0]);
        assert_eq!(c2.mean_score, Some(40.17));
        assert_eq!(c2.quietest_prev_class, None);
    }

    #[test]
    fn empty_class_has_no_mean_and_width_is_at_least_one() {
        let mut roster = parse("3 1 1 가온 2011.01.01 남 10 전입 3 2 1 나래 2011.01.01 여 20 전입");
        roster
            .move_students(&[Position::new(ClassKey::new(3, 2), 0)], ClassKey::new(3, 1))
            .expect("move");
        let stats = summarize(&roster);
        assert_eq!(stats.prev_class_width, 1);
        let empty = &stats.rows[1];
        assert_eq!(empty.student_count, 0);
        assert_eq!(empty.mean_score, None);
        assert_eq!(empty.max, None);
        assert_eq!(empty.prev_class_counts, vec![0]);
    }
}
