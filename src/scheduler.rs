use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;

/// Hard ceiling on scheduled intervals (100 years).
const MAX_INTERVAL_DAYS: f64 = 36500.0;

/// FSRS weight vector plus the retention target used when converting
/// stability into a concrete interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub w: [f64; 17],
    pub desired_retention: f64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            w: [
                0.4, 0.6, 2.4, 5.8, // w0-w3: initial stability per rating
                4.93, 0.94, 0.86, 0.01, 1.49, // w4-w8
                0.14, 0.94, 2.18, 0.05, 0.34, // w9-w13
                1.26, 0.29, 2.61, // w14-w16
            ],
            desired_retention: 0.9,
        }
    }
}

/// Recall quality reported by the user after seeing the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    /// Good and Easy count as a correct answer.
    pub fn is_correct(self) -> bool {
        self >= Rating::Good
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Again => "Again",
            Self::Hard => "Hard",
            Self::Good => "Good",
            Self::Easy => "Easy",
        }
    }
}

/// Coarse display label derived from the memory state. Never feeds back
/// into scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proficiency {
    New,
    Learning,
    Review,
    Mastered,
}

impl Proficiency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Mastered => "mastered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "learning" => Some(Self::Learning),
            "review" => Some(Self::Review),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }
}

/// Per-card scheduling state owned by this module. Difficulty is kept on
/// a 0..1 scale; stability is measured in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub stability: f64,
    pub difficulty: f64,
    pub reps: i64,
    pub lapses: i64,
    pub last_review: Option<DateTime<Utc>>,
    pub due: DateTime<Utc>,
}

impl MemoryState {
    /// State for a card that has never been reviewed: due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            stability: 0.0,
            difficulty: 0.3,
            reps: 0,
            lapses: 0,
            last_review: None,
            due: now,
        }
    }

    pub fn is_new(&self) -> bool {
        self.reps == 0
    }
}

/// One scheduling transition, captured for the review log.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub rating: Rating,
    pub stability: f64,
    pub difficulty: f64,
    pub interval_days: f64,
    pub reviewed_at: DateTime<Utc>,
}

/// Apply one review to a memory state. Pure: same inputs, same outputs.
pub fn review(
    state: &MemoryState,
    rating: Rating,
    now: DateTime<Utc>,
    params: &SchedulerParams,
) -> (MemoryState, ReviewOutcome) {
    let w = &params.w;
    let rating_val = rating as i64;

    let (stability, difficulty, lapses) = if state.is_new() {
        let s = initial_stability(w, rating_val);
        let d = initial_difficulty(w, rating_val);
        let lapses = if rating == Rating::Again { 1 } else { 0 };
        (s, d, lapses)
    } else {
        let elapsed = elapsed_days(state, now);
        let r = retrievability(state.stability, elapsed);
        let d = next_difficulty(w, state.difficulty, rating_val);

        if rating == Rating::Again {
            let s = next_forget_stability(w, state.difficulty, state.stability, r);
            (s, d, state.lapses + 1)
        } else {
            let s = next_recall_stability(w, state.difficulty, state.stability, r, rating_val);
            (s, d, state.lapses)
        }
    };

    let interval = next_interval(stability, params.desired_retention);
    let due = now + Duration::days(interval.round().max(1.0) as i64);

    let next = MemoryState {
        stability,
        difficulty,
        reps: state.reps + 1,
        lapses,
        last_review: Some(now),
        due,
    };

    let outcome = ReviewOutcome {
        rating,
        stability,
        difficulty,
        interval_days: interval,
        reviewed_at: now,
    };

    (next, outcome)
}

/// The due date is embedded in the state produced by `review`.
pub fn next_review_date(state: &MemoryState) -> DateTime<Utc> {
    state.due
}

/// Map a memory state onto a coarse proficiency bucket.
///
/// Thresholds are fixed constants: zero reps is New; fewer than three reps
/// or a scheduled interval under a week is Learning; stability of at least
/// 21 days with at most two lapses is Mastered; everything else is Review.
pub fn proficiency(state: &MemoryState) -> Proficiency {
    if state.is_new() {
        return Proficiency::New;
    }

    let scheduled = match state.last_review {
        Some(last) => (state.due - last).num_days(),
        None => 0,
    };

    if state.reps < 3 || scheduled < 7 {
        Proficiency::Learning
    } else if state.stability >= 21.0 && state.lapses <= 2 {
        Proficiency::Mastered
    } else {
        Proficiency::Review
    }
}

fn elapsed_days(state: &MemoryState, now: DateTime<Utc>) -> f64 {
    match state.last_review {
        Some(last) => ((now - last).num_seconds() as f64 / 86_400.0).max(0.0),
        None => 0.0,
    }
}

fn retrievability(stability: f64, elapsed: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (1.0 + FACTOR * elapsed.max(0.0) / stability).powf(DECAY)
}

fn initial_stability(w: &[f64; 17], rating: i64) -> f64 {
    w[(rating - 1) as usize].max(0.1)
}

fn initial_difficulty(w: &[f64; 17], rating: i64) -> f64 {
    let d = w[4] - (rating - 3) as f64 * w[5];
    d.clamp(1.0, 10.0) / 10.0
}

fn next_difficulty(w: &[f64; 17], d: f64, rating: i64) -> f64 {
    let d_10 = d * 10.0;
    let delta = -(rating - 3) as f64;
    let d_new = d_10 + w[6] * delta;
    let d_mean = w[7] * (w[4] - 3.0 * w[5]) + (1.0 - w[7]) * d_new;
    d_mean.clamp(1.0, 10.0) / 10.0
}

fn next_recall_stability(w: &[f64; 17], d: f64, s: f64, r: f64, rating: i64) -> f64 {
    let d_10 = d * 10.0;
    let hard_penalty = if rating == 2 { w[15] } else { 1.0 };
    let easy_bonus = if rating == 4 { w[16] } else { 1.0 };

    let new_s = s
        * (1.0
            + w[8].exp()
                * (11.0 - d_10)
                * s.powf(-w[9])
                * ((1.0 - r) * w[10]).exp_m1()
                * hard_penalty
                * easy_bonus);
    new_s.max(0.1)
}

fn next_forget_stability(w: &[f64; 17], d: f64, s: f64, r: f64) -> f64 {
    let d_10 = d * 10.0;
    let new_s =
        w[11] * d_10.powf(-w[12]) * ((s + 1.0).powf(w[13]) - 1.0) * (1.0 - r).powf(w[14]).exp();
    new_s.clamp(0.1, s)
}

fn next_interval(stability: f64, desired_retention: f64) -> f64 {
    let safe_retention = desired_retention.clamp(0.0001, 0.9999);
    let interval = stability / FACTOR * (safe_retention.powf(1.0 / DECAY) - 1.0);
    interval.clamp(1.0, MAX_INTERVAL_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SchedulerParams {
        SchedulerParams::default()
    }

    #[test]
    fn first_review_seeds_state() {
        let now = Utc::now();
        let state = MemoryState::new(now);
        let (next, outcome) = review(&state, Rating::Good, now, &params());

        assert_eq!(next.reps, 1);
        assert_eq!(next.lapses, 0);
        assert!(next.stability > 0.0);
        assert!(next.due > now);
        assert!(outcome.interval_days >= 1.0);
        assert_eq!(next.last_review, Some(now));
        assert_eq!(next_review_date(&next), next.due);
    }

    #[test]
    fn good_after_prior_review_pushes_due_forward() {
        let now = Utc::now();
        let state = MemoryState::new(now);
        let (first, _) = review(&state, Rating::Good, now, &params());

        let later = first.due;
        let (second, _) = review(&first, Rating::Good, later, &params());
        assert!(second.due > first.due);

        let (third, _) = review(&second, Rating::Easy, second.due, &params());
        assert!(third.due > second.due);
    }

    #[test]
    fn again_counts_a_lapse_and_shrinks_stability() {
        let now = Utc::now();
        let state = MemoryState::new(now);
        let (reviewed, _) = review(&state, Rating::Good, now, &params());
        let (failed, _) = review(&reviewed, Rating::Again, reviewed.due, &params());

        assert_eq!(failed.lapses, 1);
        assert!(failed.stability <= reviewed.stability);
    }

    #[test]
    fn review_is_deterministic() {
        let now = Utc::now();
        let state = MemoryState::new(now);
        let (a, _) = review(&state, Rating::Hard, now, &params());
        let (b, _) = review(&state, Rating::Hard, now, &params());
        assert_eq!(a, b);
    }

    #[test]
    fn retrievability_decays_over_time() {
        let r_0 = retrievability(10.0, 0.0);
        let r_5 = retrievability(10.0, 5.0);
        let r_10 = retrievability(10.0, 10.0);
        assert!(r_0 > r_5);
        assert!(r_5 > r_10);
        assert!((r_0 - 1.0).abs() < 0.001);
    }

    #[test]
    fn proficiency_buckets() {
        let now = Utc::now();
        let fresh = MemoryState::new(now);
        assert_eq!(proficiency(&fresh), Proficiency::New);

        let learning = MemoryState {
            stability: 2.0,
            difficulty: 0.5,
            reps: 1,
            lapses: 0,
            last_review: Some(now),
            due: now + Duration::days(2),
        };
        assert_eq!(proficiency(&learning), Proficiency::Learning);

        let reviewing = MemoryState {
            stability: 12.0,
            difficulty: 0.5,
            reps: 5,
            lapses: 1,
            last_review: Some(now),
            due: now + Duration::days(12),
        };
        assert_eq!(proficiency(&reviewing), Proficiency::Review);

        let mastered = MemoryState {
            stability: 30.0,
            difficulty: 0.3,
            reps: 10,
            lapses: 0,
            last_review: Some(now),
            due: now + Duration::days(30),
        };
        assert_eq!(proficiency(&mastered), Proficiency::Mastered);
    }
}
