//! Cross-game aggregation: success rates, averages and questionnaire
//! statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::{GameLog, MistakePolicy};

/// One questionnaire answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
}

impl Answer {
    /// Likert answers are plain non-negative integers that fit an `i64`.
    pub fn is_numeric(&self) -> bool {
        self.numeric_value().is_some()
    }

    pub fn numeric_value(&self) -> Option<i64> {
        if !self.answer.is_empty() && self.answer.bytes().all(|b| b.is_ascii_digit()) {
            self.answer.parse().ok()
        } else {
            None
        }
    }
}

/// The per-game figures that feed an [`Aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverview {
    pub game_id: i64,
    pub successful: bool,
    pub time_to_success_secs: Option<i64>,
    pub mistakes: usize,
    pub blocks_placed: usize,
    pub blocks_destroyed: usize,
    pub answers: Vec<Answer>,
}

impl GameOverview {
    pub fn new(game_id: i64, log: &GameLog, policy: MistakePolicy, answers: Vec<Answer>) -> Self {
        Self {
            game_id,
            successful: log.was_successful(),
            time_to_success_secs: log.time_to_success_secs(),
            mistakes: log.mistakes(policy),
            blocks_placed: log.blocks_placed(),
            blocks_destroyed: log.blocks_destroyed(),
            answers,
        }
    }
}

/// Summary statistics for one numeric question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerStats {
    pub question: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; zero for a single answer.
    pub std_dev: f64,
    pub median: f64,
    pub min: i64,
    pub max: i64,
}

impl AnswerStats {
    /// Returns `None` for an empty sample.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(question: impl Into<String>, values: &[i64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let (&min, &max) = (sorted.first()?, sorted.last()?);

        let n = sorted.len() as f64;
        let mean = sorted.iter().map(|&v| v as f64).sum::<f64>() / n;
        let std_dev = if sorted.len() > 1 {
            let sq: f64 = sorted.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
            (sq / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
        } else {
            sorted[mid] as f64
        };

        Some(Self {
            question: question.into(),
            count: sorted.len(),
            mean,
            std_dev,
            median,
            min,
            max,
        })
    }
}

/// Statistics over a set of games.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub num_games: usize,
    /// Mean time to success over successful games only.
    pub average_time_to_success_secs: f64,
    pub fraction_successful: f64,
    /// Fraction of games with at least one mistake.
    pub fraction_with_mistakes: f64,
    pub average_mistakes: f64,
    pub average_blocks_placed: f64,
    pub average_blocks_destroyed: f64,
    /// Number of games per mistake count.
    pub mistake_distribution: BTreeMap<usize, usize>,
    /// One entry per numeric question, sorted by question.
    pub answer_stats: Vec<AnswerStats>,
    /// Non-empty free-text answers per question.
    pub free_text: BTreeMap<String, Vec<String>>,
}

impl Aggregate {
    #[allow(clippy::cast_precision_loss)]
    pub fn from_games(games: &[GameOverview]) -> Self {
        if games.is_empty() {
            return Self::default();
        }
        let n = games.len() as f64;
        let fraction = |count: usize| count as f64 / n;
        let average = |total: usize| total as f64 / n;

        let success_times: Vec<i64> = games
            .iter()
            .filter(|g| g.successful)
            .filter_map(|g| g.time_to_success_secs)
            .collect();
        let average_time_to_success_secs = if success_times.is_empty() {
            0.0
        } else {
            success_times.iter().sum::<i64>() as f64 / success_times.len() as f64
        };

        let mut mistake_distribution = BTreeMap::new();
        for game in games {
            *mistake_distribution.entry(game.mistakes).or_insert(0) += 1;
        }

        let mut numeric: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
        let mut free_text: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for answer in games.iter().flat_map(|g| &g.answers) {
            if let Some(value) = answer.numeric_value() {
                numeric.entry(answer.question.as_str()).or_default().push(value);
            } else {
                let responses = free_text.entry(answer.question.clone()).or_default();
                if !answer.answer.is_empty() {
                    responses.push(answer.answer.clone());
                }
            }
        }
        let answer_stats = numeric
            .into_iter()
            .filter_map(|(question, values)| AnswerStats::from_values(question, &values))
            .collect();

        Self {
            num_games: games.len(),
            average_time_to_success_secs,
            fraction_successful: fraction(games.iter().filter(|g| g.successful).count()),
            fraction_with_mistakes: fraction(games.iter().filter(|g| g.mistakes > 0).count()),
            average_mistakes: average(games.iter().map(|g| g.mistakes).sum()),
            average_blocks_placed: average(games.iter().map(|g| g.blocks_placed).sum()),
            average_blocks_destroyed: average(games.iter().map(|g| g.blocks_destroyed).sum()),
            mistake_distribution,
            answer_stats,
            free_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(question: &str, answer: &str) -> Answer {
        Answer {
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }

    fn overview(game_id: i64, time: Option<i64>, mistakes: usize, answers: Vec<Answer>) -> GameOverview {
        GameOverview {
            game_id,
            successful: time.is_some(),
            time_to_success_secs: time,
            mistakes,
            blocks_placed: 10,
            blocks_destroyed: mistakes,
            answers,
        }
    }

    #[test]
    fn test_numeric_answers_are_digits_only() {
        assert!(answer("q", "5").is_numeric());
        assert!(!answer("q", "").is_numeric());
        assert!(!answer("q", "-1").is_numeric());
        assert!(!answer("q", "4 stars").is_numeric());
        assert_eq!(answer("q", "42").numeric_value(), Some(42));
    }

    #[test]
    fn test_empty_input_yields_zeroes() {
        assert_eq!(Aggregate::from_games(&[]), Aggregate::default());
    }

    #[test]
    fn test_averages_and_fractions() {
        let games = vec![
            overview(1, Some(100), 0, vec![]),
            overview(2, Some(200), 2, vec![]),
            overview(3, None, 2, vec![]),
            overview(4, None, 4, vec![]),
        ];

        let agg = Aggregate::from_games(&games);

        assert_eq!(agg.num_games, 4);
        assert!((agg.average_time_to_success_secs - 150.0).abs() < f64::EPSILON);
        assert!((agg.fraction_successful - 0.5).abs() < f64::EPSILON);
        assert!((agg.fraction_with_mistakes - 0.75).abs() < f64::EPSILON);
        assert!((agg.average_mistakes - 2.0).abs() < f64::EPSILON);
        assert!((agg.average_blocks_placed - 10.0).abs() < f64::EPSILON);
        assert_eq!(agg.mistake_distribution, BTreeMap::from([(0, 1), (2, 2), (4, 1)]));
    }

    #[test]
    fn test_answer_statistics() {
        let games = vec![
            overview(1, None, 0, vec![answer("clear", "2"), answer("comment", "nice")]),
            overview(2, None, 0, vec![answer("clear", "4"), answer("comment", "")]),
            overview(3, None, 0, vec![answer("clear", "9")]),
        ];

        let agg = Aggregate::from_games(&games);

        assert_eq!(agg.answer_stats.len(), 1);
        let stats = &agg.answer_stats[0];
        assert_eq!(stats.question, "clear");
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.std_dev - 13.0_f64.sqrt()).abs() < 1e-9);
        assert!((stats.median - 4.0).abs() < 1e-9);
        assert_eq!((stats.min, stats.max), (2, 9));
        assert_eq!(
            agg.free_text,
            BTreeMap::from([("comment".to_string(), vec!["nice".to_string()])])
        );
    }

    #[test]
    fn test_even_sample_median_is_midpoint() {
        let stats = AnswerStats::from_values("q", &[4, 1, 3, 2]).unwrap();
        assert!((stats.median - 2.5).abs() < 1e-9);
        assert!(AnswerStats::from_values("q", &[]).is_none());
    }

    #[test]
    fn test_out_of_range_digits_are_free_text() {
        let huge = answer("clear", "99999999999999999999");
        assert!(!huge.is_numeric());
        assert_eq!(huge.numeric_value(), None);

        let agg = Aggregate::from_games(&[overview(1, None, 0, vec![huge])]);

        assert!(agg.answer_stats.is_empty());
        assert_eq!(
            agg.free_text,
            BTreeMap::from([("clear".to_string(), vec!["99999999999999999999".to_string()])])
        );
    }
}
