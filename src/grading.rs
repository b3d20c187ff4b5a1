/// Lower bounds of each letter grade, highest first. Anything below the last is F.
pub const GRADE_LADDER: [(f64, &str); 8] = [
    (90.0, "A+"),
    (85.0, "A"),
    (80.0, "B+"),
    (75.0, "B"),
    (70.0, "C+"),
    (65.0, "C"),
    (60.0, "D+"),
    (50.0, "D"),
];

pub fn grade_for(percentage: f64) -> &'static str {
    GRADE_LADDER
        .iter()
        .find(|(min, _)| percentage >= *min)
        .map(|(_, g)| *g)
        .unwrap_or("F")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultScores {
    pub total: f64,
    pub average: f64,
    pub percentage: f64,
    pub grade: &'static str,
}

fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Recomputes a published result from the raw components. Results keep two
/// decimals; the marks grid stores a whole-number percentage. The grade comes
/// from the unrounded average.
pub fn derive_result(midterm: Option<f64>, final_score: Option<f64>, homework: Option<f64>) -> ResultScores {
    let total = [midterm, final_score, homework]
        .iter()
        .flatten()
        .sum::<f64>();
    let average = total / 3.0;
    let percentage = round_2(average);
    ResultScores {
        total,
        average: round_2(average),
        percentage,
        grade: grade_for(average),
    }
}
