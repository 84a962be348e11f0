//! Plain-text rendering for the terminal front end.

use std::fmt::Write as _;

use services::TopicSummary;
use sqlearn_core::model::{AnswerFeedback, AnswerKind, QuizQuestion, Score, TabularResult, Topic};
use storage::{TableInfo, TableKind};

/// Longest cell rendered before it is cut with an ellipsis.
const MAX_CELL_WIDTH: usize = 40;

fn clip(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_string();
    }
    let mut out: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
    out.push('…');
    out
}

/// Boxed ASCII grid. Every row must have `columns.len()` cells.
pub fn grid(columns: &[String], rows: &[Vec<String>]) -> String {
    let header: Vec<String> = columns.iter().map(|c| clip(c)).collect();
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|c| clip(c)).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|c| c.chars().count()).collect();
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };
    let line = |cells: &[String]| {
        let mut out = String::from("|");
        for (cell, width) in cells.iter().zip(&widths) {
            let pad = width - cell.chars().count();
            let _ = write!(out, " {cell}{} |", " ".repeat(pad));
        }
        out
    };

    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{}", line(&header));
    let _ = writeln!(out, "{rule}");
    for row in &body {
        let _ = writeln!(out, "{}", line(row));
    }
    if !body.is_empty() {
        let _ = writeln!(out, "{rule}");
    }
    out
}

pub fn result(result: &TabularResult) -> String {
    let rows: Vec<Vec<String>> = result
        .rows()
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    let mut out = grid(result.columns(), &rows);

    let noun = if result.row_count() == 1 { "row" } else { "rows" };
    let _ = write!(out, "{} {noun}", result.row_count());
    if result.truncated() {
        out.push_str(" (truncated)");
    }
    let _ = writeln!(out, " in {} ms", result.elapsed().as_millis());
    out
}

pub fn schema(tables: &[TableInfo]) -> String {
    let columns = ["name", "kind", "rows", "columns"].map(String::from);
    let rows: Vec<Vec<String>> = tables
        .iter()
        .map(|t| {
            let kind = match t.kind {
                TableKind::Table => "table",
                TableKind::View => "view",
            };
            vec![
                t.name.clone(),
                kind.to_string(),
                t.row_count.to_string(),
                t.columns.join(", "),
            ]
        })
        .collect();
    grid(&columns, &rows)
}

pub fn topics(topics: &[TopicSummary]) -> String {
    let columns = ["#", "id", "title", "examples", "quiz"].map(String::from);
    let rows: Vec<Vec<String>> = topics
        .iter()
        .map(|t| {
            vec![
                t.order.to_string(),
                t.id.to_string(),
                t.title.clone(),
                t.examples.to_string(),
                t.questions.to_string(),
            ]
        })
        .collect();
    grid(&columns, &rows)
}

/// Lesson text followed by the example index.
pub fn topic(topic: &Topic) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", topic.title());
    if !topic.summary().is_empty() {
        let _ = writeln!(out, "\n{}", topic.summary());
    }
    for section in topic.sections() {
        let _ = writeln!(out, "\n## {}\n\n{}", section.heading, section.body.trim_end());
    }

    if !topic.examples().is_empty() {
        let _ = writeln!(out, "\n## Examples\n");
        for example in topic.examples() {
            let target = example
                .dataset()
                .map_or_else(|| "illustrative".to_string(), |d| format!("on {d}"));
            let _ = writeln!(out, "- {} ({target}): {}", example.id(), example.title());
            for line in example.sql().lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
    }
    out
}

pub fn question(number: usize, question: &QuizQuestion) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Q{number}. {}", question.prompt());
    for (i, candidate) in question.candidates().iter().enumerate() {
        let _ = writeln!(out, "  {}) {candidate}", i + 1);
    }
    let prompt = match question.answer_kind() {
        AnswerKind::SingleChoice => "Pick one number.",
        AnswerKind::MultiSelect => "Pick all that apply, separated by commas.",
    };
    let _ = writeln!(out, "{prompt}");
    out
}

pub fn feedback(feedback: &AnswerFeedback) -> String {
    let mut out = String::new();
    let verdict = if feedback.correct { "Correct." } else { "Not quite." };
    let _ = writeln!(out, "{verdict} {}", feedback.message);
    if !feedback.missing.is_empty() {
        let _ = writeln!(out, "  missed: {}", feedback.missing.join(", "));
    }
    if !feedback.extra.is_empty() {
        let _ = writeln!(out, "  not correct: {}", feedback.extra.join(", "));
    }
    out
}

pub fn score(score: Score) -> String {
    match score.ratio() {
        Some(ratio) => format!(
            "Score: {}/{} ({:.0}%)",
            score.correct,
            score.answered,
            ratio * 100.0
        ),
        None => "No questions answered.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlearn_core::model::Value;

    use super::*;

    #[test]
    fn grid_pads_to_widest_cell() {
        let out = grid(
            &["id".into(), "name".into()],
            &[vec!["1".into(), "Alice".into()], vec!["22".into(), "Bo".into()]],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "+----+-------+");
        assert_eq!(lines[1], "| id | name  |");
        assert_eq!(lines[3], "| 1  | Alice |");
        assert_eq!(lines[4], "| 22 | Bo    |");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn empty_result_still_shows_header() {
        let result =
            TabularResult::new(vec!["name".into()], Vec::new(), false, Duration::ZERO).unwrap();
        let out = super::result(&result);
        assert!(out.contains("| name |"));
        assert!(out.ends_with("0 rows in 0 ms\n"));
    }

    #[test]
    fn truncation_and_nulls_are_visible() {
        let result = TabularResult::new(
            vec!["a".into()],
            vec![vec![Value::Null]],
            true,
            Duration::from_millis(3),
        )
        .unwrap();
        let out = super::result(&result);
        assert!(out.contains("| NULL |"));
        assert!(out.contains("1 row (truncated) in 3 ms"));
    }

    #[test]
    fn long_cells_are_clipped() {
        let long = "x".repeat(100);
        let out = grid(&["c".into()], &[vec![long]]);
        let row = out.lines().nth(3).unwrap();
        assert_eq!(row.chars().count(), MAX_CELL_WIDTH + 4);
        assert!(row.contains('…'));
    }

    #[test]
    fn score_handles_empty_sessions() {
        assert_eq!(
            score(Score {
                correct: 0,
                answered: 0
            }),
            "No questions answered."
        );
        assert_eq!(
            score(Score {
                correct: 1,
                answered: 2
            }),
            "Score: 1/2 (50%)"
        );
    }
}
