//! Plain-text quiz authoring format.
//!
//! Questions are separated by blank lines. The first line of a block is the
//! question, every following line is an option, and the single correct
//! option is prefixed with `*`:
//!
//! ```text
//! Which planet is closest to the sun?
//! *Mercury
//! Venus
//! Mars
//!
//! How many moons does Mars have?
//! 1
//! *2
//! ```

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizFormatError {
    #[error("The quiz needs at least one question.")]
    Empty,
    #[error("Question {0} needs at least two options.")]
    TooFewOptions(usize),
    #[error("Question {0} must mark exactly one option with '*'.")]
    CorrectOption(usize),
    #[error("Question {0} has an empty option.")]
    EmptyOption(usize),
}

/// Groups trimmed lines into blocks; any whitespace-only line ends a block.
fn blocks(input: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in input.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

pub fn parse(input: &str) -> Result<Vec<ParsedQuestion>, QuizFormatError> {
    let mut questions = Vec::new();

    for (i, block) in blocks(input).into_iter().enumerate() {
        let number = i + 1;
        let mut lines = block.into_iter();
        let Some(text) = lines.next() else {
            continue;
        };

        let mut options = Vec::new();
        let mut correct = Vec::new();
        for line in lines {
            let option = match line.strip_prefix('*') {
                Some(rest) => {
                    correct.push(options.len());
                    rest.trim()
                }
                None => line,
            };
            if option.is_empty() {
                return Err(QuizFormatError::EmptyOption(number));
            }
            options.push(option.to_string());
        }

        if options.len() < 2 {
            return Err(QuizFormatError::TooFewOptions(number));
        }
        let [correct_index] = correct[..] else {
            return Err(QuizFormatError::CorrectOption(number));
        };

        questions.push(ParsedQuestion {
            text: text.to_string(),
            options,
            correct_index,
        });
    }

    if questions.is_empty() {
        return Err(QuizFormatError::Empty);
    }
    Ok(questions)
}

/// Inverse of [`parse`], used to prefill the edit form.
pub fn render(questions: &[ParsedQuestion]) -> String {
    questions
        .iter()
        .map(|q| {
            let mut block = q.text.clone();
            for (i, option) in q.options.iter().enumerate() {
                block.push('\n');
                if i == q.correct_index {
                    block.push('*');
                }
                block.push_str(option);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "Which planet is closest to the sun?\n*Mercury\nVenus\nMars\n\n\r\nHow many moons does Mars have?\r\n1\r\n* 2\r\n";

    #[test]
    fn parses_blocks_and_marks() {
        let questions = parse(SAMPLE).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text, "Which planet is closest to the sun?");
        assert_eq!(questions[0].options, ["Mercury", "Venus", "Mars"]);
        assert_eq!(questions[0].correct_index, 0);
        assert_eq!(questions[1].options, ["1", "2"]);
        assert_eq!(questions[1].correct_index, 1);
    }

    #[test]
    fn render_parses_back() {
        let questions = parse(SAMPLE).unwrap();
        assert_eq!(parse(&render(&questions)).unwrap(), questions);
    }

    #[test]
    fn errors_name_the_question() {
        assert_eq!(parse("  \n\n "), Err(QuizFormatError::Empty));
        assert_eq!(parse("Q1\n*a\nb\n\nQ2\n*only"), Err(QuizFormatError::TooFewOptions(2)));
        assert_eq!(parse("Q1\na\nb"), Err(QuizFormatError::CorrectOption(1)));
        assert_eq!(parse("Q1\n*a\n*b"), Err(QuizFormatError::CorrectOption(1)));
        assert_eq!(parse("Q1\n*\nb"), Err(QuizFormatError::EmptyOption(1)));
    }

    #[test]
    fn whitespace_only_lines_separate_questions() {
        let questions = parse("Q1\n*a\nb\n   \nQ2\nc\n*d").unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options, ["a", "b"]);
        assert_eq!(questions[1].text, "Q2");
        assert_eq!(questions[1].correct_index, 1);

        let tabbed = parse("Q1\n*a\nb\n\t\r\nQ2\nc\nd");
        assert_eq!(tabbed, Err(QuizFormatError::CorrectOption(2)));
    }

    #[test]
    fn error_messages_are_user_facing() {
        assert_eq!(
            QuizFormatError::TooFewOptions(3).to_string(),
            "Question 3 needs at least two options."
        );
    }
}
