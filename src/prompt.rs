// Interactive input used by the selection and creation wizards

use std::io::{self, BufRead, Write};

/// Source of interactive answers
pub trait InputReader {
    /// Show `prompt` and return the next line without its line terminator
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;
}

/// Reads answers from the terminal
#[derive(Debug, Default)]
pub struct StdinReader;

impl InputReader for StdinReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Ask a question, falling back to `default` on an empty answer
pub fn ask_with_default(
    input: &mut dyn InputReader,
    question: &str,
    default: &str,
) -> io::Result<String> {
    let prompt = if default.is_empty() {
        format!("{}: ", question)
    } else {
        format!("{} [{}]: ", question, default)
    };
    let answer = input.read_line(&prompt)?;
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}

/// Yes/no question; an empty answer picks `default_yes`, anything
/// unrecognised asks again
pub fn confirm(input: &mut dyn InputReader, question: &str, default_yes: bool) -> io::Result<bool> {
    let hint = if default_yes { "Y/n" } else { "y/N" };
    loop {
        let answer = input.read_line(&format!("{} [{}]: ", question, hint))?;
        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(default_yes),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer 'y' or 'n'."),
        }
    }
}

/// Pick any subset of `options` by number.
///
/// An empty answer keeps every option, `q` cancels and yields `None`.
/// Answers with unknown numbers ask again.
pub fn select_many(
    input: &mut dyn InputReader,
    title: &str,
    options: &[String],
) -> io::Result<Option<Vec<String>>> {
    println!("{}:", title);
    for (i, option) in options.iter().enumerate() {
        println!("  {}) {}", i + 1, option);
    }

    loop {
        let answer = input.read_line("Numbers separated by commas (empty for all, q to cancel): ")?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(Some(options.to_vec()));
        }
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        let picked: Option<Vec<usize>> = answer
            .split(',')
            .map(|part| part.trim().parse::<usize>().ok())
            .map(|n| n.filter(|n| (1..=options.len()).contains(n)))
            .collect();
        match picked {
            Some(mut numbers) => {
                numbers.sort_unstable();
                numbers.dedup();
                return Ok(Some(
                    numbers.into_iter().map(|n| options[n - 1].clone()).collect(),
                ));
            }
            None => println!("Pick numbers between 1 and {}.", options.len()),
        }
    }
}

#[cfg(test)]
pub(crate) use scripted::ScriptedInput;

#[cfg(test)]
mod scripted {
    use super::InputReader;
    use std::collections::VecDeque;
    use std::io;

    /// Replays canned answers and records the prompts it was shown
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedInput {
        answers: VecDeque<String>,
        pub prompts: Vec<String>,
    }

    impl ScriptedInput {
        pub(crate) fn new<I, S>(answers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                answers: answers.into_iter().map(Into::into).collect(),
                prompts: Vec::new(),
            }
        }

        pub(crate) fn remaining(&self) -> usize {
            self.answers.len()
        }
    }

    impl InputReader for ScriptedInput {
        fn read_line(&mut self, prompt: &str) -> io::Result<String> {
            self.prompts.push(prompt.to_string());
            self.answers.pop_front().ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer left")
            })
        }
    }
}
