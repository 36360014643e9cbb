//! Listing, selection and creation of organizations and projects.

pub mod organization;
pub mod project;

pub use organization::Organizations;
pub use project::Projects;

use crate::api::models::{Organization, Project};
use crate::api::ApiError;
use crate::error::{ForgeError, ForgeResult};
use crate::prompt::InputReader;

/// Outcome of an interactive selection
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<T> {
    Chosen(T),
    /// The backend returned no entities
    Empty,
    /// The user asked to create a new entity instead
    CreateNew,
}

/// States of the create/update wizards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WizardStep {
    AwaitingName,
    AwaitingSlug,
    AwaitingConfirmFinal,
}

pub(crate) trait Selectable {
    fn label(&self) -> &str;
    fn slug(&self) -> &str;
}

impl Selectable for Organization {
    fn label(&self) -> &str {
        &self.name
    }
    fn slug(&self) -> &str {
        &self.slug
    }
}

impl Selectable for Project {
    fn label(&self) -> &str {
        &self.name
    }
    fn slug(&self) -> &str {
        &self.slug
    }
}

/// Pick one of `items`.
///
/// A single item is confirmed with Y/n (or `c` to create a new one); several
/// items are listed with numbers and picked by number or slug, `q` cancels.
pub(crate) fn choose<T: Selectable + Clone>(
    input: &mut dyn InputReader,
    kind: &str,
    items: &[T],
) -> ForgeResult<Selection<T>> {
    match items {
        [] => Ok(Selection::Empty),
        [only] => loop {
            let answer = input.read_line(&format!(
                "Found {} '{}' [{}]. Use it? [Y/n] or [c] to create a new one: ",
                kind,
                only.label(),
                only.slug()
            ))?;
            match answer.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(Selection::Chosen(only.clone())),
                "n" | "no" => return Err(ForgeError::SelectionCancelled),
                "c" | "create" => return Ok(Selection::CreateNew),
                _ => println!("Please answer 'y', 'n' or 'c'."),
            }
        },
        _ => {
            println!("Available {}s:", kind);
            for (i, item) in items.iter().enumerate() {
                println!("  {}. {} [{}]", i + 1, item.label(), item.slug());
            }
            loop {
                let answer = input.read_line(&format!(
                    "Enter {} number or slug ('q' to cancel): ",
                    kind
                ))?;
                let answer = answer.trim();
                if answer.eq_ignore_ascii_case("q") {
                    return Err(ForgeError::SelectionCancelled);
                }
                if let Ok(n) = answer.parse::<usize>() {
                    if (1..=items.len()).contains(&n) {
                        return Ok(Selection::Chosen(items[n - 1].clone()));
                    }
                    println!("Please enter a number between 1 and {}.", items.len());
                    continue;
                }
                if let Some(item) = items.iter().find(|item| item.slug() == answer) {
                    return Ok(Selection::Chosen(item.clone()));
                }
                println!("No {} matches '{}'.", kind, answer);
            }
        }
    }
}

/// Map a backend 404 onto [`ForgeError::NotFound`]
pub(crate) fn not_found_as(err: ApiError, what: impl FnOnce() -> String) -> ForgeError {
    if err.is_not_found() {
        ForgeError::NotFound(what())
    } else {
        ForgeError::Api(err)
    }
}
