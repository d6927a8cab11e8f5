//! Read-only portfolio content and the widget that asks its questions.
//!
//! A [`Catalog`] groups cards (a job, a project) into sections.  Each card
//! carries suggested questions; a [`QuestionWidget`] publishes the one a
//! visitor picks on the [`QuestionBus`] so whatever conversation is
//! listening can answer it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bus::QuestionBus;
use crate::error::{Error, Result};

/// An external link attached to a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLink {
    /// Label shown for the link.
    pub name: String,
    /// Where it points.
    pub url: String,
}

/// One entry of the portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCard {
    /// Role or project name.
    pub title: String,
    /// Organization and period, e.g. "Acme • 2021-2023".
    #[serde(default)]
    pub subtitle: String,
    /// Free-form summary.
    #[serde(default)]
    pub description: String,
    /// Questions a visitor can ask about this entry.
    #[serde(default)]
    pub questions: Vec<String>,
    /// External links.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<CardLink>,
}

/// A titled group of cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Section heading.
    pub name: String,
    /// Cards in display order.
    pub cards: Vec<CatalogCard>,
}

/// The portfolio content browser's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Sections in display order.
    pub sections: Vec<CatalogSection>,
}

impl Catalog {
    /// Parses a catalog from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a catalog from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read catalog {}", path.display()), e))?;
        Self::from_json(&json)
    }

    /// Every suggested question, in display order.
    ///
    /// The position in this list is what [`QuestionWidget::ask_numbered`]
    /// takes (1-based).
    pub fn questions(&self) -> Vec<&str> {
        self.cards()
            .flat_map(|card| card.questions.iter().map(String::as_str))
            .collect()
    }

    /// Every card, in display order.
    pub fn cards(&self) -> impl Iterator<Item = &CatalogCard> {
        self.sections.iter().flat_map(|section| section.cards.iter())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let card = |title: &str, subtitle: &str, description: &str, questions: &[&str]| {
            CatalogCard {
                title: title.to_string(),
                subtitle: subtitle.to_string(),
                description: description.to_string(),
                questions: questions.iter().map(|q| q.to_string()).collect(),
                links: Vec::new(),
            }
        };
        Self {
            sections: vec![
                CatalogSection {
                    name: "Software Experience".to_string(),
                    cards: vec![card(
                        "Software Developer",
                        "Current role",
                        "Builds and ships product features across the stack.",
                        &[
                            "What technologies do you work with daily?",
                            "What project are you most proud of?",
                        ],
                    )],
                },
                CatalogSection {
                    name: "Personal Projects".to_string(),
                    cards: vec![card(
                        "Portfolio Assistant",
                        "Personal project",
                        "This conversational portfolio.",
                        &[
                            "How did you build this portfolio?",
                            "Tell me about your development process",
                        ],
                    )],
                },
            ],
        }
    }
}

////////////////////////////////////////// QuestionWidget //////////////////////////////////////

/// Publishes suggested questions on a bus.
///
/// The widget knows nothing about the conversation; it only holds the bus.
#[derive(Debug, Clone)]
pub struct QuestionWidget {
    bus: QuestionBus,
}

impl QuestionWidget {
    /// Creates a widget publishing on `bus`.
    pub fn new(bus: QuestionBus) -> Self {
        Self { bus }
    }

    /// Publishes `question`, returning how many subscribers received it.
    pub fn ask(&self, question: &str) -> usize {
        self.bus.publish(question)
    }

    /// Publishes question `n` (1-based) of `catalog`.
    ///
    /// # Errors
    ///
    /// Fails when `n` does not name a question.
    pub fn ask_numbered(&self, catalog: &Catalog, n: usize) -> Result<usize> {
        let questions = catalog.questions();
        let question = n
            .checked_sub(1)
            .and_then(|index| questions.get(index))
            .ok_or_else(|| {
                Error::validation(
                    format!("no question {n}; choose 1-{}", questions.len()),
                    Some("n".to_string()),
                )
            })?;
        Ok(self.ask(question))
    }
}
