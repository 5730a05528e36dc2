//! Core data model types for gellyfish.
//!
//! These mirror the model schemas of the hosted backend: the tutorial
//! challenges, the jellyfish demo domain used as query fixtures, and the
//! per-user progress records. Field names serialize in camelCase to match
//! the GraphQL API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Maximum length of a jellyfish name or type.
pub const MAX_JELLYFISH_TEXT_LEN: usize = 80;

/// A numbered tutorial unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Backend record id.
    pub id: String,
    /// Position in the tutorial, starting at 1.
    #[serde(rename = "challengeId")]
    pub number: u32,
    pub title: String,
    pub backstory: String,
    /// What the learner is asked to query.
    pub prompt: String,
    pub hint: String,
    /// Documentation link shown next to the hint.
    pub hint_link: String,
    /// Reference Gelly query.
    pub solution: String,
    /// Output the reference query produces, as JSON or `key: value` text.
    #[serde(default)]
    pub expected_output: Option<String>,
}

/// Input for creating a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChallenge {
    #[serde(rename = "challengeId")]
    pub number: u32,
    pub title: String,
    pub backstory: String,
    pub prompt: String,
    pub hint: String,
    pub hint_link: String,
    pub solution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

impl NewChallenge {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.number < 1 {
            return Err(ValidationError::OutOfRange {
                model: "challenge",
                field: "challengeId",
                min: 1,
            });
        }
        require("challenge", "title", &self.title)?;
        require("challenge", "backstory", &self.backstory)?;
        require("challenge", "prompt", &self.prompt)?;
        require("challenge", "hint", &self.hint)?;
        require("challenge", "hintLink", &self.hint_link)?;
        require("challenge", "solution", &self.solution)?;
        if !is_url(&self.hint_link) {
            return Err(ValidationError::InvalidUrl {
                model: "challenge",
                field: "hintLink",
                value: self.hint_link.clone(),
            });
        }
        Ok(())
    }

    /// Attach a backend id, producing the stored record.
    pub fn into_record(self, id: impl Into<String>) -> Challenge {
        Challenge {
            id: id.into(),
            number: self.number,
            title: self.title,
            backstory: self.backstory,
            prompt: self.prompt,
            hint: self.hint,
            hint_link: self.hint_link,
            solution: self.solution,
            expected_output: self.expected_output,
        }
    }
}

impl From<&Challenge> for NewChallenge {
    fn from(c: &Challenge) -> Self {
        Self {
            number: c.number,
            title: c.title.clone(),
            backstory: c.backstory.clone(),
            prompt: c.prompt.clone(),
            hint: c.hint.clone(),
            hint_link: c.hint_link.clone(),
            solution: c.solution.clone(),
            expected_output: c.expected_output.clone(),
        }
    }
}

/// Food categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Plant,
    Meat,
    Other,
}

impl fmt::Display for FoodCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoodCategory::Plant => write!(f, "plant"),
            FoodCategory::Meat => write!(f, "meat"),
            FoodCategory::Other => write!(f, "other"),
        }
    }
}

impl FromStr for FoodCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plant" => Ok(FoodCategory::Plant),
            "meat" => Ok(FoodCategory::Meat),
            "other" => Ok(FoodCategory::Other),
            other => Err(format!("unknown food category: {other}")),
        }
    }
}

/// Something a jellyfish can eat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    pub name: String,
    pub category: FoodCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFood {
    pub name: String,
    pub category: FoodCategory,
}

impl NewFood {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("food", "name", &self.name)
    }
}

/// A jellyfish. `kind` is called `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jellyfish {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub age: i64,
    pub length: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJellyfish {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub age: i64,
    pub length: f64,
    pub weight: f64,
}

impl NewJellyfish {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("jellyfish", "name", &self.name)?;
        require("jellyfish", "type", &self.kind)?;
        max_len("jellyfish", "name", &self.name, MAX_JELLYFISH_TEXT_LEN)?;
        max_len("jellyfish", "type", &self.kind, MAX_JELLYFISH_TEXT_LEN)?;
        Ok(())
    }
}

impl From<&Jellyfish> for NewJellyfish {
    fn from(j: &Jellyfish) -> Self {
        Self {
            name: j.name.clone(),
            kind: j.kind.clone(),
            age: j.age,
            length: j.length,
            weight: j.weight,
        }
    }
}

/// Oceans a home can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ocean {
    Pacific,
    Atlantic,
    Indian,
    Arctic,
    Antarctic,
}

impl fmt::Display for Ocean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ocean::Pacific => "Pacific",
            Ocean::Atlantic => "Atlantic",
            Ocean::Indian => "Indian",
            Ocean::Arctic => "Arctic",
            Ocean::Antarctic => "Antarctic",
        };
        f.write_str(name)
    }
}

/// A reef address, optionally belonging to a jellyfish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    pub id: String,
    pub reef_address: String,
    #[serde(default)]
    pub ocean: Option<Ocean>,
    #[serde(default)]
    pub jellyfish_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHome {
    pub reef_address: String,
    #[serde(default)]
    pub ocean: Option<Ocean>,
    #[serde(default)]
    pub jellyfish_id: Option<String>,
}

impl NewHome {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("home", "reefAddress", &self.reef_address)
    }
}

/// Join record between a food and a jellyfish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodChain {
    pub id: String,
    #[serde(default)]
    pub food_id: Option<String>,
    #[serde(default)]
    pub jellyfish_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFoodChain {
    #[serde(default)]
    pub food_id: Option<String>,
    #[serde(default)]
    pub jellyfish_id: Option<String>,
}

/// A signed-in learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A browser session, optionally tied to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Per-user completion record, unique on `(challenge_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: String,
    /// Record id of the challenge (not its number).
    pub challenge_id: String,
    pub user_id: String,
    pub is_complete: bool,
    pub solution: String,
}

/// Upsert input for a progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpsert {
    pub challenge_id: String,
    pub user_id: String,
    pub is_complete: bool,
    pub solution: String,
}

impl ProgressUpsert {
    /// A completed record for `challenge_id` solved by `user_id`.
    pub fn completed(challenge_id: &str, user_id: &str, solution: &str) -> Self {
        Self {
            challenge_id: challenge_id.to_string(),
            user_id: user_id.to_string(),
            is_complete: true,
            solution: solution.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("progress", "challenge", &self.challenge_id)?;
        require("progress", "user", &self.user_id)?;
        require("progress", "solution", &self.solution)?;
        Ok(())
    }
}

/// One field of a model as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub name: String,
    pub field_type: String,
}

/// Introspected field list of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    pub model_name: String,
    pub fields: Vec<SchemaField>,
}

fn require(model: &'static str, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required { model, field })
    } else {
        Ok(())
    }
}

fn max_len(
    model: &'static str,
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        Err(ValidationError::TooLong { model, field, max })
    } else {
        Ok(())
    }
}

fn is_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}
