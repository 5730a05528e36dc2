//! In-memory backend for tests and offline use.
//!
//! Applies the same model validations as the hosted backend: required
//! fields, the jellyfish text limits, unique challenge numbers, links to
//! existing records, and progress upserts keyed on `(challenge, user)`.
//! A jellyfish's foods are the food chains that point at it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use gellyfish_core::compare::normalize_text;
use gellyfish_core::error::ValidationError;
use gellyfish_core::model::{
    Challenge, Food, FoodCategory, FoodChain, Home, Jellyfish, ModelSchema, NewChallenge,
    NewFood, NewFoodChain, NewHome, NewJellyfish, ProgressRecord, ProgressUpsert, SchemaField,
};
use gellyfish_core::traits::{ProgressApi, QueryRunner, RecordApi, SchemaSource};

use crate::error::ApiError;

#[derive(Default)]
struct State {
    next_id: u64,
    challenges: Vec<Challenge>,
    foods: Vec<Food>,
    jellyfish: Vec<Jellyfish>,
    homes: Vec<Home>,
    food_chains: Vec<FoodChain>,
    progress: Vec<ProgressRecord>,
    gelly: HashMap<String, Result<Value, String>>,
    schemas: HashMap<String, Vec<SchemaField>>,
    failure: Option<String>,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn check_available(&self) -> Result<(), ApiError> {
        match &self.failure {
            Some(message) => Err(ApiError::Network(message.clone())),
            None => Ok(()),
        }
    }

    fn require_challenge(&self, id: &str) -> Result<(), ApiError> {
        if self.challenges.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(not_found("challenge", id))
        }
    }

    fn require_food(&self, id: &str) -> Result<&Food, ApiError> {
        self.foods
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| not_found("food", id))
    }

    fn require_jellyfish(&self, id: &str) -> Result<&Jellyfish, ApiError> {
        self.jellyfish
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| not_found("jellyfish", id))
    }

    fn check_unique_number(&self, number: u32) -> Result<(), ValidationError> {
        if self.challenges.iter().any(|c| c.number == number) {
            Err(ValidationError::NotUnique {
                model: "challenge",
                field: "challengeId",
                value: number.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn foods_of(&self, jellyfish_id: &str) -> Vec<String> {
        self.food_chains
            .iter()
            .filter(|chain| chain.jellyfish_id.as_deref() == Some(jellyfish_id))
            .filter_map(|chain| chain.food_id.as_deref())
            .filter_map(|food_id| self.foods.iter().find(|f| f.id == food_id))
            .map(|food| food.name.clone())
            .collect()
    }
}

fn not_found(model: &str, id: &str) -> ApiError {
    ApiError::NotFound {
        model: model.to_string(),
        id: id.to_string(),
    }
}

/// A backend that keeps every record in memory.
pub struct InMemoryBackend {
    state: Mutex<State>,
    call_count: AtomicU32,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// An empty backend that knows the field lists of the built-in models.
    pub fn new() -> Self {
        let state = State {
            schemas: builtin_schemas(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            call_count: AtomicU32::new(0),
        }
    }

    /// Start record ids after `offset`, so two backends hand out
    /// different ids for the same records.
    pub fn with_id_offset(self, offset: u64) -> Self {
        self.state().next_id = offset;
        self
    }

    /// Result returned by [`QueryRunner::run_gelly`] for `query`.
    pub fn with_gelly_result(self, query: &str, result: Value) -> Self {
        self.state().gelly.insert(normalize_text(query), Ok(result));
        self
    }

    /// Error returned by [`QueryRunner::run_gelly`] for `query`.
    pub fn with_gelly_error(self, query: &str, message: &str) -> Self {
        self.state()
            .gelly
            .insert(normalize_text(query), Err(message.to_string()));
        self
    }

    /// Replace the field list reported for `model`.
    pub fn with_schema(self, model: &str, fields: Vec<SchemaField>) -> Self {
        self.state().schemas.insert(model.to_string(), fields);
        self
    }

    /// Make every subsequent call fail with a network error, or recover.
    pub fn set_failure(&self, message: Option<&str>) {
        self.state().failure = message.map(str::to_string);
    }

    /// Number of trait calls made so far.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Snapshot of all progress records.
    pub fn progress_records(&self) -> Vec<ProgressRecord> {
        self.state().progress.clone()
    }

    /// Names of the foods currently linked to a jellyfish.
    pub fn foods_of(&self, jellyfish_id: &str) -> Vec<String> {
        self.state().foods_of(jellyfish_id)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state for one trait call, failing if a failure is injected.
    fn enter(&self) -> Result<MutexGuard<'_, State>, ApiError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let state = self.state();
        state.check_available()?;
        Ok(state)
    }
}

fn field(name: &str, field_type: &str) -> SchemaField {
    SchemaField {
        name: name.to_string(),
        field_type: field_type.to_string(),
    }
}

fn builtin_schemas() -> HashMap<String, Vec<SchemaField>> {
    let system = || {
        vec![
            field("id", "ID"),
            field("createdAt", "DateTime"),
            field("updatedAt", "DateTime"),
        ]
    };
    let with = |extra: Vec<SchemaField>| {
        let mut fields = system();
        fields.extend(extra);
        fields
    };

    HashMap::from([
        (
            "challenge".to_string(),
            with(vec![
                field("backstory", "String"),
                field("challengeId", "Number"),
                field("expectedOutput", "String"),
                field("hint", "String"),
                field("hintLink", "URL"),
                field("prompt", "String"),
                field("solution", "String"),
                field("title", "String"),
                field("users", "HasManyThrough"),
            ]),
        ),
        (
            "food".to_string(),
            with(vec![
                field("category", "Enum"),
                field("jellyfish", "HasManyThrough"),
                field("name", "String"),
            ]),
        ),
        (
            "foodChain".to_string(),
            with(vec![
                field("food", "BelongsTo"),
                field("jellyfish", "BelongsTo"),
            ]),
        ),
        (
            "home".to_string(),
            with(vec![
                field("jellyfish", "BelongsTo"),
                field("ocean", "Enum"),
                field("reefAddress", "String"),
            ]),
        ),
        (
            "jellyfish".to_string(),
            with(vec![
                field("age", "Number"),
                field("foods", "HasManyThrough"),
                field("homes", "HasMany"),
                field("length", "Number"),
                field("name", "String"),
                field("type", "String"),
                field("weight", "Number"),
            ]),
        ),
        (
            "progress".to_string(),
            with(vec![
                field("challenge", "BelongsTo"),
                field("isComplete", "Boolean"),
                field("solution", "String"),
                field("user", "BelongsTo"),
            ]),
        ),
    ])
}

#[async_trait]
impl QueryRunner for InMemoryBackend {
    async fn run_gelly(&self, query: &str) -> anyhow::Result<Value> {
        let state = self.enter()?;
        match state.gelly.get(&normalize_text(query)) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(ApiError::GraphQl(message.clone()).into()),
            None => Err(ApiError::GraphQl(format!("no result for query: {}", query.trim())).into()),
        }
    }
}

#[async_trait]
impl ProgressApi for InMemoryBackend {
    async fn upsert_progress(&self, input: &ProgressUpsert) -> anyhow::Result<ProgressRecord> {
        let mut state = self.enter()?;
        input.validate().map_err(ApiError::from)?;
        state.require_challenge(&input.challenge_id)?;

        let existing = state
            .progress
            .iter_mut()
            .find(|p| p.challenge_id == input.challenge_id && p.user_id == input.user_id);
        if let Some(record) = existing {
            record.is_complete = input.is_complete;
            record.solution = input.solution.clone();
            return Ok(record.clone());
        }

        let record = ProgressRecord {
            id: state.next_id(),
            challenge_id: input.challenge_id.clone(),
            user_id: input.user_id.clone(),
            is_complete: input.is_complete,
            solution: input.solution.clone(),
        };
        state.progress.push(record.clone());
        Ok(record)
    }

    async fn completed_challenge_ids(&self, user_id: &str) -> anyhow::Result<Vec<String>> {
        let state = self.enter()?;
        Ok(state
            .progress
            .iter()
            .filter(|p| p.user_id == user_id && p.is_complete)
            .map(|p| p.challenge_id.clone())
            .collect())
    }

    async fn find_solution(
        &self,
        challenge_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Option<String>> {
        let state = self.enter()?;
        Ok(state
            .progress
            .iter()
            .find(|p| p.challenge_id == challenge_id && p.user_id == user_id && p.is_complete)
            .map(|p| p.solution.clone())
            .filter(|s| !s.is_empty()))
    }
}

#[async_trait]
impl RecordApi for InMemoryBackend {
    async fn list_challenges(&self) -> anyhow::Result<Vec<Challenge>> {
        let state = self.enter()?;
        let mut challenges = state.challenges.clone();
        challenges.sort_by_key(|c| c.number);
        Ok(challenges)
    }

    async fn find_challenge(&self, number: u32) -> anyhow::Result<Option<Challenge>> {
        let state = self.enter()?;
        Ok(state.challenges.iter().find(|c| c.number == number).cloned())
    }

    async fn create_challenge(&self, input: &NewChallenge) -> anyhow::Result<Challenge> {
        let mut state = self.enter()?;
        input.validate().map_err(ApiError::from)?;
        state
            .check_unique_number(input.number)
            .map_err(ApiError::from)?;
        let id = state.next_id();
        let challenge = input.clone().into_record(id);
        state.challenges.push(challenge.clone());
        Ok(challenge)
    }

    async fn bulk_create_challenges(
        &self,
        inputs: &[NewChallenge],
    ) -> anyhow::Result<Vec<Challenge>> {
        let mut state = self.enter()?;
        let mut seen = Vec::with_capacity(inputs.len());
        for input in inputs {
            input.validate().map_err(ApiError::from)?;
            state
                .check_unique_number(input.number)
                .map_err(ApiError::from)?;
            if seen.contains(&input.number) {
                return Err(ApiError::from(ValidationError::NotUnique {
                    model: "challenge",
                    field: "challengeId",
                    value: input.number.to_string(),
                })
                .into());
            }
            seen.push(input.number);
        }

        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let id = state.next_id();
            let challenge = input.clone().into_record(id);
            state.challenges.push(challenge.clone());
            created.push(challenge);
        }
        Ok(created)
    }

    async fn list_foods(&self, exclude_category: Option<FoodCategory>) -> anyhow::Result<Vec<Food>> {
        let state = self.enter()?;
        Ok(state
            .foods
            .iter()
            .filter(|f| Some(f.category) != exclude_category)
            .cloned()
            .collect())
    }

    async fn create_food(&self, input: &NewFood) -> anyhow::Result<Food> {
        let mut state = self.enter()?;
        input.validate().map_err(ApiError::from)?;
        let food = Food {
            id: state.next_id(),
            name: input.name.clone(),
            category: input.category,
        };
        state.foods.push(food.clone());
        Ok(food)
    }

    async fn list_jellyfish(&self) -> anyhow::Result<Vec<Jellyfish>> {
        Ok(self.enter()?.jellyfish.clone())
    }

    async fn create_jellyfish(&self, input: &NewJellyfish) -> anyhow::Result<Jellyfish> {
        let mut state = self.enter()?;
        input.validate().map_err(ApiError::from)?;
        let jellyfish = Jellyfish {
            id: state.next_id(),
            name: input.name.clone(),
            kind: input.kind.clone(),
            age: input.age,
            length: input.length,
            weight: input.weight,
        };
        state.jellyfish.push(jellyfish.clone());
        Ok(jellyfish)
    }

    async fn list_homes(&self) -> anyhow::Result<Vec<Home>> {
        Ok(self.enter()?.homes.clone())
    }

    async fn create_home(&self, input: &NewHome) -> anyhow::Result<Home> {
        let mut state = self.enter()?;
        input.validate().map_err(ApiError::from)?;
        if let Some(jellyfish_id) = &input.jellyfish_id {
            state.require_jellyfish(jellyfish_id)?;
        }
        let home = Home {
            id: state.next_id(),
            reef_address: input.reef_address.clone(),
            ocean: input.ocean,
            jellyfish_id: input.jellyfish_id.clone(),
        };
        state.homes.push(home.clone());
        Ok(home)
    }

    async fn list_food_chains(&self) -> anyhow::Result<Vec<FoodChain>> {
        Ok(self.enter()?.food_chains.clone())
    }

    async fn create_food_chain(&self, input: &NewFoodChain) -> anyhow::Result<FoodChain> {
        let mut state = self.enter()?;
        if let Some(food_id) = &input.food_id {
            state.require_food(food_id)?;
        }
        if let Some(jellyfish_id) = &input.jellyfish_id {
            state.require_jellyfish(jellyfish_id)?;
        }
        let chain = FoodChain {
            id: state.next_id(),
            food_id: input.food_id.clone(),
            jellyfish_id: input.jellyfish_id.clone(),
        };
        state.food_chains.push(chain.clone());
        Ok(chain)
    }

    async fn set_jellyfish_foods(
        &self,
        jellyfish_id: &str,
        food_ids: &[String],
    ) -> anyhow::Result<Vec<String>> {
        let mut state = self.enter()?;
        state.require_jellyfish(jellyfish_id)?;
        for food_id in food_ids {
            state.require_food(food_id)?;
        }

        state
            .food_chains
            .retain(|chain| chain.jellyfish_id.as_deref() != Some(jellyfish_id));
        for food_id in food_ids {
            let chain = FoodChain {
                id: state.next_id(),
                food_id: Some(food_id.clone()),
                jellyfish_id: Some(jellyfish_id.to_string()),
            };
            state.food_chains.push(chain);
        }
        Ok(state.foods_of(jellyfish_id))
    }
}

#[async_trait]
impl SchemaSource for InMemoryBackend {
    async fn fetch_model_schemas(
        &self,
        model_names: &[String],
    ) -> anyhow::Result<Vec<ModelSchema>> {
        let state = self.enter()?;
        Ok(model_names
            .iter()
            .filter_map(|name| {
                state.schemas.get(name).map(|fields| ModelSchema {
                    model_name: name.clone(),
                    fields: fields.clone(),
                })
            })
            .collect())
    }
}
