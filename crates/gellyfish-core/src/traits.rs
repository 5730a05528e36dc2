//! Core trait definitions for the hosted backend.
//!
//! These async traits are implemented by the GraphQL client and the
//! in-memory backend in `gellyfish-client`. They are split by concern so
//! that the progress store, the schema cache, and the admin actions each
//! depend only on the calls they make.

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{
    Challenge, Food, FoodCategory, FoodChain, Home, Jellyfish, ModelSchema, NewChallenge,
    NewFood, NewFoodChain, NewHome, NewJellyfish, ProgressRecord, ProgressUpsert,
};

// ---------------------------------------------------------------------------
// Query execution
// ---------------------------------------------------------------------------

/// Runs learner-submitted Gelly queries.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Execute a Gelly `view` query and return its JSON result.
    async fn run_gelly(&self, query: &str) -> anyhow::Result<Value>;
}

// ---------------------------------------------------------------------------
// Progress records
// ---------------------------------------------------------------------------

/// Account-backed progress records.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// Create or update the record keyed on `(challenge_id, user_id)`.
    async fn upsert_progress(&self, input: &ProgressUpsert) -> anyhow::Result<ProgressRecord>;

    /// Record ids of the challenges `user_id` has completed.
    async fn completed_challenge_ids(&self, user_id: &str) -> anyhow::Result<Vec<String>>;

    /// The stored solution of a completed challenge, if any.
    async fn find_solution(
        &self,
        challenge_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// Model records
// ---------------------------------------------------------------------------

/// CRUD access to the tutorial and demo-domain records.
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// All challenges, ordered by number.
    async fn list_challenges(&self) -> anyhow::Result<Vec<Challenge>>;

    /// The challenge with the given number.
    async fn find_challenge(&self, number: u32) -> anyhow::Result<Option<Challenge>>;

    async fn create_challenge(&self, input: &NewChallenge) -> anyhow::Result<Challenge>;

    /// Create many challenges in one call. All-or-nothing.
    async fn bulk_create_challenges(&self, inputs: &[NewChallenge])
        -> anyhow::Result<Vec<Challenge>>;

    /// All foods, optionally leaving out one category.
    async fn list_foods(&self, exclude_category: Option<FoodCategory>)
        -> anyhow::Result<Vec<Food>>;

    async fn create_food(&self, input: &NewFood) -> anyhow::Result<Food>;

    async fn list_jellyfish(&self) -> anyhow::Result<Vec<Jellyfish>>;

    async fn create_jellyfish(&self, input: &NewJellyfish) -> anyhow::Result<Jellyfish>;

    async fn list_homes(&self) -> anyhow::Result<Vec<Home>>;

    async fn create_home(&self, input: &NewHome) -> anyhow::Result<Home>;

    async fn list_food_chains(&self) -> anyhow::Result<Vec<FoodChain>>;

    async fn create_food_chain(&self, input: &NewFoodChain) -> anyhow::Result<FoodChain>;

    /// Replace the foods of a jellyfish. Returns the names of its foods
    /// after the update.
    async fn set_jellyfish_foods(
        &self,
        jellyfish_id: &str,
        food_ids: &[String],
    ) -> anyhow::Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Schema introspection
// ---------------------------------------------------------------------------

/// Fetches model field lists for the schema viewer.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Field lists for the named models. Unknown models are left out of
    /// the result rather than failing the whole call.
    async fn fetch_model_schemas(&self, model_names: &[String])
        -> anyhow::Result<Vec<ModelSchema>>;
}

/// Everything the hosted backend offers.
pub trait Backend: QueryRunner + ProgressApi + RecordApi + SchemaSource {}

impl<T> Backend for T where T: QueryRunner + ProgressApi + RecordApi + SchemaSource {}
