//! GraphQL client for a hosted gelly.fish environment.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use gellyfish_core::model::{
    Challenge, Food, FoodCategory, FoodChain, Home, Jellyfish, ModelSchema, NewChallenge,
    NewFood, NewFoodChain, NewHome, NewJellyfish, Ocean, ProgressRecord, ProgressUpsert,
    SchemaField,
};
use gellyfish_core::traits::{ProgressApi, QueryRunner, RecordApi, SchemaSource};

use crate::error::{ApiError, ConfigError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PAGE_SIZE: u32 = 250;

const CHALLENGE_FIELDS: &str =
    "id challengeId title backstory prompt hint hintLink solution expectedOutput";
const FOOD_FIELDS: &str = "id name category";
const JELLYFISH_FIELDS: &str = "id name type age length weight";
const HOME_FIELDS: &str = "id reefAddress ocean jellyfish { id }";
const FOOD_CHAIN_FIELDS: &str = "id food { id } jellyfish { id }";
const PROGRESS_FIELDS: &str = "id isComplete solution challenge { id } user { id }";

/// Client for the `/api/graphql` endpoint of one environment.
pub struct GadgetClient {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for GadgetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GadgetClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GadgetClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/api/graphql", self.base_url)
    }

    /// Send one GraphQL request and return its `data` object.
    async fn execute(&self, query: &str, variables: Value) -> anyhow::Result<Value> {
        let body = GraphQlRequest { query, variables };

        let mut request = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout.as_secs())
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthenticationFailed(body).into());
        }
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, message }.into());
        }

        let envelope: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let message = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::GraphQl(message).into());
        }

        envelope
            .data
            .ok_or_else(|| ApiError::Decode("response has no data".into()).into())
    }

    /// Fetch every node of a connection, following `pageInfo` cursors.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        field: &str,
        selection: &str,
        filter: Option<(&str, Value)>,
    ) -> anyhow::Result<Vec<T>> {
        let (filter_decl, filter_arg, filter_value) = match filter {
            Some((ty, value)) => (format!(", $filter: [{ty}!]"), ", filter: $filter", value),
            None => (String::new(), "", Value::Null),
        };
        let query = format!(
            "query($first: Int, $after: String{filter_decl}) {{ {field}(first: $first, after: $after{filter_arg}) {{ edges {{ node {{ {selection} }} }} pageInfo {{ hasNextPage endCursor }} }} }}"
        );

        let mut nodes = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut variables = json!({ "first": PAGE_SIZE, "after": after });
            if !filter_value.is_null() {
                variables["filter"] = filter_value.clone();
            }
            let data = self.execute(&query, variables).await?;
            let page: Connection<T> = take_field(data, field)?;
            nodes.extend(page.edges.into_iter().map(|edge| edge.node));
            match page.page_info {
                PageInfo {
                    has_next_page: true,
                    end_cursor: Some(cursor),
                } => after = Some(cursor),
                _ => break,
            }
        }
        tracing::debug!(field, count = nodes.len(), "fetched connection");
        Ok(nodes)
    }

    /// Run a model mutation and return its `record_field` payload.
    async fn mutate<T: DeserializeOwned>(
        &self,
        operation: &str,
        record_field: &str,
        query: &str,
        variables: Value,
    ) -> anyhow::Result<T> {
        let data = self.execute(query, variables).await?;
        let mut result: Value = take_field(data, operation)?;

        let success = result.get("success").and_then(Value::as_bool).unwrap_or(false);
        if !success {
            let message = result
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(|e| e.get("message").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ApiError::Mutation {
                operation: operation.to_string(),
                message,
            }
            .into());
        }

        take_field(result[record_field].take(), "")
    }
}

/// Deserialize `data[field]`, or `data` itself when `field` is empty.
fn take_field<T: DeserializeOwned>(mut data: Value, field: &str) -> anyhow::Result<T> {
    let value = if field.is_empty() {
        data
    } else {
        match data.get_mut(field) {
            Some(v) => v.take(),
            None => return Err(ApiError::Decode(format!("missing field `{field}`")).into()),
        }
    };
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()).into())
}

/// Model names end up inside the query text, so only identifiers pass.
fn check_model_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidModelName(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorBody>,
}

#[derive(Deserialize)]
struct GraphQlErrorBody {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    edges: Vec<Edge<T>>,
    page_info: PageInfo,
}

#[derive(Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HomeNode {
    id: String,
    reef_address: String,
    ocean: Option<Ocean>,
    jellyfish: Option<IdRef>,
}

impl From<HomeNode> for Home {
    fn from(node: HomeNode) -> Self {
        Home {
            id: node.id,
            reef_address: node.reef_address,
            ocean: node.ocean,
            jellyfish_id: node.jellyfish.map(|j| j.id),
        }
    }
}

#[derive(Deserialize)]
struct FoodChainNode {
    id: String,
    food: Option<IdRef>,
    jellyfish: Option<IdRef>,
}

impl From<FoodChainNode> for FoodChain {
    fn from(node: FoodChainNode) -> Self {
        FoodChain {
            id: node.id,
            food_id: node.food.map(|f| f.id),
            jellyfish_id: node.jellyfish.map(|j| j.id),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressNode {
    id: String,
    is_complete: bool,
    #[serde(default)]
    solution: Option<String>,
    challenge: Option<IdRef>,
    user: Option<IdRef>,
}

impl From<ProgressNode> for ProgressRecord {
    fn from(node: ProgressNode) -> Self {
        ProgressRecord {
            id: node.id,
            challenge_id: node.challenge.map(|c| c.id).unwrap_or_default(),
            user_id: node.user.map(|u| u.id).unwrap_or_default(),
            is_complete: node.is_complete,
            solution: node.solution.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct NamedNode {
    name: String,
}

#[derive(Deserialize)]
struct JellyfishFoodsNode {
    foods: Connection<NamedNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelMetaNode {
    fields: Vec<SchemaField>,
}

fn link(id: &Option<String>) -> Value {
    match id {
        Some(id) => json!({ "_link": id }),
        None => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl QueryRunner for GadgetClient {
    #[instrument(skip(self, query), fields(base_url = %self.base_url))]
    async fn run_gelly(&self, query: &str) -> anyhow::Result<Value> {
        let data = self
            .execute(
                "query($query: String!) { gellyView(query: $query) }",
                json!({ "query": query }),
            )
            .await?;
        take_field(data, "gellyView")
    }
}

#[async_trait]
impl ProgressApi for GadgetClient {
    #[instrument(skip(self, input), fields(challenge = %input.challenge_id, user = %input.user_id))]
    async fn upsert_progress(&self, input: &ProgressUpsert) -> anyhow::Result<ProgressRecord> {
        input.validate().map_err(ApiError::from)?;
        let query = format!(
            "mutation($progress: UpsertProgressInput, $on: [String!]) {{ upsertProgress(progress: $progress, on: $on) {{ success errors {{ message }} progress {{ {PROGRESS_FIELDS} }} }} }}"
        );
        let variables = json!({
            "progress": {
                "challenge": { "_link": input.challenge_id },
                "user": { "_link": input.user_id },
                "isComplete": input.is_complete,
                "solution": input.solution,
            },
            "on": ["challenge", "user"],
        });
        let node: ProgressNode = self
            .mutate("upsertProgress", "progress", &query, variables)
            .await?;
        Ok(node.into())
    }

    #[instrument(skip(self))]
    async fn completed_challenge_ids(&self, user_id: &str) -> anyhow::Result<Vec<String>> {
        let filter = json!([{
            "user": { "equals": user_id },
            "isComplete": { "equals": true },
        }]);
        let nodes: Vec<ProgressNode> = self
            .fetch_all("progresses", PROGRESS_FIELDS, Some(("ProgressFilter", filter)))
            .await?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| node.challenge.map(|c| c.id))
            .collect())
    }

    #[instrument(skip(self))]
    async fn find_solution(
        &self,
        challenge_id: &str,
        user_id: &str,
    ) -> anyhow::Result<Option<String>> {
        let query = format!(
            "query($filter: [ProgressFilter!]) {{ progresses(first: 1, filter: $filter) {{ edges {{ node {{ {PROGRESS_FIELDS} }} }} pageInfo {{ hasNextPage endCursor }} }} }}"
        );
        let variables = json!({
            "filter": [{
                "challenge": { "equals": challenge_id },
                "user": { "equals": user_id },
                "isComplete": { "equals": true },
            }]
        });
        let data = self.execute(&query, variables).await?;
        let page: Connection<ProgressNode> = take_field(data, "progresses")?;
        Ok(page
            .edges
            .into_iter()
            .next()
            .and_then(|edge| edge.node.solution)
            .filter(|s| !s.is_empty()))
    }
}

#[async_trait]
impl RecordApi for GadgetClient {
    #[instrument(skip(self))]
    async fn list_challenges(&self) -> anyhow::Result<Vec<Challenge>> {
        let mut challenges: Vec<Challenge> =
            self.fetch_all("challenges", CHALLENGE_FIELDS, None).await?;
        challenges.sort_by_key(|c| c.number);
        Ok(challenges)
    }

    #[instrument(skip(self))]
    async fn find_challenge(&self, number: u32) -> anyhow::Result<Option<Challenge>> {
        let query = format!(
            "query($filter: [ChallengeFilter!]) {{ challenges(first: 1, filter: $filter) {{ edges {{ node {{ {CHALLENGE_FIELDS} }} }} pageInfo {{ hasNextPage endCursor }} }} }}"
        );
        let variables = json!({ "filter": [{ "challengeId": { "equals": number } }] });
        let data = self.execute(&query, variables).await?;
        let page: Connection<Challenge> = take_field(data, "challenges")?;
        Ok(page.edges.into_iter().next().map(|edge| edge.node))
    }

    #[instrument(skip(self, input), fields(number = input.number))]
    async fn create_challenge(&self, input: &NewChallenge) -> anyhow::Result<Challenge> {
        input.validate().map_err(ApiError::from)?;
        let query = format!(
            "mutation($challenge: CreateChallengeInput) {{ createChallenge(challenge: $challenge) {{ success errors {{ message }} challenge {{ {CHALLENGE_FIELDS} }} }} }}"
        );
        self.mutate(
            "createChallenge",
            "challenge",
            &query,
            json!({ "challenge": input }),
        )
        .await
    }

    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    async fn bulk_create_challenges(
        &self,
        inputs: &[NewChallenge],
    ) -> anyhow::Result<Vec<Challenge>> {
        for input in inputs {
            input.validate().map_err(ApiError::from)?;
        }
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "mutation($inputs: [BulkCreateChallengesInput!]!) {{ bulkCreateChallenges(inputs: $inputs) {{ success errors {{ message }} challenges {{ {CHALLENGE_FIELDS} }} }} }}"
        );
        let wrapped: Vec<Value> = inputs.iter().map(|c| json!({ "challenge": c })).collect();
        self.mutate(
            "bulkCreateChallenges",
            "challenges",
            &query,
            json!({ "inputs": wrapped }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_foods(&self, exclude_category: Option<FoodCategory>) -> anyhow::Result<Vec<Food>> {
        let filter = exclude_category
            .map(|category| ("FoodFilter", json!([{ "category": { "notEquals": category } }])));
        self.fetch_all("foods", FOOD_FIELDS, filter).await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_food(&self, input: &NewFood) -> anyhow::Result<Food> {
        input.validate().map_err(ApiError::from)?;
        let query = format!(
            "mutation($food: CreateFoodInput) {{ createFood(food: $food) {{ success errors {{ message }} food {{ {FOOD_FIELDS} }} }} }}"
        );
        self.mutate("createFood", "food", &query, json!({ "food": input }))
            .await
    }

    #[instrument(skip(self))]
    async fn list_jellyfish(&self) -> anyhow::Result<Vec<Jellyfish>> {
        self.fetch_all("jellyfishes", JELLYFISH_FIELDS, None).await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_jellyfish(&self, input: &NewJellyfish) -> anyhow::Result<Jellyfish> {
        input.validate().map_err(ApiError::from)?;
        let query = format!(
            "mutation($jellyfish: CreateJellyfishInput) {{ createJellyfish(jellyfish: $jellyfish) {{ success errors {{ message }} jellyfish {{ {JELLYFISH_FIELDS} }} }} }}"
        );
        self.mutate(
            "createJellyfish",
            "jellyfish",
            &query,
            json!({ "jellyfish": input }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_homes(&self) -> anyhow::Result<Vec<Home>> {
        let nodes: Vec<HomeNode> = self.fetch_all("homes", HOME_FIELDS, None).await?;
        Ok(nodes.into_iter().map(Home::from).collect())
    }

    #[instrument(skip(self, input), fields(reef_address = %input.reef_address))]
    async fn create_home(&self, input: &NewHome) -> anyhow::Result<Home> {
        input.validate().map_err(ApiError::from)?;
        let query = format!(
            "mutation($home: CreateHomeInput) {{ createHome(home: $home) {{ success errors {{ message }} home {{ {HOME_FIELDS} }} }} }}"
        );
        let mut home = json!({ "reefAddress": input.reef_address, "ocean": input.ocean });
        if input.jellyfish_id.is_some() {
            home["jellyfish"] = link(&input.jellyfish_id);
        }
        let node: HomeNode = self
            .mutate("createHome", "home", &query, json!({ "home": home }))
            .await?;
        Ok(node.into())
    }

    #[instrument(skip(self))]
    async fn list_food_chains(&self) -> anyhow::Result<Vec<FoodChain>> {
        let nodes: Vec<FoodChainNode> =
            self.fetch_all("foodChains", FOOD_CHAIN_FIELDS, None).await?;
        Ok(nodes.into_iter().map(FoodChain::from).collect())
    }

    #[instrument(skip(self, input))]
    async fn create_food_chain(&self, input: &NewFoodChain) -> anyhow::Result<FoodChain> {
        let query = format!(
            "mutation($foodChain: CreateFoodChainInput) {{ createFoodChain(foodChain: $foodChain) {{ success errors {{ message }} foodChain {{ {FOOD_CHAIN_FIELDS} }} }} }}"
        );
        let mut chain = json!({});
        if input.food_id.is_some() {
            chain["food"] = link(&input.food_id);
        }
        if input.jellyfish_id.is_some() {
            chain["jellyfish"] = link(&input.jellyfish_id);
        }
        let node: FoodChainNode = self
            .mutate(
                "createFoodChain",
                "foodChain",
                &query,
                json!({ "foodChain": chain }),
            )
            .await?;
        Ok(node.into())
    }

    #[instrument(skip(self, food_ids), fields(foods = food_ids.len()))]
    async fn set_jellyfish_foods(
        &self,
        jellyfish_id: &str,
        food_ids: &[String],
    ) -> anyhow::Result<Vec<String>> {
        let query = "mutation($id: GadgetID!, $jellyfish: UpdateJellyfishInput) { updateJellyfish(id: $id, jellyfish: $jellyfish) { success errors { message } jellyfish { foods { edges { node { name } } pageInfo { hasNextPage endCursor } } } } }";
        let foods: Vec<Value> = food_ids
            .iter()
            .map(|id| json!({ "update": { "id": id } }))
            .collect();
        let variables = json!({ "id": jellyfish_id, "jellyfish": { "foods": foods } });
        let node: JellyfishFoodsNode = self
            .mutate("updateJellyfish", "jellyfish", query, variables)
            .await?;
        Ok(node.foods.edges.into_iter().map(|e| e.node.name).collect())
    }
}

#[async_trait]
impl SchemaSource for GadgetClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_model_schemas(
        &self,
        model_names: &[String],
    ) -> anyhow::Result<Vec<ModelSchema>> {
        if model_names.is_empty() {
            return Ok(Vec::new());
        }
        for name in model_names {
            check_model_name(name)?;
        }

        let selections = model_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                format!("model{i}: model(apiIdentifier: \"{name}\") {{ fields {{ name fieldType }} }}")
            })
            .collect::<Vec<_>>()
            .join(" ");
        let query = format!("query {{ gadgetMeta {{ {selections} }} }}");

        let data = self.execute(&query, json!({})).await?;
        let mut meta: serde_json::Map<String, Value> = take_field(data, "gadgetMeta")?;

        let mut schemas = Vec::new();
        for (i, name) in model_names.iter().enumerate() {
            let Some(raw) = meta.remove(&format!("model{i}")) else {
                continue;
            };
            if raw.is_null() {
                tracing::debug!(model = %name, "model not found");
                continue;
            }
            let node: ModelMetaNode = take_field(raw, "")?;
            schemas.push(ModelSchema {
                model_name: name.clone(),
                fields: node.fields,
            });
        }
        Ok(schemas)
    }
}
