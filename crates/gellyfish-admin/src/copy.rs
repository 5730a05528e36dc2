//! Copy every record from one environment into another.

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use gellyfish_core::model::{NewChallenge, NewFood, NewFoodChain, NewHome, NewJellyfish};
use gellyfish_core::report::{CopyReport, IdMaps, ModelCounts};
use gellyfish_core::traits::RecordApi;

/// A named environment taking part in a copy.
#[derive(Clone, Copy)]
pub struct Endpoint<'a> {
    pub name: &'a str,
    pub api: &'a dyn RecordApi,
}

impl<'a> Endpoint<'a> {
    pub fn new(name: &'a str, api: &'a dyn RecordApi) -> Self {
        Self { name, api }
    }
}

/// Look up the target id of a linked record. Links whose record was not
/// copied are dropped.
fn remap(
    map: &std::collections::BTreeMap<String, String>,
    id: Option<&String>,
    model: &str,
) -> Option<String> {
    let id = id?;
    let mapped = map.get(id).cloned();
    if mapped.is_none() {
        tracing::warn!(model, source_id = %id, "linked record was not copied, dropping link");
    }
    mapped
}

/// Copy challenges, foods, jellyfish, homes and food chains from `source`
/// to `target`.
///
/// Records are created in dependency order so that links can be rewritten
/// to the new ids. The copy is not idempotent: running it twice creates
/// the records twice (or fails on unique challenge numbers). The first
/// failed write aborts the run.
pub async fn copy_environment(source: Endpoint<'_>, target: Endpoint<'_>) -> Result<CopyReport> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    tracing::info!(%run_id, source = source.name, target = target.name, "starting data copy");

    let (challenges, foods, jellyfish, homes, food_chains) = tokio::try_join!(
        source.api.list_challenges(),
        source.api.list_foods(None),
        source.api.list_jellyfish(),
        source.api.list_homes(),
        source.api.list_food_chains(),
    )
    .with_context(|| format!("failed to fetch records from {}", source.name))?;

    let counts = ModelCounts {
        challenges: challenges.len(),
        foods: foods.len(),
        jellyfish: jellyfish.len(),
        homes: homes.len(),
        food_chains: food_chains.len(),
    };
    tracing::info!(?counts, "fetched records from {}", source.name);

    let mut id_maps = IdMaps::default();

    for challenge in &challenges {
        let created = target
            .api
            .create_challenge(&NewChallenge::from(challenge))
            .await
            .with_context(|| format!("failed to create challenge {}", challenge.number))?;
        id_maps.challenge.insert(challenge.id.clone(), created.id);
    }
    tracing::info!("created {} challenges", challenges.len());

    for food in &foods {
        let created = target
            .api
            .create_food(&NewFood {
                name: food.name.clone(),
                category: food.category,
            })
            .await
            .with_context(|| format!("failed to create food {}", food.name))?;
        id_maps.food.insert(food.id.clone(), created.id);
    }
    tracing::info!("created {} foods", foods.len());

    for jelly in &jellyfish {
        let created = target
            .api
            .create_jellyfish(&NewJellyfish::from(jelly))
            .await
            .with_context(|| format!("failed to create jellyfish {}", jelly.name))?;
        id_maps.jellyfish.insert(jelly.id.clone(), created.id);
    }
    tracing::info!("created {} jellyfish", jellyfish.len());

    for home in &homes {
        let input = NewHome {
            reef_address: home.reef_address.clone(),
            ocean: home.ocean,
            jellyfish_id: remap(&id_maps.jellyfish, home.jellyfish_id.as_ref(), "jellyfish"),
        };
        let created = target
            .api
            .create_home(&input)
            .await
            .with_context(|| format!("failed to create home {}", home.reef_address))?;
        id_maps.home.insert(home.id.clone(), created.id);
    }
    tracing::info!("created {} homes", homes.len());

    for chain in &food_chains {
        let input = NewFoodChain {
            food_id: remap(&id_maps.food, chain.food_id.as_ref(), "food"),
            jellyfish_id: remap(&id_maps.jellyfish, chain.jellyfish_id.as_ref(), "jellyfish"),
        };
        let created = target
            .api
            .create_food_chain(&input)
            .await
            .with_context(|| format!("failed to create food chain {}", chain.id))?;
        id_maps.food_chain.insert(chain.id.clone(), created.id);
    }
    tracing::info!("created {} food chains", food_chains.len());

    let report = CopyReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        source: source.name.to_string(),
        target: target.name.to_string(),
        success: true,
        counts,
        id_maps,
    };
    tracing::info!(%run_id, "data copy completed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gellyfish_client::InMemoryBackend;
    use gellyfish_core::model::{FoodCategory, Ocean};

    async fn populated_source() -> InMemoryBackend {
        let source = InMemoryBackend::new();
        source
            .create_challenge(&NewChallenge {
                number: 1,
                title: "Census".into(),
                backstory: "The reef census is due.".into(),
                prompt: "How many jellyfish are there?".into(),
                hint: "Use count".into(),
                hint_link: "https://docs.gadget.dev/guides/data-access/gelly".into(),
                solution: "view { count(jellyfishes) }".into(),
                expected_output: Some("count: 1".into()),
            })
            .await
            .unwrap();
        let krill = source
            .create_food(&NewFood {
                name: "Krill".into(),
                category: FoodCategory::Meat,
            })
            .await
            .unwrap();
        let moon = source
            .create_jellyfish(&NewJellyfish {
                name: "Moon".into(),
                kind: "Aurelia".into(),
                age: 2,
                length: 12.5,
                weight: 0.4,
            })
            .await
            .unwrap();
        source
            .create_home(&NewHome {
                reef_address: "12 Coral Way".into(),
                ocean: Some(Ocean::Pacific),
                jellyfish_id: Some(moon.id.clone()),
            })
            .await
            .unwrap();
        source
            .create_food_chain(&NewFoodChain {
                food_id: Some(krill.id),
                jellyfish_id: Some(moon.id),
            })
            .await
            .unwrap();
        source
    }

    #[tokio::test]
    async fn copies_records_and_remaps_links() {
        let source = populated_source().await;
        let target = InMemoryBackend::new().with_id_offset(1000);

        let report = copy_environment(
            Endpoint::new("development", &source),
            Endpoint::new("production", &target),
        )
        .await
        .unwrap();

        assert!(report.success);
        assert_eq!(report.counts.challenges, 1);
        assert_eq!(report.counts.food_chains, 1);
        assert_eq!(report.source, "development");

        let source_moon = &source.list_jellyfish().await.unwrap()[0];
        let target_moon = &target.list_jellyfish().await.unwrap()[0];
        assert_ne!(source_moon.id, target_moon.id);
        assert_eq!(report.id_maps.jellyfish[&source_moon.id], target_moon.id);

        let home = &target.list_homes().await.unwrap()[0];
        assert_eq!(home.jellyfish_id.as_ref(), Some(&target_moon.id));
        assert_eq!(target.foods_of(&target_moon.id), vec!["Krill"]);
        assert_eq!(
            target.find_challenge(1).await.unwrap().unwrap().expected_output.as_deref(),
            Some("count: 1")
        );
    }

    #[tokio::test]
    async fn write_failure_aborts_the_copy() {
        let source = populated_source().await;
        let target = InMemoryBackend::new();
        target.set_failure(Some("connection reset"));

        let err = copy_environment(
            Endpoint::new("development", &source),
            Endpoint::new("production", &target),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("failed to create challenge 1"));
    }

    #[tokio::test]
    async fn copying_twice_hits_unique_challenge_numbers() {
        let source = populated_source().await;
        let target = InMemoryBackend::new();

        copy_environment(
            Endpoint::new("development", &source),
            Endpoint::new("production", &target),
        )
        .await
        .unwrap();
        let err = copy_environment(
            Endpoint::new("development", &source),
            Endpoint::new("production", &target),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("must be unique"));
    }
}
