//! Random food assignment for the demo jellyfish.

use anyhow::{Context, Result};
use rand::Rng;
use uuid::Uuid;

use gellyfish_core::model::FoodCategory;
use gellyfish_core::report::{AssignReport, FoodAssignment};
use gellyfish_core::traits::RecordApi;

/// Largest number of foods given to one jellyfish.
pub const MAX_FOODS_PER_JELLYFISH: usize = 3;

/// Pick `max(1, min(X, pool_size))` distinct indices into a pool of
/// `pool_size`, with X drawn uniformly from `1..=MAX_FOODS_PER_JELLYFISH`.
///
/// Returns nothing for an empty pool.
pub fn pick_food_indices<R: Rng + ?Sized>(pool_size: usize, rng: &mut R) -> Vec<usize> {
    if pool_size == 0 {
        return Vec::new();
    }
    let wanted = rng.gen_range(1..=MAX_FOODS_PER_JELLYFISH);

    // Fisher-Yates
    let mut pool: Vec<usize> = (0..pool_size).collect();
    for i in (1..pool.len()).rev() {
        let j = rng.gen_range(0..=i);
        pool.swap(i, j);
    }

    pool.truncate(wanted.min(pool_size).max(1));
    pool
}

/// Give every jellyfish between one and three random non-plant foods,
/// replacing the foods it had.
///
/// Foods may be shared between jellyfish. When there are no non-plant
/// foods every jellyfish is skipped with a warning.
pub async fn assign_foods<R: Rng + Send + ?Sized>(
    api: &dyn RecordApi,
    rng: &mut R,
) -> Result<AssignReport> {
    let run_id = Uuid::new_v4();
    let jellies = api
        .list_jellyfish()
        .await
        .context("failed to list jellyfish")?;
    let foods = api
        .list_foods(Some(FoodCategory::Plant))
        .await
        .context("failed to list foods")?;

    let mut assignments = Vec::with_capacity(jellies.len());
    let mut skipped = Vec::new();

    for jelly in &jellies {
        if foods.is_empty() {
            tracing::warn!(
                jelly = %jelly.id,
                jelly_name = %jelly.name,
                "no foods available to assign"
            );
            skipped.push(jelly.id.clone());
            continue;
        }

        let food_ids: Vec<String> = pick_food_indices(foods.len(), rng)
            .into_iter()
            .map(|i| foods[i].id.clone())
            .collect();

        let food_names = api
            .set_jellyfish_foods(&jelly.id, &food_ids)
            .await
            .with_context(|| format!("failed to update jellyfish {}", jelly.id))?;

        tracing::info!(
            jelly = %jelly.id,
            jelly_name = %jelly.name,
            foods = ?food_names,
            "assigned foods"
        );
        assignments.push(FoodAssignment {
            jellyfish_id: jelly.id.clone(),
            jellyfish_name: jelly.name.clone(),
            food_names,
        });
    }

    tracing::info!(
        total_jellies = jellies.len(),
        total_foods = foods.len(),
        "food assignment completed"
    );

    Ok(AssignReport {
        run_id,
        total_jellies: jellies.len(),
        total_foods: foods.len(),
        assignments,
        skipped,
    })
}
