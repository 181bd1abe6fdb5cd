// Pair Selector - two unvoted characters of the same gender
//
// Strategy:
// 1. Hinted gender, or a uniformly random one
// 2. The opposite gender when the first has fewer than two eligible
// 3. Otherwise reset the epoch and hand back nothing; the client asks again
//
// At most three store queries per call.

use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::character::{Character, Gender};
use crate::error::RankingResult;
use crate::store::Store;

const PAIR_SIZE: usize = 2;

/// Two distinct characters to vote on, or nothing if the epoch just reset
pub type Pair = Option<[Character; 2]>;

fn pick_gender(hint: Option<Gender>) -> Gender {
    hint.or_else(|| Gender::ALL.choose(&mut rand::thread_rng()).copied())
        .unwrap_or(Gender::Female)
}

async fn sample_pair(store: &Store, gender: Gender) -> RankingResult<Pair> {
    let pivot: f64 = rand::random();
    let sampled = store.sample_eligible(gender, pivot, PAIR_SIZE).await?;

    Ok(<[Character; 2]>::try_from(sampled).ok())
}

pub async fn select_pair(store: &Store, hint: Option<Gender>) -> RankingResult<Pair> {
    let gender = pick_gender(hint);

    if let Some(pair) = sample_pair(store, gender).await? {
        return Ok(Some(pair));
    }

    let opposite = gender.opposite();
    debug!(%gender, %opposite, "not enough eligible characters, trying opposite gender");

    if let Some(pair) = sample_pair(store, opposite).await? {
        return Ok(Some(pair));
    }

    let cleared = store.reset_epoch().await?;
    info!(cleared, "no eligible pair left, voting epoch reset");

    Ok(None)
}
