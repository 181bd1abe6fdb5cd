// Ranking & Stats Aggregator - read-only views over the store
//
// The top view is capped by raw wins in the store and only then re-sorted by
// win ratio. A character with a perfect but short record can only outrank
// busier ones if it already made the top 100 by wins.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::character::{Character, Gender, KNOWN_RACES, LEADERBOARD_LIMIT};
use crate::db::GroupColumn;
use crate::error::{RankingError, RankingResult};
use crate::store::Store;

// ============================================================================
// TOP FILTER
// ============================================================================

/// Exact, case-insensitive filters for the top view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopFilter {
    pub race: Option<String>,
    pub bloodline: Option<String>,
    pub gender: Option<Gender>,
}

impl TopFilter {
    pub const KEYS: [&'static str; 3] = ["race", "bloodline", "gender"];

    /// Build from raw query parameters. Unknown keys are rejected, blank
    /// values leave that attribute unfiltered.
    pub fn from_params(params: &HashMap<String, String>) -> RankingResult<Self> {
        let mut filter = TopFilter::default();

        for (key, value) in params {
            let value = value.trim();
            if !Self::KEYS.contains(&key.as_str()) {
                return Err(RankingError::InvalidInput(format!(
                    "Unknown filter '{}', expected one of: {}.",
                    key,
                    Self::KEYS.join(", ")
                )));
            }
            if value.is_empty() {
                continue;
            }

            match key.as_str() {
                "race" => filter.race = Some(value.to_string()),
                "bloodline" => filter.bloodline = Some(value.to_string()),
                _ => filter.gender = Some(value.parse()?),
            }
        }

        Ok(filter)
    }

    /// (column, value) pairs for the active filters
    pub fn conditions(&self) -> Vec<(&'static str, String)> {
        let mut conditions = Vec::new();
        if let Some(race) = &self.race {
            conditions.push(("race", race.clone()));
        }
        if let Some(bloodline) = &self.bloodline {
            conditions.push(("bloodline", bloodline.clone()));
        }
        if let Some(gender) = self.gender {
            conditions.push(("gender", gender.as_str().to_string()));
        }
        conditions
    }
}

// ============================================================================
// LEADERBOARDS
// ============================================================================

/// Most losses first
pub async fn bottom(store: &Store) -> RankingResult<Vec<Character>> {
    store.by_losses(LEADERBOARD_LIMIT).await
}

/// Best win ratio first, among the top characters by wins
pub async fn top(store: &Store, filter: TopFilter) -> RankingResult<Vec<Character>> {
    let mut characters = store.by_wins(filter, LEADERBOARD_LIMIT).await?;
    rank_by_ratio(&mut characters);
    Ok(characters)
}

/// Stable sort, so equal ratios keep their win-count order
pub fn rank_by_ratio(characters: &mut [Character]) {
    characters.sort_by(|a, b| b.win_ratio().total_cmp(&a.win_ratio()));
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leader {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_count: i64,
    pub race_counts: BTreeMap<String, i64>,
    pub gender_counts: BTreeMap<String, i64>,
    pub total_votes: i64,
    /// Most common race among the top characters by wins
    pub leading_race: Option<Leader>,
    /// Most common bloodline among the top characters by wins
    pub leading_bloodline: Option<Leader>,
}

/// Most frequent value. Ties go to whichever value appeared first.
pub fn most_frequent<'a, I>(values: I) -> Option<Leader>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut leader: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if leader.map_or(true, |(_, best)| count > best) {
            leader = Some((value, count));
        }
    }

    leader.map(|(value, count)| Leader {
        value: value.to_string(),
        count,
    })
}

pub async fn stats(store: &Store) -> RankingResult<Stats> {
    let (total_count, races, genders, total_votes, leaders) = tokio::try_join!(
        store.count(),
        store.count_grouped_by(GroupColumn::Race),
        store.count_grouped_by(GroupColumn::Gender),
        store.total_votes(),
        store.by_wins(TopFilter::default(), LEADERBOARD_LIMIT),
    )?;

    let mut race_counts: BTreeMap<String, i64> =
        KNOWN_RACES.iter().map(|race| (race.to_string(), 0)).collect();
    race_counts.extend(races);

    let mut gender_counts: BTreeMap<String, i64> = Gender::ALL
        .iter()
        .map(|gender| (gender.as_str().to_string(), 0))
        .collect();
    gender_counts.extend(genders);

    Ok(Stats {
        total_count,
        race_counts,
        gender_counts,
        total_votes,
        leading_race: most_frequent(leaders.iter().map(|c| c.race.as_str())),
        leading_bloodline: most_frequent(leaders.iter().map(|c| c.bloodline.as_str())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::tests::sample_character;
    use crate::character::CharacterId;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_rank_by_ratio_prefers_perfect_record() {
        let mut characters = vec![sample_character(1, 9, 1), sample_character(2, 2, 0)];
        rank_by_ratio(&mut characters);

        let ids: Vec<CharacterId> = characters.iter().map(|c| c.character_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_rank_by_ratio_is_stable() {
        let mut characters = vec![
            sample_character(1, 4, 4),
            sample_character(2, 0, 0),
            sample_character(3, 2, 2),
            sample_character(4, 1, 1),
        ];
        rank_by_ratio(&mut characters);

        let ids: Vec<CharacterId> = characters.iter().map(|c| c.character_id).collect();
        assert_eq!(ids, vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_filter_from_params() {
        let filter = TopFilter::from_params(&params(&[("race", "amarr"), ("gender", "male")])).unwrap();
        assert_eq!(filter.race.as_deref(), Some("amarr"));
        assert_eq!(filter.gender, Some(Gender::Male));
        assert_eq!(filter.bloodline, None);

        let blank = TopFilter::from_params(&params(&[("bloodline", "  ")])).unwrap();
        assert_eq!(blank, TopFilter::default());
    }

    #[test]
    fn test_filter_rejects_unknown_keys_and_genders() {
        assert!(matches!(
            TopFilter::from_params(&params(&[("wins", "10")])),
            Err(RankingError::InvalidInput(_))
        ));
        assert!(matches!(
            TopFilter::from_params(&params(&[("gender", "robot")])),
            Err(RankingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_most_frequent_ties_go_to_first_seen() {
        let leader = most_frequent(["Gallente", "Amarr", "Amarr", "Gallente", "Caldari"]).unwrap();
        assert_eq!(leader.value, "Gallente");
        assert_eq!(leader.count, 2);

        let leader = most_frequent(["Caldari", "Amarr", "Amarr"]).unwrap();
        assert_eq!(leader.value, "Amarr");

        assert!(most_frequent(Vec::<&str>::new()).is_none());
    }

    async fn store_with(characters: Vec<Character>) -> Store {
        let store = Store::open_in_memory().unwrap();
        for character in characters {
            store.insert(character).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_top_sorts_by_ratio() {
        let store = store_with(vec![sample_character(1, 9, 1), sample_character(2, 2, 0)]).await;

        let top = top(&store, TopFilter::default()).await.unwrap();
        assert_eq!(top[0].character_id, 2);
        assert_eq!(top[1].character_id, 1);
    }

    #[tokio::test]
    async fn test_top_only_ranks_capped_candidates() {
        let mut characters: Vec<Character> = (1..=100).map(|id| sample_character(id, 10, 5)).collect();
        // Perfect record, but too few wins to make the store-level cut
        characters.push(sample_character(500, 1, 0));
        let store = store_with(characters).await;

        let top = top(&store, TopFilter::default()).await.unwrap();
        assert_eq!(top.len(), LEADERBOARD_LIMIT);
        assert!(top.iter().all(|c| c.character_id != 500));
    }

    #[tokio::test]
    async fn test_top_filters_case_insensitively() {
        let mut amarr = sample_character(1, 1, 0);
        amarr.race = "Amarr".to_string();
        let store = store_with(vec![amarr, sample_character(2, 5, 0)]).await;

        let filter = TopFilter::from_params(&params(&[("race", "AMARR")])).unwrap();
        let top = top(&store, filter).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].character_id, 1);
    }

    #[tokio::test]
    async fn test_bottom_orders_by_losses() {
        let store = store_with(vec![
            sample_character(1, 0, 2),
            sample_character(2, 0, 7),
            sample_character(3, 5, 0),
        ])
        .await;

        let ids: Vec<CharacterId> = bottom(&store)
            .await
            .unwrap()
            .iter()
            .map(|c| c.character_id)
            .collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_stats() {
        let mut amarr = sample_character(1, 6, 0);
        amarr.race = "Amarr".to_string();
        amarr.bloodline = "Khanid".to_string();
        let mut male = sample_character(2, 3, 2);
        male.gender = Gender::Male;
        let mut jove = sample_character(3, 1, 1);
        jove.race = "Jove".to_string();
        let store = store_with(vec![amarr, male, jove]).await;

        let stats = stats(&store).await.unwrap();
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.total_votes, 10);
        assert_eq!(stats.race_counts["Amarr"], 1);
        assert_eq!(stats.race_counts["Caldari"], 1);
        assert_eq!(stats.race_counts["Gallente"], 0);
        assert_eq!(stats.race_counts["Minmatar"], 0);
        assert_eq!(stats.race_counts["Jove"], 1);
        assert_eq!(stats.gender_counts["Female"], 2);
        assert_eq!(stats.gender_counts["Male"], 1);

        // Top order by wins is Amarr/Khanid, Caldari/Deteis, Jove/Deteis
        let race = stats.leading_race.unwrap();
        assert_eq!((race.value.as_str(), race.count), ("Amarr", 1));
        let bloodline = stats.leading_bloodline.unwrap();
        assert_eq!((bloodline.value.as_str(), bloodline.count), ("Deteis", 2));
    }

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let store = Store::open_in_memory().unwrap();
        let stats = stats(&store).await.unwrap();

        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.total_votes, 0);
        assert_eq!(stats.race_counts.len(), 4);
        assert!(stats.leading_race.is_none());
        assert!(stats.leading_bloodline.is_none());
    }
}
