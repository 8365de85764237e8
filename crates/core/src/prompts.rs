//! Conversation-starter selection: the built-in topic catalog, question
//! templates, and the weighted choices the scheduled poster makes.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use crate::domain::topic::TopicCategory;

const TOPIC_CATALOG_JSON: &str = include_str!("../assets/topics.json");

/// Templates take the target mention as their only argument.
const QUESTION_TEMPLATES: [&str; 5] = [
    "{user}さん、最近取り組んでいるプロジェクトで面白いことはありますか？🤔",
    "{user}さん、最近学んだ技術や知識で、チームにシェアしたいことはありますか？📖",
    "{user}さん、最近の開発で工夫したポイントや、うまくいったことを教えてください！💡",
    "{user}さん、今取り組んでいる課題や、アドバイスが欲しいことはありますか？🤝",
    "{user}さん、最近読んだ技術記事や本でおすすめはありますか？📚",
];

/// Candidates beyond this rank are never picked, keeping question targets
/// varied while still favouring the least-recently-asked members.
const TARGET_CANDIDATE_POOL: usize = 3;

#[derive(Clone, Debug, Deserialize)]
pub struct TopicSeed {
    pub content: String,
    pub reaction_emoji: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TopicCatalog {
    pub casual_topics: Vec<TopicSeed>,
    pub technical_topics: Vec<TopicSeed>,
}

impl TopicCatalog {
    /// Catalog embedded at build time.
    pub fn builtin() -> Result<Self, serde_json::Error> {
        serde_json::from_str(TOPIC_CATALOG_JSON)
    }

    pub fn seeds(&self, category: TopicCategory) -> &[TopicSeed] {
        match category {
            TopicCategory::Casual => &self.casual_topics,
            TopicCategory::Technical => &self.technical_topics,
        }
    }

    /// Picks a category at even odds, then a seed within it.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(TopicCategory, &TopicSeed)> {
        let category =
            *[TopicCategory::Casual, TopicCategory::Technical].choose(rng)?;
        self.seeds(category).choose(rng).map(|seed| (category, seed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostKind {
    Topic,
    Question,
}

/// Weighted choice between a plain topic and a member question.
pub fn choose_post_kind<R: Rng + ?Sized>(rng: &mut R, question_weight: f64) -> PostKind {
    if rng.gen_bool(question_weight.clamp(0.0, 1.0)) {
        PostKind::Question
    } else {
        PostKind::Topic
    }
}

/// Renders one of the question templates with the target's mention.
pub fn question_text<R: Rng + ?Sized>(rng: &mut R, user_id: &str) -> String {
    let template = QUESTION_TEMPLATES
        .choose(rng)
        .unwrap_or(&QUESTION_TEMPLATES[0]);
    template.replace("{user}", &format!("<@{user_id}>"))
}

/// Picks the question target from `(user_id, recent_question_count)` pairs.
/// The least-questioned members rank first; one of the top candidates is
/// chosen at random.
pub fn select_question_target<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[(String, usize)],
) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let mut ranked: Vec<&(String, usize)> = candidates.iter().collect();
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TARGET_CANDIDATE_POOL);
    ranked.choose(rng).map(|(user_id, _)| user_id.clone())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{
        choose_post_kind, question_text, select_question_target, PostKind, TopicCatalog,
    };
    use crate::domain::topic::TopicCategory;

    #[test]
    fn builtin_catalog_parses_and_is_populated() {
        let catalog = TopicCatalog::builtin().expect("embedded catalog");
        assert!(!catalog.casual_topics.is_empty());
        assert!(!catalog.technical_topics.is_empty());
        for seed in catalog.seeds(TopicCategory::Technical) {
            assert!(!seed.content.is_empty());
            assert!(!seed.reaction_emoji.is_empty());
        }
    }

    #[test]
    fn pick_returns_a_seed_from_the_chosen_category() {
        let catalog = TopicCatalog::builtin().expect("embedded catalog");
        let mut rng = StdRng::seed_from_u64(7);
        let (category, seed) = catalog.pick(&mut rng).expect("non-empty catalog");
        assert!(catalog.seeds(category).iter().any(|s| s.content == seed.content));
    }

    #[test]
    fn post_kind_weights_are_respected_at_the_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(choose_post_kind(&mut rng, 0.0), PostKind::Topic);
        assert_eq!(choose_post_kind(&mut rng, 1.0), PostKind::Question);
    }

    #[test]
    fn question_text_mentions_the_target() {
        let mut rng = StdRng::seed_from_u64(7);
        let text = question_text(&mut rng, "U123");
        assert!(text.contains("<@U123>さん"));
    }

    #[test]
    fn least_questioned_members_are_preferred() {
        let candidates = vec![
            ("U_BUSY".to_owned(), 9),
            ("U_A".to_owned(), 0),
            ("U_B".to_owned(), 1),
            ("U_C".to_owned(), 2),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let target = select_question_target(&mut rng, &candidates).expect("candidates");
            assert_ne!(target, "U_BUSY");
        }
    }

    #[test]
    fn no_candidates_means_no_target() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(select_question_target(&mut rng, &[]), None);
    }
}
