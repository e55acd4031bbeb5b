//! Built-in discussion topics

use rand::seq::SliceRandom;

/// Topic offered before the user picks one
pub const DEFAULT_TOPIC: &str = "The future of AI";

/// Topics offered by the random pick
pub const TOPICS: &[&str] = &[
    "The impact of AI on society",
    "Climate change and its global effects",
    "The future of space exploration",
    "Ethics in technology",
    "The role of education in the 21st century",
    "The psychology of decision-making",
    "The history and evolution of music genres",
    "The impact of social media on mental health",
    "Sustainable living and eco-friendly practices",
    "The rise of remote work and its implications",
    "The science of sleep and dreams",
    "The philosophy of happiness",
    "The future of personalized medicine",
    "The influence of globalization on local cultures",
    "The art of storytelling across different mediums",
    "Cybersecurity in an increasingly connected world",
    "The challenges and opportunities of an aging global population",
    "The role of art in social commentary",
    "The ethics of genetic engineering",
    "The evolution of language",
    "The impact of diet on cognitive function",
    "The history of espionage and intelligence",
    "The future of transportation",
    "The concept of consciousness",
    "The importance of biodiversity",
];

/// Pick a topic uniformly at random
#[must_use]
pub fn random_topic() -> &'static str {
    TOPICS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_TOPIC)
}
