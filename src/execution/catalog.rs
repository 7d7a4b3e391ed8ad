//! Exercise name lookups: running-pattern detection and demo video URLs.

/// Word prefixes that mark a timing-sport exercise.
const RUNNING_KEYWORDS: &[&str] = &[
    "sprint", "dash", "jog", "run", "meter", "metre", "mile", "relay", "hurdle", "shuttle",
    "stride",
];

/// Demo video per keyword; first match wins.
const VIDEO_TABLE: &[(&str, &str)] = &[
    ("sprint", "https://videos.repflow.app/sprint-mechanics.mp4"),
    ("hurdle", "https://videos.repflow.app/hurdle-drills.mp4"),
    ("dash", "https://videos.repflow.app/sprint-mechanics.mp4"),
    ("jump", "https://videos.repflow.app/jump-technique.mp4"),
    ("bound", "https://videos.repflow.app/plyometric-bounds.mp4"),
    ("squat", "https://videos.repflow.app/squat-form.mp4"),
    ("lunge", "https://videos.repflow.app/lunge-form.mp4"),
    ("deadlift", "https://videos.repflow.app/deadlift-form.mp4"),
    ("bench", "https://videos.repflow.app/bench-press.mp4"),
    ("push", "https://videos.repflow.app/push-up.mp4"),
    ("pull", "https://videos.repflow.app/pull-up.mp4"),
    ("plank", "https://videos.repflow.app/plank-hold.mp4"),
    ("throw", "https://videos.repflow.app/throwing-drills.mp4"),
    ("stretch", "https://videos.repflow.app/mobility-routine.mp4"),
    ("jog", "https://videos.repflow.app/easy-running.mp4"),
    ("run", "https://videos.repflow.app/easy-running.mp4"),
];

/// Fallback demo video.
pub const DEFAULT_VIDEO_URL: &str = "https://videos.repflow.app/general-training.mp4";

fn words(name: &str) -> impl Iterator<Item = String> + '_ {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Distance written as digits followed by "m", e.g. "60m".
fn is_metric_distance(word: &str) -> bool {
    word.strip_suffix('m')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

/// Whether an exercise is a running-pattern exercise.
///
/// Matches keyword prefixes on whole words, so "Jogging" matches but
/// "Crunch" does not.
pub fn is_running_exercise(name: &str) -> bool {
    words(name).any(|word| {
        is_metric_distance(&word) || RUNNING_KEYWORDS.iter().any(|k| word.starts_with(k))
    })
}

/// Demo video URL for an exercise name.
pub fn video_url(name: &str) -> &'static str {
    let lowered = name.to_lowercase();
    VIDEO_TABLE
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, url)| *url)
        .unwrap_or(DEFAULT_VIDEO_URL)
}
