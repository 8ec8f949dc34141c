use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::Note;

const READING_WPM: f64 = 200.0;
const SPEAKING_WPM: f64 = 150.0;
const WRITING_WPM: f64 = 25.0;
const TOP_WORDS: usize = 3;

/// Characters trimmed from both ends of a word before it is counted
const WORD_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '(', ')', '[', ']', '{', '}'];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "i", "you", "he", "she", "it", "we", "they", "this", "that", "these",
    "those",
];

/// Writing statistics for a single note.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteStats {
    pub title: String,
    pub chars: usize,
    pub chars_no_spaces: usize,
    pub words: usize,
    pub unique_words: usize,
    pub lines: usize,
    pub paragraphs: usize,
    pub sentences: usize,
    pub dialogue_lines: usize,
    pub average_word_length: f64,
    pub average_sentence_length: f64,
    pub lexical_diversity: f64,
    pub reading_time_minutes: f64,
    pub speaking_time_minutes: f64,
    pub estimated_writing_time_minutes: f64,
    /// Up to three `(word, count)` pairs, most frequent first
    pub most_common_words: Vec<(String, usize)>,
    /// Flesch reading ease; higher reads easier
    pub readability: f64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Per-collection row of the overall statistics.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub name: String,
    pub notes: usize,
    pub words: usize,
    pub chars: usize,
    pub is_current: bool,
}

/// Totals across every collection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_notes: usize,
    pub total_words: usize,
    pub total_chars: usize,
    pub total_sentences: usize,
    pub total_paragraphs: usize,
    pub notes_this_week: usize,
    pub notes_this_month: usize,
    pub collections: Vec<CollectionStats>,
    pub collections_count: usize,
}

fn sentence_splitter() -> &'static Regex {
    static SPLITTER: OnceLock<Regex> = OnceLock::new();
    SPLITTER.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence pattern is valid"))
}

fn strip_word(word: &str) -> &str {
    word.trim_matches(|c| WORD_PUNCTUATION.contains(&c))
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn count_words(content: &str) -> usize {
    content.split_whitespace().count()
}

pub fn count_sentences(content: &str) -> usize {
    sentence_splitter()
        .split(content)
        .filter(|s| !s.trim().is_empty())
        .count()
}

pub fn count_paragraphs(content: &str) -> usize {
    content
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .count()
}

/// Vowel-group syllable estimate with a silent trailing `e`.
fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut syllables = 0;
    let mut previous_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !previous_vowel {
            syllables += 1;
        }
        previous_vowel = vowel;
    }
    if word.ends_with('e') && !word.ends_with("le") && syllables > 1 {
        syllables -= 1;
    }
    syllables.max(1)
}

/// Flesch reading ease, rounded to one decimal.
pub fn flesch_reading_ease(content: &str) -> f64 {
    let words: Vec<&str> = content
        .split_whitespace()
        .map(strip_word)
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let sentences = count_sentences(content).max(1) as f64;
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();
    let word_count = words.len() as f64;
    let score = 206.835 - 1.015 * (word_count / sentences) - 84.6 * (syllables as f64 / word_count);
    round_to(score, 1)
}

/// The most frequent words that are longer than two characters and not stop
/// words. Ties keep first-occurrence order.
fn most_common_words(words: &[&str]) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in words {
        let stripped = strip_word(word);
        let lower = stripped.to_lowercase();
        if stripped.chars().count() <= 2 || STOP_WORDS.contains(&lower.as_str()) {
            continue;
        }
        let count = counts.entry(lower.clone()).or_insert(0);
        if *count == 0 {
            order.push(lower);
        }
        *count += 1;
    }
    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|word| {
            let count = counts[&word];
            (word, count)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_WORDS);
    ranked
}

/// Computes the statistics panel for one note.
pub fn note_stats(note: &Note) -> NoteStats {
    let content = note.content.as_str();
    let words: Vec<&str> = content.split_whitespace().collect();
    let word_count = words.len();
    let sentences = count_sentences(content);

    let average_word_length = if words.is_empty() {
        0.0
    } else {
        let letters: usize = words.iter().map(|w| strip_word(w).chars().count()).sum();
        letters as f64 / word_count as f64
    };
    let average_sentence_length = if sentences > 0 {
        word_count as f64 / sentences as f64
    } else {
        0.0
    };

    let unique_words = words
        .iter()
        .map(|w| strip_word(w).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<HashSet<_>>()
        .len();
    let lexical_diversity = if word_count > 0 {
        unique_words as f64 / word_count as f64
    } else {
        0.0
    };

    let dialogue_lines = content
        .split('\n')
        .map(str::trim)
        .filter(|line| line.starts_with('"') || line.starts_with('\''))
        .count();

    NoteStats {
        title: note.title.clone(),
        chars: content.chars().count(),
        chars_no_spaces: content.chars().filter(|c| *c != ' ').count(),
        words: word_count,
        unique_words,
        lines: if content.is_empty() {
            0
        } else {
            content.matches('\n').count() + 1
        },
        paragraphs: count_paragraphs(content),
        sentences,
        dialogue_lines,
        average_word_length: round_to(average_word_length, 1),
        average_sentence_length: round_to(average_sentence_length, 1),
        lexical_diversity: round_to(lexical_diversity, 3),
        reading_time_minutes: word_count as f64 / READING_WPM,
        speaking_time_minutes: word_count as f64 / SPEAKING_WPM,
        estimated_writing_time_minutes: word_count as f64 / WRITING_WPM,
        most_common_words: most_common_words(&words),
        readability: flesch_reading_ease(content),
        created: note.created,
        modified: note.modified,
    }
}

/// Aggregates every collection.
///
/// # Arguments
/// * `collections` - Each collection name with its notes, in display order
/// * `current` - The current collection, flagged in its row
/// * `now` - Reference time for the 7 and 30 day counters
pub fn overall_stats(
    collections: &[(String, Vec<Note>)],
    current: Option<&str>,
    now: DateTime<Utc>,
) -> OverallStats {
    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(30);

    let mut stats = OverallStats {
        total_notes: 0,
        total_words: 0,
        total_chars: 0,
        total_sentences: 0,
        total_paragraphs: 0,
        notes_this_week: 0,
        notes_this_month: 0,
        collections: Vec::with_capacity(collections.len()),
        collections_count: collections.len(),
    };

    for (name, notes) in collections {
        let mut row = CollectionStats {
            name: name.clone(),
            notes: notes.len(),
            words: 0,
            chars: 0,
            is_current: current == Some(name.as_str()),
        };
        for note in notes {
            row.words += count_words(&note.content);
            row.chars += note.content.chars().count();
            stats.total_sentences += count_sentences(&note.content);
            stats.total_paragraphs += count_paragraphs(&note.content);
            if note.created >= week_ago {
                stats.notes_this_week += 1;
            }
            if note.created >= month_ago {
                stats.notes_this_month += 1;
            }
        }
        stats.total_notes += row.notes;
        stats.total_words += row.words;
        stats.total_chars += row.chars;
        stats.collections.push(row);
    }

    stats
}
