//! Deterministic lexicon-and-rule entity model.
//!
//! Recognizes person names from given-name/surname lists and honorifics,
//! organizations from legal or institutional suffixes and a gazetteer,
//! places from gazetteers, and dates from calendar-validated patterns.
//! The model is data driven: all word lists live in a JSON model file.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;

use super::entity::{EntityRecognizer, RecognizedEntity};
use crate::error::{Error, Result};
use crate::model::EntityCategory;

const BUILTIN_MODEL: &str = include_str!("../../models/en_core_lexicon.json");

/// Lower-case words allowed inside multi-word names ("Bank of America").
const CONNECTORS: &[&str] = &["of", "the", "and", "&", "de", "la", "du", "van", "von", "bin", "binte", "bte"];

/// Longest run of words accepted as one person name.
const MAX_NAME_WORDS: usize = 4;

/// Longest run of words accepted as one organization name.
const MAX_ORG_WORDS: usize = 8;

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec";

#[derive(Debug, Deserialize)]
struct LexiconFile {
    name: String,
    version: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    given_names: Vec<String>,
    #[serde(default)]
    surnames: Vec<String>,
    #[serde(default)]
    titles: Vec<String>,
    #[serde(default)]
    organization_suffixes: Vec<String>,
    #[serde(default)]
    organizations: Vec<String>,
    #[serde(default)]
    gpe: Vec<String>,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    stopwords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateForm {
    Iso,
    Numeric,
    DayMonthYear,
    MonthDayYear,
    MonthYear,
    DayMonth,
}

#[derive(Debug, Clone)]
struct DatePattern {
    form: DateForm,
    regex: Regex,
}

/// One word of the input, with its normalized form.
#[derive(Debug, Clone)]
struct Word<'t> {
    start: usize,
    end: usize,
    raw: &'t str,
    norm: String,
}

impl Word<'_> {
    fn is_capitalized(&self) -> bool {
        let mut chars = self.raw.chars();
        chars.next().is_some_and(char::is_uppercase) && !self.raw.chars().any(|c| c.is_ascii_digit())
    }
}

/// Rule precedence when two candidates have equal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rule {
    Date,
    Gazetteer,
    OrgSuffix,
    Person,
}

/// A lexicon-driven [`EntityRecognizer`].
#[derive(Debug, Clone)]
pub struct LexiconModel {
    name: String,
    version: String,
    language: String,
    given_names: HashSet<String>,
    surnames: HashSet<String>,
    titles: HashSet<String>,
    org_suffixes: HashSet<String>,
    stopwords: HashSet<String>,
    /// First word → (phrase words, category), longest phrase first
    gazetteer: HashMap<String, Vec<(Vec<String>, EntityCategory)>>,
    word_regex: Regex,
    dates: Vec<DatePattern>,
}

static SHARED: OnceLock<Arc<LexiconModel>> = OnceLock::new();

impl LexiconModel {
    /// The model shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_MODEL)
    }

    /// The builtin model, built on first use and shared by every caller after that.
    pub fn shared() -> Result<Arc<Self>> {
        if let Some(model) = SHARED.get() {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(Self::builtin()?);
        Ok(Arc::clone(SHARED.get_or_init(|| model)))
    }

    /// Load a model file. Any failure is reported as an unavailable model.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::ModelUnavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: LexiconFile =
            serde_json::from_str(json).map_err(|e| Error::ModelUnavailable(e.to_string()))?;
        Self::from_lexicon(file)
    }

    fn from_lexicon(file: LexiconFile) -> Result<Self> {
        let mut gazetteer: HashMap<String, Vec<(Vec<String>, EntityCategory)>> = HashMap::new();
        let entries = [
            (&file.organizations, EntityCategory::Organization),
            (&file.gpe, EntityCategory::Gpe),
            (&file.locations, EntityCategory::Location),
        ];
        for (phrases, category) in entries {
            for phrase in phrases {
                let words: Vec<String> = phrase.split_whitespace().map(normalize).collect();
                if let Some(first) = words.first() {
                    gazetteer.entry(first.clone()).or_default().push((words, category));
                }
            }
        }
        for phrases in gazetteer.values_mut() {
            phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }

        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| Error::ModelUnavailable(format!("date pattern: {}", e)))
        };
        let ord = r"(?:st|nd|rd|th)?";
        let dates = vec![
            (DateForm::Iso, r"\b([0-9]{4})-([0-9]{2})-([0-9]{2})\b".to_string()),
            (DateForm::Numeric, r"\b([0-9]{1,2})[/.\-]([0-9]{1,2})[/.\-]([0-9]{4}|[0-9]{2})\b".to_string()),
            (DateForm::DayMonthYear, format!(r"\b([0-9]{{1,2}}){ord}\s+({MONTHS})\b\.?,?\s+([0-9]{{4}})\b")),
            (DateForm::MonthDayYear, format!(r"\b({MONTHS})\b\.?\s+([0-9]{{1,2}}){ord},?\s+([0-9]{{4}})\b")),
            (DateForm::MonthYear, format!(r"\b({MONTHS})\b\.?,?\s+([0-9]{{4}})\b")),
            (DateForm::DayMonth, format!(r"\b([0-9]{{1,2}}){ord}\s+({MONTHS})\b")),
        ]
        .into_iter()
        .map(|(form, pattern)| Ok(DatePattern { form, regex: compile(pattern)? }))
        .collect::<Result<Vec<_>>>()?;

        let word_regex = compile(r"[\p{L}\p{N}][\p{L}\p{M}\p{N}]*(?:['’\-][\p{L}\p{N}][\p{L}\p{M}\p{N}]*)*|&".to_string())?;

        Ok(Self {
            given_names: word_set(&file.given_names),
            surnames: word_set(&file.surnames),
            titles: word_set(&file.titles),
            org_suffixes: word_set(&file.organization_suffixes),
            stopwords: word_set(&file.stopwords),
            name: file.name,
            version: file.version,
            language: file.language,
            gazetteer,
            word_regex,
            dates,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn words<'t>(&self, text: &'t str) -> Vec<Word<'t>> {
        self.word_regex
            .find_iter(text)
            .map(|m| {
                let mut end = m.end();
                // Possessive "Tan's" counts as "Tan"
                for suffix in ["'s", "’s"] {
                    if m.as_str().len() > suffix.len() + 1 && m.as_str().ends_with(suffix) {
                        end -= suffix.len();
                    }
                }
                let raw = &text[m.start()..end];
                Word {
                    start: m.start(),
                    end,
                    raw,
                    norm: normalize(raw),
                }
            })
            .collect()
    }

    fn recognize_dates(&self, text: &str, out: &mut Vec<(RecognizedEntity, Rule)>) {
        for pattern in &self.dates {
            for caps in pattern.regex.captures_iter(text) {
                let Some(m) = caps.get(0) else { continue };
                if valid_date(pattern.form, &caps) {
                    let entity = RecognizedEntity::new(m.start(), m.end(), EntityCategory::Date).with_confidence(0.95);
                    out.push((entity, Rule::Date));
                }
            }
        }
    }

    fn recognize_gazetteer(&self, text: &str, words: &[Word<'_>], out: &mut Vec<(RecognizedEntity, Rule)>) {
        for i in 0..words.len() {
            if !words[i].is_capitalized() {
                continue;
            }
            let Some(phrases) = self.gazetteer.get(&words[i].norm) else {
                continue;
            };
            let hit = phrases.iter().find(|(phrase, _)| {
                i + phrase.len() <= words.len()
                    && phrase.iter().enumerate().all(|(k, p)| {
                        let w = &words[i + k];
                        w.norm == *p
                            && (k == 0 || joined(text, &words[i + k - 1], w))
                            && (w.is_capitalized() || is_connector(&w.norm) || w.raw.chars().all(char::is_uppercase))
                    })
            });
            if let Some((phrase, category)) = hit {
                let last = &words[i + phrase.len() - 1];
                let entity = RecognizedEntity::new(words[i].start, last.end, *category).with_confidence(0.9);
                out.push((entity, Rule::Gazetteer));
            }
        }
    }

    fn recognize_organizations(&self, text: &str, words: &[Word<'_>], out: &mut Vec<(RecognizedEntity, Rule)>) {
        for j in 0..words.len() {
            if !words[j].is_capitalized() || !self.org_suffixes.contains(&words[j].norm) {
                continue;
            }
            // A suffix continuing a previous suffix run is handled by that run
            if j > 0 && joined(text, &words[j - 1], &words[j]) && self.org_suffixes.contains(&words[j - 1].norm) {
                continue;
            }

            let mut first = j;
            while first > 0 && j - first < MAX_ORG_WORDS && joined(text, &words[first - 1], &words[first]) {
                let prev = &words[first - 1];
                if self.is_name_word(prev) {
                    first -= 1;
                } else if is_connector(&prev.norm) && first >= 2 && self.is_name_word(&words[first - 2]) {
                    first -= 2;
                } else {
                    break;
                }
            }

            let mut last = j;
            while last + 1 < words.len() && joined(text, &words[last], &words[last + 1]) {
                let next = &words[last + 1];
                if next.is_capitalized() && self.org_suffixes.contains(&next.norm) {
                    last += 1;
                } else if next.norm == "of" {
                    let mut k = last + 2;
                    while k < words.len()
                        && k - last <= 4
                        && joined(text, &words[k - 1], &words[k])
                        && self.is_name_word(&words[k])
                    {
                        k += 1;
                    }
                    if k == last + 2 {
                        break;
                    }
                    last = k - 1;
                } else {
                    break;
                }
            }

            if first == j && last == j {
                continue;
            }
            let entity = RecognizedEntity::new(words[first].start, words[last].end, EntityCategory::Organization)
                .with_confidence(0.8);
            out.push((entity, Rule::OrgSuffix));
        }
    }

    fn recognize_persons(&self, text: &str, words: &[Word<'_>], out: &mut Vec<(RecognizedEntity, Rule)>) {
        let mut i = 0;
        while i < words.len() {
            let word = &words[i];
            if !word.is_capitalized() {
                i += 1;
                continue;
            }

            // Honorific followed by capitalized words
            if self.titles.contains(&word.norm) {
                let mut last = i;
                while last + 1 < words.len()
                    && last - i < MAX_NAME_WORDS - 1
                    && title_joined(text, &words[last], &words[last + 1], last == i)
                    && self.is_name_word(&words[last + 1])
                {
                    last += 1;
                }
                if last > i {
                    let entity = RecognizedEntity::new(words[i + 1].start, words[last].end, EntityCategory::Person)
                        .with_confidence(0.9);
                    out.push((entity, Rule::Person));
                    i = last + 1;
                    continue;
                }
                i += 1;
                continue;
            }

            if !self.is_name_word(word) || !(self.is_given(word) || self.is_surname(word)) {
                i += 1;
                continue;
            }

            let mut last = i;
            let mut unknown = 0;
            while last + 1 < words.len()
                && last + 1 - i < MAX_NAME_WORDS
                && joined(text, &words[last], &words[last + 1])
                && self.is_name_word(&words[last + 1])
            {
                let next = &words[last + 1];
                if self.is_given(next) || self.is_surname(next) {
                    last += 1;
                } else if unknown == 0 && self.is_given(&words[last]) && !self.gazetteer.contains_key(&next.norm) {
                    unknown += 1;
                    last += 1;
                } else {
                    break;
                }
            }

            let span = &words[i..=last];
            let has_given = span.iter().any(|w| self.is_given(w));
            let confidence = match (span.len(), has_given) {
                (1, true) => Some(0.6),
                (1, false) => None,
                (_, true) => Some(0.85),
                (_, false) => Some(0.7),
            };
            if let Some(confidence) = confidence {
                let entity = RecognizedEntity::new(words[i].start, words[last].end, EntityCategory::Person)
                    .with_confidence(confidence);
                out.push((entity, Rule::Person));
            }
            i = last + 1;
        }
    }

    /// A capitalized word that may be part of a proper name.
    fn is_name_word(&self, word: &Word<'_>) -> bool {
        word.is_capitalized()
            && word.raw.chars().count() > 1
            && !self.stopwords.contains(&word.norm)
            && !self.titles.contains(&word.norm)
            && !self.org_suffixes.contains(&word.norm)
    }

    fn is_given(&self, word: &Word<'_>) -> bool {
        self.given_names.contains(&word.norm)
    }

    fn is_surname(&self, word: &Word<'_>) -> bool {
        self.surnames.contains(&word.norm)
    }
}

impl EntityRecognizer for LexiconModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn recognize(&self, text: &str) -> Vec<RecognizedEntity> {
        let words = self.words(text);
        let mut candidates = Vec::new();
        self.recognize_dates(text, &mut candidates);
        self.recognize_gazetteer(text, &words, &mut candidates);
        self.recognize_organizations(text, &words, &mut candidates);
        self.recognize_persons(text, &words, &mut candidates);

        // Longest match wins; rule precedence breaks ties
        candidates.sort_by(|(a, ra), (b, rb)| {
            (b.end - b.start)
                .cmp(&(a.end - a.start))
                .then(ra.cmp(rb))
                .then(a.start.cmp(&b.start))
        });
        let mut accepted: Vec<RecognizedEntity> = Vec::new();
        for (entity, _) in candidates {
            if accepted.iter().all(|e| entity.end <= e.start || e.end <= entity.start) {
                accepted.push(entity);
            }
        }
        accepted.sort_by_key(|e| e.start);
        accepted
    }
}

/// NFKC-normalized, lower-cased form used for all lexicon lookups.
fn normalize(word: &str) -> String {
    word.nfkc().collect::<String>().replace('’', "'").to_lowercase()
}

fn word_set(words: &[String]) -> HashSet<String> {
    words.iter().map(|w| normalize(w)).collect()
}

fn is_connector(norm: &str) -> bool {
    CONNECTORS.contains(&norm)
}

/// Two words separated only by whitespace, with at most one line break.
fn joined(text: &str, a: &Word<'_>, b: &Word<'_>) -> bool {
    text.get(a.end..b.start).is_some_and(|gap| {
        !gap.is_empty() && gap.chars().all(char::is_whitespace) && gap.matches('\n').count() <= 1
    })
}

/// Like [`joined`], but an honorific may be followed by a period ("Dr. Lee").
fn title_joined(text: &str, a: &Word<'_>, b: &Word<'_>, after_title: bool) -> bool {
    if joined(text, a, b) {
        return true;
    }
    after_title
        && text
            .get(a.end..b.start)
            .and_then(|gap| gap.strip_prefix('.'))
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(char::is_whitespace))
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let months = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    months.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

fn full_year(year: i32, digits: usize) -> i32 {
    match digits {
        2 if year < 50 => 2000 + year,
        2 => 1900 + year,
        _ => year,
    }
}

fn valid_date(form: DateForm, caps: &Captures<'_>) -> bool {
    let int = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
    let month = |i: usize| caps.get(i).and_then(|m| month_number(m.as_str()));
    let ymd = |y: i32, m: u32, d: i32| d > 0 && NaiveDate::from_ymd_opt(y, m, d as u32).is_some();

    match form {
        DateForm::Iso => match (int(1), int(2), int(3)) {
            (Some(y), Some(m), Some(d)) => m > 0 && ymd(y, m as u32, d),
            _ => false,
        },
        DateForm::Numeric => {
            let digits = caps.get(3).map(|m| m.as_str().len()).unwrap_or(4);
            match (int(1), int(2), int(3)) {
                (Some(a), Some(b), Some(y)) => {
                    let y = full_year(y, digits);
                    (b > 0 && ymd(y, b as u32, a)) || (a > 0 && ymd(y, a as u32, b))
                }
                _ => false,
            }
        }
        DateForm::DayMonthYear => match (int(1), month(2), int(3)) {
            (Some(d), Some(m), Some(y)) => ymd(y, m, d),
            _ => false,
        },
        DateForm::MonthDayYear => match (month(1), int(2), int(3)) {
            (Some(m), Some(d), Some(y)) => ymd(y, m, d),
            _ => false,
        },
        DateForm::MonthYear => month(1).is_some() && int(2).is_some(),
        // Leap year so 29 February is accepted without a year
        DateForm::DayMonth => match (int(1), month(2)) {
            (Some(d), Some(m)) => ymd(2000, m, d),
            _ => false,
        },
    }
}
