//! Weekly report engine.
//!
//! For a `(user, ISO week)` pair the engine clusters the week's notes by
//! embedding, aggregates keyword frequencies, diffs them against the prior
//! week, and suggests high-similarity note connections. Reports are cached
//! as JSON blobs; a cache hit returns the stored document byte-for-byte
//! with zero processing time, and `regenerate` replaces the cached entry.

mod cluster;
pub mod types;

pub use types::{
    ClusterSummary, KeywordCount, PotentialConnection, WeeklyReportData, WeeklyReportResponse,
};

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use tracing::{debug, info, warn};

use crate::db::Engram;
use crate::error::{NotFoundError, Result, ValidationError};
use crate::note::Note;
use crate::types::{Timestamp, UserId};

use cluster::kmeans;

/// Year bounds accepted in week keys.
const MIN_YEAR: i32 = 2000;
/// Upper year bound.
const MAX_YEAR: i32 = 2100;

/// Parses a `YYYY-WNN` week key into `(year, week)`.
///
/// `YYYY-WW` (without the `W` marker) is a rejected form. Week 53 is
/// additionally checked against the ISO calendar, which not every year has.
fn parse_week_key(week_key: &str) -> Result<(i32, u32)> {
    let bytes = week_key.as_bytes();
    let well_formed = bytes.len() == 8
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5] == b'W'
        && bytes[6..].iter().all(u8::is_ascii_digit);
    if !well_formed {
        return Err(ValidationError::invalid_week_key(week_key).into());
    }

    let year: i32 = week_key[..4]
        .parse()
        .map_err(|_| ValidationError::invalid_week_key(week_key))?;
    let week: u32 = week_key[6..]
        .parse()
        .map_err(|_| ValidationError::invalid_week_key(week_key))?;

    if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=53).contains(&week) {
        return Err(ValidationError::invalid_week_key(week_key).into());
    }

    // Rejects week 53 in 52-week ISO years
    if NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_none() {
        return Err(ValidationError::invalid_week_key(week_key).into());
    }

    Ok((year, week))
}

/// The `[monday 00:00, next monday 00:00)` UTC window of an ISO week.
fn week_range(year: i32, week: u32) -> (Timestamp, Timestamp) {
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
        .expect("validated week key")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid");
    let start = Utc.from_utc_datetime(&monday);
    let end = start + Duration::days(7);
    (Timestamp::from_datetime(start), Timestamp::from_datetime(end))
}

/// Loads the user's analyzable notes for a week window: non-deleted,
/// embedding present, `created_at` inside the window.
fn notes_in_week(
    core: &Engram,
    user_id: &UserId,
    start: Timestamp,
    end: Timestamp,
) -> Result<Vec<Note>> {
    let notes = core
        .storage()
        .list_notes(user_id)?
        .into_iter()
        .filter(|note| {
            !note.is_deleted()
                && note.embedding.is_some()
                && note.created_at >= start
                && note.created_at < end
        })
        .collect();
    Ok(notes)
}

/// Cluster count for a week of `n` notes.
fn cluster_count(n: usize, max_clusters: usize) -> usize {
    let k = if n < 3 {
        1
    } else if n < 10 {
        2
    } else if n < 20 {
        3
    } else if n < 40 {
        4
    } else {
        5
    };
    k.min(max_clusters)
}

/// Counts keyword occurrences across notes; BTreeMap keeps name order
/// deterministic before the count sort.
fn keyword_counts(core: &Engram, notes: &[Note]) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for note in notes {
        for (name, _) in core.storage().note_keywords(&note.id)? {
            *counts.entry(name).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

/// Sorts `(name, count)` pairs by count descending, name ascending on ties.
fn sort_by_count(counts: BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Builds cluster summaries from the label assignment.
fn summarize_clusters(
    core: &Engram,
    notes: &[Note],
    labels: &[usize],
) -> Result<Vec<ClusterSummary>> {
    // Group member indexes per raw label, then relabel densely in raw order
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(index);
    }

    let mut summaries = Vec::with_capacity(groups.len());
    for (cluster_id, (_, mut members)) in groups.into_iter().enumerate() {
        members.sort_by(|&a, &b| {
            notes[a]
                .created_at
                .cmp(&notes[b].created_at)
                .then_with(|| notes[a].id.cmp(&notes[b].id))
        });

        let representative = &notes[members[0]];
        let representative_sentence: String = representative.body.chars().take(100).collect();

        let mut counts = BTreeMap::new();
        for &index in &members {
            for (name, _) in core.storage().note_keywords(&notes[index].id)? {
                *counts.entry(name).or_insert(0) += 1;
            }
        }
        let top_keywords = sort_by_count(counts)
            .into_iter()
            .take(3)
            .map(|(name, _)| name)
            .collect();

        summaries.push(ClusterSummary {
            cluster_id,
            size: members.len(),
            representative_sentence,
            top_keywords,
            note_ids: members
                .iter()
                .map(|&index| notes[index].id.as_str().to_owned())
                .collect(),
        });
    }

    Ok(summaries)
}

/// Suggests high-similarity note pairs within the week.
fn suggest_connections(notes: &[Note], threshold: f32) -> Vec<PotentialConnection> {
    let mut connections = Vec::new();

    for i in 0..notes.len() {
        for j in (i + 1)..notes.len() {
            let (Some(a), Some(b)) = (&notes[i].embedding, &notes[j].embedding) else {
                continue;
            };
            let similarity = cosine_similarity(a, b);
            if similarity >= threshold {
                connections.push(PotentialConnection {
                    from_note_id: notes[i].id.as_str().to_owned(),
                    to_note_id: notes[j].id.as_str().to_owned(),
                    similarity_score: similarity,
                    reason: format!("high similarity ({:.2})", similarity),
                });
            }
        }
    }

    connections.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.from_note_id.cmp(&b.from_note_id))
            .then_with(|| a.to_note_id.cmp(&b.to_note_id))
    });
    connections.truncate(5);
    connections
}

/// Returns (possibly generating) the weekly report for `(user, week_key)`.
pub(crate) fn weekly_report(
    core: &Engram,
    user_id: &UserId,
    week_key: &str,
    regenerate: bool,
) -> Result<WeeklyReportResponse> {
    let (year, week) = parse_week_key(week_key)?;

    if !regenerate {
        if let Some(blob) = core.storage().get_report(user_id, week_key)? {
            match serde_json::from_slice::<WeeklyReportData>(&blob) {
                Ok(report) => {
                    debug!(user = %user_id, week = %week_key, "Returning cached report");
                    return Ok(WeeklyReportResponse {
                        week_key: week_key.to_owned(),
                        report,
                        processing_time_ms: 0,
                    });
                }
                Err(e) => {
                    warn!(
                        user = %user_id,
                        week = %week_key,
                        error = %e,
                        "Cached report unreadable, regenerating"
                    );
                }
            }
        }
    }

    let start = Instant::now();

    let (window_start, window_end) = week_range(year, week);
    let notes = notes_in_week(core, user_id, window_start, window_end)?;
    if notes.is_empty() {
        return Err(NotFoundError::week_empty(week_key).into());
    }

    info!(
        user = %user_id,
        week = %week_key,
        notes = notes.len(),
        "Generating weekly report"
    );

    let clustering = &core.config().clustering;
    let embeddings: Vec<Vec<f32>> = notes
        .iter()
        .map(|note| note.embedding.clone().expect("filtered to embedded notes"))
        .collect();

    let k = cluster_count(notes.len(), clustering.max_clusters);
    let labels = kmeans(&embeddings, k, clustering.seed, clustering.restarts);
    let clusters = summarize_clusters(core, &notes, &labels)?;

    let current_counts = keyword_counts(core, &notes)?;
    let top_keywords: Vec<KeywordCount> = sort_by_count(current_counts.clone())
        .into_iter()
        .take(10)
        .map(|(name, count)| KeywordCount { name, count })
        .collect();

    // Previous ISO week via calendar arithmetic; handles year boundaries
    let previous_monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
        .expect("validated week key")
        - Duration::days(7);
    let prev_week = previous_monday.iso_week();
    let (prev_start, prev_end) = week_range(prev_week.year(), prev_week.week());
    let previous_notes = notes_in_week(core, user_id, prev_start, prev_end)?;
    let previous_keywords: HashSet<String> = keyword_counts(core, &previous_notes)?
        .into_keys()
        .collect();

    let new_keywords: Vec<String> = sort_by_count(current_counts)
        .into_iter()
        .filter(|(name, _)| !previous_keywords.contains(name))
        .take(5)
        .map(|(name, _)| name)
        .collect();

    let potential_connections = suggest_connections(&notes, clustering.connection_threshold);

    let report = WeeklyReportData {
        week_key: week_key.to_owned(),
        total_notes: notes.len(),
        clusters,
        top_keywords,
        new_keywords,
        potential_connections,
        generated_at: Timestamp::now().to_rfc3339(),
    };

    let blob = serde_json::to_vec(&report).map_err(|e| {
        crate::error::StorageError::serialization(format!("report encoding failed: {e}"))
    })?;
    core.storage().save_report(user_id, week_key, &blob)?;

    let processing_time_ms = (start.elapsed().as_millis() as u64).max(1);

    info!(
        user = %user_id,
        week = %week_key,
        clusters = report.clusters.len(),
        elapsed_ms = processing_time_ms,
        "Weekly report generated"
    );

    Ok(WeeklyReportResponse {
        week_key: week_key.to_owned(),
        report,
        processing_time_ms,
    })
}
