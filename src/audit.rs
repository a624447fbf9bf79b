//! Link density audit.
//!
//! Classifies already-scraped pages by how many words they carry per
//! internal link and whether they link to any target page at all.

use serde::{Deserialize, Serialize};

/// Counts collected for one page by the scraper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageStats {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub internal_link_count: usize,
    #[serde(default)]
    pub target_link_count: usize,
    /// Set when the page could not be fetched or parsed
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    NeedsLinks,
    Good,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub word_count: usize,
    pub internal_link_count: usize,
    pub target_link_count: usize,
    /// Words per internal link, 0.0 for pages without internal links
    pub link_density: f64,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total_scanned: usize,
    pub needs_links: usize,
    pub has_good_density: usize,
    pub failed: usize,
}

/// Words per internal link, rounded to 2 decimals.
///
/// Pages without internal links report 0.0 rather than infinity.
pub fn link_density(word_count: usize, internal_link_count: usize) -> f64 {
    if internal_link_count == 0 {
        return 0.0;
    }
    let density = word_count as f64 / internal_link_count as f64;
    (density * 100.0).round() / 100.0
}

/// A usable words-per-link threshold is finite and positive.
pub fn check_link_ratio_threshold(threshold: f64) -> Result<(), String> {
    if threshold.is_nan() || threshold.is_infinite() || threshold <= 0.0 {
        return Err(format!(
            "link_ratio_threshold must be positive, got {}",
            threshold
        ));
    }
    Ok(())
}

/// Classify a single page against `link_ratio_threshold` words per link.
pub fn classify(page: &PageStats, link_ratio_threshold: f64) -> PageResult {
    if let Some(error) = &page.error {
        return PageResult {
            url: page.url.clone(),
            title: None,
            word_count: 0,
            internal_link_count: 0,
            target_link_count: 0,
            link_density: 0.0,
            status: PageStatus::Failed,
            error: Some(error.clone()),
        };
    }

    let density = link_density(page.word_count, page.internal_link_count);
    let status = if density > link_ratio_threshold || page.target_link_count == 0 {
        PageStatus::NeedsLinks
    } else {
        PageStatus::Good
    };

    PageResult {
        url: page.url.clone(),
        title: page.title.clone(),
        word_count: page.word_count,
        internal_link_count: page.internal_link_count,
        target_link_count: page.target_link_count,
        link_density: density,
        status,
        error: None,
    }
}

/// Classify every page and tally the outcome.
pub fn audit_pages(pages: &[PageStats], link_ratio_threshold: f64) -> (Vec<PageResult>, BulkSummary) {
    let results: Vec<PageResult> = pages
        .iter()
        .map(|page| classify(page, link_ratio_threshold))
        .collect();

    let mut summary = BulkSummary {
        total_scanned: results.len(),
        ..Default::default()
    };
    for result in &results {
        match result.status {
            PageStatus::NeedsLinks => summary.needs_links += 1,
            PageStatus::Good => summary.has_good_density += 1,
            PageStatus::Failed => summary.failed += 1,
        }
    }

    log::debug!(
        "audited {} pages: {} need links, {} good, {} failed",
        summary.total_scanned,
        summary.needs_links,
        summary.has_good_density,
        summary.failed
    );

    (results, summary)
}
