use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{MatchingConfig, ModelConfig};
use crate::matcher::{
    find_opportunities, similarities, Candidate, EmbeddingError, LinkMatcher, MatchError,
    MatchOptions, MatchRequest, ScoringModel,
};
use crate::tests::support::{
    candidate, CountingEmbedder, FailingEmbedder, HashEmbedder, ShortEmbedder,
};

const AUDI_TEXT: &str =
    "Our Audi lease deals offer competitive monthly rates on the A3 and Q5.";

const WEATHER_TEXT: &str =
    "The weather today is sunny with light winds and clear skies across the region.";

fn car_titles() -> Vec<String> {
    vec![
        "Audi Lease Deals".to_string(),
        "BMW Contract Hire".to_string(),
        "Tesla PCP Finance".to_string(),
    ]
}

fn car_targets() -> Vec<Candidate> {
    vec![
        candidate("/audi-lease", "Audi Lease Deals"),
        candidate("/bmw-contract-hire", "BMW Contract Hire"),
        candidate("/tesla-pcp", "Tesla PCP Finance"),
    ]
}

fn options(threshold: f32, window_size: usize, overlap: usize) -> MatchOptions {
    MatchOptions {
        threshold,
        window_size,
        overlap,
    }
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end - start).collect()
}

#[test]
fn test_audi_title_scores_highest() {
    let scores = similarities(&HashEmbedder, AUDI_TEXT, &car_titles()).unwrap();

    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0].index, 0);
    assert!(scores[0].score > scores[1].score);
    assert!(scores[0].score > scores[2].score);
}

#[test]
fn test_similarities_in_range_and_sorted() {
    let titles: Vec<String> = [
        "Audi Lease Deals",
        "monthly rates",
        "Q5",
        "completely unrelated gardening tips",
        "the the the",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let scores = similarities(&HashEmbedder, AUDI_TEXT, &titles).unwrap();
    assert_eq!(scores.len(), titles.len());

    let indexes: HashSet<usize> = scores.iter().map(|s| s.index).collect();
    assert_eq!(indexes.len(), titles.len());

    for s in &scores {
        assert!((-1.0..=1.0).contains(&s.score), "score {} out of range", s.score);
    }
    for pair in scores.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_batched_scores_equal_single_title_scores() {
    let titles = car_titles();
    let batched = similarities(&HashEmbedder, AUDI_TEXT, &titles).unwrap();

    for s in &batched {
        let single = similarities(&HashEmbedder, AUDI_TEXT, &titles[s.index..=s.index]).unwrap();
        assert_eq!(single.len(), 1);
        assert!((single[0].score - s.score).abs() < 1e-6);
    }
}

#[test]
fn test_equal_scores_keep_input_order() {
    let titles: Vec<String> = ["BMW Hire", "Audi Lease", "BMW Hire", "Audi Lease"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let scores = similarities(&HashEmbedder, "audi lease", &titles).unwrap();
    let order: Vec<usize> = scores.iter().map(|s| s.index).collect();
    assert_eq!(order, vec![1, 3, 0, 2]);
}

#[test]
fn test_no_titles_means_no_model_call() {
    let embedder = CountingEmbedder::default();
    let scores = similarities(&embedder, AUDI_TEXT, &[]).unwrap();

    assert!(scores.is_empty());
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn test_empty_inputs_return_no_matches() {
    let embedder = CountingEmbedder::default();

    for threshold in [-1.0, 0.0, 0.7] {
        let opts = options(threshold, 120, 30);
        assert!(find_opportunities(&embedder, "", &car_targets(), &opts)
            .unwrap()
            .is_empty());
        assert!(find_opportunities(&embedder, "   \n\t", &car_targets(), &opts)
            .unwrap()
            .is_empty());
        assert!(find_opportunities(&embedder, AUDI_TEXT, &[], &opts)
            .unwrap()
            .is_empty());
    }

    assert_eq!(embedder.calls(), 0);
}

#[test]
fn test_titles_and_windows_share_one_model_call() {
    let embedder = CountingEmbedder::default();
    let text = (0..25)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ");

    // 25 words, window 10, stride 8: windows at 0, 8, 16
    find_opportunities(&embedder, &text, &car_targets(), &options(0.0, 10, 2)).unwrap();

    assert_eq!(embedder.calls(), 1);
    assert_eq!(embedder.texts(), 3 + 3);
}

#[test]
fn test_best_window_wins() {
    let text = "The weather today is sunny with light winds and clear skies. \
                Our Audi lease deals offer competitive monthly rates on the A3 and Q5.";
    let targets = vec![candidate("/audi-lease", "Audi Lease Deals")];

    let matches =
        find_opportunities(&HashEmbedder, text, &targets, &options(0.3, 10, 2)).unwrap();

    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.target_url, "/audi-lease");
    assert_eq!(m.target_title, "Audi Lease Deals");
    assert!(m.matched_text.starts_with("and clear skies. Our Audi lease deals"));
    assert_eq!(m.start_idx, text.find("and clear").unwrap());
    assert_eq!(char_slice(text, m.start_idx, m.end_idx), m.matched_text);
}

#[test]
fn test_one_match_per_target() {
    let paragraph = "Audi lease deals are popular. BMW contract hire is flexible. ";
    let text = paragraph.repeat(12);
    let mut targets = car_targets();
    targets.push(candidate("/audi-lease", "Audi Lease Deals Again"));

    let matches =
        find_opportunities(&HashEmbedder, &text, &targets, &options(0.05, 15, 5)).unwrap();

    let urls: Vec<&str> = matches.iter().map(|m| m.target_url.as_str()).collect();
    let unique: HashSet<&str> = urls.iter().copied().collect();
    assert_eq!(urls.len(), unique.len());
    assert!(unique.contains("/audi-lease"));
    assert!(unique.contains("/bmw-contract-hire"));

    for pair in matches.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn test_raising_threshold_never_adds_matches() {
    let text = "Audi lease deals. BMW contract hire. Tesla finance with PCP. ".repeat(6);
    let mut last = usize::MAX;

    for threshold in [-1.0, 0.0, 0.1, 0.2, 0.3, 0.5, 0.7, 0.9, 1.0] {
        let count = find_opportunities(
            &HashEmbedder,
            &text,
            &car_targets(),
            &options(threshold, 12, 4),
        )
        .unwrap()
        .len();
        assert!(count <= last, "threshold {} gave {} > {}", threshold, count, last);
        last = count;
    }
}

#[test]
fn test_unrelated_text_has_no_matches() {
    let targets = vec![candidate("/car-lease", "Car Lease Deals")];
    let matches =
        find_opportunities(&HashEmbedder, WEATHER_TEXT, &targets, &MatchOptions::default())
            .unwrap();
    assert!(matches.is_empty());
}

#[test]
fn test_similarity_is_rounded() {
    let matches = find_opportunities(
        &HashEmbedder,
        AUDI_TEXT,
        &car_targets(),
        &options(0.1, 120, 30),
    )
    .unwrap();

    assert_eq!(matches.len(), 1);
    let scaled = matches[0].similarity * 10_000.0;
    assert!((scaled - scaled.round()).abs() < 1e-6);
}

#[test]
fn test_short_embedding_batch_is_an_error() {
    let result = similarities(&ShortEmbedder, AUDI_TEXT, &car_titles());
    assert!(matches!(result, Err(EmbeddingError::EmbeddingFailed(_))));
}

fn matcher_with(embedder: Arc<CountingEmbedder>, defaults: MatchingConfig) -> LinkMatcher {
    LinkMatcher::new(embedder, defaults)
}

fn request(targets: Vec<Candidate>) -> MatchRequest {
    MatchRequest {
        source_content: AUDI_TEXT.to_string(),
        targets,
        threshold: Some(0.1),
        ..Default::default()
    }
}

fn many_targets() -> Vec<Candidate> {
    let mut targets = vec![
        candidate("/garden", "Gardening Tips"),
        candidate("/recipes", "Dinner Recipes"),
    ];
    targets.extend(car_targets());
    targets
}

#[test]
fn test_service_prefilters_to_max_targets() {
    let embedder = Arc::new(CountingEmbedder::default());
    let matcher = matcher_with(embedder.clone(), MatchingConfig::default());

    let mut req = request(many_targets());
    req.max_targets = Some(2);
    req.keyword = Some("audi lease".to_string());

    let response = matcher.match_links(&req).unwrap();

    // two titles plus the single window
    assert_eq!(embedder.texts(), 3);
    assert_eq!(response.matches.len(), 1);
    assert_eq!(response.matches[0].target_url, "/audi-lease");
}

#[test]
fn test_service_uses_configured_max_targets() {
    let embedder = Arc::new(CountingEmbedder::default());
    let defaults = MatchingConfig {
        max_targets: Some(1),
        ..MatchingConfig::default()
    };
    let matcher = matcher_with(embedder.clone(), defaults);

    let response = matcher.match_links(&request(many_targets())).unwrap();

    assert_eq!(embedder.texts(), 2);
    assert_eq!(response.matches[0].target_url, "/audi-lease");
}

#[test]
fn test_service_without_limit_scores_every_target() {
    let embedder = Arc::new(CountingEmbedder::default());
    let matcher = matcher_with(embedder.clone(), MatchingConfig::default());

    matcher.match_links(&request(many_targets())).unwrap();
    assert_eq!(embedder.texts(), 5 + 1);
}

#[test]
fn test_service_rejects_invalid_parameters() {
    let embedder = Arc::new(CountingEmbedder::default());
    let matcher = matcher_with(embedder.clone(), MatchingConfig::default());

    let mut bad_threshold = request(car_targets());
    bad_threshold.threshold = Some(1.5);

    let mut bad_overlap = request(car_targets());
    bad_overlap.window_size = Some(10);
    bad_overlap.overlap = Some(10);

    let mut bad_limit = request(car_targets());
    bad_limit.max_targets = Some(0);

    for req in [bad_threshold, bad_overlap, bad_limit] {
        assert!(matches!(
            matcher.match_links(&req),
            Err(MatchError::InvalidRequest(_))
        ));
    }
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn test_service_surfaces_unavailable_model() {
    let matcher = LinkMatcher::new(Arc::new(FailingEmbedder), MatchingConfig::default());
    let result = matcher.match_links(&request(car_targets()));

    assert!(matches!(
        result,
        Err(MatchError::Embedding(EmbeddingError::Unavailable(_)))
    ));
}

#[test]
fn test_request_defaults_from_json() {
    let req: MatchRequest = serde_json::from_str(
        r#"{"source_content": "text", "targets": [{"url": "/a", "title": "A"}]}"#,
    )
    .unwrap();

    assert_eq!(req.targets[0].keywords, Vec::<String>::new());
    assert_eq!(req.threshold, None);
    assert_eq!(req.match_type, crate::matcher::MatchType::Stemmed);
}

fn real_model() -> (tempfile::TempDir, ScoringModel) {
    let dir = tempfile::tempdir().unwrap();
    let model = ScoringModel::from_config(ModelConfig::default(), dir.path().join("models"));
    (dir, model)
}

#[test]
#[ignore = "requires model download (~90MB)"]
fn test_real_model_ranks_audi_first() {
    let (_dir, model) = real_model();

    let scores = similarities(&model, AUDI_TEXT, &car_titles()).unwrap();
    assert_eq!(scores[0].index, 0);
    assert!(scores[0].score > scores[1].score);
    assert!(scores[0].score > scores[2].score);
}

#[test]
#[ignore = "requires model download (~90MB)"]
fn test_real_model_ignores_unrelated_text() {
    let (_dir, model) = real_model();
    let targets = vec![candidate("/car-lease", "Car Lease Deals")];

    let matches =
        find_opportunities(&model, WEATHER_TEXT, &targets, &MatchOptions::default()).unwrap();
    assert!(matches.is_empty());
}

#[test]
#[ignore = "requires model download (~90MB)"]
fn test_real_model_finds_related_passage() {
    let (_dir, model) = real_model();
    let text = format!("{} {}", WEATHER_TEXT, AUDI_TEXT);

    let matches =
        find_opportunities(&model, &text, &car_targets(), &options(0.3, 120, 30)).unwrap();
    assert!(!matches.is_empty());
    assert_eq!(matches[0].target_url, "/audi-lease");
}
