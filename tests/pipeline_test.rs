mod common;

use common::{encode_png, render_sheet, BrokenReader, SheetReader, NAME, SUBJECT};
use image::{DynamicImage, GrayImage, Luma};
use sheet_omr::omr::config::LayoutConfig;
use sheet_omr::omr::{OmrConfig, OmrPipeline, Rectification, NOT_DETECTED};
use sheet_omr::OmrError;
use std::sync::Arc;

fn pipeline_with(config: OmrConfig) -> OmrPipeline {
    OmrPipeline::new(Arc::new(config), Arc::new(SheetReader))
}

fn pipeline() -> OmrPipeline {
    pipeline_with(OmrConfig::default())
}

/// One mark per question, cycling through the options
fn full_marks(layout: &LayoutConfig) -> Vec<(u32, u8)> {
    (1..=layout.total_questions() as u32)
        .map(|q| (q, ((q - 1) % layout.choices as u32) as u8 + 1))
        .collect()
}

#[test]
fn test_reads_every_marked_question() {
    let layout = LayoutConfig::default();
    let marks = full_marks(&layout);
    let sheet = render_sheet(&layout, &marks);

    let scan = pipeline().scan(&encode_png(&sheet)).unwrap();

    assert_eq!(scan.rectification, Rectification::Accept);
    assert_eq!(scan.answers.len(), 40);
    assert_eq!(scan.answers.iter().collect::<Vec<_>>(), marks);
    assert!(scan.low_confidence.is_empty());
}

#[test]
fn test_four_by_four_grid() {
    let config = OmrConfig {
        layout: LayoutConfig {
            rows_per_column: 4,
            ..LayoutConfig::default()
        },
        ..OmrConfig::default()
    };
    let marks = full_marks(&config.layout);
    let sheet = render_sheet(&config.layout, &marks);

    let scan = pipeline_with(config).scan(&encode_png(&sheet)).unwrap();

    assert_eq!(scan.answers.len(), 16);
    for (question, option) in marks {
        assert_eq!(scan.answers.get(question), Some(option), "question {}", question);
    }
}

#[test]
fn test_unmarked_questions_are_absent() {
    let layout = LayoutConfig::default();
    let marks = vec![(1, 2), (12, 4), (40, 1)];
    let sheet = render_sheet(&layout, &marks);

    let scan = pipeline().scan(&encode_png(&sheet)).unwrap();

    assert_eq!(scan.answers.iter().collect::<Vec<_>>(), marks);
    assert_eq!(scan.answers.get(2), None);
}

#[test]
fn test_double_mark_is_flagged() {
    let layout = LayoutConfig::default();
    let sheet = render_sheet(&layout, &[(5, 2), (5, 3), (6, 1)]);

    let scan = pipeline().scan(&encode_png(&sheet)).unwrap();

    let chosen = scan.answers.get(5).unwrap();
    assert!(chosen == 2 || chosen == 3);
    assert_eq!(scan.answers.get(6), Some(1));
    assert_eq!(scan.low_confidence.len(), 1);
    assert_eq!(scan.low_confidence[0].question, 5);
    assert_eq!(scan.low_confidence[0].chosen, chosen);
    assert_eq!(scan.low_confidence[0].marked_options, vec![2, 3]);
}

#[test]
fn test_header_fields_are_read() {
    let layout = LayoutConfig::default();
    let sheet = render_sheet(&layout, &[]);

    let scan = pipeline().scan(&encode_png(&sheet)).unwrap();

    assert_eq!(scan.student_info.subject, SUBJECT);
    assert_eq!(scan.student_info.medium, "English");
    assert_eq!(scan.student_info.name, NAME);
    assert!(scan.answers.is_empty());
}

#[test]
fn test_upside_down_sheet_matches_upright() {
    let layout = LayoutConfig::default();
    let marks = full_marks(&layout);
    let sheet = render_sheet(&layout, &marks);
    let flipped = image::imageops::rotate180(&sheet);

    let upright = pipeline().scan(&encode_png(&sheet)).unwrap();
    let corrected = pipeline().scan(&encode_png(&flipped)).unwrap();

    assert_eq!(upright.rotation_degrees, 0);
    assert_eq!(corrected.rotation_degrees, 180);
    assert_eq!(corrected.answers, upright.answers);
}

#[test]
fn test_recognizer_failure_only_affects_header() {
    let layout = LayoutConfig::default();
    let marks = full_marks(&layout);
    let sheet = render_sheet(&layout, &marks);

    let pipeline = OmrPipeline::new(Arc::new(OmrConfig::default()), Arc::new(BrokenReader));
    let scan = pipeline.scan(&encode_png(&sheet)).unwrap();

    assert_eq!(scan.student_info.subject, NOT_DETECTED);
    assert_eq!(scan.student_info.medium, NOT_DETECTED);
    assert_eq!(scan.student_info.name, NOT_DETECTED);
    assert_eq!(scan.rotation_degrees, 0);
    assert_eq!(scan.answers.len(), 40);
}

#[test]
fn test_scanning_is_repeatable() {
    let layout = LayoutConfig::default();
    let bytes = encode_png(&render_sheet(&layout, &[(3, 3), (17, 1), (33, 4)]));
    let pipeline = pipeline();

    let first = pipeline.scan(&bytes).unwrap();
    let second = pipeline.scan(&bytes).unwrap();

    assert_eq!(first.answers, second.answers);
    assert_eq!(first.student_info, second.student_info);
    assert_eq!(first.candidates, second.candidates);
}

#[test]
fn test_answers_stay_within_layout() {
    let layout = LayoutConfig::default();
    let sheet = render_sheet(&layout, &full_marks(&layout));

    let scan = pipeline().scan(&encode_png(&sheet)).unwrap();

    for (question, option) in scan.answers.iter() {
        assert!((1..=40).contains(&question));
        assert!((1..=4).contains(&option));
    }
}

#[test]
fn test_empty_input_is_rejected() {
    assert!(matches!(pipeline().scan(&[]), Err(OmrError::Decode(_))));
}

#[test]
fn test_garbage_input_is_rejected() {
    let result = pipeline().scan(b"definitely not an image");
    assert!(matches!(result, Err(OmrError::Decode(_))));
}

#[test]
fn test_blank_page_degrades_to_fixed_resize() {
    let blank = GrayImage::from_pixel(900, 1200, Luma([250]));

    let scan = pipeline().scan_image(DynamicImage::ImageLuma8(blank));

    assert_eq!(scan.rectification, Rectification::FixedResize);
    assert!(scan.answers.is_empty());
}
