//! Runs the conformance suite against trees built by the fragmenter, then
//! against deliberately damaged copies.

use std::fs;

use ldes_conformance::{run_all, ConformanceReport};
use ldes_fragmenter::source::TermValue;
use ldes_fragmenter::{
    pipeline, FragmenterConfig, OutputFormat, RawRow, RawSnippet, RawTemplate, SourceKind,
};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn iri(s: &str) -> Option<TermValue> {
    Some(TermValue::Iri(s.to_owned()))
}

fn row(id: i64, time: &str) -> RawRow {
    RawRow {
        subject: iri(&format!("https://example.org/observation/{id}")),
        id: Some(id.to_string()),
        value: Some(format!("{}.25", id * 3)),
        property: iri("https://example.org/property/waterLevel"),
        time: Some(time.to_owned()),
    }
}

fn snippet(name: &str, from: &str, to: &str) -> RawSnippet {
    RawSnippet {
        subject: iri(&format!("https://example.org/snippet/{name}")),
        from: Some(from.to_owned()),
        to: Some(to.to_owned()),
        point_type: Some("float".to_owned()),
        points: Some(format!(r#"[{{"time": "{from}", "value": 2.5}}]"#)),
        template: Some(RawTemplate {
            sensor: iri("https://example.org/sensor/sluis"),
            property: iri("https://example.org/property/waterLevel"),
        }),
    }
}

fn rows() -> Vec<RawRow> {
    vec![
        row(1, "2023-01-31T23:59:59Z"),
        row(2, "2023-02-01T00:00:00Z"),
        row(3, "2023-02-01T13:30:00Z"),
        row(4, "2023-12-31T12:00:00Z"),
        row(5, "2024-01-01T00:00:00Z"),
        row(6, "2024-02-29T08:15:00.500Z"),
    ]
}

fn build(dir: &TempDir, format: OutputFormat) -> Result<FragmenterConfig, Box<dyn std::error::Error>> {
    let config = FragmenterConfig {
        output_dir: dir.path().join("LDES"),
        format,
        ..FragmenterConfig::default()
    };
    pipeline::run(&config, rows())?;
    Ok(config)
}

fn failures(report: &ConformanceReport) -> Vec<String> {
    report
        .results
        .iter()
        .filter(|r| r.is_failure())
        .map(|r| format!("{}: {} {:?}", r.validator, r.message, r.details))
        .collect()
}

#[test]
fn freshly_built_trees_conform_in_every_format() -> TestResult {
    for format in OutputFormat::ALL {
        let dir = TempDir::new()?;
        let config = build(&dir, format)?;
        let report = run_all(&config)?;
        assert!(
            report.all_passed(),
            "{format} tree should conform: {:#?}",
            failures(&report)
        );
    }
    Ok(())
}

#[test]
fn shifted_bound_is_reported() -> TestResult {
    let dir = TempDir::new()?;
    let config = build(&dir, OutputFormat::Turtle)?;
    let year = config.output_dir.join("2023/2023.ttl");
    let content = fs::read_to_string(&year)?;
    fs::write(&year, content.replace("2023-02-01T00:00:00Z", "2023-03-01T00:00:00Z"))?;

    let report = run_all(&config)?;
    assert!(!report.all_passed());
    assert!(report
        .by_validator("relations")
        .any(|r| r.is_failure() && r.message.contains("bounds")));
    Ok(())
}

#[test]
fn missing_month_document_is_reported() -> TestResult {
    let dir = TempDir::new()?;
    let config = build(&dir, OutputFormat::NTriples)?;
    fs::remove_file(config.output_dir.join("2024/02/02.nt"))?;

    let report = run_all(&config)?;
    assert!(report
        .by_validator("layout")
        .any(|r| r.is_failure() && r.details.iter().any(|d| d.contains("2024/02/02.nt"))));
    Ok(())
}

#[test]
fn stale_document_and_foreign_format_are_reported() -> TestResult {
    let dir = TempDir::new()?;
    let config = build(&dir, OutputFormat::Turtle)?;
    fs::create_dir_all(config.output_dir.join("2021/06"))?;
    fs::write(config.output_dir.join("2021/06/06.ttl"), "")?;
    fs::write(config.output_dir.join("LDES.trig"), "")?;

    let report = run_all(&config)?;
    let layout: Vec<_> = report.by_validator("layout").filter(|r| r.is_failure()).collect();
    assert_eq!(layout.len(), 2, "{:#?}", failures(&report));
    Ok(())
}

#[test]
fn observation_in_the_wrong_leaf_is_reported() -> TestResult {
    let dir = TempDir::new()?;
    let config = build(&dir, OutputFormat::Turtle)?;
    let leaf = config.output_dir.join("2023/01/31/readings.ttl");
    let content = fs::read_to_string(&leaf)?;
    fs::write(&leaf, content.replace("2023-01-31T23:59:59Z", "2023-02-01T00:00:01Z"))?;

    let report = run_all(&config)?;
    assert!(report
        .by_validator("leaves")
        .any(|r| r.is_failure() && r.message.contains("outside")));
    Ok(())
}

#[test]
fn missing_output_directory_fails_without_error() -> TestResult {
    let dir = TempDir::new()?;
    let config = FragmenterConfig {
        output_dir: dir.path().join("nowhere"),
        ..FragmenterConfig::default()
    };
    let report = run_all(&config)?;
    assert_eq!(report.failure_count(), 1);
    Ok(())
}

#[test]
fn blank_rows_sharing_an_id_build_a_conforming_tree() -> TestResult {
    let dir = TempDir::new()?;
    let config = FragmenterConfig {
        output_dir: dir.path().join("LDES"),
        ..FragmenterConfig::default()
    };
    let blank = |label: &str, time: &str| RawRow {
        subject: Some(TermValue::BlankNode(label.to_owned())),
        ..row(7, time)
    };
    let summary = pipeline::run(
        &config,
        vec![
            blank("b0", "2023-01-31T12:00:00Z"),
            blank("b1", "2023-02-01T12:00:00Z"),
        ],
    )?;
    assert_eq!(summary.members, 2);

    let report = run_all(&config)?;
    assert!(report.all_passed(), "{:#?}", failures(&report));
    Ok(())
}

#[test]
fn snippet_trees_conform_in_every_format() -> TestResult {
    for format in OutputFormat::ALL {
        let dir = TempDir::new()?;
        let config = FragmenterConfig {
            output_dir: dir.path().join("LDES"),
            source: SourceKind::Snippets,
            format,
            ..FragmenterConfig::default()
        };
        let summary = pipeline::run(
            &config,
            vec![
                snippet("a", "2023-01-31T00:00:00Z", "2023-01-31T23:59:59Z"),
                snippet("b", "2023-02-01T00:00:00Z", "2023-02-02T00:00:00Z"),
                snippet("c", "2024-02-29T06:00:00Z", "2024-02-29T07:00:00Z"),
            ],
        )?;
        assert_eq!(summary.members, 3);

        let report = run_all(&config)?;
        assert!(
            report.all_passed(),
            "{format} snippet tree should conform: {:#?}",
            failures(&report)
        );
    }
    Ok(())
}

#[test]
fn leaf_without_stream_declaration_is_reported() -> TestResult {
    let dir = TempDir::new()?;
    let config = build(&dir, OutputFormat::Turtle)?;
    let leaf = config.output_dir.join("2023/02/01/readings.ttl");
    let content = fs::read_to_string(&leaf)?;
    fs::write(&leaf, content.replace("a ldes:EventStream ;", ""))?;

    let report = run_all(&config)?;
    assert!(report
        .by_validator("leaves")
        .any(|r| r.is_failure() && r.details.iter().any(|d| d.contains("2023/02/01"))));

    let quiet = FragmenterConfig {
        leaf_stream: false,
        ..config
    };
    pipeline::run(&quiet, rows())?;
    let report = run_all(&quiet)?;
    assert!(report.all_passed(), "{:#?}", failures(&report));
    Ok(())
}
