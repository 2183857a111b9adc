//! Reading and writing Q&A tables in their JSON form.
//!
//! A table is a JSON array of objects with `question`, `answer` (string or
//! list of strings) and, for embedded tables, `embedding`. Unknown fields are
//! ignored so exports from other tools load as-is.

use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::{
    domain::{Dataset, DatasetSource, DomainError, QaEntry, Record},
    infrastructure::http_client::describe_http_error,
};

/// Parse raw table rows without requiring embeddings.
pub fn parse_entries(reader: impl Read) -> Result<Vec<QaEntry>, DomainError> {
    serde_json::from_reader(reader)
        .map_err(|err| DomainError::dataset(format!("invalid Q&A table: {err}")))
}

/// Parse an embedded table into records, one per answer.
pub fn parse_records(reader: impl Read) -> Result<Vec<Record>, DomainError> {
    entries_into_records(parse_entries(reader)?)
}

pub fn read_entries_from_path(path: impl AsRef<Path>) -> Result<Vec<QaEntry>, DomainError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|err| {
        DomainError::dataset(format!("failed to open {}: {err}", path.display()))
    })?;
    parse_entries(std::io::BufReader::new(file))
}

pub fn load_records_from_path(path: impl AsRef<Path>) -> Result<Vec<Record>, DomainError> {
    entries_into_records(read_entries_from_path(path)?)
}

pub fn load_records_from_url(agent: &ureq::Agent, url: &str) -> Result<Vec<Record>, DomainError> {
    let response = agent.get(url).call().map_err(|err| {
        DomainError::dataset(format!(
            "failed to fetch {url}: {}",
            describe_http_error(err)
        ))
    })?;
    parse_records(response.into_reader())
}

/// Load a full snapshot from the given origin.
pub fn load_dataset(source: &DatasetSource, agent: &ureq::Agent) -> Result<Dataset, DomainError> {
    let records = match source {
        DatasetSource::File(path) => load_records_from_path(path)?,
        DatasetSource::Url(url) => load_records_from_url(agent, url)?,
        DatasetSource::Inline => {
            return Err(DomainError::validation(
                "inline datasets have no origin to load from",
            ))
        }
    };

    let dataset = Dataset::new(records, source.clone())?;
    info!(
        target: "tanya::dataset",
        source = %source,
        records = dataset.len(),
        questions = dataset.distinct_questions(),
        dims = ?dataset.dimensions(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Write records back out as an embedded table, one row per record.
pub fn write_records(path: impl AsRef<Path>, records: &[Record]) -> Result<(), DomainError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            DomainError::dataset(format!("failed to create {}: {err}", parent.display()))
        })?;
    }
    let payload = serde_json::to_vec_pretty(records)
        .map_err(|err| DomainError::dataset(format!("serialization error: {err}")))?;
    fs::write(path, payload)
        .map_err(|err| DomainError::dataset(format!("failed to write {}: {err}", path.display())))
}

fn entries_into_records(entries: Vec<QaEntry>) -> Result<Vec<Record>, DomainError> {
    let mut records = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let Some(embedding) = entry.embedding else {
            return Err(DomainError::dataset(format!(
                "entry {index} (`{}`) has no embedding",
                entry.question
            )));
        };

        let answers = entry.answer.into_answers();
        if answers.is_empty() {
            warn!(
                target: "tanya::dataset",
                index,
                question = %entry.question,
                "skipping entry without answers"
            );
            continue;
        }

        for answer in answers {
            records.push(Record::new(entry.question.clone(), answer, embedding.clone()));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::build_agent;
    use httpmock::prelude::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::tempdir;

    const TABLE: &str = r#"[
        {"question": "What is your refund policy?", "answer": "30 days", "embedding": [1.0, 0.0], "source": "rfp-2023"},
        {"question": "Do you ship abroad?", "answer": ["Yes", "To 40 countries"], "embedding": [0.0, 1.0]},
        {"question": "Unanswered", "answer": [], "embedding": [0.5, 0.5]}
    ]"#;

    #[test]
    fn parses_rows_and_expands_answer_lists() {
        let records = parse_records(TABLE.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].answer, "30 days");
        assert_eq!(records[1].question, "Do you ship abroad?");
        assert_eq!(records[2].answer, "To 40 countries");
        assert_eq!(records[2].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn missing_embedding_is_rejected() {
        let err = parse_records(r#"[{"question":"q","answer":"a"}]"#.as_bytes()).unwrap_err();
        assert!(matches!(err, DomainError::Dataset(_)));
    }

    #[test]
    fn malformed_json_is_a_dataset_error() {
        let err = parse_records("{not json".as_bytes()).unwrap_err();
        assert!(matches!(err, DomainError::Dataset(_)));
    }

    #[test]
    fn load_dataset_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rfp.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();

        let agent = ureq::agent();
        let dataset = load_dataset(&DatasetSource::File(path.clone()), &agent).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.distinct_questions(), 2);
        assert_eq!(dataset.dimensions(), Some(2));
        assert_eq!(dataset.source(), &DatasetSource::File(path));
    }

    #[test]
    fn ragged_table_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.json");
        fs::write(
            &path,
            r#"[{"question":"a","answer":"x","embedding":[1.0]},{"question":"b","answer":"y","embedding":[1.0,2.0]}]"#,
        )
        .unwrap();

        let err = load_dataset(&DatasetSource::File(path), &ureq::agent()).unwrap_err();
        assert!(matches!(err, DomainError::DimensionMismatch { .. }));
    }

    #[test]
    fn written_records_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("embedded.json");
        let records = vec![
            Record::new("q1", "a1", vec![0.25, 0.75]),
            Record::new("q1", "a2", vec![0.25, 0.75]),
        ];

        write_records(&path, &records).unwrap();
        let loaded = load_records_from_path(&path).unwrap();

        assert_eq!(loaded, records);
    }

    #[test]
    fn table_loads_from_url() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/qa.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(TABLE);
        });
        let agent = build_agent(Duration::from_secs(5));

        let records = load_records_from_url(&agent, &server.url("/qa.json")).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].answer, "To 40 countries");

        let url = server.url("/qa.json");
        let dataset = load_dataset(&DatasetSource::Url(url.clone()), &agent).unwrap();
        assert_eq!(dataset.distinct_questions(), 2);
        assert_eq!(dataset.source(), &DatasetSource::Url(url));
        mock.assert_hits(2);
    }

    #[test]
    fn failed_download_is_a_dataset_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.json");
            then.status(404);
        });

        let err = load_records_from_url(&ureq::agent(), &server.url("/missing.json")).unwrap_err();
        match err {
            DomainError::Dataset(message) => assert!(message.contains("HTTP error: 404"), "{message}"),
            other => panic!("expected dataset error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_records_from_path("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }
}
