//! Streaming ingest of the IMDb `title.ratings.tsv.gz` dataset (spec §4.4 steps 1-5), grounded in
//! the pack's `flate2` streaming-decompress idiom.

// std
use std::{collections::HashMap, io::BufRead};
// crates.io
use flate2::read::GzDecoder;
use url::Url;
// self
use crate::{_prelude::*, ratings::store::{Rating, RatingsSnapshot}};

const FLUSH_BATCH: usize = 10_000;

/// What an ingest attempt produced.
pub enum IngestOutcome {
	/// The dataset's source tag matched the previously stored one; the live set is unchanged.
	Unchanged,
	/// A fresh snapshot was parsed and is ready to be swapped in.
	Imported { snapshot: RatingsSnapshot, rows_imported: usize },
}

/// Perform one conditional fetch-and-parse attempt against `dataset_url`.
///
/// When `previous_tag` is `Some` and the server responds `304 Not Modified`, returns
/// [`IngestOutcome::Unchanged`] without downloading the body (spec §4.4 step 2).
pub async fn fetch(
	http: &reqwest::Client,
	dataset_url: &Url,
	min_votes: u32,
	previous_tag: Option<&str>,
) -> Result<IngestOutcome> {
	let mut request = http.get(dataset_url.clone());

	if let Some(tag) = previous_tag {
		request = request.header(reqwest::header::IF_NONE_MATCH, tag);
	}

	let response = request.send().await?;

	if response.status() == reqwest::StatusCode::NOT_MODIFIED {
		return Ok(IngestOutcome::Unchanged);
	}

	let response = response.error_for_status()?;
	let source_tag =
		response.headers().get(reqwest::header::ETAG).and_then(|value| value.to_str().ok()).map(str::to_string);
	let body = response.bytes().await?;

	let ratings = tokio::task::spawn_blocking(move || parse_tsv_gz(&body, min_votes))
		.await
		.map_err(|err| Error::Internal(err.to_string()))??;

	let rows_imported = ratings.len();

	Ok(IngestOutcome::Imported {
		snapshot: RatingsSnapshot { ratings, source_tag, imported_at: Some(Utc::now()) },
		rows_imported,
	})
}

/// Parse a gzip-compressed TSV body into a ratings map.
///
/// Runs synchronously (intended to be called from [`tokio::task::spawn_blocking`]): skips the
/// header line, drops malformed or under-vote rows, and logs a trace event every
/// [`FLUSH_BATCH`] accepted rows (spec §4.4 step 3, "flush in batches of 10 000").
fn parse_tsv_gz(body: &bytes::Bytes, min_votes: u32) -> Result<HashMap<String, Rating>> {
	let decoder = GzDecoder::new(&body[..]);
	let reader = std::io::BufReader::new(decoder);
	let mut ratings = HashMap::new();
	let mut since_flush = 0usize;

	for (line_no, line) in reader.lines().enumerate() {
		let line = line?;

		if line_no == 0 {
			continue;
		}

		let mut fields = line.split('\t');
		let (Some(id), Some(average), Some(votes)) = (fields.next(), fields.next(), fields.next())
		else {
			continue;
		};

		let Ok(average) = average.parse::<f32>() else { continue };
		let Ok(votes) = votes.parse::<u32>() else { continue };

		if votes < min_votes {
			continue;
		}

		ratings.insert(id.to_string(), Rating { average, votes });
		since_flush += 1;

		if since_flush >= FLUSH_BATCH {
			since_flush = 0;
			tracing::trace!(imported = ratings.len(), "ratings ingest batch flushed");
		}
	}

	Ok(ratings)
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	fn gzip(text: &str) -> bytes::Bytes {
		let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());

		encoder.write_all(text.as_bytes()).unwrap();

		bytes::Bytes::from(encoder.finish().unwrap())
	}

	#[test]
	fn parses_rows_above_vote_threshold_and_skips_header() {
		let body = gzip("tconst\taverageRating\tnumVotes\ntt0000001\t5.7\t2000\ntt0000002\t8.1\t50\n");
		let ratings = parse_tsv_gz(&body, 100).unwrap();

		assert_eq!(ratings.len(), 1);
		assert_eq!(ratings["tt0000001"].votes, 2000);
	}

	#[test]
	fn skips_malformed_rows_without_failing_the_batch() {
		let body = gzip("tconst\taverageRating\tnumVotes\nbadrow\ntt0000002\t8.1\t500\n");
		let ratings = parse_tsv_gz(&body, 100).unwrap();

		assert_eq!(ratings.len(), 1);
		assert!(ratings.contains_key("tt0000002"));
	}
}
