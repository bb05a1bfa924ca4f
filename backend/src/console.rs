//! Interactive prediction session over stdin/stdout.

use std::io::{self, BufRead, Write};

use crate::catalog::RegionCatalog;
use crate::model::TrainedArtifact;
use crate::predictor::{Query, Responder};

pub const EXIT_WORDS: [&str; 3] = ["salir", "exit", "quit"];

const SAMPLE_REGIONS: usize = 5;
const SAMPLE_COUNTRIES: usize = 3;

/// Prompt and read one answer. `None` on end of input or an exit word.
fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<Option<String>> {
    write!(out, "{prompt}")?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let answer = line.trim();
    if EXIT_WORDS.iter().any(|w| answer.eq_ignore_ascii_case(w)) {
        return Ok(None);
    }
    Ok(Some(answer.to_string()))
}

pub fn run_session<R: BufRead, W: Write>(
    artifact: &TrainedArtifact,
    catalog: &RegionCatalog,
    responder: Responder,
    mut input: R,
    mut out: W,
) -> io::Result<()> {
    writeln!(out, "--- Disaster Probability Prediction ---")?;
    writeln!(out, "Enter a region and a country to see disaster probabilities.")?;
    writeln!(out, "Type '{}' at any time to finish.", EXIT_WORDS.join("' / '"))?;

    let continents = catalog.continents();
    if !continents.is_empty() {
        let sample: Vec<&str> = continents.iter().take(SAMPLE_REGIONS).map(String::as_str).collect();
        writeln!(out, "\nExample regions: {}, etc.", sample.join(", "))?;
    }

    loop {
        let Some(region) = ask(&mut input, &mut out, "\nRegion (continent): ")? else {
            break;
        };

        match catalog.countries(&region) {
            Ok((continent, countries)) if !countries.is_empty() => {
                let sample: Vec<&str> = countries.iter().take(SAMPLE_COUNTRIES).map(String::as_str).collect();
                writeln!(out, "Example countries in '{continent}': {}...", sample.join(", "))?;
            }
            _ => writeln!(out, "Type the country name (e.g. Mexico, Japan, Germany)...")?,
        }

        let Some(country) = ask(&mut input, &mut out, "Country: ")? else {
            break;
        };

        let query = Query::new(&region, &country);
        match responder.respond(Some(artifact), &query) {
            Ok(result) => {
                writeln!(out, "\n--- Results for: {}, {} ---", result.country, result.region)?;
                if result.ranked.iter().all(|(_, p)| *p == 0.0) {
                    writeln!(out, "No historical data found for this country/region combination.")?;
                    writeln!(out, "The model predicts 0% for every disaster type.")?;
                } else {
                    for (disaster_type, probability) in &result.ranked {
                        writeln!(out, "- {disaster_type}: {:.2}%", probability * 100.0)?;
                    }
                }
            }
            Err(e) => {
                log::error!("Console prediction failed: {}", e);
                writeln!(out, "{e}")?;
                writeln!(out, "Check that the names are spelled correctly.")?;
            }
        }
    }

    writeln!(out, "\nGoodbye.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactMetadata, LabelEncoder, ModelError, ProbabilityModel};
    use crate::predictor::ZeroProbabilityPolicy;

    #[derive(Debug)]
    struct JapanOnly;

    impl ProbabilityModel for JapanOnly {
        fn predict_probabilities(&self, _: &str, country: &str) -> Result<Vec<f64>, ModelError> {
            Ok(match country {
                "Japan" => vec![0.75, 0.0, 0.25],
                _ => vec![0.0, 0.0, 0.0],
            })
        }
        fn n_classes(&self) -> usize {
            3
        }
        fn model_type(&self) -> String {
            "JapanOnly".into()
        }
        fn feature_names(&self) -> Vec<String> {
            vec!["Region".into(), "Country".into()]
        }
    }

    fn session(script: &str, policy: ZeroProbabilityPolicy) -> String {
        let labels = LabelEncoder::fit(["Earthquake", "Flood", "Storm"]).unwrap();
        let artifact =
            TrainedArtifact::new(Box::new(JapanOnly), labels, ArtifactMetadata::new(0, 0, None)).unwrap();
        let catalog = RegionCatalog::from_pairs([
            ("Asia", "Japan"),
            ("Asia", "India"),
            ("Asia", "China"),
            ("Asia", "Nepal"),
            ("Europe", "Italy"),
        ]);

        let mut out = Vec::new();
        run_session(&artifact, &catalog, Responder::new(policy), script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn prints_ranked_percentages() {
        let out = session("asia\njapan\nsalir\n", ZeroProbabilityPolicy::Drop);
        assert!(out.contains("Example regions: Asia, Europe, etc."));
        assert!(out.contains("Example countries in 'Asia': China, India, Japan..."));
        assert!(out.contains("--- Results for: Japan, Asia ---"));
        assert!(out.contains("- Earthquake: 75.00%\n- Storm: 25.00%\n"));
        assert!(!out.contains("Flood"));
    }

    #[test]
    fn show_all_keeps_zero_entries() {
        let out = session("Asia\nJapan\n", ZeroProbabilityPolicy::Keep);
        assert!(out.contains("- Flood: 0.00%"));
        assert!(out.ends_with("Goodbye.\n"));
    }

    #[test]
    fn unseen_pair_prints_notice() {
        let out = session("Antarctica\nNowhere\nquit\n", ZeroProbabilityPolicy::Drop);
        assert!(out.contains("Type the country name"));
        assert!(out.contains("No historical data found"));
    }

    #[test]
    fn exit_word_at_country_prompt_ends_session() {
        let out = session("Asia\nEXIT\nAsia\nJapan\n", ZeroProbabilityPolicy::Drop);
        assert!(!out.contains("Results for"));
    }
}
