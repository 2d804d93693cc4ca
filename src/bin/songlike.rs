//! Terminal front-end: ask for a song, print songs like it

use anyhow::{bail, Result};
use clap::Parser;
use songlike::loader::{fetch_catalog, read_catalog};
use songlike::{
    lookup_title, Feature, FuzzyTitleResolver, RecommendEngine, TitleLookup, TitleResolver,
    WeightError, WeightVector, DEFAULT_RECOMMENDATIONS,
};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn parse_weight(s: &str) -> Result<(Feature, f64), WeightError> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| WeightError::Malformed(s.to_string()))?;
    let feature: Feature = name.parse()?;
    let weight: f64 = value
        .trim()
        .parse()
        .map_err(|_| WeightError::Malformed(s.to_string()))?;
    Ok((feature, weight))
}

#[derive(Parser, Debug)]
#[command(name = "songlike", version, about = "Find songs like the one you name")]
struct CliArgs {
    /// Song title; prompts for titles until an empty line when omitted
    title: Option<String>,

    /// Base URL of the songlike server
    #[arg(long, env = "SONGLIKE_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    #[arg(long, env = "SONGLIKE_CATALOG_TABLE", default_value = "spotify_songs")]
    table: String,

    /// Read the dataset from a local JSON file instead of the server
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// FEATURE=WEIGHT, repeatable; unspecified features weigh 5
    #[arg(long = "weight", value_parser = parse_weight)]
    weights: Vec<(Feature, f64)>,

    #[arg(short = 'n', long, default_value_t = DEFAULT_RECOMMENDATIONS)]
    count: usize,

    /// Accept title corrections without asking
    #[arg(short, long)]
    yes: bool,
}

struct Session<'a> {
    engine: &'a RecommendEngine,
    resolver: &'a dyn TitleResolver,
    weights: WeightVector,
    count: usize,
    assume_yes: bool,
}

impl Session<'_> {
    fn confirm<R: BufRead, W: Write>(
        &self,
        question: &str,
        input: &mut R,
        out: &mut W,
    ) -> io::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        write!(out, "{} [y/N] ", question)?;
        out.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    /// Resolve one typed title and print its recommendations
    fn answer<R: BufRead, W: Write>(
        &self,
        typed: &str,
        input: &mut R,
        out: &mut W,
    ) -> io::Result<()> {
        let title = match lookup_title(self.engine.catalog(), self.resolver, typed) {
            TitleLookup::Exact(title) => title,
            TitleLookup::Suggestion(m) => {
                if !self.confirm(&format!("Did you mean '{}'?", m.title), input, out)? {
                    return Ok(());
                }
                m.title
            }
            TitleLookup::NoMatch => {
                writeln!(out, "Song '{}' not found in the dataset.", typed)?;
                return Ok(());
            }
        };

        match self.engine.recommend(&title, &self.weights, self.count) {
            Ok(recs) => {
                writeln!(out, "Recommendations for '{}':", title)?;
                for (i, song) in recs.iter().enumerate() {
                    writeln!(out, "{}. {} by {}", i + 1, song.title, song.artist)?;
                }
            }
            Err(e) => writeln!(out, "{}", e)?,
        }
        Ok(())
    }

    fn prompt_loop<R: BufRead, W: Write>(&self, input: &mut R, out: &mut W) -> io::Result<()> {
        loop {
            write!(out, "Enter a song name: ")?;
            out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 || line.trim().is_empty() {
                return Ok(());
            }
            self.answer(line.trim(), input, out)?;
            writeln!(out)?;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = CliArgs::parse();
    if args.count == 0 {
        bail!("--count must be at least 1");
    }
    let overrides: HashMap<Feature, f64> = args.weights.iter().copied().collect();
    let weights = WeightVector::from_overrides(&overrides)?;

    let report = match &args.data_file {
        Some(path) => read_catalog(path)?,
        None => {
            let url = format!(
                "{}/get_data/{}",
                args.server.trim_end_matches('/'),
                urlencoding::encode(&args.table)
            );
            fetch_catalog(&reqwest::Client::new(), &url).await?
        }
    };
    if report.catalog.is_empty() {
        bail!("dataset has no usable songs");
    }

    let engine = RecommendEngine::new(report.catalog);
    let resolver = FuzzyTitleResolver::new();
    let session = Session {
        engine: &engine,
        resolver: &resolver,
        weights,
        count: args.count,
        assume_yes: args.yes,
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    match args.title {
        Some(title) => session.answer(&title, &mut input, &mut out)?,
        None => session.prompt_loop(&mut input, &mut out)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use songlike::{Catalog, SongRecord, SharedRecommendEngine, FEATURE_COUNT};

    fn engine() -> SharedRecommendEngine {
        let song = |title: &str, artist: &str, f: [f64; FEATURE_COUNT]| SongRecord {
            title: title.to_string(),
            artist: artist.to_string(),
            features: f,
        };
        RecommendEngine::new(Catalog::new(vec![
            song("Bohemian Rhapsody", "Queen", [70.0, -9.0, 80.0, 0.4, 0.4, 0.2, 0.0]),
            song("Somebody to Love", "Queen", [72.0, -8.0, 70.0, 0.45, 0.5, 0.2, 0.0]),
            song("Around the World", "Daft Punk", [121.0, -6.0, 60.0, 0.95, 0.8, 0.1, 0.9]),
        ]))
    }

    fn run(session: &Session<'_>, typed: &str, stdin: &str) -> String {
        let mut input = io::Cursor::new(stdin.as_bytes().to_vec());
        let mut out = Vec::new();
        session.answer(typed, &mut input, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight("energy=7").unwrap(), (Feature::Energy, 7.0));
        assert_eq!(
            parse_weight("TRACK_POPULARITY= 2.5").unwrap(),
            (Feature::TrackPopularity, 2.5)
        );
        assert!(parse_weight("energy").is_err());
        assert!(parse_weight("bpm=3").is_err());
        assert!(parse_weight("energy=lots").is_err());
    }

    #[test]
    fn test_exact_title_prints_numbered_list() {
        let engine = engine();
        let resolver = FuzzyTitleResolver::new();
        let session = Session {
            engine: &engine,
            resolver: &resolver,
            weights: WeightVector::default(),
            count: 10,
            assume_yes: false,
        };
        let output = run(&session, "bohemian rhapsody", "");
        assert!(output.starts_with("Recommendations for 'Bohemian Rhapsody':\n"));
        assert!(output.contains("1. Somebody to Love by Queen\n"));
        assert!(output.contains("2. Around the World by Daft Punk\n"));
    }

    #[test]
    fn test_suggestion_needs_confirmation() {
        let engine = engine();
        let resolver = FuzzyTitleResolver::new();
        let session = Session {
            engine: &engine,
            resolver: &resolver,
            weights: WeightVector::default(),
            count: 1,
            assume_yes: false,
        };

        let declined = run(&session, "Bohemian Rapsody", "n\n");
        assert_eq!(declined, "Did you mean 'Bohemian Rhapsody'? [y/N] ");

        let accepted = run(&session, "Bohemian Rapsody", "y\n");
        assert!(accepted.contains("Recommendations for 'Bohemian Rhapsody':"));
        assert!(accepted.contains("1. Somebody to Love by Queen"));
    }

    #[test]
    fn test_unresolvable_title() {
        let engine = engine();
        let resolver = FuzzyTitleResolver::new();
        let session = Session {
            engine: &engine,
            resolver: &resolver,
            weights: WeightVector::default(),
            count: 3,
            assume_yes: true,
        };
        assert_eq!(run(&session, "?!", ""), "Song '?!' not found in the dataset.\n");
        // Accepting corrections never turns gibberish into some title
        assert_eq!(run(&session, "xqzvwk", ""), "Song 'xqzvwk' not found in the dataset.\n");
    }

    #[test]
    fn test_prompt_loop_stops_on_empty_line() {
        let engine = engine();
        let resolver = FuzzyTitleResolver::new();
        let session = Session {
            engine: &engine,
            resolver: &resolver,
            weights: WeightVector::default(),
            count: 1,
            assume_yes: true,
        };
        let mut input = io::Cursor::new(b"around the world\n\nsomebody to love\n".to_vec());
        let mut out = Vec::new();
        session.prompt_loop(&mut input, &mut out).unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Recommendations for 'Around the World':"));
        assert!(!output.contains("Recommendations for 'Somebody to Love':"));
    }
}
