//! Command-line driver for the adaptive sorting engine
//!
//! Reads whitespace-separated numbers from files or standard input, sorts them
//! and writes one value per line.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process;

use hyperion_sort::{
    config::{SortConfig, SortConfigBuilder, Strategy},
    error::{SortContext, SortError, SortResult},
    SortEngine, EXIT_SUCCESS,
};

fn main() {
    let matches = build_cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("hyperion-sort: {e}");
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn run(matches: &ArgMatches) -> SortResult<i32> {
    let config = parse_config_from_matches(matches)?;

    let inputs: Vec<String> = matches
        .get_many::<String>("files")
        .map(|files| files.cloned().collect())
        .unwrap_or_default();
    let values = read_values(&inputs)?;

    let engine = SortEngine::new(config)?;
    let (sorted, stats) = engine.sort(&values);

    if stats.error_detected && stats.algorithm_used.is_none() {
        return Err(SortError::internal(&format!(
            "strategy {} failed; see log for details",
            stats.strategy_used
        )));
    }
    log::info!(
        "{} items, strategy {}, algorithm {}, {:.4}s ({:.0} items/s)",
        stats.items_processed,
        stats.strategy_used,
        stats.algorithm_name(),
        stats.execution_time,
        stats.items_per_second()
    );

    match matches.get_one::<String>("output") {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create {path}"))?;
            write_values(BufWriter::new(file), &sorted)?;
        }
        None => write_values(BufWriter::new(io::stdout().lock()), &sorted)?,
    }

    Ok(EXIT_SUCCESS)
}

fn build_cli() -> Command {
    Command::new("hyperion-sort")
        .version(env!("CARGO_PKG_VERSION"))
        .override_usage("hyperion-sort [OPTION]... [FILE]...")
        .about("Sort numbers with an adaptively chosen strategy")

        // Input files
        .arg(Arg::new("files")
            .help("Input files (use '-' or omit for stdin)")
            .num_args(0..)
            .value_name("FILE"))
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .help("Write result to FILE instead of standard output")
            .value_name("FILE"))

        // Strategy selection
        .arg(Arg::new("strategy")
            .short('S')
            .long("strategy")
            .help("Strategy to use (auto, parallel, memory-efficient, hybrid, adaptive, stream, block-sort, bucket-sort, radix-sort, compression-sort, external-sort)")
            .value_name("NAME")
            .default_value("auto"))
        .arg(Arg::new("learned")
            .long("learned")
            .help("Let the predictor choose the strategy")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("model")
            .long("model")
            .help("Load a pre-trained linear predictor from a JSON file")
            .value_name("FILE"))
        .arg(Arg::new("seed")
            .long("seed")
            .help("Seed for sampling, for reproducible selection")
            .value_name("N"))

        // Resources
        .arg(Arg::new("threads")
            .short('j')
            .long("threads")
            .help("Number of worker threads")
            .value_name("N"))
        .arg(Arg::new("chunk-size")
            .long("chunk-size")
            .help("Elements per stream window or parallel chunk")
            .value_name("N"))
        .arg(Arg::new("block-size")
            .long("block-size")
            .help("Elements per block for block sort")
            .value_name("N"))
        .arg(Arg::new("cache-size")
            .long("cache-size")
            .help("Initial capacity of the memo cache")
            .value_name("N"))
        .arg(Arg::new("stream")
            .long("stream")
            .help("Sort the input in adaptive windows and merge them")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("compression-threshold")
            .long("compression-threshold")
            .help("Minimum number of items for a compression attempt")
            .value_name("N"))
        .arg(Arg::new("external-threshold")
            .long("external-threshold")
            .help("Number of items above which the input is sorted on disk")
            .value_name("N"))
        .arg(Arg::new("temporary-directory")
            .short('T')
            .long("temporary-directory")
            .help("Use DIR for temporaries, not $TMPDIR or /tmp")
            .value_name("DIR"))

        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("Log progress to stderr")
            .action(ArgAction::SetTrue))
}

fn parse_count(matches: &ArgMatches, name: &str) -> SortResult<Option<usize>> {
    matches
        .get_one::<String>(name)
        .map(|value| {
            value
                .parse::<usize>()
                .map_err(|_| SortError::parse_error(&format!("invalid --{name}: {value}")))
        })
        .transpose()
}

/// Parse configuration from command line matches
fn parse_config_from_matches(matches: &ArgMatches) -> SortResult<SortConfig> {
    let mut builder = SortConfigBuilder::new();

    if let Some(name) = matches.get_one::<String>("strategy") {
        builder = builder.strategy(name.parse::<Strategy>()?);
    }
    if matches.get_flag("learned") {
        builder = builder.learned();
    }
    if let Some(model) = matches.get_one::<String>("model") {
        builder = builder.model(PathBuf::from(model));
    }
    if matches.get_flag("stream") {
        builder = builder.stream();
    }
    if let Some(seed) = matches.get_one::<String>("seed") {
        let seed = seed
            .parse::<u64>()
            .map_err(|_| SortError::parse_error(&format!("invalid --seed: {seed}")))?;
        builder = builder.seed(seed);
    }

    if let Some(threads) = parse_count(matches, "threads")? {
        builder = builder.workers(threads);
    }
    if let Some(chunk) = parse_count(matches, "chunk-size")? {
        builder = builder.chunk_size(chunk);
    }
    if let Some(block) = parse_count(matches, "block-size")? {
        builder = builder.block_size(block);
    }
    if let Some(cache) = parse_count(matches, "cache-size")? {
        builder = builder.cache_size(cache);
    }
    if let Some(threshold) = parse_count(matches, "compression-threshold")? {
        builder = builder.compression_threshold(threshold);
    }
    if let Some(threshold) = parse_count(matches, "external-threshold")? {
        builder = builder.external_threshold(threshold);
    }
    if let Some(dir) = matches.get_one::<String>("temporary-directory") {
        builder = builder.temp_dir(PathBuf::from(dir));
    }

    builder.build()
}

/// Read every input (stdin for none or "-") as whitespace-separated numbers
fn read_values(inputs: &[String]) -> SortResult<Vec<f64>> {
    let mut values = Vec::new();

    if inputs.is_empty() {
        parse_values(io::stdin().lock(), "-", &mut values)?;
        return Ok(values);
    }

    for input in inputs {
        if input == "-" {
            parse_values(io::stdin().lock(), "-", &mut values)?;
        } else {
            let file = File::open(input).with_context(|| format!("cannot read {input}"))?;
            parse_values(file, input, &mut values)?;
        }
    }
    Ok(values)
}

fn parse_values<R: Read>(reader: R, name: &str, values: &mut Vec<f64>) -> SortResult<()> {
    let reader = BufReader::new(reader);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("cannot read {name}"))?;
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| {
                SortError::parse_error(&format!("{name}:{}: not a number: {token}", line_no + 1))
            })?;
            values.push(value);
        }
    }
    Ok(())
}

fn write_values<W: Write>(mut writer: W, values: &[f64]) -> SortResult<()> {
    for value in values {
        writeln!(writer, "{value}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_config() {
        let matches = build_cli()
            .try_get_matches_from(["hyperion-sort", "--strategy", "radix-sort", "-j", "3"])
            .expect("Failed to parse test arguments");

        let config = parse_config_from_matches(&matches).expect("Failed to parse test config");
        assert_eq!(config.strategy, Strategy::RadixSort);
        assert_eq!(config.worker_count, Some(3));
        assert!(!config.stream_mode);
    }

    #[test]
    fn test_parse_resource_options() {
        let matches = build_cli()
            .try_get_matches_from([
                "hyperion-sort",
                "--stream",
                "--chunk-size", "500",
                "--external-threshold", "1000",
                "--seed", "7",
                "-T", "/tmp",
                "input.txt",
            ])
            .expect("Failed to parse test arguments");

        let config = parse_config_from_matches(&matches).expect("Failed to parse test config");
        assert!(config.stream_mode);
        assert_eq!(config.chunk_size, Some(500));
        assert_eq!(config.external_sort_threshold, 1000);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.temp_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_rejects_bad_values() {
        let matches = build_cli()
            .try_get_matches_from(["hyperion-sort", "--strategy", "bogo"])
            .expect("Failed to parse test arguments");
        assert!(matches!(
            parse_config_from_matches(&matches),
            Err(SortError::ParseError { .. })
        ));

        let matches = build_cli()
            .try_get_matches_from(["hyperion-sort", "--block-size", "0"])
            .expect("Failed to parse test arguments");
        assert!(matches!(
            parse_config_from_matches(&matches),
            Err(SortError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_parse_values() {
        let mut values = Vec::new();
        parse_values("3 1.5\n-2\n\n  1e3 ".as_bytes(), "test", &mut values).expect("parse");
        assert_eq!(values, vec![3.0, 1.5, -2.0, 1000.0]);

        let err = parse_values("1 x".as_bytes(), "test", &mut values).unwrap_err();
        assert!(err.to_string().contains("test:1"));
    }

    #[test]
    fn test_write_values() {
        let mut out = Vec::new();
        write_values(&mut out, &[-1.0, 2.5, 3.0]).expect("write");
        assert_eq!(String::from_utf8(out).unwrap(), "-1\n2.5\n3\n");
    }
}
