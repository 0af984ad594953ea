#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;
use tc_conformance::bench::{BenchmarkConfig, GeneratedBenchmarkConfig, run_generated_benchmarks};
use tc_conformance::fuzz::{FuzzBudget, FuzzConfig, InputStrategy, run_fuzz};
use tc_conformance::suite::{default_cases, run_suite};
use tc_conformance::check_consistency;
use tc_core::Alphabet;
use tc_exec::{ProcessAdapter, default_variants};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage());
    }

    let command = args.remove(0);
    match command.as_str() {
        "fuzz" => cmd_fuzz(args),
        "bench" => cmd_bench(args),
        "suite" => cmd_suite(args),
        "check" => cmd_check(args),
        _ => Err(usage()),
    }
}

fn cmd_fuzz(args: Vec<String>) -> Result<(), String> {
    let adapter = adapter_from_flags(&args)?;
    let seed = optional_u64_flag(&args, "--seed")?.unwrap_or(0);
    let program_len = optional_usize_flag(&args, "--length")?.unwrap_or(80);
    let max_depth = optional_usize_flag(&args, "--max-depth")?.unwrap_or(2);
    let no_loops = has_flag(&args, "--no-loops");
    let keep_going = has_flag(&args, "--keep-going");

    let budget = match (
        optional_f64_flag(&args, "--seconds")?,
        optional_u64_flag(&args, "--trials")?,
    ) {
        (Some(_), Some(_)) => {
            return Err("pass either --seconds or --trials, not both".to_owned());
        }
        (None, Some(trials)) => FuzzBudget::Trials(trials),
        (seconds, None) => FuzzBudget::Duration(Duration::from_secs_f64(seconds.unwrap_or(2.0))),
    };

    // Straight-line fuzzing exercises i/o under random stdin; loop fuzzing
    // sticks to output-only tokens and no input, like the original harness.
    let config = if no_loops {
        FuzzConfig {
            seed,
            alphabet: parse_alphabet("+-<>,.")?,
            program_len,
            max_depth: 0,
            input: InputStrategy::RandomMatchingProgramLength,
            budget,
            fail_fast: !keep_going,
        }
    } else {
        FuzzConfig {
            seed,
            alphabet: parse_alphabet("<>+-[].")?,
            program_len,
            max_depth,
            input: InputStrategy::Empty,
            budget,
            fail_fast: !keep_going,
        }
    };

    let report = run_fuzz(&adapter, &default_variants(), &config).map_err(|err| err.to_string())?;
    print_json(&report)?;
    if report.found_failure() {
        return Err("divergence or engine failure found; see report".to_owned());
    }
    Ok(())
}

fn cmd_bench(args: Vec<String>) -> Result<(), String> {
    let adapter = adapter_from_flags(&args)?;
    let mut config = GeneratedBenchmarkConfig {
        seed: optional_u64_flag(&args, "--seed")?.unwrap_or(0),
        ..GeneratedBenchmarkConfig::default()
    };
    if let Some(len) = optional_usize_flag(&args, "--length")? {
        config.program_len = len;
    }
    if let Some(depth) = optional_usize_flag(&args, "--max-depth")? {
        config.max_depth = depth;
    }
    if let Some(programs) = optional_usize_flag(&args, "--programs")? {
        config.programs_per_level = programs;
    }
    let trials = optional_usize_flag(&args, "--trials")?;
    let repeats = optional_usize_flag(&args, "--repeats")?;
    config.timer = BenchmarkConfig {
        trials: trials.unwrap_or(config.timer.trials),
        inner_repeats: repeats.unwrap_or(config.timer.inner_repeats),
    };

    let levels = run_generated_benchmarks(&adapter, &default_variants(), &config)
        .map_err(|err| err.to_string())?;
    print_json(&levels)
}

fn cmd_suite(args: Vec<String>) -> Result<(), String> {
    let adapter = adapter_from_flags(&args)?;
    let report = run_suite(&adapter, &default_variants(), &default_cases())
        .map_err(|err| err.to_string())?;
    print_json(&report)?;
    if report.failed > 0 {
        return Err(format!("{} of {} suite checks failed", report.failed, report.total));
    }
    Ok(())
}

fn cmd_check(args: Vec<String>) -> Result<(), String> {
    let adapter = adapter_from_flags(&args)?;
    let program = required_path_flag(&args, "--program")?;
    let input = match optional_path_flag(&args, "--input-file")? {
        Some(path) => std::fs::read(&path)
            .map_err(|err| format!("cannot read {}: {err}", path.display()))?,
        None => Vec::new(),
    };

    match check_consistency(&adapter, &default_variants(), &program, &input) {
        Ok(()) => {
            println!("all variants agree on {}", program.display());
            Ok(())
        }
        Err(failure) => Err(failure.to_string()),
    }
}

fn adapter_from_flags(args: &[String]) -> Result<ProcessAdapter, String> {
    let engine = required_path_flag(args, "--engine")?;
    let mut adapter = ProcessAdapter::new(engine);
    if let Some(ms) = optional_u64_flag(args, "--timeout-ms")? {
        let timeout = if ms == 0 { None } else { Some(Duration::from_millis(ms)) };
        adapter = adapter.with_timeout(timeout);
    }
    Ok(adapter)
}

fn parse_alphabet(tokens: &str) -> Result<Alphabet, String> {
    Alphabet::from_tokens(tokens).map_err(|err| err.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == name)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

fn required_path_flag(args: &[String], name: &str) -> Result<PathBuf, String> {
    flag_value(args, name)
        .map(PathBuf::from)
        .ok_or_else(|| format!("missing required flag {name}\n{}", usage()))
}

fn optional_path_flag(args: &[String], name: &str) -> Result<Option<PathBuf>, String> {
    Ok(flag_value(args, name).map(PathBuf::from))
}

fn optional_u64_flag(args: &[String], name: &str) -> Result<Option<u64>, String> {
    flag_value(args, name)
        .map(|raw| raw.parse::<u64>().map_err(|err| format!("{name}: {err}")))
        .transpose()
}

fn optional_usize_flag(args: &[String], name: &str) -> Result<Option<usize>, String> {
    flag_value(args, name)
        .map(|raw| raw.parse::<usize>().map_err(|err| format!("{name}: {err}")))
        .transpose()
}

fn optional_f64_flag(args: &[String], name: &str) -> Result<Option<f64>, String> {
    flag_value(args, name)
        .map(|raw| raw.parse::<f64>().map_err(|err| format!("{name}: {err}")))
        .transpose()
}

fn usage() -> String {
    [
        "Usage: tapecheck <command> --engine <path> [flags]",
        "",
        "Commands:",
        "  fuzz   differential fuzzing: fresh random programs until the budget runs out",
        "         [--seed N] [--length N] [--max-depth N] [--seconds F | --trials N]",
        "         [--no-loops] [--keep-going] [--timeout-ms N]",
        "  bench  min-of-N timing of generated programs at each nesting level",
        "         [--seed N] [--length N] [--max-depth N] [--programs N]",
        "         [--trials N] [--repeats N] [--timeout-ms N]",
        "  suite  known-program conformance checks across all variants",
        "         [--timeout-ms N]",
        "  check  one differential comparison of an existing program file",
        "         --program <path> [--input-file <path>] [--timeout-ms N]",
    ]
    .join("\n")
}
