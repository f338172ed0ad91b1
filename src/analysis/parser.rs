/// Single-pass parser for benchmark log output.
///
/// Recognised lines look like `[<timestamp>] [<tag>] [info] <name>: <value>`
/// (whitespace between the bracket groups is optional). Each name maps to one
/// field and one value rule. The first valid line for a field wins; fields
/// that never appear keep their "unreported" value (0, "" or false).
///
/// The workload identity is the exception: it is the last bare `N_K_L`
/// triple anywhere in the output, because earlier ones usually belong to
/// echoed file paths.

use std::collections::HashSet;
use std::num::ParseIntError;

use regex::{Captures, Regex};

use super::{ParsedRun, RunConfiguration, RunResult};
use crate::errors::BenchError;

/// How a field's value text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Leading run of digits, base 10
    Integer,
    /// Leading digits with an optional fractional part
    Float,
    /// First token; true iff it equals "true" ignoring case
    Flag,
    /// Rest of the line, trailing whitespace trimmed
    Text,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Integer(i64),
    Float(f64),
    Flag(bool),
    Text(String),
}

/// Every field the benchmark can report by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    BlocksInMemory,
    RawReadPerc,
    RawWritePerc,
    MixedWritesPerc,
    MixedReadsPerc,
    UpdatesPerc,
    ShortRange,
    MidRange,
    LongRange,
    Runs,
    Repeat,
    Seed,
    NumThreads,
    ResultsCsv,
    ResultsLog,
    InputFile,
    BinaryInput,
    Validate,
    Verbose,
    PreloadTime,
    RawWritesTime,
    RawReadsTime,
    MixedTime,
    UpdatesTime,
    ShortRangeTime,
    MidRangeTime,
    LongRangeTime,
    Size,
    Height,
    Internal,
    Leaves,
    FastInserts,
    Redistribute,
    SoftResets,
    HardResets,
    FastInsertsFail,
    Sort,
}

impl Field {
    const ALL: [Field; 37] = [
        Field::BlocksInMemory,
        Field::RawReadPerc,
        Field::RawWritePerc,
        Field::MixedWritesPerc,
        Field::MixedReadsPerc,
        Field::UpdatesPerc,
        Field::ShortRange,
        Field::MidRange,
        Field::LongRange,
        Field::Runs,
        Field::Repeat,
        Field::Seed,
        Field::NumThreads,
        Field::ResultsCsv,
        Field::ResultsLog,
        Field::InputFile,
        Field::BinaryInput,
        Field::Validate,
        Field::Verbose,
        Field::PreloadTime,
        Field::RawWritesTime,
        Field::RawReadsTime,
        Field::MixedTime,
        Field::UpdatesTime,
        Field::ShortRangeTime,
        Field::MidRangeTime,
        Field::LongRangeTime,
        Field::Size,
        Field::Height,
        Field::Internal,
        Field::Leaves,
        Field::FastInserts,
        Field::Redistribute,
        Field::SoftResets,
        Field::HardResets,
        Field::FastInsertsFail,
        Field::Sort,
    ];

    /// Name as printed by the benchmark executable.
    fn log_name(self) -> &'static str {
        match self {
            Field::BlocksInMemory => "blocks_in_memory",
            Field::RawReadPerc => "raw_read_perc",
            Field::RawWritePerc => "raw_write_perc",
            Field::MixedWritesPerc => "mixed_writes_perc",
            Field::MixedReadsPerc => "mixed_reads_perc",
            Field::UpdatesPerc => "updates_perc",
            Field::ShortRange => "short_range",
            Field::MidRange => "mid_range",
            Field::LongRange => "long_range",
            Field::Runs => "runs",
            Field::Repeat => "repeat",
            Field::Seed => "seed",
            Field::NumThreads => "num_threads",
            Field::ResultsCsv => "results_csv",
            Field::ResultsLog => "results_log",
            Field::InputFile => "input_file",
            Field::BinaryInput => "binary_input",
            Field::Validate => "validate",
            Field::Verbose => "verbose",
            Field::PreloadTime => "Preload",
            Field::RawWritesTime => "Raw Writes",
            Field::RawReadsTime => "Raw Reads",
            Field::MixedTime => "Mixed",
            Field::UpdatesTime => "Updates",
            Field::ShortRangeTime => "Short Range",
            Field::MidRangeTime => "Mid Range",
            Field::LongRangeTime => "Long Range",
            Field::Size => "size",
            Field::Height => "height",
            Field::Internal => "internal",
            Field::Leaves => "leaves",
            Field::FastInserts => "fast_inserts",
            Field::Redistribute => "redistribute",
            Field::SoftResets => "soft_resets",
            Field::HardResets => "hard_resets",
            Field::FastInsertsFail => "fast_inserts_fail",
            Field::Sort => "sort",
        }
    }

    fn from_log_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.log_name() == name)
    }

    fn rule(self) -> Rule {
        match self {
            Field::RawReadPerc
            | Field::RawWritePerc
            | Field::MixedWritesPerc
            | Field::MixedReadsPerc
            | Field::UpdatesPerc
            | Field::ShortRange
            | Field::MidRange
            | Field::LongRange => Rule::Float,
            Field::ResultsCsv | Field::ResultsLog | Field::InputFile => Rule::Text,
            Field::BinaryInput | Field::Validate | Field::Verbose => Rule::Flag,
            _ => Rule::Integer,
        }
    }
}

impl ParsedRun {
    fn assign(&mut self, field: Field, value: Value) {
        let c = &mut self.config;
        let r = &mut self.result;
        match (field, value) {
            (Field::BlocksInMemory, Value::Integer(v)) => c.blocks_in_memory = v,
            (Field::RawReadPerc, Value::Float(v)) => c.raw_read_perc = v,
            (Field::RawWritePerc, Value::Float(v)) => c.raw_write_perc = v,
            (Field::MixedWritesPerc, Value::Float(v)) => c.mixed_writes_perc = v,
            (Field::MixedReadsPerc, Value::Float(v)) => c.mixed_reads_perc = v,
            (Field::UpdatesPerc, Value::Float(v)) => c.updates_perc = v,
            (Field::ShortRange, Value::Float(v)) => c.short_range = v,
            (Field::MidRange, Value::Float(v)) => c.mid_range = v,
            (Field::LongRange, Value::Float(v)) => c.long_range = v,
            (Field::Runs, Value::Integer(v)) => c.runs = v,
            (Field::Repeat, Value::Integer(v)) => c.repeat = v,
            (Field::Seed, Value::Integer(v)) => c.seed = v,
            (Field::NumThreads, Value::Integer(v)) => c.num_threads = v,
            (Field::ResultsCsv, Value::Text(v)) => c.results_csv = v,
            (Field::ResultsLog, Value::Text(v)) => c.results_log = v,
            (Field::InputFile, Value::Text(v)) => c.input_file = v,
            (Field::BinaryInput, Value::Flag(v)) => c.binary_input = v,
            (Field::Validate, Value::Flag(v)) => c.validate = v,
            (Field::Verbose, Value::Flag(v)) => c.verbose = v,
            (Field::PreloadTime, Value::Integer(v)) => r.preload_time = v,
            (Field::RawWritesTime, Value::Integer(v)) => r.raw_writes_time = v,
            (Field::RawReadsTime, Value::Integer(v)) => r.raw_reads_time = v,
            (Field::MixedTime, Value::Integer(v)) => r.mixed_time = v,
            (Field::UpdatesTime, Value::Integer(v)) => r.updates_time = v,
            (Field::ShortRangeTime, Value::Integer(v)) => r.short_range_time = v,
            (Field::MidRangeTime, Value::Integer(v)) => r.mid_range_time = v,
            (Field::LongRangeTime, Value::Integer(v)) => r.long_range_time = v,
            (Field::Size, Value::Integer(v)) => r.size = v,
            (Field::Height, Value::Integer(v)) => r.height = v,
            (Field::Internal, Value::Integer(v)) => r.internal = v,
            (Field::Leaves, Value::Integer(v)) => r.leaves = v,
            (Field::FastInserts, Value::Integer(v)) => r.fast_inserts = v,
            (Field::Redistribute, Value::Integer(v)) => r.redistribute = v,
            (Field::SoftResets, Value::Integer(v)) => r.soft_resets = v,
            (Field::HardResets, Value::Integer(v)) => r.hard_resets = v,
            (Field::FastInsertsFail, Value::Integer(v)) => r.fast_inserts_fail = v,
            (Field::Sort, Value::Integer(v)) => r.sort = v,
            (field, value) => {
                // Field::rule and this table disagree
                unreachable!("{:?} cannot hold {:?}", field, value)
            }
        }
    }
}

/// Parser for one benchmark's captured output. Build once, reuse per run.
pub struct ResultParser {
    line_re: Regex,
    integer_re: Regex,
    float_re: Regex,
    workload_re: Regex,
}

impl ResultParser {
    pub fn new() -> Result<Self, BenchError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| BenchError::Internal(format!("Invalid pattern '{}': {}", pattern, e)))
        };

        Ok(ResultParser {
            line_re: compile(
                r"\[[^\]]*\]\s*\[[^\]]*\]\s*\[info\]\s*(?P<name>[A-Za-z][A-Za-z_ ]*?):[ \t]*(?P<value>.*)",
            )?,
            integer_re: compile(r"^\d+")?,
            float_re: compile(r"^\d+(?:\.\d+)?")?,
            workload_re: compile(r"(\d+)_(\d+)_(\d+)")?,
        })
    }

    /// Recover the configuration and results of one run from its output.
    ///
    /// Never fails: absent fields are logged and left unreported.
    pub fn parse(&self, output: &str) -> ParsedRun {
        let mut run = ParsedRun {
            config: RunConfiguration::unreported(),
            result: RunResult::default(),
        };
        let mut seen: HashSet<Field> = HashSet::new();

        for line in output.lines() {
            let Some(caps) = self.line_re.captures(line) else {
                continue;
            };
            let Some(field) = Field::from_log_name(&caps["name"]) else {
                continue;
            };
            if seen.contains(&field) {
                continue;
            }
            if let Some(value) = self.read_value(field, &caps["value"]) {
                run.assign(field, value);
                seen.insert(field);
            }
        }

        for field in Field::ALL.iter().filter(|f| !seen.contains(*f)) {
            tracing::warn!(field = field.log_name(), "Field not reported by benchmark, using default");
        }

        // threads is inherited from the configuration once it is fully parsed
        run.result.threads = run.config.num_threads;

        match self.workload_identity(output) {
            Some(Ok((n, k, l))) => {
                run.result.n = n;
                run.result.k = k;
                run.result.l = l;
            }
            Some(Err(e)) => {
                // The last triple is authoritative; an earlier one is not a fallback.
                tracing::error!(error = %e, "Workload info out of range, recording zeros");
            }
            None => {
                tracing::error!("Workload info not found in the results");
            }
        }

        run
    }

    fn read_value(&self, field: Field, raw: &str) -> Option<Value> {
        match field.rule() {
            Rule::Integer => {
                let digits = self.integer_re.find(raw)?.as_str();
                match digits.parse::<i64>() {
                    Ok(v) => Some(Value::Integer(v)),
                    Err(e) => {
                        tracing::warn!(field = field.log_name(), value = digits, error = %e, "Ignoring unparseable value");
                        None
                    }
                }
            }
            Rule::Float => {
                let number = self.float_re.find(raw)?.as_str();
                number.parse::<f64>().ok().map(Value::Float)
            }
            Rule::Flag => {
                let token = raw.split_whitespace().next()?;
                Some(Value::Flag(token.eq_ignore_ascii_case("true")))
            }
            Rule::Text => Some(Value::Text(raw.trim_end().to_string())),
        }
    }

    /// Last `N_K_L` triple in the output, if any.
    fn workload_identity(&self, output: &str) -> Option<Result<(i64, i64, i64), ParseIntError>> {
        let caps = self.workload_re.captures_iter(output).last()?;
        Some(parse_triple(&caps))
    }
}

fn parse_triple(caps: &Captures<'_>) -> Result<(i64, i64, i64), ParseIntError> {
    Ok((caps[1].parse()?, caps[2].parse()?, caps[3].parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, value: &str) -> String {
        format!("[2025-01-01 10:00:00.000] [bench] [info] {}: {}\n", name, value)
    }

    fn parse(output: &str) -> ParsedRun {
        ResultParser::new().unwrap().parse(output)
    }

    #[test]
    fn test_every_field_round_trips() {
        let mut log = String::new();
        let config_fields = [
            ("blocks_in_memory", "1024"),
            ("raw_read_perc", "10"),
            ("raw_write_perc", "20"),
            ("mixed_writes_perc", "30"),
            ("mixed_reads_perc", "25"),
            ("updates_perc", "15"),
            ("short_range", "5"),
            ("mid_range", "3"),
            ("long_range", "1"),
            ("runs", "2"),
            ("repeat", "4"),
            ("seed", "99"),
            ("num_threads", "16"),
            ("results_csv", "out/results.csv"),
            ("results_log", "out/results.log"),
            ("input_file", "workloads/1000_5_1"),
            ("binary_input", "true"),
            ("validate", "false"),
            ("verbose", "true"),
        ];
        for (name, value) in config_fields {
            log.push_str(&line(name, value));
        }
        let result_fields = [
            ("Preload", 1001),
            ("Raw Writes", 1002),
            ("Raw Reads", 1003),
            ("Mixed", 1004),
            ("Updates", 1005),
            ("Short Range", 1006),
            ("Mid Range", 1007),
            ("Long Range", 1008),
            ("size", 1009),
            ("height", 1010),
            ("internal", 1011),
            ("leaves", 1012),
            ("fast_inserts", 1013),
            ("redistribute", 1014),
            ("soft_resets", 1015),
            ("hard_resets", 1016),
            ("fast_inserts_fail", 1017),
            ("sort", 1018),
        ];
        for (name, value) in result_fields {
            log.push_str(&line(name, &value.to_string()));
        }

        let run = parse(&log);
        let c = &run.config;
        assert_eq!(c.blocks_in_memory, 1024);
        assert_eq!(c.raw_read_perc, 10.0);
        assert_eq!(c.raw_write_perc, 20.0);
        assert_eq!(c.mixed_writes_perc, 30.0);
        assert_eq!(c.mixed_reads_perc, 25.0);
        assert_eq!(c.updates_perc, 15.0);
        assert_eq!(c.short_range, 5.0);
        assert_eq!(c.mid_range, 3.0);
        assert_eq!(c.long_range, 1.0);
        assert_eq!(c.runs, 2);
        assert_eq!(c.repeat, 4);
        assert_eq!(c.seed, 99);
        assert_eq!(c.num_threads, 16);
        assert_eq!(c.results_csv, "out/results.csv");
        assert_eq!(c.results_log, "out/results.log");
        assert_eq!(c.input_file, "workloads/1000_5_1");
        assert!(c.binary_input);
        assert!(!c.validate);
        assert!(c.verbose);

        let r = &run.result;
        assert_eq!(r.preload_time, 1001);
        assert_eq!(r.raw_writes_time, 1002);
        assert_eq!(r.raw_reads_time, 1003);
        assert_eq!(r.mixed_time, 1004);
        assert_eq!(r.updates_time, 1005);
        assert_eq!(r.short_range_time, 1006);
        assert_eq!(r.mid_range_time, 1007);
        assert_eq!(r.long_range_time, 1008);
        assert_eq!(r.size, 1009);
        assert_eq!(r.height, 1010);
        assert_eq!(r.internal, 1011);
        assert_eq!(r.leaves, 1012);
        assert_eq!(r.fast_inserts, 1013);
        assert_eq!(r.redistribute, 1014);
        assert_eq!(r.soft_resets, 1015);
        assert_eq!(r.hard_resets, 1016);
        assert_eq!(r.fast_inserts_fail, 1017);
        assert_eq!(r.sort, 1018);
        assert_eq!(r.threads, 16);
        assert_eq!((r.n, r.k, r.l), (1000, 5, 1));
    }

    #[test]
    fn test_latency_names_are_distinct_from_config_names() {
        let log = line("short_range", "7") + &line("Short Range", "123456");
        let run = parse(&log);
        assert_eq!(run.config.short_range, 7.0);
        assert_eq!(run.result.short_range_time, 123456);
    }

    #[test]
    fn test_absent_fields_use_unreported_defaults() {
        let run = parse("nothing useful here\n");
        assert_eq!(run.config, RunConfiguration::unreported());
        assert_eq!(run.result, RunResult::default());
    }

    #[test]
    fn test_end_to_end_scenario() {
        let log = "[01-01-25:00:00:00][x][info] size: 42\n\
                   [01-01-25:00:00:01][x][info] height: 3\n\
                   [01-01-25:00:00:02][x][info] 5_50_100\n";
        let run = parse(log);
        let expected = RunResult {
            size: 42,
            height: 3,
            n: 5,
            k: 50,
            l: 100,
            ..RunResult::default()
        };
        assert_eq!(run.result, expected);
    }

    #[test]
    fn test_threads_copied_from_configuration() {
        let log = line("num_threads", "12") + &line("size", "1");
        let run = parse(&log);
        assert_eq!(run.result.threads, 12);
    }

    #[test]
    fn test_workload_triple_last_occurrence_wins() {
        let log = line("input_file", "/data/workloads/5_50_100.bin")
            + &line("size", "10")
            + "7_10_20\n";
        let run = parse(&log);
        assert_eq!((run.result.n, run.result.k, run.result.l), (7, 10, 20));
        assert_eq!(run.config.input_file, "/data/workloads/5_50_100.bin");
    }

    #[test]
    fn test_workload_triple_missing_is_zero() {
        let run = parse(&line("size", "10"));
        assert_eq!((run.result.n, run.result.k, run.result.l), (0, 0, 0));
    }

    #[test]
    fn test_workload_triple_out_of_range_is_zero() {
        let run = parse("5_50_100\n99999999999999999999_1_2\n");
        assert_eq!((run.result.n, run.result.k, run.result.l), (0, 0, 0));
    }

    #[test]
    fn test_flag_parsing_ignores_case() {
        for token in ["TRUE", "true", "True"] {
            let run = parse(&line("binary_input", token));
            assert!(run.config.binary_input, "token {}", token);
        }
        for token in ["false", "yes", "1"] {
            let run = parse(&line("binary_input", token));
            assert!(!run.config.binary_input, "token {}", token);
        }
    }

    #[test]
    fn test_first_match_wins() {
        let log = line("size", "1") + &line("size", "2");
        assert_eq!(parse(&log).result.size, 1);
    }

    #[test]
    fn test_non_numeric_line_does_not_count_as_match() {
        let log = line("size", "unknown") + &line("size", "9");
        assert_eq!(parse(&log).result.size, 9);
    }

    #[test]
    fn test_similar_names_do_not_collide() {
        let log = line("fast_inserts_fail", "4") + &line("fast_inserts", "40");
        let run = parse(&log);
        assert_eq!(run.result.fast_inserts, 40);
        assert_eq!(run.result.fast_inserts_fail, 4);
    }

    #[test]
    fn test_other_levels_are_ignored() {
        let log = "[ts] [bench] [debug] size: 5\n[ts] [bench] [info] size: 6\n";
        assert_eq!(parse(log).result.size, 6);
    }

    #[test]
    fn test_text_values_keep_inner_spaces_and_trim_end() {
        let run = parse("[ts] [bench] [info] results_log: my results.log  \r\n");
        assert_eq!(run.config.results_log, "my results.log");
    }

    #[test]
    fn test_fractional_percentages() {
        let run = parse(&line("short_range", "0.25"));
        assert_eq!(run.config.short_range, 0.25);
    }

    #[test]
    fn test_integer_overflow_is_skipped() {
        let log = line("seed", "99999999999999999999999") + &line("seed", "7");
        assert_eq!(parse(&log).config.seed, 7);
    }
}
